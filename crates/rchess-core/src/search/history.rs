//! History統計
//!
//! 静かな手の成功/失敗を記録し、手の順序付けに利用する。
//!
//! - `main`: butterfly history [Color][from×to]
//! - `continuation`: 直前の手（駒×移動先）との組み合わせ [prev][cur]
//!
//! 更新は範囲制限付き（gravity方式）: 値は [-MAX_HISTORY, MAX_HISTORY] に
//! 飽和し、既に大きい値ほど増分が小さくなる。

use crate::types::{Color, Depth, Move, Piece, Square};

/// historyの値域
const MAX_HISTORY: i32 = 16_384;

/// 駒×移動先の組み合わせ数（continuation用）
const PIECE_TO: usize = Piece::NUM * Square::NUM;

/// カットオフボーナス（深さスケール、上限付き）
#[inline]
fn stat_bonus(depth: Depth) -> i32 {
    (140 * depth - 80).clamp(0, 1_600)
}

/// History統計テーブル
pub struct History {
    main: Box<[[i16; Square::NUM * Square::NUM]; Color::NUM]>,
    continuation: Box<[[i16; PIECE_TO]]>,
}

impl History {
    pub fn new() -> Box<History> {
        Box::new(History {
            main: Box::new([[0; Square::NUM * Square::NUM]; Color::NUM]),
            continuation: vec![[0; PIECE_TO]; PIECE_TO].into_boxed_slice(),
        })
    }

    /// 対局間でクリアする
    pub fn clear(&mut self) {
        for table in self.main.iter_mut() {
            table.fill(0);
        }
        for row in self.continuation.iter_mut() {
            row.fill(0);
        }
    }

    /// continuation history参照キー（指した駒×移動先）
    #[inline]
    pub fn continuation_key(c: Color, mv: Move) -> usize {
        Piece::new(c, mv.piece()).index() * Square::NUM + mv.to().index()
    }

    /// 静かな手の順序付けスコア
    #[inline]
    pub fn quiet_score(&self, c: Color, mv: Move, prev_key: Option<usize>) -> i32 {
        let mut score = self.main[c.index()][from_to(mv)] as i32;
        if let Some(prev) = prev_key {
            score += self.continuation[prev][Self::continuation_key(c, mv)] as i32;
        }
        score
    }

    /// β cutoffを起こした静かな手に加点し、先に試して失敗した静かな手を減点する
    pub fn update_cutoff(
        &mut self,
        c: Color,
        best: Move,
        prev_key: Option<usize>,
        tried_quiets: &[Move],
        depth: Depth,
    ) {
        let bonus = stat_bonus(depth);
        self.bump(c, best, prev_key, bonus);
        for &mv in tried_quiets {
            if mv != best {
                self.bump(c, mv, prev_key, -bonus);
            }
        }
    }

    fn bump(&mut self, c: Color, mv: Move, prev_key: Option<usize>, bonus: i32) {
        gravity_update(&mut self.main[c.index()][from_to(mv)], bonus);
        if let Some(prev) = prev_key {
            let cur = Self::continuation_key(c, mv);
            gravity_update(&mut self.continuation[prev][cur], bonus);
        }
    }
}

#[inline]
fn from_to(mv: Move) -> usize {
    mv.from().index() * Square::NUM + mv.to().index()
}

/// 範囲制限付き更新
#[inline]
fn gravity_update(entry: &mut i16, bonus: i32) {
    let clamped = bonus.clamp(-MAX_HISTORY, MAX_HISTORY);
    let v = *entry as i32 + clamped - (*entry as i32) * clamped.abs() / MAX_HISTORY;
    *entry = v as i16;
}
