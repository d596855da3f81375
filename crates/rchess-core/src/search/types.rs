//! 探索用の型定義
//!
//! - `SearchLimits`: 深さ・ノード数などの探索制限
//! - `StackEntry` / `SearchStack`: plyごとの探索スタック
//! - `PvTable`: principal variationの三角テーブル
//! - `InfoEvent` / `SearchResult`: 報告用

use std::time::Duration;

use crate::types::{Bound, Depth, Move, Value, MAX_PLY};

/// 探索制限
#[derive(Debug, Clone)]
pub struct SearchLimits {
    /// 最大深さ
    pub max_depth: Depth,
    /// 最大ノード数
    pub max_nodes: u64,
    /// ponderモードで開始するか
    pub ponder: bool,
}

impl Default for SearchLimits {
    fn default() -> Self {
        SearchLimits {
            max_depth: MAX_PLY - 1,
            max_nodes: u64::MAX,
            ponder: false,
        }
    }
}

/// キラームーブの2枠
#[derive(Debug, Clone, Copy, Default)]
pub struct KillerPair {
    pub primary: Move,
    pub secondary: Move,
}

impl KillerPair {
    /// 先頭に挿入（重複は並べ替えない）
    #[inline]
    pub fn add(&mut self, mv: Move) {
        if self.primary != mv {
            self.secondary = self.primary;
            self.primary = mv;
        }
    }

    #[inline]
    pub fn contains(&self, mv: Move) -> bool {
        self.primary == mv || self.secondary == mv
    }
}

/// plyごとの探索スタックエントリ
///
/// `current_move` 系のフィールドは「このノードで今指した手」を保持し、
/// 子ノードが `ply - 1` を参照して読む。
#[derive(Debug, Clone, Copy)]
pub struct StackEntry {
    /// このノードで指した手
    pub current_move: Move,
    /// その手が王手だったか
    pub is_checking_move: bool,
    /// その手が昇格を脅かすか
    pub is_promotion_threat: bool,
    /// continuation history参照キー（駒×移動先）
    pub cont_key: Option<usize>,
    /// キラームーブ
    pub killers: KillerPair,
    /// 静的評価のキャッシュ（王手中はNONE）
    pub eval: Value,
    /// singular extension検証中に除外する手
    pub excluded: Move,
}

impl Default for StackEntry {
    fn default() -> Self {
        StackEntry {
            current_move: Move::NONE,
            is_checking_move: false,
            is_promotion_threat: false,
            cont_key: None,
            killers: KillerPair::default(),
            eval: Value::NONE,
            excluded: Move::NONE,
        }
    }
}

/// 探索スタック
///
/// ply -1（root直前の番兵）からMAX_PLYまでをバイアス付き添字で保持する。
/// 負数添字の代わりに `PRE_ROOT` 分だけずらしてアクセスする。
pub struct SearchStack {
    entries: [StackEntry; (MAX_PLY + 2) as usize],
}

/// 番兵のオフセット（entry(-1)が配列先頭になる）
const PRE_ROOT: i32 = 1;

impl SearchStack {
    pub fn new() -> SearchStack {
        SearchStack {
            entries: [StackEntry::default(); (MAX_PLY + 2) as usize],
        }
    }

    #[inline]
    pub fn entry(&self, ply: i32) -> &StackEntry {
        debug_assert!((-1..=MAX_PLY).contains(&ply));
        &self.entries[(ply + PRE_ROOT) as usize]
    }

    #[inline]
    pub fn entry_mut(&mut self, ply: i32) -> &mut StackEntry {
        debug_assert!((-1..=MAX_PLY).contains(&ply));
        &mut self.entries[(ply + PRE_ROOT) as usize]
    }

    /// 全エントリを初期状態に戻す（トップレベル探索の終了時）
    pub fn clear(&mut self) {
        self.entries = [StackEntry::default(); (MAX_PLY + 2) as usize];
    }
}

impl Default for SearchStack {
    fn default() -> Self {
        SearchStack::new()
    }
}

/// PVテーブル
///
/// plyごとの最善応手列。子plyの列の先頭に手を継ぎ足して親plyの列を作る。
pub struct PvTable {
    table: Box<[[Move; MAX_PLY as usize]; (MAX_PLY + 1) as usize]>,
    len: [usize; (MAX_PLY + 1) as usize],
}

impl PvTable {
    pub fn new() -> PvTable {
        PvTable {
            table: Box::new([[Move::NONE; MAX_PLY as usize]; (MAX_PLY + 1) as usize]),
            len: [0; (MAX_PLY + 1) as usize],
        }
    }

    /// ノード進入時にそのplyのPVを空にする
    #[inline]
    pub fn init(&mut self, ply: i32) {
        self.len[ply as usize] = 0;
    }

    /// 子plyのPVの先頭にmvを継ぎ足す
    pub fn merge(&mut self, ply: i32, mv: Move) {
        let ply = ply as usize;
        let child_len = self.len[ply + 1].min(MAX_PLY as usize - 1);
        self.table[ply][0] = mv;
        // 子の列を1つ後ろにずらしてコピー
        let (parent, child) = {
            let (a, b) = self.table.split_at_mut(ply + 1);
            (&mut a[ply], &b[0])
        };
        parent[1..=child_len].copy_from_slice(&child[..child_len]);
        self.len[ply] = child_len + 1;
    }

    /// rootのPV
    pub fn line(&self) -> &[Move] {
        &self.table[0][..self.len[0]]
    }

    pub fn clear(&mut self) {
        self.len = [0; (MAX_PLY + 1) as usize];
    }
}

impl Default for PvTable {
    fn default() -> Self {
        PvTable::new()
    }
}

/// 探索の進捗イベント
#[derive(Debug, Clone)]
pub enum InfoEvent {
    /// 1反復の完了、またはaspiration失敗時の暫定報告
    Iteration {
        depth: Depth,
        seldepth: i32,
        score: Value,
        /// Exact=確定値、Lower/Upper=aspiration失敗の暫定境界
        bound: Bound,
        nodes: u64,
        elapsed: Duration,
        hashfull: u32,
        pv: Vec<Move>,
    },
    /// root直下で探索中の手
    CurrMove {
        depth: Depth,
        mv: Move,
        move_number: usize,
        nodes: u64,
    },
}

/// 探索結果
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub best_move: Move,
    pub ponder_move: Option<Move>,
    pub score: Value,
    pub depth: Depth,
    pub seldepth: i32,
    pub nodes: u64,
    pub elapsed: Duration,
}
