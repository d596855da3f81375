//! TranspositionTable本体
//!
//! 固定長（2のべき乗）の配列を `hash & mask` で引き、(index, index^1) の
//! 2-wayバケットで運用する。置き換えは「(age - depth) が悪い方を追い出す」。
//! 深い既存エントリを浅い結果で上書きすることはない。
//!
//! 詰みスコアはroot距離に依存するため、store時にply分を足して
//! 「このノードからの距離」に正規化し、load時に引き戻す。

use std::sync::atomic::{AtomicU8, Ordering};

use crate::types::{Bound, Depth, Move, Value};

use super::entry::{pack_data, TtEntry};
use super::{ENTRIES_PER_MB, MAX_SIZE_MB};

/// probe結果
#[derive(Debug, Clone, Copy)]
pub struct TtLookup {
    /// ハッシュが一致するエントリがあったか
    pub hit: bool,
    /// 窓が解決した（呼び出し側は即リターンしてよい）か
    pub cutoff: bool,
    /// ply補正済みスコア（missならValue::NONE）
    pub score: Value,
    pub mv: Move,
    pub depth: Depth,
    pub bound: Bound,
}

impl TtLookup {
    const MISS: TtLookup = TtLookup {
        hit: false,
        cutoff: false,
        score: Value::NONE,
        mv: Move::NONE,
        depth: 0,
        bound: Bound::None,
    };
}

/// 置換表
pub struct TranspositionTable {
    table: Box<[TtEntry]>,
    mask: u64,
    /// 論理世代。トップレベル探索の完了ごとに1進める。
    version: AtomicU8,
}

impl TranspositionTable {
    /// 新しい置換表を作成（サイズはMB単位、2のべき乗に切り下げ）
    pub fn new(mb_size: usize) -> TranspositionTable {
        let capacity = Self::capacity_for(mb_size);
        TranspositionTable {
            table: Self::allocate(capacity),
            mask: (capacity - 1) as u64,
            version: AtomicU8::new(0),
        }
    }

    fn capacity_for(mb_size: usize) -> usize {
        let mb = mb_size.clamp(1, MAX_SIZE_MB);
        let mb = if mb.is_power_of_two() {
            mb
        } else {
            // 2のべき乗に切り下げ
            usize::pow(2, mb.ilog2())
        };
        mb * ENTRIES_PER_MB
    }

    fn allocate(capacity: usize) -> Box<[TtEntry]> {
        (0..capacity).map(|_| TtEntry::default()).collect()
    }

    /// サイズを変更（破壊的。リハッシュはしない）
    pub fn resize(&mut self, mb_size: usize) {
        let capacity = Self::capacity_for(mb_size);
        if capacity != self.table.len() {
            self.table = Self::allocate(capacity);
            self.mask = (capacity - 1) as u64;
        }
    }

    /// 全エントリをクリア（対局間で呼ぶ）
    pub fn clear(&mut self) {
        self.version.store(0, Ordering::Relaxed);
        for entry in self.table.iter() {
            entry.clear();
        }
    }

    /// 世代を1進める（トップレベル探索の完了時）
    pub fn increment_version(&self) {
        self.version.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn version(&self) -> u8 {
        self.version.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.table.len()
    }

    /// 探索結果を登録する
    ///
    /// `alpha`/`beta` は枝刈りで動かす前のオリジナル窓であること。
    /// bound種別はこの窓とscoreの位置関係から分類する。
    pub fn add(
        &self,
        hash: u64,
        depth: Depth,
        ply: i32,
        alpha: Value,
        beta: Value,
        score: Value,
        mv: Move,
    ) {
        debug_assert!((-128..=127).contains(&depth));
        let index = self.store_index(hash);
        let entry = &self.table[index];

        let mut best_move = mv;
        if entry.is_valid(hash) {
            let old = entry.read();
            if old.depth > depth {
                return; // 深いエントリは温存
            }
            if best_move.is_none() {
                best_move = old.mv;
            }
        }

        let mut score = score;
        if score.is_mate_score() {
            score = score + score.raw().signum() * ply;
        }

        let bound = if score <= alpha {
            Bound::Upper
        } else if score >= beta {
            Bound::Lower
        } else {
            Bound::Exact
        };

        entry.write(hash, pack_data(best_move, score, bound, depth, 0));
    }

    /// スコアの取得を試みる
    ///
    /// ハッシュ一致時はエントリ内容（手・深さ・bound・ply補正済みスコア）を
    /// 常に返す。保存深さが要求深さ以上で、boundが窓を解決するときだけ
    /// `cutoff` が立つ。片側boundは `alpha`/`beta` をその場で締める。
    pub fn try_get_score(
        &self,
        hash: u64,
        depth: Depth,
        ply: i32,
        alpha: &mut Value,
        beta: &mut Value,
    ) -> TtLookup {
        let Some(index) = self.load_index(hash) else {
            return TtLookup::MISS;
        };
        let data = self.table[index].read();

        let mut score = data.score;
        if score.is_mate_score() {
            score = score - score.raw().signum() * ply;
        }

        let mut lookup = TtLookup {
            hit: true,
            cutoff: false,
            score,
            mv: data.mv,
            depth: data.depth,
            bound: data.bound,
        };

        if data.depth < depth {
            return lookup;
        }

        match data.bound {
            Bound::Exact => lookup.cutoff = true,
            Bound::Upper => {
                *beta = (*beta).min(score);
                lookup.cutoff = *alpha >= *beta;
            }
            Bound::Lower => {
                *alpha = (*alpha).max(score);
                lookup.cutoff = *alpha >= *beta;
            }
            Bound::None => {}
        }
        lookup
    }

    /// 最善手のみ取得
    pub fn try_get_best_move(&self, hash: u64) -> Move {
        match self.load_index(hash) {
            Some(index) => self.table[index].read().mv,
            None => Move::NONE,
        }
    }

    /// 最善手とboundを取得（PV延長用）
    pub fn try_get_best_move_with_bound(&self, hash: u64) -> (Move, Bound) {
        match self.load_index(hash) {
            Some(index) => {
                let data = self.table[index].read();
                (data.mv, data.bound)
            }
            None => (Move::NONE, Bound::None),
        }
    }

    /// 使用率（千分率）。先頭のサンプルだけ数える。
    pub fn usage(&self) -> u32 {
        let sample = self.table.len().min(1000);
        let used = self.table[..sample]
            .iter()
            .filter(|e| e.load() != (0, 0))
            .count();
        (used * 1000 / sample) as u32
    }

    /// 書き込み先のインデックスを選ぶ
    ///
    /// 一致エントリを優先。なければバケット両者のエイジを進めたうえで
    /// (age - depth) が悪い方を返す。
    fn store_index(&self, hash: u64) -> usize {
        let index = (hash & self.mask) as usize;
        let e0 = &self.table[index];
        if e0.is_valid(hash) {
            return index;
        }
        let e1 = &self.table[index ^ 1];
        if e1.is_valid(hash) {
            return index ^ 1;
        }

        let d0 = e0.read();
        let d1 = e1.read();
        let age0 = d0.age.saturating_add(1);
        let age1 = d1.age.saturating_add(1);
        e0.set_age(age0);
        e1.set_age(age1);

        if (age0 as i32 - d0.depth) > (age1 as i32 - d1.depth) {
            index
        } else {
            index ^ 1
        }
    }

    /// 読み出しインデックスの解決（ヒット時はエイジを0に戻す）
    fn load_index(&self, hash: u64) -> Option<usize> {
        let mut index = (hash & self.mask) as usize;
        if !self.table[index].is_valid(hash) {
            index ^= 1;
            if !self.table[index].is_valid(hash) {
                return None;
            }
        }
        self.table[index].set_age(0);
        Some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MoveKind, PieceType, Square};

    fn tiny_tt() -> TranspositionTable {
        TranspositionTable::new(1)
    }

    fn any_move() -> Move {
        Move::new(Square::E1, Square::E8, MoveKind::Quiet, PieceType::Rook)
    }

    const WIDE: (Value, Value) = (Value::new(-30_000), Value::new(30_000));

    #[test]
    fn test_roundtrip_exact() {
        let tt = tiny_tt();
        let hash = 0x1122_3344_5566_7788u64;
        tt.add(hash, 8, 0, WIDE.0, WIDE.1, Value::new(42), any_move());

        let (mut a, mut b) = WIDE;
        let lookup = tt.try_get_score(hash, 8, 0, &mut a, &mut b);
        assert!(lookup.hit);
        assert!(lookup.cutoff);
        assert_eq!(lookup.score, Value::new(42));
        assert_eq!(lookup.bound, Bound::Exact);
        assert_eq!(lookup.mv, any_move());
    }

    #[test]
    fn test_shallower_query_hits() {
        let tt = tiny_tt();
        let hash = 0xaaaa_bbbb_cccc_ddddu64;
        tt.add(hash, 10, 0, WIDE.0, WIDE.1, Value::new(7), Move::NONE);
        let (mut a, mut b) = WIDE;
        assert!(tt.try_get_score(hash, 6, 0, &mut a, &mut b).cutoff);
        let (mut a, mut b) = WIDE;
        assert!(tt.try_get_score(hash, 10, 0, &mut a, &mut b).cutoff);
        // 深さ不足: ヒットはするがカットオフしない
        let (mut a, mut b) = WIDE;
        let lookup = tt.try_get_score(hash, 11, 0, &mut a, &mut b);
        assert!(lookup.hit);
        assert!(!lookup.cutoff);
    }

    #[test]
    fn test_bound_classification() {
        let tt = tiny_tt();
        let alpha = Value::new(0);
        let beta = Value::new(100);

        // 下位ビットを変えて別バケットに載せる
        tt.add(0x1010, 5, 0, alpha, beta, Value::new(-10), Move::NONE);
        let (mut a, mut b) = WIDE;
        let lookup = tt.try_get_score(0x1010, 5, 0, &mut a, &mut b);
        assert_eq!(lookup.bound, Bound::Upper);

        tt.add(0x2020, 5, 0, alpha, beta, Value::new(150), Move::NONE);
        let (mut a, mut b) = WIDE;
        let lookup = tt.try_get_score(0x2020, 5, 0, &mut a, &mut b);
        assert_eq!(lookup.bound, Bound::Lower);

        tt.add(0x3030, 5, 0, alpha, beta, Value::new(50), Move::NONE);
        let (mut a, mut b) = WIDE;
        let lookup = tt.try_get_score(0x3030, 5, 0, &mut a, &mut b);
        assert_eq!(lookup.bound, Bound::Exact);
    }

    #[test]
    fn test_one_sided_bound_tightens_window() {
        let tt = tiny_tt();
        let hash = 0x5555_0000_1111_2222u64;
        // lower bound 80
        tt.add(hash, 6, 0, Value::new(0), Value::new(50), Value::new(80), Move::NONE);

        let mut a = Value::new(-10);
        let mut b = Value::new(200);
        let lookup = tt.try_get_score(hash, 6, 0, &mut a, &mut b);
        assert!(!lookup.cutoff);
        assert_eq!(a, Value::new(80)); // alphaが締まる

        let mut a = Value::new(-10);
        let mut b = Value::new(60);
        let lookup = tt.try_get_score(hash, 6, 0, &mut a, &mut b);
        assert!(lookup.cutoff); // 80 >= 60 で解決
    }

    #[test]
    fn test_mate_score_ply_adjustment() {
        let tt = tiny_tt();
        let hash = 0x9999_8888_7777_6666u64;
        // ply 4のノードで「3手先で詰ます」スコアを保存
        let score = Value::mate_in(7);
        tt.add(hash, 6, 4, WIDE.0, WIDE.1, score, Move::NONE);

        // 同じ局面にply 2で到達した場合、root距離に合わせて補正される
        let (mut a, mut b) = WIDE;
        let lookup = tt.try_get_score(hash, 6, 2, &mut a, &mut b);
        assert_eq!(lookup.score, Value::mate_in(5));
    }

    #[test]
    fn test_deeper_entry_not_replaced() {
        let tt = tiny_tt();
        let hash = 0x1234_0000_5678_0000u64;
        tt.add(hash, 12, 0, WIDE.0, WIDE.1, Value::new(99), any_move());
        tt.add(hash, 3, 0, WIDE.0, WIDE.1, Value::new(-99), Move::NONE);

        let (mut a, mut b) = WIDE;
        let lookup = tt.try_get_score(hash, 1, 0, &mut a, &mut b);
        assert_eq!(lookup.score, Value::new(99));
        assert_eq!(lookup.depth, 12);
    }

    #[test]
    fn test_move_preserved_when_storing_without_move() {
        let tt = tiny_tt();
        let hash = 0xfedc_ba98_7654_3210u64;
        tt.add(hash, 4, 0, WIDE.0, WIDE.1, Value::new(10), any_move());
        // 同じ深さで手なしの結果を上書きしても手は残る
        tt.add(hash, 4, 0, WIDE.0, WIDE.1, Value::new(20), Move::NONE);
        assert_eq!(tt.try_get_best_move(hash), any_move());
    }

    #[test]
    fn test_read_resets_age() {
        let tt = tiny_tt();
        let hash = 0x0f0f_0f0f_f0f0_f0f0u64;
        tt.add(hash, 4, 0, WIDE.0, WIDE.1, Value::new(1), Move::NONE);

        // バケットメイトへの書き込みでエイジが進む
        let mate_hash = hash ^ 1;
        for i in 0..3u64 {
            tt.add(
                mate_hash ^ (i << 32),
                1,
                0,
                WIDE.0,
                WIDE.1,
                Value::new(0),
                Move::NONE,
            );
        }

        let (mut a, mut b) = WIDE;
        let lookup = tt.try_get_score(hash, 1, 0, &mut a, &mut b);
        if lookup.hit {
            // 読み出し後はエイジ0に戻っている
            let (mut a2, mut b2) = WIDE;
            let again = tt.try_get_score(hash, 1, 0, &mut a2, &mut b2);
            assert!(again.hit);
        }
    }

    #[test]
    fn test_clear_and_resize() {
        let mut tt = tiny_tt();
        let hash = 0x1111_2222_3333_4444u64;
        tt.add(hash, 4, 0, WIDE.0, WIDE.1, Value::new(5), Move::NONE);
        tt.increment_version();
        assert_eq!(tt.version(), 1);

        tt.clear();
        assert_eq!(tt.version(), 0);
        let (mut a, mut b) = WIDE;
        assert!(!tt.try_get_score(hash, 0, 0, &mut a, &mut b).hit);

        let old_capacity = tt.capacity();
        tt.resize(2);
        assert_eq!(tt.capacity(), old_capacity * 2);
        // 2のべき乗でないサイズは切り下げ
        tt.resize(3);
        assert_eq!(tt.capacity(), old_capacity * 2);
    }

    #[test]
    fn test_quiescence_depth_does_not_satisfy_main_search() {
        let tt = tiny_tt();
        let hash = 0x4444_5555_6666_7777u64;
        // 静止探索の結果（非正深さ）
        tt.add(hash, -2, 0, WIDE.0, WIDE.1, Value::new(30), Move::NONE);

        // 深さ1の本探索には使えない
        let (mut a, mut b) = WIDE;
        assert!(!tt.try_get_score(hash, 1, 0, &mut a, &mut b).cutoff);
        // より浅い静止探索には使える
        let (mut a, mut b) = WIDE;
        assert!(tt.try_get_score(hash, -3, 0, &mut a, &mut b).cutoff);
    }
}
