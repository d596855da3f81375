//! 置換表エントリ
//!
//! 16バイト（key 8 + data 8）の固定レコード。dataのビットレイアウト:
//!
//! - bit  0-23: 最善手（Moveの24bitパック）
//! - bit 24-39: スコア（i16）
//! - bit 40-41: 境界種別（Bound）
//! - bit 42-49: 深さ（i8、静止探索は非正値）
//! - bit 50-57: 世代エイジ
//!
//! pack/unpackは純関数に分離してあり、エントリ本体はAtomicU64の組。
//! 単一スレッド前提だが、共有されても壊れた読み出しはXOR検証で弾ける
//! （lock-free風の設計。並列探索で共有するなら外部で調停すること）。

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{Bound, Depth, Move, Value};

/// アンパック済みのエントリ内容
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtData {
    pub mv: Move,
    pub score: Value,
    pub bound: Bound,
    pub depth: Depth,
    pub age: u8,
}

impl TtData {
    pub const EMPTY: TtData = TtData {
        mv: Move::NONE,
        score: Value::ZERO,
        bound: Bound::None,
        depth: 0,
        age: 0,
    };
}

/// dataワードへのパック
#[inline]
pub fn pack_data(mv: Move, score: Value, bound: Bound, depth: Depth, age: u8) -> u64 {
    debug_assert!((-128..=127).contains(&depth));
    debug_assert!((i16::MIN as i32..=i16::MAX as i32).contains(&score.raw()));
    (mv.to_bits() as u64)
        | ((score.raw() as i16 as u16 as u64) << 24)
        | ((bound.bits() as u64) << 40)
        | ((depth as i8 as u8 as u64) << 42)
        | ((age as u64) << 50)
}

/// dataワードからのアンパック
#[inline]
pub fn unpack_data(data: u64) -> TtData {
    TtData {
        mv: Move::from_bits((data & 0x00ff_ffff) as u32),
        score: Value::new(((data >> 24) as u16) as i16 as i32),
        bound: Bound::from_bits(((data >> 40) & 3) as u8),
        depth: ((data >> 42) as u8) as i8 as i32,
        age: (data >> 50) as u8,
    }
}

/// dataワードのエイジだけ差し替える
#[inline]
pub fn with_age(data: u64, age: u8) -> u64 {
    (data & !(0xffu64 << 50)) | ((age as u64) << 50)
}

/// 置換表エントリ
///
/// `key`は`fullHash ^ data`を保持する。
#[derive(Default)]
pub struct TtEntry {
    key: AtomicU64,
    data: AtomicU64,
}

impl TtEntry {
    /// 生のkey/dataを読む
    #[inline]
    pub fn load(&self) -> (u64, u64) {
        (
            self.key.load(Ordering::Relaxed),
            self.data.load(Ordering::Relaxed),
        )
    }

    /// hashに対して有効なエントリか（XOR検証）
    #[inline]
    pub fn is_valid(&self, hash: u64) -> bool {
        let (key, data) = self.load();
        key ^ data == hash
    }

    /// エントリ内容を読む（有効性は呼び出し側で確認済みであること）
    #[inline]
    pub fn read(&self) -> TtData {
        unpack_data(self.data.load(Ordering::Relaxed))
    }

    /// エントリを書き込む
    #[inline]
    pub fn write(&self, hash: u64, data: u64) {
        self.data.store(data, Ordering::Relaxed);
        self.key.store(hash ^ data, Ordering::Relaxed);
    }

    /// エイジを書き換える（XOR検証を保ったまま）
    #[inline]
    pub fn set_age(&self, age: u8) {
        let (key, data) = self.load();
        let full = key ^ data;
        let new_data = with_age(data, age);
        self.data.store(new_data, Ordering::Relaxed);
        self.key.store(full ^ new_data, Ordering::Relaxed);
    }

    /// 空にする
    #[inline]
    pub fn clear(&self) {
        self.key.store(0, Ordering::Relaxed);
        self.data.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MoveKind, PieceType, Square};

    #[test]
    fn test_pack_unpack_roundtrip() {
        let mv = Move::new(Square::E1, Square::G1, MoveKind::CastleKing, PieceType::King);
        let data = pack_data(mv, Value::new(-123), Bound::Lower, -5, 7);
        let unpacked = unpack_data(data);
        assert_eq!(unpacked.mv, mv);
        assert_eq!(unpacked.score, Value::new(-123));
        assert_eq!(unpacked.bound, Bound::Lower);
        assert_eq!(unpacked.depth, -5);
        assert_eq!(unpacked.age, 7);
    }

    #[test]
    fn test_negative_score_and_depth() {
        let data = pack_data(Move::NONE, Value::new(-32000), Bound::Upper, 127, 255);
        let unpacked = unpack_data(data);
        assert_eq!(unpacked.score.raw(), -32000);
        assert_eq!(unpacked.depth, 127);
        assert_eq!(unpacked.age, 255);
    }

    #[test]
    fn test_xor_validation() {
        let entry = TtEntry::default();
        let hash = 0xdead_beef_1234_5678u64;
        let data = pack_data(Move::NONE, Value::new(50), Bound::Exact, 10, 0);
        entry.write(hash, data);
        assert!(entry.is_valid(hash));
        assert!(!entry.is_valid(hash ^ 1));
    }

    #[test]
    fn test_set_age_preserves_validity() {
        let entry = TtEntry::default();
        let hash = 0x0123_4567_89ab_cdefu64;
        entry.write(hash, pack_data(Move::NONE, Value::new(1), Bound::Exact, 3, 9));
        entry.set_age(0);
        assert!(entry.is_valid(hash));
        assert_eq!(entry.read().age, 0);
        assert_eq!(entry.read().depth, 3);
    }

    #[test]
    fn test_entry_is_16_bytes() {
        assert_eq!(std::mem::size_of::<TtEntry>(), super::super::ENTRY_SIZE);
    }
}
