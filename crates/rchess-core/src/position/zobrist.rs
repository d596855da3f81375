//! Zobristハッシュのキーテーブル
//!
//! rand_xoshiroを固定シードで回して再現可能なキー列を生成する。
//! キーは 駒×マス / 手番 / キャスリング権 / アンパサン筋 の4系統。

use std::sync::LazyLock;

use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::types::{Piece, Square};

/// キー生成用の固定シード（変更すると既存ハッシュと互換性がなくなる）
const ZOBRIST_SEED: u64 = 0x5851_f42d_4c95_7f2d;

pub struct ZobristKeys {
    /// [piece][square]
    pub piece: [[u64; Square::NUM]; Piece::NUM],
    /// 黒番のときにXORする
    pub side: u64,
    /// キャスリング権の4bitマスクごと
    pub castling: [u64; 16],
    /// アンパサン対象の筋ごと
    pub ep_file: [u64; 8],
}

pub static KEYS: LazyLock<ZobristKeys> = LazyLock::new(|| {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(ZOBRIST_SEED);
    let mut piece = [[0u64; Square::NUM]; Piece::NUM];
    for row in piece.iter_mut() {
        for key in row.iter_mut() {
            *key = rng.next_u64();
        }
    }
    let side = rng.next_u64();
    let mut castling = [0u64; 16];
    // 空のマスクはXORが恒等になるよう0のまま
    for key in castling.iter_mut().skip(1) {
        *key = rng.next_u64();
    }
    let mut ep_file = [0u64; 8];
    for key in ep_file.iter_mut() {
        *key = rng.next_u64();
    }
    ZobristKeys {
        piece,
        side,
        castling,
        ep_file,
    }
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_deterministic() {
        // LazyLockの二重参照で同じテーブルが得られる
        assert_eq!(KEYS.piece[0][0], KEYS.piece[0][0]);
        assert_ne!(KEYS.piece[0][0], KEYS.piece[0][1]);
        assert_ne!(KEYS.side, 0);
    }

    #[test]
    fn test_keys_mostly_distinct() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        for row in KEYS.piece.iter() {
            for &k in row.iter() {
                assert!(set.insert(k));
            }
        }
    }
}
