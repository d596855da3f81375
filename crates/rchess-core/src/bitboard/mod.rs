//! ビットボード
//!
//! - `Bitboard`: u64のnewtype（1bit = 1マス）
//! - 跳び駒（桂相当のナイト・王・ポーン）の攻撃テーブル
//! - 走り駒（ビショップ・ルーク・クイーン）のレイ + ブロッカー方式の利き計算
//!
//! レイテーブルは初回アクセス時にLazyLockで構築する。
//! magic bitboardは使わない（古典的なray-walkで十分な速度が出る）。

use std::sync::LazyLock;

use crate::types::{Color, Square};

/// ビットボード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct Bitboard(pub u64);

impl Bitboard {
    pub const EMPTY: Bitboard = Bitboard(0);
    pub const ALL: Bitboard = Bitboard(!0);

    pub const FILE_A: Bitboard = Bitboard(0x0101_0101_0101_0101);
    pub const FILE_H: Bitboard = Bitboard(0x8080_8080_8080_8080);
    pub const RANK_1: Bitboard = Bitboard(0x0000_0000_0000_00ff);
    pub const RANK_2: Bitboard = Bitboard(0x0000_0000_0000_ff00);
    pub const RANK_7: Bitboard = Bitboard(0x00ff_0000_0000_0000);
    pub const RANK_8: Bitboard = Bitboard(0xff00_0000_0000_0000);

    #[inline]
    pub const fn from_square(sq: Square) -> Bitboard {
        Bitboard(sq.bb())
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_set(self, sq: Square) -> bool {
        self.0 & sq.bb() != 0
    }

    #[inline]
    pub fn set(&mut self, sq: Square) {
        self.0 |= sq.bb();
    }

    #[inline]
    pub fn clear(&mut self, sq: Square) {
        self.0 &= !sq.bb();
    }

    #[inline]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// 最下位bitのマス（空の場合は未定義）
    #[inline]
    pub const fn lsb(self) -> Square {
        debug_assert!(self.0 != 0);
        Square::new(self.0.trailing_zeros() as u8)
    }

    /// 最上位bitのマス（空の場合は未定義）
    #[inline]
    pub const fn msb(self) -> Square {
        debug_assert!(self.0 != 0);
        Square::new(63 - self.0.leading_zeros() as u8)
    }

    /// 最下位bitを取り出して消す
    #[inline]
    pub fn pop(&mut self) -> Option<Square> {
        if self.0 == 0 {
            return None;
        }
        let sq = self.lsb();
        self.0 &= self.0 - 1;
        Some(sq)
    }
}

impl Iterator for Bitboard {
    type Item = Square;

    #[inline]
    fn next(&mut self) -> Option<Square> {
        self.pop()
    }
}

impl std::ops::BitAnd for Bitboard {
    type Output = Bitboard;
    #[inline]
    fn bitand(self, rhs: Bitboard) -> Bitboard {
        Bitboard(self.0 & rhs.0)
    }
}

impl std::ops::BitOr for Bitboard {
    type Output = Bitboard;
    #[inline]
    fn bitor(self, rhs: Bitboard) -> Bitboard {
        Bitboard(self.0 | rhs.0)
    }
}

impl std::ops::BitXor for Bitboard {
    type Output = Bitboard;
    #[inline]
    fn bitxor(self, rhs: Bitboard) -> Bitboard {
        Bitboard(self.0 ^ rhs.0)
    }
}

impl std::ops::Not for Bitboard {
    type Output = Bitboard;
    #[inline]
    fn not(self) -> Bitboard {
        Bitboard(!self.0)
    }
}

impl std::ops::BitAndAssign for Bitboard {
    #[inline]
    fn bitand_assign(&mut self, rhs: Bitboard) {
        self.0 &= rhs.0;
    }
}

impl std::ops::BitOrAssign for Bitboard {
    #[inline]
    fn bitor_assign(&mut self, rhs: Bitboard) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitXorAssign for Bitboard {
    #[inline]
    fn bitxor_assign(&mut self, rhs: Bitboard) {
        self.0 ^= rhs.0;
    }
}

impl std::fmt::Display for Bitboard {
    /// 盤面形式のデバッグ出力（8段目が上）
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for rank in (0..8).rev() {
            for file in 0..8 {
                let sq = Square::new(rank * 8 + file);
                write!(f, "{}", if self.is_set(sq) { " x" } else { " ." })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

// =============================================================================
// 攻撃テーブル
// =============================================================================

/// レイの方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
enum Dir {
    North = 0,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl Dir {
    const ALL: [Dir; 8] = [
        Dir::North,
        Dir::South,
        Dir::East,
        Dir::West,
        Dir::NorthEast,
        Dir::NorthWest,
        Dir::SouthEast,
        Dir::SouthWest,
    ];

    const BISHOP: [Dir; 4] = [Dir::NorthEast, Dir::NorthWest, Dir::SouthEast, Dir::SouthWest];
    const ROOK: [Dir; 4] = [Dir::North, Dir::South, Dir::East, Dir::West];

    /// (筋の増分, 段の増分)
    const fn delta(self) -> (i8, i8) {
        match self {
            Dir::North => (0, 1),
            Dir::South => (0, -1),
            Dir::East => (1, 0),
            Dir::West => (-1, 0),
            Dir::NorthEast => (1, 1),
            Dir::NorthWest => (-1, 1),
            Dir::SouthEast => (1, -1),
            Dir::SouthWest => (-1, -1),
        }
    }

    /// 正方向（lsb側にブロッカーが現れる方向）か
    const fn is_positive(self) -> bool {
        matches!(self, Dir::North | Dir::East | Dir::NorthEast | Dir::NorthWest)
    }
}

struct AttackTables {
    knight: [Bitboard; 64],
    king: [Bitboard; 64],
    pawn: [[Bitboard; 64]; 2],
    rays: [[Bitboard; 64]; 8],
}

static TABLES: LazyLock<AttackTables> = LazyLock::new(AttackTables::init);

impl AttackTables {
    fn init() -> AttackTables {
        let mut knight = [Bitboard::EMPTY; 64];
        let mut king = [Bitboard::EMPTY; 64];
        let mut pawn = [[Bitboard::EMPTY; 64]; 2];
        let mut rays = [[Bitboard::EMPTY; 64]; 8];

        for sq in 0..64u8 {
            let file = (sq & 7) as i8;
            let rank = (sq >> 3) as i8;

            const KNIGHT_DELTAS: [(i8, i8); 8] = [
                (1, 2),
                (2, 1),
                (2, -1),
                (1, -2),
                (-1, -2),
                (-2, -1),
                (-2, 1),
                (-1, 2),
            ];
            for (df, dr) in KNIGHT_DELTAS {
                if let Some(t) = target(file, rank, df, dr) {
                    knight[sq as usize].set(t);
                }
            }

            for df in -1..=1i8 {
                for dr in -1..=1i8 {
                    if (df, dr) == (0, 0) {
                        continue;
                    }
                    if let Some(t) = target(file, rank, df, dr) {
                        king[sq as usize].set(t);
                    }
                }
            }

            for df in [-1i8, 1] {
                if let Some(t) = target(file, rank, df, 1) {
                    pawn[Color::White.index()][sq as usize].set(t);
                }
                if let Some(t) = target(file, rank, df, -1) {
                    pawn[Color::Black.index()][sq as usize].set(t);
                }
            }

            for dir in Dir::ALL {
                let (df, dr) = dir.delta();
                let (mut f, mut r) = (file + df, rank + dr);
                while (0..8).contains(&f) && (0..8).contains(&r) {
                    rays[dir as usize][sq as usize].set(Square::new((r * 8 + f) as u8));
                    f += df;
                    r += dr;
                }
            }
        }

        AttackTables {
            knight,
            king,
            pawn,
            rays,
        }
    }
}

#[inline]
fn target(file: i8, rank: i8, df: i8, dr: i8) -> Option<Square> {
    let (f, r) = (file + df, rank + dr);
    if (0..8).contains(&f) && (0..8).contains(&r) {
        Some(Square::new((r * 8 + f) as u8))
    } else {
        None
    }
}

/// ナイトの利き
#[inline]
pub fn knight_attacks(sq: Square) -> Bitboard {
    TABLES.knight[sq.index()]
}

/// 王の利き
#[inline]
pub fn king_attacks(sq: Square) -> Bitboard {
    TABLES.king[sq.index()]
}

/// ポーンの利き（駒取り方向のみ）
#[inline]
pub fn pawn_attacks(c: Color, sq: Square) -> Bitboard {
    TABLES.pawn[c.index()][sq.index()]
}

/// 1方向のレイ利き（ブロッカーで打ち切り、ブロッカーのマスは含む）
#[inline]
fn ray_attacks(dir: Dir, sq: Square, occupied: Bitboard) -> Bitboard {
    let ray = TABLES.rays[dir as usize][sq.index()];
    let blockers = ray & occupied;
    if blockers.is_empty() {
        return ray;
    }
    let blocker = if dir.is_positive() {
        blockers.lsb()
    } else {
        blockers.msb()
    };
    ray ^ TABLES.rays[dir as usize][blocker.index()]
}

/// ビショップの利き
#[inline]
pub fn bishop_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    Dir::BISHOP
        .iter()
        .fold(Bitboard::EMPTY, |acc, &d| acc | ray_attacks(d, sq, occupied))
}

/// ルークの利き
#[inline]
pub fn rook_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    Dir::ROOK
        .iter()
        .fold(Bitboard::EMPTY, |acc, &d| acc | ray_attacks(d, sq, occupied))
}

/// クイーンの利き
#[inline]
pub fn queen_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    bishop_attacks(sq, occupied) | rook_attacks(sq, occupied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    #[test]
    fn test_knight_attacks_corner_and_center() {
        assert_eq!(knight_attacks(sq("a1")).count(), 2);
        assert_eq!(knight_attacks(sq("e4")).count(), 8);
        assert!(knight_attacks(sq("g1")).is_set(sq("f3")));
        assert!(knight_attacks(sq("g1")).is_set(sq("h3")));
        assert!(knight_attacks(sq("g1")).is_set(sq("e2")));
    }

    #[test]
    fn test_king_attacks() {
        assert_eq!(king_attacks(sq("a1")).count(), 3);
        assert_eq!(king_attacks(sq("e4")).count(), 8);
    }

    #[test]
    fn test_pawn_attacks_no_wrap() {
        // a筋のポーンはh筋に利きを持たない
        assert_eq!(pawn_attacks(Color::White, sq("a2")).count(), 1);
        assert!(pawn_attacks(Color::White, sq("a2")).is_set(sq("b3")));
        assert!(pawn_attacks(Color::Black, sq("h7")).is_set(sq("g6")));
        assert_eq!(pawn_attacks(Color::Black, sq("h7")).count(), 1);
    }

    #[test]
    fn test_rook_attacks_with_blockers() {
        let occ = Bitboard::from_square(sq("e6")) | Bitboard::from_square(sq("g4"));
        let att = rook_attacks(sq("e4"), occ);
        assert!(att.is_set(sq("e5")));
        assert!(att.is_set(sq("e6"))); // ブロッカー自身は含む
        assert!(!att.is_set(sq("e7")));
        assert!(att.is_set(sq("g4")));
        assert!(!att.is_set(sq("h4")));
        assert!(att.is_set(sq("a4")));
        assert!(att.is_set(sq("e1")));
    }

    #[test]
    fn test_bishop_attacks_empty_board() {
        let att = bishop_attacks(sq("c1"), Bitboard::EMPTY);
        assert!(att.is_set(sq("a3")));
        assert!(att.is_set(sq("h6")));
        assert!(!att.is_set(sq("c2")));
    }

    #[test]
    fn test_queen_attacks_is_union() {
        let occ = Bitboard::from_square(sq("d5"));
        let q = queen_attacks(sq("d4"), occ);
        assert_eq!(q, bishop_attacks(sq("d4"), occ) | rook_attacks(sq("d4"), occ));
    }

    #[test]
    fn test_bitboard_pop_iterates_all() {
        let bb = Bitboard::RANK_2;
        assert_eq!(bb.count(), 8);
        let squares: Vec<Square> = bb.collect();
        assert_eq!(squares.len(), 8);
        assert_eq!(squares[0], sq("a2"));
        assert_eq!(squares[7], sq("h2"));
    }
}
