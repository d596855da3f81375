//! 指し手（Move）
//!
//! 24bitにパックされた指し手表現。置換表エントリのmoveフィールド（24bit）に
//! そのまま格納できる。
//!
//! レイアウト:
//! - bit  0- 5: 移動元マス
//! - bit  6-11: 移動先マス
//! - bit 12-15: 種別（MoveKind）
//! - bit 16-18: 動かす駒種（PieceType）

use super::{PieceType, Square};

/// 指し手の種別（4bit）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MoveKind {
    Quiet = 0,
    DoublePush = 1,
    CastleKing = 2,
    CastleQueen = 3,
    Capture = 4,
    EnPassant = 5,
    PromoKnight = 8,
    PromoBishop = 9,
    PromoRook = 10,
    PromoQueen = 11,
    PromoCaptureKnight = 12,
    PromoCaptureBishop = 13,
    PromoCaptureRook = 14,
    PromoCaptureQueen = 15,
}

impl MoveKind {
    #[inline]
    pub const fn from_bits(bits: u8) -> MoveKind {
        match bits & 0xf {
            0 => MoveKind::Quiet,
            1 => MoveKind::DoublePush,
            2 => MoveKind::CastleKing,
            3 => MoveKind::CastleQueen,
            4 => MoveKind::Capture,
            5 => MoveKind::EnPassant,
            8 => MoveKind::PromoKnight,
            9 => MoveKind::PromoBishop,
            10 => MoveKind::PromoRook,
            11 => MoveKind::PromoQueen,
            12 => MoveKind::PromoCaptureKnight,
            13 => MoveKind::PromoCaptureBishop,
            14 => MoveKind::PromoCaptureRook,
            15 => MoveKind::PromoCaptureQueen,
            // 6,7は未使用。壊れたビット列はQuiet扱いにして疑似合法チェックで弾く。
            _ => MoveKind::Quiet,
        }
    }

    /// 昇格の指し手か
    #[inline]
    pub const fn is_promotion(self) -> bool {
        (self as u8) >= 8
    }

    /// 駒を取る指し手か（アンパサン含む）
    #[inline]
    pub const fn is_capture(self) -> bool {
        matches!(self, MoveKind::Capture | MoveKind::EnPassant) || (self as u8) >= 12
    }
}

/// 指し手
///
/// `Move::NONE`（全bit 0）は「指し手なし」を表す。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Move(u32);

impl Move {
    /// 指し手なし
    pub const NONE: Move = Move(0);

    /// パック表現のビット幅（置換表エントリに合わせる）
    pub const BITS: u32 = 24;

    #[inline]
    pub const fn new(from: Square, to: Square, kind: MoveKind, piece: PieceType) -> Move {
        Move(
            from.index() as u32
                | (to.index() as u32) << 6
                | (kind as u32) << 12
                | (piece.index() as u32) << 16,
        )
    }

    #[inline]
    pub const fn from(self) -> Square {
        Square::new((self.0 & 0x3f) as u8)
    }

    #[inline]
    pub const fn to(self) -> Square {
        Square::new(((self.0 >> 6) & 0x3f) as u8)
    }

    #[inline]
    pub const fn kind(self) -> MoveKind {
        MoveKind::from_bits(((self.0 >> 12) & 0xf) as u8)
    }

    /// 動かす駒種
    #[inline]
    pub const fn piece(self) -> PieceType {
        PieceType::from_index(((self.0 >> 16) & 0x7) as usize)
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_some(self) -> bool {
        self.0 != 0
    }

    #[inline]
    pub const fn is_capture(self) -> bool {
        self.kind().is_capture()
    }

    #[inline]
    pub const fn is_promotion(self) -> bool {
        self.kind().is_promotion()
    }

    /// 静かな手か（駒取りでも昇格でもない）
    #[inline]
    pub const fn is_quiet(self) -> bool {
        !self.is_capture() && !self.is_promotion()
    }

    #[inline]
    pub const fn is_castle(self) -> bool {
        matches!(self.kind(), MoveKind::CastleKing | MoveKind::CastleQueen)
    }

    /// 昇格先の駒種（昇格手のみ有効）
    #[inline]
    pub const fn promotion(self) -> PieceType {
        debug_assert!(self.is_promotion());
        PieceType::from_index(1 + ((self.0 >> 12) & 0x3) as usize)
    }

    /// 24bitパック表現（置換表格納用）
    #[inline]
    pub const fn to_bits(self) -> u32 {
        self.0 & 0x00ff_ffff
    }

    /// 24bitパック表現から復元
    #[inline]
    pub const fn from_bits(bits: u32) -> Move {
        Move(bits & 0x00ff_ffff)
    }

    /// UCI形式の文字列（e2e4, e7e8q）
    pub fn to_uci(self) -> String {
        if self.is_none() {
            return "0000".to_string();
        }
        let mut s = format!("{}{}", self.from(), self.to());
        if self.is_promotion() {
            s.push(match self.promotion() {
                PieceType::Knight => 'n',
                PieceType::Bishop => 'b',
                PieceType::Rook => 'r',
                _ => 'q',
            });
        }
        s
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_uci())
    }
}
