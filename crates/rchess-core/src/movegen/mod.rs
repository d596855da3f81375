//! 指し手生成
//!
//! 疑似合法手を段階別（駒取り+昇格 / 静かな手）に生成する。
//! 合法性の最終判定は `Position::make_move` に任せる（王手放置はそこで弾く）。
//!
//! MovePickerがLMP等で静かな手を読み飛ばせるよう、生成関数は段階ごとに
//! 分かれている。バッファは固定長でヒープ確保しない。

use crate::bitboard::{
    bishop_attacks, king_attacks, knight_attacks, pawn_attacks, queen_attacks, rook_attacks,
    Bitboard,
};
use crate::position::Position;
use crate::types::{Color, Move, MoveKind, PieceType, Rank, Square, MAX_MOVES};

/// 固定長の指し手バッファ
#[derive(Clone)]
pub struct MoveList {
    moves: [Move; MAX_MOVES],
    len: usize,
}

impl MoveList {
    #[inline]
    pub const fn new() -> MoveList {
        MoveList {
            moves: [Move::NONE; MAX_MOVES],
            len: 0,
        }
    }

    #[inline]
    pub fn push(&mut self, mv: Move) {
        debug_assert!(self.len < MAX_MOVES);
        self.moves[self.len] = mv;
        self.len += 1;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    #[inline]
    pub fn as_slice(&self) -> &[Move] {
        &self.moves[..self.len]
    }

    #[inline]
    pub fn get(&self, idx: usize) -> Move {
        debug_assert!(idx < self.len);
        self.moves[idx]
    }

    #[inline]
    pub fn swap(&mut self, a: usize, b: usize) {
        self.moves.swap(a, b);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Move> {
        self.as_slice().iter()
    }
}

impl Default for MoveList {
    fn default() -> Self {
        MoveList::new()
    }
}

/// 駒取りと昇格を生成
pub fn generate_captures(pos: &Position, list: &mut MoveList) {
    let us = pos.side_to_move();
    let them = us.opponent();
    let occupied = pos.occupied();
    let enemies = pos.pieces_of(them);

    gen_pawn_captures_and_promotions(pos, us, list);

    for from in pos.pieces(us, PieceType::Knight) {
        push_targets(list, from, knight_attacks(from) & enemies, PieceType::Knight);
    }
    for from in pos.pieces(us, PieceType::Bishop) {
        push_targets(
            list,
            from,
            bishop_attacks(from, occupied) & enemies,
            PieceType::Bishop,
        );
    }
    for from in pos.pieces(us, PieceType::Rook) {
        push_targets(
            list,
            from,
            rook_attacks(from, occupied) & enemies,
            PieceType::Rook,
        );
    }
    for from in pos.pieces(us, PieceType::Queen) {
        push_targets(
            list,
            from,
            queen_attacks(from, occupied) & enemies,
            PieceType::Queen,
        );
    }
    let king = pos.king_square(us);
    push_targets(list, king, king_attacks(king) & enemies, PieceType::King);
}

/// 静かな手（非駒取り・非昇格）を生成
pub fn generate_quiets(pos: &Position, list: &mut MoveList) {
    let us = pos.side_to_move();
    let occupied = pos.occupied();
    let empty = !occupied;

    gen_pawn_quiets(pos, us, list);

    for kind in [MoveKind::CastleKing, MoveKind::CastleQueen] {
        if pos.castle_allowed(us, kind) {
            let (from, to) = king_castle_squares(us, kind);
            list.push(Move::new(from, to, kind, PieceType::King));
        }
    }

    for from in pos.pieces(us, PieceType::Knight) {
        push_quiet_targets(list, from, knight_attacks(from) & empty, PieceType::Knight);
    }
    for from in pos.pieces(us, PieceType::Bishop) {
        push_quiet_targets(
            list,
            from,
            bishop_attacks(from, occupied) & empty,
            PieceType::Bishop,
        );
    }
    for from in pos.pieces(us, PieceType::Rook) {
        push_quiet_targets(
            list,
            from,
            rook_attacks(from, occupied) & empty,
            PieceType::Rook,
        );
    }
    for from in pos.pieces(us, PieceType::Queen) {
        push_quiet_targets(
            list,
            from,
            queen_attacks(from, occupied) & empty,
            PieceType::Queen,
        );
    }
    let king = pos.king_square(us);
    push_quiet_targets(list, king, king_attacks(king) & empty, PieceType::King);
}

/// 全疑似合法手を生成
pub fn generate_all(pos: &Position, list: &mut MoveList) {
    generate_captures(pos, list);
    generate_quiets(pos, list);
}

#[inline]
fn push_targets(list: &mut MoveList, from: Square, targets: Bitboard, piece: PieceType) {
    for to in targets {
        list.push(Move::new(from, to, MoveKind::Capture, piece));
    }
}

#[inline]
fn push_quiet_targets(list: &mut MoveList, from: Square, targets: Bitboard, piece: PieceType) {
    for to in targets {
        list.push(Move::new(from, to, MoveKind::Quiet, piece));
    }
}

fn gen_pawn_captures_and_promotions(pos: &Position, us: Color, list: &mut MoveList) {
    let them = us.opponent();
    let enemies = pos.pieces_of(them);
    let empty = !pos.occupied();

    for from in pos.pieces(us, PieceType::Pawn) {
        let promo_rank = from.relative_rank(us) == Rank::R7;

        for to in pawn_attacks(us, from) & enemies {
            if promo_rank {
                for kind in [
                    MoveKind::PromoCaptureQueen,
                    MoveKind::PromoCaptureRook,
                    MoveKind::PromoCaptureBishop,
                    MoveKind::PromoCaptureKnight,
                ] {
                    list.push(Move::new(from, to, kind, PieceType::Pawn));
                }
            } else {
                list.push(Move::new(from, to, MoveKind::Capture, PieceType::Pawn));
            }
        }

        // 昇格を伴う前進（静かな昇格もここで生成する）
        if promo_rank {
            if let Some(to) = from.offset(us.forward()) {
                if empty.is_set(to) {
                    for kind in [
                        MoveKind::PromoQueen,
                        MoveKind::PromoRook,
                        MoveKind::PromoBishop,
                        MoveKind::PromoKnight,
                    ] {
                        list.push(Move::new(from, to, kind, PieceType::Pawn));
                    }
                }
            }
        }
    }

    if let Some(ep) = pos.ep_square() {
        for from in pawn_attacks(them, ep) & pos.pieces(us, PieceType::Pawn) {
            list.push(Move::new(from, ep, MoveKind::EnPassant, PieceType::Pawn));
        }
    }
}

fn gen_pawn_quiets(pos: &Position, us: Color, list: &mut MoveList) {
    let empty = !pos.occupied();

    for from in pos.pieces(us, PieceType::Pawn) {
        if from.relative_rank(us) == Rank::R7 {
            continue; // 昇格は駒取り側で生成済み
        }
        if let Some(to) = from.offset(us.forward()) {
            if empty.is_set(to) {
                list.push(Move::new(from, to, MoveKind::Quiet, PieceType::Pawn));
                if from.relative_rank(us) == Rank::R2 {
                    if let Some(to2) = to.offset(us.forward()) {
                        if empty.is_set(to2) {
                            list.push(Move::new(from, to2, MoveKind::DoublePush, PieceType::Pawn));
                        }
                    }
                }
            }
        }
    }
}

/// キャスリングの王の移動元/先
const fn king_castle_squares(us: Color, kind: MoveKind) -> (Square, Square) {
    match (us, kind) {
        (Color::White, MoveKind::CastleKing) => (Square::E1, Square::G1),
        (Color::White, MoveKind::CastleQueen) => (Square::E1, Square::C1),
        (Color::Black, MoveKind::CastleKing) => (Square::E8, Square::G8),
        (Color::Black, MoveKind::CastleQueen) => (Square::E8, Square::C8),
        _ => unreachable!(),
    }
}

/// 合法手の数を数え、最初の合法手を返す（1手限定局面の検出用）
pub fn count_legal_moves(pos: &mut Position) -> (usize, Move) {
    let mut list = MoveList::new();
    generate_all(pos, &mut list);
    let mut count = 0;
    let mut first = Move::NONE;
    for &mv in list.iter() {
        if pos.make_move(mv) {
            pos.unmake_move();
            if count == 0 {
                first = mv;
            }
            count += 1;
        }
    }
    (count, first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startpos_move_count() {
        let mut pos = Position::startpos();
        let (count, _) = count_legal_moves(&mut pos);
        assert_eq!(count, 20);
    }

    #[test]
    fn test_captures_only_generates_captures_and_promotions() {
        let pos =
            Position::from_fen("rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2")
                .unwrap();
        let mut list = MoveList::new();
        generate_captures(&pos, &mut list);
        assert!(list.iter().all(|m| m.is_capture() || m.is_promotion()));
        assert!(list
            .iter()
            .any(|m| m.from() == "e4".parse().unwrap() && m.to() == "d5".parse().unwrap()));
    }

    #[test]
    fn test_promotion_generation() {
        let pos = Position::from_fen("3n4/4P3/8/8/8/8/8/k3K3 w - - 0 1").unwrap();
        let mut list = MoveList::new();
        generate_captures(&pos, &mut list);
        // 前進昇格4種 + 駒取り昇格4種
        let promos = list.iter().filter(|m| m.is_promotion()).count();
        assert_eq!(promos, 8);
    }

    #[test]
    fn test_en_passant_generated() {
        let pos = Position::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1").unwrap();
        let mut list = MoveList::new();
        generate_captures(&pos, &mut list);
        assert!(list.iter().any(|m| m.kind() == MoveKind::EnPassant));
    }

    #[test]
    fn test_castling_generated_only_when_allowed() {
        let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let mut list = MoveList::new();
        generate_quiets(&pos, &mut list);
        assert_eq!(list.iter().filter(|m| m.is_castle()).count(), 2);

        let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w kq - 0 1").unwrap();
        let mut list = MoveList::new();
        generate_quiets(&pos, &mut list);
        assert_eq!(list.iter().filter(|m| m.is_castle()).count(), 0);
    }

    #[test]
    fn test_one_legal_move_position() {
        // 浮いたクイーンの王手。逃げ場はなく、取る一手のみ。
        let mut pos = Position::from_fen("k7/8/8/8/8/8/1q6/K7 w - - 0 1").unwrap();
        let (count, first) = count_legal_moves(&mut pos);
        assert_eq!(count, 1);
        assert_eq!(first.to(), "b2".parse().unwrap());
    }
}
