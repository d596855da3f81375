//! perft（指し手生成の検証）
//!
//! 探索と同じmake/unmake経路で葉ノード数を数える。

use crate::movegen::{generate_all, MoveList};
use crate::position::Position;

/// 深さdepthまでの葉ノード数
pub fn perft(pos: &mut Position, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let mut list = MoveList::new();
    generate_all(pos, &mut list);
    let mut nodes = 0;
    for &mv in list.iter() {
        if !pos.make_move(mv) {
            continue;
        }
        nodes += if depth == 1 {
            1
        } else {
            perft(pos, depth - 1)
        };
        pos.unmake_move();
    }
    nodes
}

/// ルートの各手ごとの内訳（デバッグ用）
pub fn perft_divide(pos: &mut Position, depth: u32) -> Vec<(String, u64)> {
    let mut list = MoveList::new();
    generate_all(pos, &mut list);
    let mut result = Vec::new();
    for &mv in list.iter() {
        if !pos.make_move(mv) {
            continue;
        }
        let nodes = if depth <= 1 {
            1
        } else {
            perft(pos, depth - 1)
        };
        pos.unmake_move();
        result.push((mv.to_uci(), nodes));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perft_startpos_shallow() {
        let mut pos = Position::startpos();
        assert_eq!(perft(&mut pos, 1), 20);
        assert_eq!(perft(&mut pos, 2), 400);
        assert_eq!(perft(&mut pos, 3), 8_902);
    }

    #[test]
    fn test_perft_startpos_depth4() {
        let mut pos = Position::startpos();
        assert_eq!(perft(&mut pos, 4), 197_281);
    }

    #[test]
    fn test_perft_kiwipete_shallow() {
        // キャスリング・アンパサン・昇格が絡む標準検証局面
        let mut pos = Position::from_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        )
        .unwrap();
        assert_eq!(perft(&mut pos, 1), 48);
        assert_eq!(perft(&mut pos, 2), 2_039);
    }

    #[test]
    fn test_perft_en_passant_position() {
        // Position 3 (CPW): アンパサンとピンの組み合わせ
        let mut pos =
            Position::from_fen("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1").unwrap();
        assert_eq!(perft(&mut pos, 1), 14);
        assert_eq!(perft(&mut pos, 2), 191);
        assert_eq!(perft(&mut pos, 3), 2_812);
    }

    #[test]
    fn test_perft_divide_sums_to_total() {
        let mut pos = Position::startpos();
        let divide = perft_divide(&mut pos, 3);
        let total: u64 = divide.iter().map(|(_, n)| n).sum();
        assert_eq!(total, 8_902);
        assert_eq!(divide.len(), 20);
    }
}
