//! 局面（Position）
//!
//! - ビットボード + メールボックスの二重管理
//! - make/unmake（合法性はmake後の王の利きチェックで判定）
//! - Zobristハッシュの差分更新
//! - 千日手（同一局面の再出現）検出
//! - 静的交換評価（SEE）
//!
//! `make_move` は疑似合法手を受け取り、自玉が取られる手なら盤面を復元して
//! `false` を返す。利き・ピン解析による事前判定は行わない。

pub mod zobrist;

use crate::bitboard::{
    bishop_attacks, king_attacks, knight_attacks, pawn_attacks, queen_attacks, rook_attacks,
    Bitboard,
};
use crate::types::{Color, Move, MoveKind, Piece, PieceType, Rank, Square};

use zobrist::KEYS;

/// 初期局面のFEN
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// キャスリング権のビット
pub mod castling {
    pub const WHITE_KING: u8 = 1;
    pub const WHITE_QUEEN: u8 = 2;
    pub const BLACK_KING: u8 = 4;
    pub const BLACK_QUEEN: u8 = 8;
    pub const ALL: u8 = 15;
}

/// FEN解析エラー
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FenError {
    #[error("FEN must have at least 4 fields: {0}")]
    MissingFields(String),
    #[error("invalid piece placement: {0}")]
    InvalidBoard(String),
    #[error("invalid side to move: {0}")]
    InvalidSideToMove(String),
    #[error("invalid castling rights: {0}")]
    InvalidCastling(String),
    #[error("invalid en passant square: {0}")]
    InvalidEnPassant(String),
}

/// ゲームフェーズ（コンテンプト制御用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GamePhase {
    Opening,
    MidGame,
    EndGame,
}

/// make前の状態（unmakeでの復元用）
#[derive(Debug, Clone, Copy)]
struct StateInfo {
    mv: Move,
    captured: Option<PieceType>,
    castling: u8,
    ep_square: Option<Square>,
    halfmove_clock: u16,
    hash: u64,
}

/// 局面
#[derive(Clone)]
pub struct Position {
    by_type: [Bitboard; PieceType::NUM],
    by_color: [Bitboard; Color::NUM],
    board: [Option<Piece>; Square::NUM],
    side_to_move: Color,
    castling: u8,
    ep_square: Option<Square>,
    halfmove_clock: u16,
    fullmove_number: u16,
    hash: u64,
    states: Vec<StateInfo>,
    /// 過去局面のハッシュ（現局面は含まない）。千日手検出に使う。
    history: Vec<u64>,
}

impl Position {
    /// 空の盤面
    pub fn empty() -> Position {
        Position {
            by_type: [Bitboard::EMPTY; PieceType::NUM],
            by_color: [Bitboard::EMPTY; Color::NUM],
            board: [None; Square::NUM],
            side_to_move: Color::White,
            castling: 0,
            ep_square: None,
            halfmove_clock: 0,
            fullmove_number: 1,
            hash: 0,
            states: Vec::with_capacity(256),
            history: Vec::with_capacity(256),
        }
    }

    /// 初期局面
    pub fn startpos() -> Position {
        Position::from_fen(START_FEN).expect("start FEN is valid")
    }

    /// FEN文字列から局面を構築
    pub fn from_fen(fen: &str) -> Result<Position, FenError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(FenError::MissingFields(fen.to_string()));
        }

        let mut pos = Position::empty();

        let mut rank = 7i8;
        let mut file = 0i8;
        for c in fields[0].chars() {
            match c {
                '/' => {
                    rank -= 1;
                    file = 0;
                    if rank < 0 {
                        return Err(FenError::InvalidBoard(fields[0].to_string()));
                    }
                }
                '1'..='8' => file += c as i8 - b'0' as i8,
                _ => {
                    let piece = Piece::from_char(c)
                        .ok_or_else(|| FenError::InvalidBoard(fields[0].to_string()))?;
                    if file >= 8 {
                        return Err(FenError::InvalidBoard(fields[0].to_string()));
                    }
                    pos.put_piece(piece, Square::new((rank * 8 + file) as u8));
                    file += 1;
                }
            }
        }

        pos.side_to_move = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            s => return Err(FenError::InvalidSideToMove(s.to_string())),
        };

        if fields[2] != "-" {
            for c in fields[2].chars() {
                pos.castling |= match c {
                    'K' => castling::WHITE_KING,
                    'Q' => castling::WHITE_QUEEN,
                    'k' => castling::BLACK_KING,
                    'q' => castling::BLACK_QUEEN,
                    _ => return Err(FenError::InvalidCastling(fields[2].to_string())),
                };
            }
        }

        if fields[3] != "-" {
            let sq: Square = fields[3]
                .parse()
                .map_err(|_| FenError::InvalidEnPassant(fields[3].to_string()))?;
            pos.ep_square = Some(sq);
        }

        pos.halfmove_clock = fields.get(4).and_then(|s| s.parse().ok()).unwrap_or(0);
        pos.fullmove_number = fields.get(5).and_then(|s| s.parse().ok()).unwrap_or(1);

        pos.hash = pos.compute_hash();
        Ok(pos)
    }

    /// FEN文字列を生成
    pub fn to_fen(&self) -> String {
        let mut s = String::new();
        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                let sq = Square::new(rank * 8 + file);
                match self.board[sq.index()] {
                    Some(p) => {
                        if empty > 0 {
                            s.push((b'0' + empty) as char);
                            empty = 0;
                        }
                        s.push(p.to_char());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                s.push((b'0' + empty) as char);
            }
            if rank > 0 {
                s.push('/');
            }
        }
        s.push(' ');
        s.push_str(&self.side_to_move.to_string());
        s.push(' ');
        if self.castling == 0 {
            s.push('-');
        } else {
            for (bit, c) in [
                (castling::WHITE_KING, 'K'),
                (castling::WHITE_QUEEN, 'Q'),
                (castling::BLACK_KING, 'k'),
                (castling::BLACK_QUEEN, 'q'),
            ] {
                if self.castling & bit != 0 {
                    s.push(c);
                }
            }
        }
        s.push(' ');
        match self.ep_square {
            Some(sq) => s.push_str(&sq.to_string()),
            None => s.push('-'),
        }
        s.push_str(&format!(" {} {}", self.halfmove_clock, self.fullmove_number));
        s
    }

    // =========================================================================
    // アクセサ
    // =========================================================================

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    #[inline]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    #[inline]
    pub fn ep_square(&self) -> Option<Square> {
        self.ep_square
    }

    #[inline]
    pub fn castling_rights(&self) -> u8 {
        self.castling
    }

    #[inline]
    pub fn halfmove_clock(&self) -> u16 {
        self.halfmove_clock
    }

    #[inline]
    pub fn fullmove_number(&self) -> u16 {
        self.fullmove_number
    }

    #[inline]
    pub fn occupied(&self) -> Bitboard {
        self.by_color[0] | self.by_color[1]
    }

    #[inline]
    pub fn pieces_of(&self, c: Color) -> Bitboard {
        self.by_color[c.index()]
    }

    #[inline]
    pub fn pieces(&self, c: Color, pt: PieceType) -> Bitboard {
        self.by_color[c.index()] & self.by_type[pt.index()]
    }

    #[inline]
    pub fn pieces_by_type(&self, pt: PieceType) -> Bitboard {
        self.by_type[pt.index()]
    }

    #[inline]
    pub fn piece_on(&self, sq: Square) -> Option<Piece> {
        self.board[sq.index()]
    }

    #[inline]
    pub fn king_square(&self, c: Color) -> Square {
        self.pieces(c, PieceType::King).lsb()
    }

    /// 王以外の駒数（null move pruningのツークツワンク対策用）
    #[inline]
    pub fn non_king_count(&self, c: Color) -> u32 {
        self.pieces_of(c).count() - 1
    }

    /// ゲームフェーズ（ポーンと王を除く駒の合計価値で判定）
    pub fn game_phase(&self) -> GamePhase {
        let mut npm = 0;
        for pt in [
            PieceType::Knight,
            PieceType::Bishop,
            PieceType::Rook,
            PieceType::Queen,
        ] {
            npm += self.by_type[pt.index()].count() as i32 * pt.value();
        }
        if npm > 4_500 {
            GamePhase::Opening
        } else if npm > 1_500 {
            GamePhase::MidGame
        } else {
            GamePhase::EndGame
        }
    }

    // =========================================================================
    // 利き
    // =========================================================================

    /// sqに利きを持つcolor側の駒
    pub fn attackers_to(&self, sq: Square, occupied: Bitboard, by: Color) -> Bitboard {
        (pawn_attacks(by.opponent(), sq) & self.pieces(by, PieceType::Pawn))
            | (knight_attacks(sq) & self.pieces(by, PieceType::Knight))
            | (king_attacks(sq) & self.pieces(by, PieceType::King))
            | (bishop_attacks(sq, occupied)
                & (self.pieces(by, PieceType::Bishop) | self.pieces(by, PieceType::Queen)))
            | (rook_attacks(sq, occupied)
                & (self.pieces(by, PieceType::Rook) | self.pieces(by, PieceType::Queen)))
    }

    /// sqがcolor側から攻撃されているか
    #[inline]
    pub fn is_attacked(&self, sq: Square, by: Color) -> bool {
        !self.attackers_to(sq, self.occupied(), by).is_empty()
    }

    /// 手番側の王に王手がかかっているか
    #[inline]
    pub fn in_check(&self) -> bool {
        self.is_attacked(self.king_square(self.side_to_move), self.side_to_move.opponent())
    }

    // =========================================================================
    // make / unmake
    // =========================================================================

    /// 指し手を適用する
    ///
    /// 疑似合法手を受け取り、自玉が取られる手なら復元して `false` を返す。
    /// `true` を返した場合は必ず `unmake_move` と対にすること。
    pub fn make_move(&mut self, mv: Move) -> bool {
        debug_assert!(mv.is_some());
        let us = self.side_to_move;
        let them = us.opponent();
        let from = mv.from();
        let to = mv.to();

        self.states.push(StateInfo {
            mv,
            captured: None,
            castling: self.castling,
            ep_square: self.ep_square,
            halfmove_clock: self.halfmove_clock,
            hash: self.hash,
        });
        self.history.push(self.hash);

        if let Some(ep) = self.ep_square.take() {
            self.hash ^= KEYS.ep_file[ep.file().index()];
        }

        self.halfmove_clock += 1;
        if mv.piece() == PieceType::Pawn {
            self.halfmove_clock = 0;
        }

        match mv.kind() {
            MoveKind::Quiet => {
                self.move_piece(us, mv.piece(), from, to);
            }
            MoveKind::DoublePush => {
                self.move_piece(us, PieceType::Pawn, from, to);
                let ep = from.offset(us.forward()).expect("double push stays on board");
                self.ep_square = Some(ep);
                self.hash ^= KEYS.ep_file[ep.file().index()];
            }
            MoveKind::Capture => {
                let captured = self.board[to.index()].expect("capture target").piece_type();
                self.remove_piece(them, captured, to);
                self.move_piece(us, mv.piece(), from, to);
                self.states.last_mut().expect("just pushed").captured = Some(captured);
                self.halfmove_clock = 0;
            }
            MoveKind::EnPassant => {
                let victim = to.offset(-us.forward()).expect("ep victim on board");
                self.remove_piece(them, PieceType::Pawn, victim);
                self.move_piece(us, PieceType::Pawn, from, to);
                self.states.last_mut().expect("just pushed").captured = Some(PieceType::Pawn);
            }
            MoveKind::CastleKing | MoveKind::CastleQueen => {
                let (rook_from, rook_to) = rook_castle_squares(us, mv.kind());
                self.move_piece(us, PieceType::King, from, to);
                self.move_piece(us, PieceType::Rook, rook_from, rook_to);
            }
            kind if kind.is_promotion() => {
                if kind.is_capture() {
                    let captured = self.board[to.index()].expect("capture target").piece_type();
                    self.remove_piece(them, captured, to);
                    self.states.last_mut().expect("just pushed").captured = Some(captured);
                }
                self.remove_piece(us, PieceType::Pawn, from);
                self.put_piece(Piece::new(us, mv.promotion()), to);
            }
            _ => unreachable!(),
        }

        let new_castling = self.castling & castling_mask(from) & castling_mask(to);
        if new_castling != self.castling {
            self.hash ^= KEYS.castling[self.castling as usize];
            self.hash ^= KEYS.castling[new_castling as usize];
            self.castling = new_castling;
        }

        self.side_to_move = them;
        self.hash ^= KEYS.side;
        if us == Color::Black {
            self.fullmove_number += 1;
        }

        if self.is_attacked(self.king_square(us), them) {
            self.unmake_move();
            return false;
        }
        true
    }

    /// 直前の指し手を戻す
    pub fn unmake_move(&mut self) {
        let st = self.states.pop().expect("unmake without make");
        self.history.pop();
        let mv = st.mv;
        let them = self.side_to_move;
        let us = them.opponent();
        let from = mv.from();
        let to = mv.to();

        match mv.kind() {
            MoveKind::Quiet | MoveKind::DoublePush => {
                self.move_piece_quiet(us, mv.piece(), to, from);
            }
            MoveKind::Capture => {
                self.move_piece_quiet(us, mv.piece(), to, from);
                self.put_piece_quiet(
                    Piece::new(them, st.captured.expect("capture recorded")),
                    to,
                );
            }
            MoveKind::EnPassant => {
                self.move_piece_quiet(us, PieceType::Pawn, to, from);
                let victim = to.offset(-us.forward()).expect("ep victim on board");
                self.put_piece_quiet(Piece::new(them, PieceType::Pawn), victim);
            }
            MoveKind::CastleKing | MoveKind::CastleQueen => {
                let (rook_from, rook_to) = rook_castle_squares(us, mv.kind());
                self.move_piece_quiet(us, PieceType::King, to, from);
                self.move_piece_quiet(us, PieceType::Rook, rook_to, rook_from);
            }
            kind if kind.is_promotion() => {
                self.remove_piece_quiet(us, mv.promotion(), to);
                self.put_piece_quiet(Piece::new(us, PieceType::Pawn), from);
                if let Some(captured) = st.captured {
                    self.put_piece_quiet(Piece::new(them, captured), to);
                }
            }
            _ => unreachable!(),
        }

        self.side_to_move = us;
        self.castling = st.castling;
        self.ep_square = st.ep_square;
        self.halfmove_clock = st.halfmove_clock;
        self.hash = st.hash;
        if us == Color::Black {
            self.fullmove_number -= 1;
        }
    }

    /// パス（null move）を適用する
    ///
    /// 王手中に呼んではならない。
    pub fn make_null_move(&mut self) {
        debug_assert!(!self.in_check());
        self.states.push(StateInfo {
            mv: Move::NONE,
            captured: None,
            castling: self.castling,
            ep_square: self.ep_square,
            halfmove_clock: self.halfmove_clock,
            hash: self.hash,
        });
        self.history.push(self.hash);
        if let Some(ep) = self.ep_square.take() {
            self.hash ^= KEYS.ep_file[ep.file().index()];
        }
        self.halfmove_clock += 1;
        self.side_to_move = self.side_to_move.opponent();
        self.hash ^= KEYS.side;
    }

    /// パスを戻す
    pub fn unmake_null_move(&mut self) {
        let st = self.states.pop().expect("unmake without make");
        self.history.pop();
        debug_assert!(st.mv.is_none());
        self.side_to_move = self.side_to_move.opponent();
        self.castling = st.castling;
        self.ep_square = st.ep_square;
        self.halfmove_clock = st.halfmove_clock;
        self.hash = st.hash;
    }

    /// 指し手が合法か（make/unmakeを往復して判定）
    pub fn is_legal_move(&mut self, mv: Move) -> bool {
        if !self.is_pseudo_legal(mv) {
            return false;
        }
        if self.make_move(mv) {
            self.unmake_move();
            true
        } else {
            false
        }
    }

    /// 現局面で指し手が疑似合法か（置換表やPV由来の手の検証用）
    pub fn is_pseudo_legal(&self, mv: Move) -> bool {
        if mv.is_none() {
            return false;
        }
        let us = self.side_to_move;
        let from = mv.from();
        let to = mv.to();
        match self.board[from.index()] {
            Some(p) if p.color() == us && p.piece_type() == mv.piece() => {}
            _ => return false,
        }
        if self.pieces_of(us).is_set(to) {
            return false;
        }
        // 種別と駒種の整合（壊れた置換表の手を弾く）
        match mv.kind() {
            MoveKind::DoublePush | MoveKind::EnPassant => {
                if mv.piece() != PieceType::Pawn {
                    return false;
                }
            }
            MoveKind::CastleKing | MoveKind::CastleQueen => {
                if mv.piece() != PieceType::King {
                    return false;
                }
            }
            kind if kind.is_promotion() => {
                if mv.piece() != PieceType::Pawn {
                    return false;
                }
            }
            _ => {}
        }
        match mv.kind() {
            MoveKind::Capture => self.pieces_of(us.opponent()).is_set(to),
            MoveKind::EnPassant => {
                mv.piece() == PieceType::Pawn && self.ep_square == Some(to)
            }
            MoveKind::DoublePush => {
                let mid = match from.offset(us.forward()) {
                    Some(sq) => sq,
                    None => return false,
                };
                mv.piece() == PieceType::Pawn
                    && from.relative_rank(us) == Rank::R2
                    && self.board[mid.index()].is_none()
                    && self.board[to.index()].is_none()
            }
            MoveKind::CastleKing | MoveKind::CastleQueen => self.castle_allowed(us, mv.kind()),
            kind => {
                // Quietと昇格系。昇格の捕獲有無と盤面の整合を確認する。
                if kind.is_capture() != self.pieces_of(us.opponent()).is_set(to) {
                    return false;
                }
                if mv.piece() == PieceType::Pawn {
                    if kind.is_promotion() != (to.relative_rank(us) == Rank::R8) {
                        return false;
                    }
                    if kind.is_capture() {
                        pawn_attacks(us, from).is_set(to)
                    } else {
                        from.offset(us.forward()) == Some(to) && self.board[to.index()].is_none()
                    }
                } else {
                    let attacks = match mv.piece() {
                        PieceType::Knight => knight_attacks(from),
                        PieceType::Bishop => bishop_attacks(from, self.occupied()),
                        PieceType::Rook => rook_attacks(from, self.occupied()),
                        PieceType::Queen => queen_attacks(from, self.occupied()),
                        PieceType::King => king_attacks(from),
                        PieceType::Pawn => unreachable!(),
                    };
                    attacks.is_set(to)
                }
            }
        }
    }

    /// キャスリングが可能か（権利・経路・通過マスの利き）
    pub fn castle_allowed(&self, us: Color, kind: MoveKind) -> bool {
        let them = us.opponent();
        let (right, empties, safe): (u8, &[Square], [Square; 3]) = match (us, kind) {
            (Color::White, MoveKind::CastleKing) => (
                castling::WHITE_KING,
                &[Square::F1, Square::G1],
                [Square::E1, Square::F1, Square::G1],
            ),
            (Color::White, MoveKind::CastleQueen) => (
                castling::WHITE_QUEEN,
                &[Square::B1, Square::C1, Square::D1],
                [Square::E1, Square::D1, Square::C1],
            ),
            (Color::Black, MoveKind::CastleKing) => (
                castling::BLACK_KING,
                &[Square::F8, Square::G8],
                [Square::E8, Square::F8, Square::G8],
            ),
            (Color::Black, MoveKind::CastleQueen) => (
                castling::BLACK_QUEEN,
                &[Square::new(57), Square::C8, Square::D8],
                [Square::E8, Square::D8, Square::C8],
            ),
            _ => return false,
        };
        if self.castling & right == 0 {
            return false;
        }
        if empties.iter().any(|&sq| self.board[sq.index()].is_some()) {
            return false;
        }
        !safe.iter().any(|&sq| self.is_attacked(sq, them))
    }

    /// 現局面がそれまでに出現していたか
    ///
    /// 不可逆手（ポーン・駒取り）以降の範囲だけ遡る。探索中は1回の再出現で
    /// 千日手とみなす。
    pub fn is_repetition(&self) -> bool {
        let span = (self.halfmove_clock as usize).min(self.history.len());
        self.history
            .iter()
            .rev()
            .take(span)
            .skip(1)
            .step_by(2)
            .any(|&h| h == self.hash)
    }

    // =========================================================================
    // 静的交換評価（SEE）
    // =========================================================================

    /// 指し手の静的交換評価
    ///
    /// 移動先マスでの最適な取り合いを駒価値だけで解決し、手番側から見た
    /// 損得を返す。静かな手は0開始（取り返されれば負になる）。
    pub fn see(&self, mv: Move) -> i32 {
        let us = self.side_to_move;
        let to = mv.to();
        let from = mv.from();

        let mut gain = [0i32; 32];
        let mut depth = 0usize;
        gain[0] = match mv.kind() {
            MoveKind::EnPassant => PieceType::Pawn.value(),
            k if k.is_capture() => self
                .board[to.index()]
                .expect("capture target")
                .piece_type()
                .value(),
            _ => 0,
        };

        let mut occupied = self.occupied();
        occupied.clear(from);
        if mv.kind() == MoveKind::EnPassant {
            if let Some(victim) = to.offset(-us.forward()) {
                occupied.clear(victim);
            }
        }

        let mut attacker_pt = mv.piece();
        let mut side = us.opponent();
        let mut attackers = self.attackers_to(to, occupied, Color::White)
            | self.attackers_to(to, occupied, Color::Black);
        attackers &= occupied;

        loop {
            let own = attackers & self.pieces_of(side);
            if own.is_empty() {
                break;
            }
            // 最も安い駒から取り返す
            let (next_sq, next_pt) = match PieceType::ALL
                .iter()
                .find_map(|&pt| {
                    let subset = own & self.by_type[pt.index()];
                    if subset.is_empty() {
                        None
                    } else {
                        Some((subset.lsb(), pt))
                    }
                }) {
                Some(found) => found,
                None => break,
            };

            depth += 1;
            if depth >= gain.len() {
                break;
            }
            gain[depth] = attacker_pt.value() - gain[depth - 1];
            // 両側とも損なら以降は取り合いが成立しない
            if gain[depth].max(-gain[depth - 1]) < 0 {
                break;
            }

            occupied.clear(next_sq);
            attacker_pt = next_pt;
            side = side.opponent();

            // X-ray: 駒をどかしたことで現れる飛び駒の利きを追加
            attackers |= bishop_attacks(to, occupied)
                & (self.by_type[PieceType::Bishop.index()]
                    | self.by_type[PieceType::Queen.index()]);
            attackers |= rook_attacks(to, occupied)
                & (self.by_type[PieceType::Rook.index()] | self.by_type[PieceType::Queen.index()]);
            attackers &= occupied;
        }

        while depth > 0 {
            gain[depth - 1] = -((-gain[depth - 1]).max(gain[depth]));
            depth -= 1;
        }
        gain[0]
    }

    /// 昇格が差し迫った手か（昇格そのもの、または相対7段目へのポーン前進）
    #[inline]
    pub fn is_promotion_threat(&self, mv: Move) -> bool {
        mv.is_promotion()
            || (mv.piece() == PieceType::Pawn && mv.to().relative_rank(self.side_to_move) >= Rank::R7)
    }

    // =========================================================================
    // 内部ヘルパー
    // =========================================================================

    fn put_piece(&mut self, piece: Piece, sq: Square) {
        self.put_piece_quiet(piece, sq);
        self.hash ^= KEYS.piece[piece.index()][sq.index()];
    }

    fn remove_piece(&mut self, c: Color, pt: PieceType, sq: Square) {
        self.remove_piece_quiet(c, pt, sq);
        self.hash ^= KEYS.piece[Piece::new(c, pt).index()][sq.index()];
    }

    fn move_piece(&mut self, c: Color, pt: PieceType, from: Square, to: Square) {
        self.move_piece_quiet(c, pt, from, to);
        let idx = Piece::new(c, pt).index();
        self.hash ^= KEYS.piece[idx][from.index()] ^ KEYS.piece[idx][to.index()];
    }

    /// ハッシュ更新なしの駒配置（unmake用）
    fn put_piece_quiet(&mut self, piece: Piece, sq: Square) {
        debug_assert!(self.board[sq.index()].is_none());
        self.by_type[piece.piece_type().index()].set(sq);
        self.by_color[piece.color().index()].set(sq);
        self.board[sq.index()] = Some(piece);
    }

    fn remove_piece_quiet(&mut self, c: Color, pt: PieceType, sq: Square) {
        debug_assert_eq!(self.board[sq.index()], Some(Piece::new(c, pt)));
        self.by_type[pt.index()].clear(sq);
        self.by_color[c.index()].clear(sq);
        self.board[sq.index()] = None;
    }

    fn move_piece_quiet(&mut self, c: Color, pt: PieceType, from: Square, to: Square) {
        self.remove_piece_quiet(c, pt, from);
        self.put_piece_quiet(Piece::new(c, pt), to);
    }

    /// ハッシュをゼロから計算（FEN読み込みとテスト用）
    pub fn compute_hash(&self) -> u64 {
        let mut hash = 0u64;
        for sq in Square::all() {
            if let Some(p) = self.board[sq.index()] {
                hash ^= KEYS.piece[p.index()][sq.index()];
            }
        }
        if self.side_to_move == Color::Black {
            hash ^= KEYS.side;
        }
        hash ^= KEYS.castling[self.castling as usize];
        if let Some(ep) = self.ep_square {
            hash ^= KEYS.ep_file[ep.file().index()];
        }
        hash
    }
}

/// キャスリングに対応するルークの移動元/先
const fn rook_castle_squares(us: Color, kind: MoveKind) -> (Square, Square) {
    match (us, kind) {
        (Color::White, MoveKind::CastleKing) => (Square::H1, Square::F1),
        (Color::White, MoveKind::CastleQueen) => (Square::A1, Square::D1),
        (Color::Black, MoveKind::CastleKing) => (Square::H8, Square::F8),
        (Color::Black, MoveKind::CastleQueen) => (Square::A8, Square::D8),
        _ => unreachable!(),
    }
}

/// from/toのマスが絡むと失われるキャスリング権
fn castling_mask(sq: Square) -> u8 {
    match sq {
        Square::E1 => !(castling::WHITE_KING | castling::WHITE_QUEEN),
        Square::H1 => !castling::WHITE_KING,
        Square::A1 => !castling::WHITE_QUEEN,
        Square::E8 => !(castling::BLACK_KING | castling::BLACK_QUEEN),
        Square::H8 => !castling::BLACK_KING,
        Square::A8 => !castling::BLACK_QUEEN,
        _ => 0xff,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    #[test]
    fn test_startpos_fen_roundtrip() {
        let pos = Position::startpos();
        assert_eq!(pos.to_fen(), START_FEN);
        assert_eq!(pos.side_to_move(), Color::White);
        assert_eq!(pos.castling_rights(), castling::ALL);
        assert_eq!(pos.occupied().count(), 32);
    }

    #[test]
    fn test_fen_partial_rights_and_ep() {
        let fen = "rnbqkbnr/ppp1pppp/8/3p4/8/8/PPPPPPPP/RNBQKBNR w Kq d6 0 2";
        let pos = Position::from_fen(fen).unwrap();
        assert_eq!(pos.castling_rights(), castling::WHITE_KING | castling::BLACK_QUEEN);
        assert_eq!(pos.ep_square(), Some(sq("d6")));
        assert_eq!(pos.to_fen(), fen);
    }

    #[test]
    fn test_fen_errors() {
        assert!(matches!(
            Position::from_fen("8/8/8/8 w"),
            Err(FenError::MissingFields(_))
        ));
        assert!(matches!(
            Position::from_fen("8/8/8/8/8/8/8/8 x - - 0 1"),
            Err(FenError::InvalidSideToMove(_))
        ));
    }

    #[test]
    fn test_make_unmake_restores_everything() {
        let mut pos = Position::startpos();
        let fen_before = pos.to_fen();
        let hash_before = pos.hash();

        let mv = Move::new(sq("e2"), sq("e4"), MoveKind::DoublePush, PieceType::Pawn);
        assert!(pos.make_move(mv));
        assert_eq!(pos.side_to_move(), Color::Black);
        assert_eq!(pos.ep_square(), Some(sq("e3")));
        assert_eq!(pos.hash(), pos.compute_hash());

        pos.unmake_move();
        assert_eq!(pos.to_fen(), fen_before);
        assert_eq!(pos.hash(), hash_before);
    }

    #[test]
    fn test_pinned_piece_move_rolls_back() {
        // 白ビショップはe筋の黒ルークにピンされている
        let mut pos = Position::from_fen("4r3/8/8/8/8/4B3/8/4K3 w - - 0 1").unwrap();
        let fen = pos.to_fen();
        let hash = pos.hash();
        let mv = Move::new(sq("e3"), sq("d4"), MoveKind::Quiet, PieceType::Bishop);
        assert!(pos.is_pseudo_legal(mv));
        assert!(!pos.make_move(mv));
        assert_eq!(pos.to_fen(), fen);
        assert_eq!(pos.hash(), hash);
    }

    #[test]
    fn test_suicide_move_rejected() {
        // 黒ルークの利き上に王が動く
        let mut pos = Position::from_fen("8/8/8/8/8/r7/8/K7 w - - 0 1").unwrap();
        let fen = pos.to_fen();
        let mv = Move::new(sq("a1"), sq("a2"), MoveKind::Quiet, PieceType::King);
        assert!(!pos.make_move(mv));
        assert_eq!(pos.to_fen(), fen);
    }

    #[test]
    fn test_castling_updates_rook_and_rights() {
        let mut pos =
            Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        assert!(pos.castle_allowed(Color::White, MoveKind::CastleKing));
        let mv = Move::new(sq("e1"), sq("g1"), MoveKind::CastleKing, PieceType::King);
        assert!(pos.make_move(mv));
        assert_eq!(
            pos.piece_on(sq("f1")),
            Some(Piece::new(Color::White, PieceType::Rook))
        );
        assert_eq!(
            pos.piece_on(sq("g1")),
            Some(Piece::new(Color::White, PieceType::King))
        );
        assert_eq!(pos.castling_rights(), castling::BLACK_KING | castling::BLACK_QUEEN);
        pos.unmake_move();
        assert_eq!(pos.castling_rights(), castling::ALL);
    }

    #[test]
    fn test_castling_blocked_by_attack() {
        // 黒ルークがf1を狙っている → 白のキングサイドは不可
        let pos = Position::from_fen("5r2/8/8/8/8/8/8/R3K2R w KQ - 0 1").unwrap();
        assert!(!pos.castle_allowed(Color::White, MoveKind::CastleKing));
        assert!(pos.castle_allowed(Color::White, MoveKind::CastleQueen));
    }

    #[test]
    fn test_en_passant_capture() {
        let mut pos =
            Position::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1").unwrap();
        let mv = Move::new(sq("e5"), sq("d6"), MoveKind::EnPassant, PieceType::Pawn);
        assert!(pos.make_move(mv));
        assert_eq!(pos.piece_on(sq("d5")), None);
        assert_eq!(
            pos.piece_on(sq("d6")),
            Some(Piece::new(Color::White, PieceType::Pawn))
        );
        pos.unmake_move();
        assert_eq!(
            pos.piece_on(sq("d5")),
            Some(Piece::new(Color::Black, PieceType::Pawn))
        );
    }

    #[test]
    fn test_null_move_roundtrip() {
        let mut pos = Position::startpos();
        let hash = pos.hash();
        pos.make_null_move();
        assert_eq!(pos.side_to_move(), Color::Black);
        assert_ne!(pos.hash(), hash);
        assert_eq!(pos.hash(), pos.compute_hash());
        pos.unmake_null_move();
        assert_eq!(pos.hash(), hash);
        assert_eq!(pos.side_to_move(), Color::White);
    }

    #[test]
    fn test_repetition_detected() {
        let mut pos = Position::startpos();
        let moves = [
            Move::new(sq("g1"), sq("f3"), MoveKind::Quiet, PieceType::Knight),
            Move::new(sq("g8"), sq("f6"), MoveKind::Quiet, PieceType::Knight),
            Move::new(sq("f3"), sq("g1"), MoveKind::Quiet, PieceType::Knight),
            Move::new(sq("f6"), sq("g8"), MoveKind::Quiet, PieceType::Knight),
        ];
        for mv in moves {
            assert!(!pos.is_repetition());
            assert!(pos.make_move(mv));
        }
        // 初期局面が再出現
        assert!(pos.is_repetition());
    }

    #[test]
    fn test_see_simple_exchange() {
        // 白ルークがd5のポーンを取る。黒ルークが取り返す。
        let pos = Position::from_fen("3r4/8/8/3p4/8/8/8/3R2K1 w - - 0 1").unwrap();
        let mv = Move::new(sq("d1"), sq("d5"), MoveKind::Capture, PieceType::Rook);
        // P - R = 100 - 500
        assert_eq!(pos.see(mv), 100 - 500);
    }

    #[test]
    fn test_see_winning_capture() {
        // 守られていないポーンをナイトで取る
        let pos = Position::from_fen("4k3/8/8/3p4/8/4N3/8/4K3 w - - 0 1").unwrap();
        let mv = Move::new(sq("e3"), sq("d5"), MoveKind::Capture, PieceType::Knight);
        assert_eq!(pos.see(mv), 100);
    }

    #[test]
    fn test_see_quiet_move_into_attack() {
        // ポーンに守られたマスへの静かな手はルーク丸損
        let pos = Position::from_fen("4k3/8/1p6/8/8/8/8/R3K3 w - - 0 1").unwrap();
        let mv = Move::new(sq("a1"), sq("a5"), MoveKind::Quiet, PieceType::Rook);
        assert_eq!(pos.see(mv), -500);
        // 誰も利いていないマスなら0
        let mv = Move::new(sq("a1"), sq("c1"), MoveKind::Quiet, PieceType::Rook);
        assert_eq!(pos.see(mv), 0);
    }

    #[test]
    fn test_promotion_threat() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/p3K3/8 b - - 0 1").unwrap();
        let push = Move::new(sq("a2"), sq("a1"), MoveKind::PromoQueen, PieceType::Pawn);
        assert!(pos.is_promotion_threat(push));

        let pos2 = Position::from_fen("4k3/8/8/8/8/p7/4K3/8 b - - 0 1").unwrap();
        let advance = Move::new(sq("a3"), sq("a2"), MoveKind::Quiet, PieceType::Pawn);
        assert!(pos2.is_promotion_threat(advance));
    }

    #[test]
    fn test_hash_differs_by_ep_rights() {
        let a = Position::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1").unwrap();
        let b = Position::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - - 0 1").unwrap();
        assert_ne!(a.hash(), b.hash());
    }
}
