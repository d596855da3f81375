//! MovePicker（指し手オーダリング）
//!
//! カットオフを起こしやすい手から順に返す。生成は段階的（lazy）で、
//! 早い段階でカットオフすれば残りの手は生成すらしない。
//!
//! ## 段階（通常探索）
//! 1. TtMove - 置換表の手
//! 2. GoodCapture - 昇格とSEE損しない駒取り（MVV-LVA順）
//! 3. Killer - キラームーブ
//! 4. Quiet - 静かな手（history順）
//! 5. BadCapture - SEEで損する駒取り（最後）
//!
//! ## 静止探索
//! TtMove（駒取り/昇格のみ）→ 駒取り+昇格。王手中は全手（Evasion）。
//!
//! ## ProbCut
//! 昇格と損しない駒取りのみ。
//!
//! History等への参照はフィールドに保持せず `next()` の引数で受け取る
//! （再帰中の借用エイリアスを避けるため）。

use crate::movegen::{generate_all, generate_captures, generate_quiets, MoveList};
use crate::position::Position;
use crate::types::{Move, PieceType, MAX_MOVES};

use super::history::History;
use super::types::KillerPair;

/// 呼び出し側に見せる手の分類
///
/// `interesting` 判定（LMR/LMP対象外の手）は `phase <= Killer` で行う。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    TtMove,
    GoodCapture,
    Killer,
    Quiet,
    BadCapture,
    /// 王手回避（静止探索のみ）
    Evasion,
}

/// 内部ステージ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    MainTt,
    CaptureInit,
    GoodCapture,
    Killers,
    QuietInit,
    Quiet,
    BadCapture,
    QsTt,
    QsCaptureInit,
    QsCapture,
    EvasionInit,
    Evasion,
    ProbCutInit,
    ProbCut,
    Done,
}

/// 悪い駒取りのスコアオフセット
///
/// 良い駒取りと混在させたまま選択ソートで自然に後回しにするための下駄。
const BAD_CAPTURE_OFFSET: i32 = -1_000_000;

pub struct MovePicker {
    stage: Stage,
    tt_move: Move,
    killers: KillerPair,
    prev_cont_key: Option<usize>,
    /// 前半[0..captures_end)が駒取り、後半[captures_end..quiets_end)が静かな手
    moves: MoveList,
    scores: [i32; MAX_MOVES],
    captures_end: usize,
    quiets_end: usize,
    capture_cur: usize,
    quiet_cur: usize,
    killer_idx: usize,
}

impl MovePicker {
    /// 通常探索用
    pub fn new_main(tt_move: Move, killers: KillerPair, prev_cont_key: Option<usize>) -> MovePicker {
        MovePicker::with_stage(Stage::MainTt, tt_move, killers, prev_cont_key)
    }

    /// 静止探索用
    pub fn new_qsearch(tt_move: Move, in_check: bool) -> MovePicker {
        let stage = if in_check {
            Stage::EvasionInit
        } else {
            Stage::QsTt
        };
        MovePicker::with_stage(stage, tt_move, KillerPair::default(), None)
    }

    /// ProbCut用（昇格と勝ち駒取りだけを返す）
    pub fn new_probcut() -> MovePicker {
        MovePicker::with_stage(Stage::ProbCutInit, Move::NONE, KillerPair::default(), None)
    }

    fn with_stage(
        stage: Stage,
        tt_move: Move,
        killers: KillerPair,
        prev_cont_key: Option<usize>,
    ) -> MovePicker {
        MovePicker {
            stage,
            tt_move,
            killers,
            prev_cont_key,
            moves: MoveList::new(),
            scores: [0; MAX_MOVES],
            captures_end: 0,
            quiets_end: 0,
            capture_cur: 0,
            quiet_cur: 0,
            killer_idx: 0,
        }
    }

    /// 次の手を返す
    pub fn next(&mut self, pos: &Position, history: &History) -> Option<(Move, Phase)> {
        loop {
            match self.stage {
                Stage::MainTt => {
                    self.stage = Stage::CaptureInit;
                    if self.tt_move.is_some() && pos.is_pseudo_legal(self.tt_move) {
                        return Some((self.tt_move, Phase::TtMove));
                    }
                }
                Stage::CaptureInit => {
                    self.init_captures(pos);
                    self.stage = Stage::GoodCapture;
                }
                Stage::GoodCapture => match self.pick_capture(true) {
                    Some(mv) => return Some((mv, Phase::GoodCapture)),
                    None => self.stage = Stage::Killers,
                },
                Stage::Killers => {
                    while self.killer_idx < 2 {
                        let killer = if self.killer_idx == 0 {
                            self.killers.primary
                        } else {
                            self.killers.secondary
                        };
                        self.killer_idx += 1;
                        if killer.is_some()
                            && killer != self.tt_move
                            && killer.is_quiet()
                            && pos.is_pseudo_legal(killer)
                        {
                            return Some((killer, Phase::Killer));
                        }
                    }
                    self.stage = Stage::QuietInit;
                }
                Stage::QuietInit => {
                    self.init_quiets(pos, history);
                    self.stage = Stage::Quiet;
                }
                Stage::Quiet => match self.pick_quiet() {
                    Some(mv) => return Some((mv, Phase::Quiet)),
                    None => self.stage = Stage::BadCapture,
                },
                Stage::BadCapture => match self.pick_capture(false) {
                    Some(mv) => return Some((mv, Phase::BadCapture)),
                    None => self.stage = Stage::Done,
                },
                Stage::QsTt => {
                    self.stage = Stage::QsCaptureInit;
                    if self.tt_move.is_some()
                        && !self.tt_move.is_quiet()
                        && pos.is_pseudo_legal(self.tt_move)
                    {
                        return Some((self.tt_move, Phase::TtMove));
                    }
                }
                Stage::QsCaptureInit => {
                    self.init_captures(pos);
                    self.stage = Stage::QsCapture;
                }
                Stage::QsCapture => {
                    // 良い順に全部返す。悪い駒取りの読み飛ばしは呼び出し側。
                    if let Some(mv) = self.pick_capture(true) {
                        return Some((mv, Phase::GoodCapture));
                    }
                    match self.pick_capture(false) {
                        Some(mv) => return Some((mv, Phase::BadCapture)),
                        None => self.stage = Stage::Done,
                    }
                }
                Stage::EvasionInit => {
                    self.init_evasions(pos, history);
                    self.stage = Stage::Evasion;
                }
                Stage::Evasion => {
                    // captures_end == quiets_end の1区画に全手が入っている
                    match self.pick_capture(false) {
                        Some(mv) => return Some((mv, Phase::Evasion)),
                        None => self.stage = Stage::Done,
                    }
                }
                Stage::ProbCutInit => {
                    self.init_captures(pos);
                    self.stage = Stage::ProbCut;
                }
                Stage::ProbCut => match self.pick_capture(true) {
                    Some(mv) => return Some((mv, Phase::GoodCapture)),
                    None => self.stage = Stage::Done,
                },
                Stage::Done => return None,
            }
        }
    }

    /// 駒取り+昇格を生成してスコア付け
    fn init_captures(&mut self, pos: &Position) {
        debug_assert!(self.moves.is_empty());
        generate_captures(pos, &mut self.moves);
        self.captures_end = self.moves.len();
        self.quiets_end = self.captures_end;
        for i in 0..self.captures_end {
            let mv = self.moves.get(i);
            self.scores[i] = capture_score(pos, mv);
        }
    }

    /// 静かな手を生成してhistoryでスコア付け
    fn init_quiets(&mut self, pos: &Position, history: &History) {
        debug_assert_eq!(self.moves.len(), self.captures_end);
        generate_quiets(pos, &mut self.moves);
        self.quiets_end = self.moves.len();
        self.quiet_cur = self.captures_end;
        let us = pos.side_to_move();
        for i in self.captures_end..self.quiets_end {
            let mv = self.moves.get(i);
            self.scores[i] = history.quiet_score(us, mv, self.prev_cont_key);
        }
    }

    /// 王手回避: 全手を1区画に生成（駒取り優先 + history順）
    fn init_evasions(&mut self, pos: &Position, history: &History) {
        debug_assert!(self.moves.is_empty());
        generate_all(pos, &mut self.moves);
        self.captures_end = self.moves.len();
        self.quiets_end = self.captures_end;
        let us = pos.side_to_move();
        for i in 0..self.captures_end {
            let mv = self.moves.get(i);
            self.scores[i] = if mv.is_capture() || mv.is_promotion() {
                1_000_000 + capture_score(pos, mv)
            } else {
                history.quiet_score(us, mv, self.prev_cont_key)
            };
        }
    }

    /// 駒取り区画から最大スコアの手を選ぶ
    ///
    /// `good_only` のときはBAD_CAPTURE_OFFSET未満の手で停止する。
    fn pick_capture(&mut self, good_only: bool) -> Option<Move> {
        while self.capture_cur < self.captures_end {
            let best = self.select_max(self.capture_cur, self.captures_end);
            if good_only && self.scores[best] <= BAD_CAPTURE_OFFSET {
                return None;
            }
            self.swap(best, self.capture_cur);
            let mv = self.moves.get(self.capture_cur);
            self.capture_cur += 1;
            if mv == self.tt_move {
                continue;
            }
            return Some(mv);
        }
        None
    }

    fn pick_quiet(&mut self) -> Option<Move> {
        while self.quiet_cur < self.quiets_end {
            let best = self.select_max(self.quiet_cur, self.quiets_end);
            self.swap(best, self.quiet_cur);
            let mv = self.moves.get(self.quiet_cur);
            self.quiet_cur += 1;
            if mv == self.tt_move || self.killers.contains(mv) {
                continue;
            }
            return Some(mv);
        }
        None
    }

    fn select_max(&self, from: usize, to: usize) -> usize {
        let mut best = from;
        for i in from + 1..to {
            if self.scores[i] > self.scores[best] {
                best = i;
            }
        }
        best
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.moves.swap(a, b);
        self.scores.swap(a, b);
    }
}

/// 駒取り/昇格のスコア（MVV-LVA + 昇格ボーナス、SEE損はオフセットで後回し）
fn capture_score(pos: &Position, mv: Move) -> i32 {
    let victim = if mv.is_capture() {
        match pos.piece_on(mv.to()) {
            Some(p) => p.piece_type().value(),
            None => PieceType::Pawn.value(), // en passant
        }
    } else {
        0
    };
    let mut score = victim * 8 - mv.piece().value() / 8;
    if mv.is_promotion() {
        score += mv.promotion().value() * 8;
    } else if pos.see(mv) < 0 {
        score += BAD_CAPTURE_OFFSET;
    }
    score
}

/// 静かな手の1手あたりの最大スコアが欲しいときのヘルパ（テスト用）
#[cfg(test)]
pub fn collect_all(pos: &Position, picker: &mut MovePicker, history: &History) -> Vec<(Move, Phase)> {
    let mut out = Vec::new();
    while let Some(item) = picker.next(pos, history) {
        out.push(item);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MoveKind;
    use crate::types::Square;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    #[test]
    fn test_tt_move_comes_first_and_once() {
        let pos = Position::startpos();
        let history = History::new();
        let tt_move = Move::new(sq("e2"), sq("e4"), MoveKind::DoublePush, PieceType::Pawn);
        let mut picker = MovePicker::new_main(tt_move, KillerPair::default(), None);
        let all = collect_all(&pos, &mut picker, &history);

        assert_eq!(all[0], (tt_move, Phase::TtMove));
        assert_eq!(all.iter().filter(|(m, _)| *m == tt_move).count(), 1);
        assert_eq!(all.len(), 20);
    }

    #[test]
    fn test_phases_in_order() {
        let pos = Position::from_fen(
            "rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2",
        )
        .unwrap();
        let history = History::new();
        let mut picker = MovePicker::new_main(Move::NONE, KillerPair::default(), None);
        let all = collect_all(&pos, &mut picker, &history);

        // Phaseは単調非減少
        for pair in all.windows(2) {
            assert!(pair[0].1 <= pair[1].1);
        }
        // e4xd5はGoodCapture
        assert!(all
            .iter()
            .any(|(m, p)| m.to() == sq("d5") && *p == Phase::GoodCapture));
    }

    #[test]
    fn test_killer_yielded_in_killer_phase() {
        let pos = Position::startpos();
        let history = History::new();
        let killer = Move::new(sq("b1"), sq("c3"), MoveKind::Quiet, PieceType::Knight);
        let mut killers = KillerPair::default();
        killers.add(killer);
        let mut picker = MovePicker::new_main(Move::NONE, killers, None);
        let all = collect_all(&pos, &mut picker, &history);

        let (_, phase) = all.iter().find(|(m, _)| *m == killer).unwrap();
        assert_eq!(*phase, Phase::Killer);
        assert_eq!(all.iter().filter(|(m, _)| *m == killer).count(), 1);
        assert_eq!(all.len(), 20);
    }

    #[test]
    fn test_losing_capture_comes_last() {
        // Rxd5はポーン相手にルーク損（黒ルークd8が守る）
        let pos = Position::from_fen("3r2k1/8/8/3p4/8/8/6N1/3R2K1 w - - 0 1").unwrap();
        let history = History::new();
        let mut picker = MovePicker::new_main(Move::NONE, KillerPair::default(), None);
        let all = collect_all(&pos, &mut picker, &history);

        let rxd5 = all
            .iter()
            .position(|(m, _)| m.from() == sq("d1") && m.to() == sq("d5"))
            .unwrap();
        assert_eq!(all[rxd5].1, Phase::BadCapture);
        // 全ての静かな手より後
        assert!(all[..rxd5].iter().any(|(_, p)| *p == Phase::Quiet));
    }

    #[test]
    fn test_qsearch_returns_captures_only() {
        let pos = Position::from_fen(
            "rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2",
        )
        .unwrap();
        let history = History::new();
        let mut picker = MovePicker::new_qsearch(Move::NONE, false);
        let all = collect_all(&pos, &mut picker, &history);
        assert!(!all.is_empty());
        assert!(all.iter().all(|(m, _)| m.is_capture() || m.is_promotion()));
    }

    #[test]
    fn test_evasions_when_in_check() {
        // 黒クイーンに王手されている
        let pos = Position::from_fen("4k3/8/8/8/8/8/4q3/4K3 w - - 0 1").unwrap();
        assert!(pos.in_check());
        let history = History::new();
        let mut picker = MovePicker::new_qsearch(Move::NONE, true);
        let all = collect_all(&pos, &mut picker, &history);
        assert!(all.iter().all(|(_, p)| *p == Phase::Evasion));
        // 取り返しが先頭
        assert_eq!(all[0].0.to(), sq("e2"));
    }

    #[test]
    fn test_probcut_only_good_captures_and_promotions() {
        let pos = Position::from_fen("3r2k1/8/8/3p4/4P3/8/8/3R2K1 w - - 0 1").unwrap();
        let history = History::new();
        let mut picker = MovePicker::new_probcut();
        let all = collect_all(&pos, &mut picker, &history);
        assert!(all
            .iter()
            .all(|(m, p)| (m.is_capture() || m.is_promotion()) && *p == Phase::GoodCapture));
        // 損なRxd5は出てこない
        assert!(!all.iter().any(|(m, _)| m.from() == sq("d1") && m.to() == sq("d5")));
    }
}
