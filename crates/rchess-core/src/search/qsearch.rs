//! 静止探索 (Quiescence Search)
//!
//! 本探索が深さ0に達したときの葉評価。駒取りと昇格（王手中は全応手）だけを
//! 読み、局面が静かになったところで評価関数を当てる。水平線効果対策。
//!
//! 置換表には深さを `-qs_ply`（非正値）で入れ、同じ局面の本探索の結果と
//! 混ざらないようにする。

use crate::position::Position;
use crate::types::{Move, Value, MAX_PLY};

use super::alpha_beta::SearchWorker;
use super::movepicker::{MovePicker, Phase};

impl SearchWorker {
    /// 静止探索
    ///
    /// fail-soft: stand-patがbetaを超えたらその値をそのまま返す。
    /// 駒取り/回避が1つも改善しなければstand-patがそのまま結果になる。
    pub(super) fn quiesce(
        &mut self,
        pos: &mut Position,
        alpha: Value,
        beta: Value,
        ply: i32,
        in_check: bool,
        qs_ply: i32,
    ) -> Value {
        let mut alpha = alpha;
        let mut beta = beta;
        let original_alpha = alpha;
        let original_beta = beta;
        self.nodes += 1;
        self.seldepth = self.seldepth.max(ply);

        if self.must_abort() {
            self.aborted = true;
            return Value::ZERO;
        }

        if ply >= MAX_PLY - 1 {
            return self.evaluation.compute(pos, alpha, beta);
        }

        if pos.is_repetition() {
            return self.draw_score(pos);
        }

        let lookup = self
            .tt
            .try_get_score(pos.hash(), -qs_ply, ply, &mut alpha, &mut beta);
        if lookup.cutoff {
            return lookup.score;
        }
        let tt_move = lookup.mv;

        if !in_check {
            let stand_pat = self.evaluation.compute(pos, alpha, beta);
            if stand_pat >= beta {
                return stand_pat;
            }
            alpha = alpha.max(stand_pat);
        }

        let mut picker = MovePicker::new_qsearch(tt_move, in_check);

        while let Some((mv, phase)) = picker.next(pos, &self.history) {
            if !pos.make_move(mv) {
                continue;
            }

            let checking = pos.in_check();
            // 王手にもならない損な駒取りは読まない
            if !in_check && !checking && phase == Phase::BadCapture {
                pos.unmake_move();
                continue;
            }

            let score = -self.quiesce(pos, -beta, -alpha, ply + 1, checking, qs_ply + 1);
            pos.unmake_move();

            if self.aborted {
                break;
            }

            if score > alpha {
                alpha = score;
                if score >= beta {
                    break;
                }
            }
        }

        if self.aborted {
            return Value::ZERO;
        }

        self.tt.add(
            pos.hash(),
            -qs_ply,
            ply,
            original_alpha,
            original_beta,
            alpha,
            Move::NONE,
        );
        alpha
    }
}
