//! Principal Variation Search
//!
//! 反復深化ドライバ + root探索 + 再帰PVS本体。
//!
//! - aspiration window（fail low/highで段階的に窓を広げる）
//! - mate distance pruning / 置換表カットオフ
//! - static null move / null move pruning（ツークツワンク対策付き）
//! - razoring / internal iterative deepening / ProbCut
//! - late move pruning / SEE枝刈り / singular extension / LMR
//!
//! 中断は値ベースの協調方式: `aborted` フラグが立ったフレームは0を返して
//! 即座に巻き戻り、途中結果を置換表へ書かない。例外は不変条件違反
//! （PVの手が非合法など）のみに使う。

use std::sync::Arc;
use std::time::Duration;

use smallvec::SmallVec;

use crate::eval::Evaluation;
use crate::movegen::count_legal_moves;
use crate::position::{GamePhase, Position};
use crate::tt::TranspositionTable;
use crate::types::{Bound, Color, Depth, Move, Value, MAX_PLY};

use super::history::History;
use super::movepicker::{MovePicker, Phase};
use super::params::{
    lmp_limit, lmr_reduction, nmp_reduction, CHECK_TC_NODES_MASK, FUTILITY_MARGIN, IID_MIN_DEPTH,
    LMP_PRUNING_DEPTH, NMP_MIN_DEPTH, ONE_MOVE_MAX_DEPTH, PCUT_DEPTH, PCUT_MARGIN,
    PONDER_WAIT_MS, RAZOR_MAX_DEPTH, SEE_PRUNING_CAPTURE_INC, SEE_PRUNING_DEPTH,
    SEE_PRUNING_QUIET_INC, SEX_DEPTH, STATIC_NULL_MOVE_MARGIN, STATIC_NULL_MOVE_MAX_DEPTH,
    WINDOW, WINDOW_MIN_DEPTH,
};
use super::time::GameClock;
use super::types::{InfoEvent, PvTable, SearchLimits, SearchResult, SearchStack};

/// 探索ワーカー
///
/// 対局をまたいで再利用される。history等の統計は`new_game`でクリアし、
/// `search`呼び出しごとにはリセットしない。
pub struct SearchWorker {
    /// 置換表への共有参照
    pub tt: Arc<TranspositionTable>,
    pub(super) history: Box<History>,
    pub(super) stack: Box<SearchStack>,
    pub(super) pv: Box<PvTable>,
    pub(super) evaluation: Evaluation,

    // オプション
    contempt: i32,
    analyse_mode: bool,

    // 1回のgoごとの状態
    pub(super) limits: SearchLimits,
    pub(super) clock: GameClock,
    pub(super) nodes: u64,
    pub(super) seldepth: i32,
    pub(super) aborted: bool,
    root_depth: Depth,
    completed_depth: Depth,
    score: Value,
    pv_line: Vec<Move>,
    engine_color: Color,
    one_legal_move: bool,
    root_changes: i32,
    start_reporting: bool,
}

impl SearchWorker {
    /// 新しいワーカーを作成（ヒープに置く）
    pub fn new(tt: Arc<TranspositionTable>) -> Box<SearchWorker> {
        Box::new(SearchWorker {
            tt,
            history: History::new(),
            stack: Box::new(SearchStack::new()),
            pv: Box::new(PvTable::new()),
            evaluation: Evaluation::new(),
            contempt: 0,
            analyse_mode: false,
            limits: SearchLimits::default(),
            clock: GameClock::infinite(Arc::new(std::sync::atomic::AtomicBool::new(false))),
            nodes: 0,
            seldepth: 0,
            aborted: false,
            root_depth: 0,
            completed_depth: 0,
            score: Value::ZERO,
            pv_line: Vec::new(),
            engine_color: Color::White,
            one_legal_move: false,
            root_changes: 0,
            start_reporting: false,
        })
    }

    /// コンテンプト値（センチポーン）
    pub fn set_contempt(&mut self, contempt: i32) {
        self.contempt = contempt;
    }

    /// 解析モード（コンテンプトと1手即指しを無効化）
    pub fn set_analyse_mode(&mut self, analyse: bool) {
        self.analyse_mode = analyse;
    }

    /// ucinewgame: 統計をクリア
    pub fn new_game(&mut self) {
        self.history.clear();
        self.stack.clear();
        self.pv_line.clear();
    }

    #[inline]
    pub fn nodes(&self) -> u64 {
        self.nodes
    }

    // =========================================================================
    // 反復深化ドライバ
    // =========================================================================

    /// トップレベル探索
    pub fn search(
        &mut self,
        pos: &mut Position,
        limits: SearchLimits,
        clock: GameClock,
        info: &mut dyn FnMut(InfoEvent),
    ) -> SearchResult {
        self.limits = limits;
        self.clock = clock;
        self.nodes = 0;
        self.seldepth = 0;
        self.aborted = false;
        self.root_depth = 0;
        self.completed_depth = 0;
        self.root_changes = 0;
        self.start_reporting = false;
        self.pv.clear();
        self.pv_line.clear();
        self.engine_color = pos.side_to_move();

        let mut ponder_move: Option<Move> = None;
        let (legal_count, first_move) = count_legal_moves(pos);
        self.one_legal_move = legal_count == 1;
        let mut best_move = first_move;

        let root_in_check = pos.in_check();
        self.stack.entry_mut(-1).is_checking_move = root_in_check;

        // 深さ0: 静止探索で初期スコアを得る
        self.score = self.quiesce(
            pos,
            -Value::INFINITE,
            Value::INFINITE,
            0,
            root_in_check,
            0,
        );
        self.stack.entry_mut(0).eval = if root_in_check {
            Value::NONE
        } else {
            self.score
        };

        let mut depth = 0;
        loop {
            depth += 1;
            if depth > self.limits.max_depth || !self.clock.can_search_deeper() {
                break;
            }
            self.root_depth = depth;
            self.update_tt_with_pv(pos, depth);
            self.seldepth = 0;

            let mut i_alpha = 0usize;
            let mut i_beta = 0usize;
            let result = loop {
                let (alpha, beta) = if depth > WINDOW_MIN_DEPTH {
                    (
                        window_bound(self.score, WINDOW[i_alpha], false),
                        window_bound(self.score, WINDOW[i_beta], true),
                    )
                } else {
                    (-Value::INFINITE, Value::INFINITE)
                };

                let result = self.search_root(pos, alpha, beta, depth, info);
                if self.aborted {
                    break result;
                }

                if result <= alpha {
                    i_alpha += 1;
                    self.report_bound(info, depth, result, Bound::Upper, &mut best_move, &mut ponder_move);
                } else if result >= beta {
                    i_beta += 1;
                    self.report_bound(info, depth, result, Bound::Lower, &mut best_move, &mut ponder_move);
                } else {
                    break result;
                }
            };

            if self.aborted {
                break;
            }

            self.score = result;
            self.completed_depth = depth;
            self.report_iteration(pos, info, depth, &mut best_move, &mut ponder_move);

            if depth == ONE_MOVE_MAX_DEPTH && self.one_legal_move && !self.analyse_mode {
                break;
            }
        }

        // ponder中にループを抜けた場合はstop/ponderhitまで待ってから結果を出す
        if self.limits.ponder {
            let mut waited = false;
            while self.clock.is_infinite() && !self.clock.stop_requested() {
                waited = true;
                std::thread::sleep(Duration::from_millis(PONDER_WAIT_MS));
            }
            if waited {
                self.report_iteration(pos, info, self.completed_depth.max(1), &mut best_move, &mut ponder_move);
            }
        }

        log::debug!("incrementing hash table version");
        self.tt.increment_version();
        self.stack.clear();

        SearchResult {
            best_move,
            ponder_move,
            score: self.score,
            depth: self.completed_depth,
            seldepth: self.seldepth,
            nodes: self.nodes,
            elapsed: self.clock.elapsed(),
        }
    }

    /// aspiration失敗時の暫定報告
    ///
    /// fail high時は暫定PVの先頭を最善手として温存する（時間切れに備える）。
    fn report_bound(
        &mut self,
        info: &mut dyn FnMut(InfoEvent),
        depth: Depth,
        score: Value,
        bound: Bound,
        best_move: &mut Move,
        ponder_move: &mut Option<Move>,
    ) {
        if depth > WINDOW_MIN_DEPTH {
            info(InfoEvent::Iteration {
                depth,
                seldepth: self.seldepth,
                score,
                bound,
                nodes: self.nodes,
                elapsed: self.clock.elapsed(),
                hashfull: self.tt.usage(),
                pv: self.pv.line().to_vec(),
            });
        }
        if bound == Bound::Lower {
            let line = self.pv.line();
            if !line.is_empty() {
                *best_move = line[0];
            }
            *ponder_move = line.get(1).copied();
        }
    }

    /// 反復完了の報告と最善手/時間予算の更新
    fn report_iteration(
        &mut self,
        pos: &Position,
        info: &mut dyn FnMut(InfoEvent),
        depth: Depth,
        best_move: &mut Move,
        ponder_move: &mut Option<Move>,
    ) {
        let old_best = *best_move;
        self.pv_line = self.extract_pv(pos, &self.pv.line().to_vec());

        let mut best_move_changed = false;
        if !self.pv_line.is_empty() {
            *best_move = self.pv_line[0];
            if *best_move != old_best {
                best_move_changed = true;
            }
            *ponder_move = self.pv_line.get(1).copied();
        }

        if best_move_changed {
            self.root_changes += 1;
        }
        if depth > 4 {
            self.clock.adjust_time(
                self.one_legal_move && !self.analyse_mode,
                best_move_changed,
                self.root_changes,
            );
        }

        info(InfoEvent::Iteration {
            depth,
            seldepth: self.seldepth,
            score: self.score,
            bound: Bound::Exact,
            nodes: self.nodes,
            elapsed: self.clock.elapsed(),
            hashfull: self.tt.usage(),
            pv: self.pv_line.clone(),
        });
    }

    /// PVの各局面を置換表へ書き戻す（再探索で並べ替えを再現させる）
    fn update_tt_with_pv(&mut self, pos: &Position, depth: Depth) {
        let mut bd = pos.clone();
        let mut depth = depth;
        let line = self.pv_line.clone();
        for (ply, &mv) in line.iter().enumerate() {
            if depth <= 0 {
                break;
            }
            if !bd.is_legal_move(mv) {
                break;
            }
            depth -= 1;
            self.tt.add(
                bd.hash(),
                depth,
                ply as i32,
                -Value::INFINITE,
                Value::INFINITE,
                self.score,
                mv,
            );
            bd.make_move(mv);
        }
    }

    /// PVを検証し、置換表のexactエントリで延長する
    ///
    /// PVテーブル由来の手が非合法なら探索の不変条件が壊れている。
    /// 記録して落とす（握りつぶすと置換表破損が隠れる）。
    fn extract_pv(&self, pos: &Position, line: &[Move]) -> Vec<Move> {
        let mut bd = pos.clone();
        let mut result: Vec<Move> = Vec::with_capacity(line.len());
        let mut seen: Vec<u64> = Vec::with_capacity(MAX_PLY as usize);

        for &mv in line {
            if !bd.is_legal_move(mv) || !bd.make_move(mv) {
                log::error!(
                    "illegal move {} in principal variation at {}",
                    mv,
                    bd.to_fen()
                );
                panic!("illegal move in principal variation");
            }
            seen.push(bd.hash());
            result.push(mv);
        }

        while (result.len() as i32) < MAX_PLY {
            let (mv, bound) = self.tt.try_get_best_move_with_bound(bd.hash());
            if bound != Bound::Exact || mv.is_none() || !bd.is_legal_move(mv) {
                break;
            }
            bd.make_move(mv);
            if seen.contains(&bd.hash()) {
                break;
            }
            seen.push(bd.hash());
            result.push(mv);
        }
        result
    }

    // =========================================================================
    // 共通ヘルパー
    // =========================================================================

    /// 時間/ノード予算の超過判定（時計は間引いて見る）
    #[inline]
    pub(super) fn must_abort(&self) -> bool {
        self.aborted
            || self.nodes >= self.limits.max_nodes
            || ((self.nodes & CHECK_TC_NODES_MASK) == 0 && self.clock.check_time_budget())
    }

    /// 引き分けスコア
    ///
    /// 完全な0は千日手への盲点を作るのでノード数で±ゆらす。
    /// コンテンプトは終盤と解析モードでは適用しない。
    pub(super) fn draw_score(&self, pos: &Position) -> Value {
        let contempt = if self.analyse_mode || pos.game_phase() == GamePhase::EndGame {
            0
        } else if pos.side_to_move() == self.engine_color {
            self.contempt
        } else {
            -self.contempt
        };
        Value::new(8 - (self.nodes & 0x7) as i32 + contempt)
    }

    // =========================================================================
    // Root探索
    // =========================================================================

    fn search_root(
        &mut self,
        pos: &mut Position,
        alpha: Value,
        beta: Value,
        depth: Depth,
        info: &mut dyn FnMut(InfoEvent),
    ) -> Value {
        let mut alpha = alpha;
        let original_alpha = alpha;
        let in_check = self.stack.entry(-1).is_checking_move;
        let depth = depth.min(MAX_PLY - 1);
        self.pv.init(0);

        self.nodes += 1;
        if self.must_abort() {
            self.aborted = true;
            return Value::ZERO;
        }

        let mut expanded = 0usize;
        let mut raised_alpha = false;
        let mut quiets: SmallVec<[Move; 64]> = SmallVec::new();
        let mut best_move = Move::NONE;
        let us = pos.side_to_move();

        let tt_move = self.tt.try_get_best_move(pos.hash());
        let killers = self.stack.entry(0).killers;
        let mut picker = MovePicker::new_main(tt_move, killers, None);

        while let Some((mv, phase)) = picker.next(pos, &self.history) {
            let promotion_threat = pos.is_promotion_threat(mv);
            if !pos.make_move(mv) {
                continue;
            }
            expanded += 1;

            if self.start_reporting || self.clock.elapsed() >= Duration::from_secs(1) {
                self.start_reporting = true;
                info(InfoEvent::CurrMove {
                    depth,
                    mv,
                    move_number: expanded,
                    nodes: self.nodes,
                });
            }

            let checking = pos.in_check();
            let is_quiet = mv.is_quiet();
            let interesting = in_check || checking || phase <= Phase::Killer || !raised_alpha;

            {
                let entry = self.stack.entry_mut(0);
                entry.current_move = mv;
                entry.is_checking_move = checking;
                entry.is_promotion_threat = promotion_threat;
                entry.cont_key = Some(History::continuation_key(us, mv));
            }

            let reduction = if interesting {
                0
            } else {
                lmr_reduction(depth, expanded as i32 - 1)
            };

            let score = if !raised_alpha {
                -self.search_node(pos, -beta, -alpha, depth - 1, 1, true, true)
            } else {
                let mut s = -self.search_node(
                    pos,
                    -alpha - 1,
                    -alpha,
                    (depth - reduction - 1).max(0),
                    1,
                    true,
                    false,
                );
                if s > alpha && reduction > 0 {
                    s = -self.search_node(pos, -alpha - 1, -alpha, depth - 1, 1, true, false);
                }
                if s > alpha {
                    s = -self.search_node(pos, -beta, -alpha, depth - 1, 1, true, true);
                }
                s
            };

            pos.unmake_move();

            if self.aborted {
                break;
            }

            if score > alpha {
                raised_alpha = true;
                alpha = score;
                best_move = mv;

                if score >= beta {
                    if is_quiet {
                        self.stack.entry_mut(0).killers.add(mv);
                        self.history.update_cutoff(us, mv, None, &quiets, depth);
                    }
                    break;
                }
                self.pv.merge(0, mv);
            }

            if is_quiet {
                quiets.push(mv);
            }
        }

        if self.aborted {
            return Value::ZERO;
        }

        if expanded == 0 {
            return if in_check {
                Value::mated_in(0)
            } else {
                Value::ZERO
            };
        }

        self.tt
            .add(pos.hash(), depth, 0, original_alpha, beta, alpha, best_move);
        alpha
    }

    // =========================================================================
    // 再帰PVS本体
    // =========================================================================

    #[allow(clippy::too_many_lines)]
    fn search_node(
        &mut self,
        pos: &mut Position,
        alpha: Value,
        beta: Value,
        depth: Depth,
        ply: i32,
        can_null: bool,
        is_pv: bool,
    ) -> Value {
        let in_check = self.stack.entry(ply - 1).is_checking_move;
        let is_promotion_threat = self.stack.entry(ply - 1).is_promotion_threat;
        let prev_cont_key = self.stack.entry(ply - 1).cont_key;

        let mut alpha = alpha;
        let mut beta = beta;
        let original_alpha = alpha;
        let original_beta = beta;
        self.nodes += 1;
        let mut depth = depth.min(MAX_PLY - 1);
        self.seldepth = self.seldepth.max(ply);
        self.pv.init(ply);

        if ply >= MAX_PLY - 1 {
            return self.evaluation.compute(pos, alpha, beta);
        }

        if pos.is_repetition() {
            return self.draw_score(pos);
        }

        // mate distance pruning
        alpha = alpha.max(Value::mated_in(ply));
        beta = beta.min(Value::mate_in(ply + 1));
        if alpha >= beta {
            return alpha;
        }

        let excluded = self.stack.entry(ply).excluded;

        let lookup = self
            .tt
            .try_get_score(pos.hash(), depth, ply, &mut alpha, &mut beta);
        let mut tt_move = lookup.mv;
        let mut tt_score = lookup.score;
        let mut tt_bound = lookup.bound;
        let tt_depth = lookup.depth;

        if excluded.is_some() && tt_move == excluded {
            tt_move = Move::NONE;
            tt_score = Value::NONE;
            tt_bound = Bound::None;
        }

        // singular検証中は同一ハッシュのエントリが検証対象そのものなので
        // カットオフには使わない
        if lookup.cutoff
            && excluded.is_none()
            && (!is_pv || !tt_score.is_mate_score())
        {
            return tt_score;
        }

        if depth <= 0 {
            return self.quiesce(pos, alpha, beta, ply, in_check, 0);
        }

        if self.must_abort() {
            self.aborted = true;
            return Value::ZERO;
        }

        // 静的評価とimprovingフラグ
        let mut eval = Value::NONE;
        let mut improving = false;
        if !in_check {
            eval = self.evaluation.compute(pos, alpha, beta);
            self.stack.entry_mut(ply).eval = eval;
            if ply >= 4 && self.stack.entry(ply - 4).eval != Value::NONE {
                improving = eval > self.stack.entry(ply - 4).eval;
            } else if ply >= 2 && self.stack.entry(ply - 2).eval != Value::NONE {
                improving = eval > self.stack.entry(ply - 2).eval;
            }
        } else {
            self.stack.entry_mut(ply).eval = Value::NONE;
        }

        let mut can_prune = false;
        if !in_check && !is_pv && excluded.is_none() {
            // static null move（reverse futility）
            if depth <= STATIC_NULL_MOVE_MAX_DEPTH
                && eval != Value::NONE
                && eval >= beta + depth * STATIC_NULL_MOVE_MARGIN
            {
                return eval;
            }

            // null move pruning
            // パスしても相手がbetaを超えられないなら枝を刈る。
            // 王以外の駒が1枚以下ではツークツワンクの恐れがあるので使わない。
            if can_null
                && depth >= NMP_MIN_DEPTH
                && eval != Value::NONE
                && eval >= beta
                && pos.non_king_count(pos.side_to_move()) > 1
            {
                let mut reduction = nmp_reduction(depth);
                if improving {
                    reduction += 1;
                }

                pos.make_null_move();
                {
                    let entry = self.stack.entry_mut(ply);
                    entry.current_move = Move::NONE;
                    entry.is_checking_move = false;
                    entry.is_promotion_threat = false;
                    entry.cont_key = None;
                }
                let score = -self.search_node(
                    pos,
                    -beta,
                    -beta + 1,
                    (depth - reduction - 1).max(0),
                    ply + 1,
                    false,
                    false,
                );
                pos.unmake_null_move();

                if self.aborted {
                    return Value::ZERO;
                }
                if score >= beta {
                    self.tt.add(
                        pos.hash(),
                        depth,
                        ply,
                        original_alpha,
                        original_beta,
                        score,
                        Move::NONE,
                    );
                    return beta;
                }
            }

            // razoring
            if can_null {
                if depth <= RAZOR_MAX_DEPTH && !is_promotion_threat {
                    let threshold = alpha - FUTILITY_MARGIN[depth as usize];
                    if eval != Value::NONE && eval <= threshold {
                        let score = self.quiesce(pos, alpha, beta, ply, in_check, 0);
                        if score <= alpha {
                            return score;
                        }
                    }
                }
                can_prune = true;
            }

            // internal iterative deepening
            // depthをその場で減らし、以降の閾値すべてに縮んだ値を効かせる
            if depth >= IID_MIN_DEPTH && tt_move.is_none() {
                depth -= 1;
            }

            // ProbCut: 駒得の手がbetaを大きく超えるなら浅い検証で切る
            let probcut_beta = beta + PCUT_MARGIN;
            if depth > PCUT_DEPTH
                && (tt_score == Value::NONE
                    || tt_bound == Bound::Lower
                    || tt_score >= probcut_beta)
            {
                let mut picker = MovePicker::new_probcut();
                while let Some((mv, _)) = picker.next(pos, &self.history) {
                    if !pos.make_move(mv) {
                        continue;
                    }
                    let checking = pos.in_check();
                    {
                        let entry = self.stack.entry_mut(ply);
                        entry.current_move = mv;
                        entry.is_checking_move = checking;
                        entry.is_promotion_threat = false;
                        entry.cont_key =
                            Some(History::continuation_key(pos.side_to_move().opponent(), mv));
                    }

                    let mut score = -self.quiesce(
                        pos,
                        -probcut_beta,
                        -probcut_beta + 1,
                        ply + 1,
                        checking,
                        0,
                    );
                    if score >= probcut_beta {
                        score = -self.search_node(
                            pos,
                            -probcut_beta,
                            -probcut_beta + 1,
                            depth - 4,
                            ply + 1,
                            true,
                            false,
                        );
                    }
                    pos.unmake_move();

                    if self.aborted {
                        return Value::ZERO;
                    }
                    if score >= probcut_beta {
                        return score;
                    }
                }
            }
        }

        // =====================================================================
        // 手のループ
        // =====================================================================

        let us = pos.side_to_move();
        let mut expanded = 0i32;
        let mut quiets: SmallVec<[Move; 64]> = SmallVec::new();
        let mut best_move = Move::NONE;
        let killers = self.stack.entry(ply).killers;
        let mut picker = MovePicker::new_main(tt_move, killers, prev_cont_key);

        while let Some((mv, phase)) = picker.next(pos, &self.history) {
            if mv == excluded {
                continue;
            }

            // SEEと昇格脅威はmake前の局面で評価する
            let see_value = if !in_check && depth <= SEE_PRUNING_DEPTH && phase >= Phase::Quiet {
                pos.see(mv)
            } else {
                0
            };
            let promotion_threat = pos.is_promotion_threat(mv);

            if !pos.make_move(mv) {
                continue;
            }
            expanded += 1;

            let checking = pos.in_check();
            let is_quiet = mv.is_quiet();
            let interesting = in_check || checking || phase <= Phase::Killer || expanded == 1;

            {
                let entry = self.stack.entry_mut(ply);
                entry.current_move = mv;
                entry.is_checking_move = checking;
                entry.is_promotion_threat = promotion_threat;
                entry.cont_key = Some(History::continuation_key(us, mv));
            }

            if can_prune && !interesting && !promotion_threat {
                // late move pruning
                if depth <= LMP_PRUNING_DEPTH && expanded > lmp_limit(depth, improving) {
                    pos.unmake_move();
                    continue;
                }

                // SEEベースの枝刈り
                if depth <= SEE_PRUNING_DEPTH {
                    if phase == Phase::BadCapture
                        && (depth <= 1
                            || -see_value > (depth - 1) * SEE_PRUNING_CAPTURE_INC)
                    {
                        pos.unmake_move();
                        continue;
                    }
                    if phase == Phase::Quiet && -see_value > depth * SEE_PRUNING_QUIET_INC {
                        pos.unmake_move();
                        continue;
                    }
                }
            }

            // singular extension: TT手だけが大崩れを防ぐ手なら1ply延長
            let mut extension = 0;
            if depth > SEX_DEPTH
                && ply <= self.root_depth * 2
                && excluded.is_none()
                && mv == tt_move
                && lookup.hit
                && tt_depth > depth - 3
                && tt_bound == Bound::Lower
                && tt_score != Value::NONE
                && !tt_score.is_mate_score()
            {
                pos.unmake_move();

                let singular_beta = tt_score - 2 * depth;
                self.stack.entry_mut(ply).excluded = mv;
                let score = self.search_node(
                    pos,
                    singular_beta - 1,
                    singular_beta,
                    depth / 2,
                    ply,
                    false,
                    false,
                );
                self.stack.entry_mut(ply).excluded = Move::NONE;

                if score < singular_beta {
                    extension = 1;
                }

                let remade = pos.make_move(mv);
                debug_assert!(remade, "singular re-make must succeed");
                // 再帰で上書きされたスタックを復元する
                let entry = self.stack.entry_mut(ply);
                entry.current_move = mv;
                entry.is_checking_move = checking;
                entry.is_promotion_threat = promotion_threat;
                entry.cont_key = Some(History::continuation_key(us, mv));
            }

            if in_check {
                extension = 1;
            }

            let mut reduction = 0;
            if !interesting {
                reduction = lmr_reduction(depth, expanded - 1);
                if (extension > 0 || is_pv) && reduction > 0 {
                    reduction -= 1;
                }
            }

            let score = if expanded == 1 {
                -self.search_node(pos, -beta, -alpha, depth + extension - 1, ply + 1, true, is_pv)
            } else {
                let mut s = -self.search_node(
                    pos,
                    -alpha - 1,
                    -alpha,
                    (depth + extension - reduction - 1).max(0),
                    ply + 1,
                    true,
                    false,
                );
                if s > alpha && reduction > 0 {
                    s = -self.search_node(
                        pos,
                        -alpha - 1,
                        -alpha,
                        depth + extension - 1,
                        ply + 1,
                        true,
                        false,
                    );
                }
                if s > alpha {
                    s = -self.search_node(
                        pos,
                        -beta,
                        -alpha,
                        depth + extension - 1,
                        ply + 1,
                        true,
                        true,
                    );
                }
                s
            };

            pos.unmake_move();

            if self.aborted {
                break;
            }

            if score > alpha {
                alpha = score;
                best_move = mv;

                if score >= beta {
                    if is_quiet {
                        self.stack.entry_mut(ply).killers.add(mv);
                        self.history
                            .update_cutoff(us, mv, prev_cont_key, &quiets, depth);
                    }
                    break;
                }
                self.pv.merge(ply, mv);
            }

            if is_quiet {
                quiets.push(mv);
            }
        }

        if self.aborted {
            return Value::ZERO;
        }

        if expanded == 0 {
            return if in_check {
                Value::mated_in(ply)
            } else {
                self.draw_score(pos)
            };
        }

        // singular検証のスコアを本来の局面の結果として書くと汚染になる
        if excluded.is_none() {
            self.tt.add(
                pos.hash(),
                depth,
                ply,
                original_alpha,
                original_beta,
                alpha,
                best_move,
            );
        }
        alpha
    }
}

/// aspiration windowの片側境界
#[inline]
fn window_bound(score: Value, delta: i32, upper: bool) -> Value {
    if delta == i32::MAX {
        if upper {
            Value::INFINITE
        } else {
            -Value::INFINITE
        }
    } else if upper {
        score + delta
    } else {
        score - delta
    }
}
