//! 時間管理
//!
//! - soft limit: 次の反復を開始してよいかの判定（`can_search_deeper`）
//! - hard limit: 探索中の強制打ち切り（`check_time_budget`）
//! - infinite/ponder: 外部からのstop/ponderhitまで時間判定を無効化
//!
//! stopとponder解除のフラグは`Arc<AtomicBool>`で共有し、UCIスレッドから
//! 探索スレッドへ協調的に伝える。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::types::Color;

/// 1手に使う時間の分母（残り時間 / MOVES_TO_GO_DEFAULT + 増分の一部）
const MOVES_TO_GO_DEFAULT: u32 = 30;

/// soft limitに対するhard limitの倍率
const HARD_LIMIT_FACTOR: u32 = 4;

/// 探索用の時計
#[derive(Clone)]
pub struct GameClock {
    start: Instant,
    /// 新しい反復を始めてよい残り予算
    soft_limit: Option<Duration>,
    /// これを超えたら探索を打ち切る
    hard_limit: Option<Duration>,
    /// 外部からの停止要求
    stop: Arc<AtomicBool>,
    /// infinite/ponder中は時間制限を見ない
    infinite: Arc<AtomicBool>,
}

impl GameClock {
    /// 時間無制限（stop要求でのみ停止）
    pub fn infinite(stop: Arc<AtomicBool>) -> GameClock {
        GameClock {
            start: Instant::now(),
            soft_limit: None,
            hard_limit: None,
            stop,
            infinite: Arc::new(AtomicBool::new(true)),
        }
    }

    /// 1手の時間固定
    pub fn fixed(movetime: Duration, stop: Arc<AtomicBool>) -> GameClock {
        GameClock {
            start: Instant::now(),
            soft_limit: Some(movetime),
            hard_limit: Some(movetime),
            stop,
            infinite: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 持ち時間制
    ///
    /// `remaining`/`increment` は手番側の値。`ponder` で開始した場合は
    /// `ponderhit` が来るまでinfinite扱い。
    pub fn tournament(
        remaining: Duration,
        increment: Duration,
        moves_to_go: Option<u32>,
        ponder: bool,
        stop: Arc<AtomicBool>,
    ) -> GameClock {
        let mtg = moves_to_go.unwrap_or(MOVES_TO_GO_DEFAULT).max(1);
        let budget = remaining / mtg + increment * 3 / 4;
        // 残り時間の半分は常に温存する
        let soft = budget.min(remaining / 2);
        let hard = (soft * HARD_LIMIT_FACTOR).min(remaining / 2);
        GameClock {
            start: Instant::now(),
            soft_limit: Some(soft),
            hard_limit: Some(hard),
            stop,
            infinite: Arc::new(AtomicBool::new(ponder)),
        }
    }

    /// go引数から時計を組み立てる
    #[allow(clippy::too_many_arguments)]
    pub fn from_go(
        stm: Color,
        wtime: Option<Duration>,
        btime: Option<Duration>,
        winc: Option<Duration>,
        binc: Option<Duration>,
        movestogo: Option<u32>,
        movetime: Option<Duration>,
        infinite: bool,
        ponder: bool,
        stop: Arc<AtomicBool>,
    ) -> GameClock {
        if infinite {
            return GameClock::infinite(stop);
        }
        if let Some(mt) = movetime {
            return GameClock::fixed(mt, stop);
        }
        let (time, inc) = match stm {
            Color::White => (wtime, winc),
            Color::Black => (btime, binc),
        };
        match time {
            Some(remaining) => GameClock::tournament(
                remaining,
                inc.unwrap_or(Duration::ZERO),
                movestogo,
                ponder,
                stop,
            ),
            None => GameClock::infinite(stop),
        }
    }

    /// ponder解除フラグの共有ハンドル
    pub fn infinite_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.infinite)
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    #[inline]
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_infinite(&self) -> bool {
        self.infinite.load(Ordering::Relaxed)
    }

    /// ponderhit: 通常の時間管理に切り替える
    pub fn ponderhit(&self) {
        self.infinite.store(false, Ordering::Relaxed);
    }

    /// 次の反復を始めてよいか
    pub fn can_search_deeper(&self) -> bool {
        if self.stop_requested() {
            return false;
        }
        if self.is_infinite() {
            return true;
        }
        match self.soft_limit {
            Some(limit) => self.elapsed() < limit,
            None => true,
        }
    }

    /// 探索を打ち切るべきか（ホットパスから間引いて呼ばれる）
    pub fn check_time_budget(&self) -> bool {
        if self.stop_requested() {
            return true;
        }
        if self.is_infinite() {
            return false;
        }
        match self.hard_limit {
            Some(limit) => self.elapsed() >= limit,
            None => false,
        }
    }

    /// 反復の結果を見て予算を補正する
    ///
    /// 合法手1つなら即指し、最善手が揺れているなら延長する。
    pub fn adjust_time(&mut self, one_legal_move: bool, best_move_changed: bool, root_changes: i32) {
        let Some(soft) = self.soft_limit else {
            return;
        };
        if one_legal_move {
            self.soft_limit = Some(Duration::ZERO);
            return;
        }
        if best_move_changed {
            let extended = soft + soft * (root_changes.clamp(1, 4) as u32) / 4;
            let capped = match self.hard_limit {
                Some(hard) => extended.min(hard),
                None => extended,
            };
            self.soft_limit = Some(capped);
        }
    }
}
