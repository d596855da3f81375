//! エンジン本体
//!
//! UCIコマンドを受けて局面・オプション・探索スレッドを管理する。
//! 探索は専用スレッドで走らせ、`stop`/`ponderhit` は共有フラグで伝える。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use rchess_core::movegen::{generate_all, MoveList};
use rchess_core::position::Position;
use rchess_core::search::{GameClock, InfoEvent, SearchLimits, SearchWorker};
use rchess_core::tt::{TranspositionTable, DEFAULT_SIZE_MB, MAX_SIZE_MB};
use rchess_core::types::{Move, MAX_PLY};

use crate::protocol::{format_bestmove, format_info, GoParams};

/// 探索スレッドのスタックサイズ
///
/// 再帰PVS + 1plyあたり固定バッファのため既定の2MBでは心許ない。
const SEARCH_THREAD_STACK: usize = 32 * 1024 * 1024;

pub struct Engine {
    tt: Arc<TranspositionTable>,
    /// 探索していない間だけSome
    worker: Option<Box<SearchWorker>>,
    search_thread: Option<JoinHandle<Box<SearchWorker>>>,
    position: Position,
    stop: Arc<AtomicBool>,
    /// 現在の探索のponder/infinite解除フラグ
    infinite_flag: Option<Arc<AtomicBool>>,
    // オプション
    hash_mb: usize,
    contempt: i32,
    analyse_mode: bool,
}

impl Engine {
    pub fn new(hash_mb: usize) -> Engine {
        let tt = Arc::new(TranspositionTable::new(hash_mb));
        let worker = SearchWorker::new(Arc::clone(&tt));
        Engine {
            tt,
            worker: Some(worker),
            search_thread: None,
            position: Position::startpos(),
            stop: Arc::new(AtomicBool::new(false)),
            infinite_flag: None,
            hash_mb,
            contempt: 0,
            analyse_mode: false,
        }
    }

    pub fn print_id() {
        println!("id name rchess {}", env!("CARGO_PKG_VERSION"));
        println!("id author SH11235");
        println!(
            "option name Hash type spin default {} min 1 max {}",
            DEFAULT_SIZE_MB, MAX_SIZE_MB
        );
        println!("option name Contempt type spin default 0 min -100 max 100");
        println!("option name Ponder type check default false");
        println!("option name UCI_AnalyseMode type check default false");
        println!("uciok");
    }

    /// 走っている探索を止めて合流する
    pub fn halt(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(flag) = self.infinite_flag.take() {
            flag.store(false, Ordering::Relaxed);
        }
        self.join_search();
    }

    fn join_search(&mut self) {
        if let Some(handle) = self.search_thread.take() {
            match handle.join() {
                Ok(worker) => self.worker = Some(worker),
                Err(err) => std::panic::resume_unwind(err),
            }
        }
    }

    /// 探索が終わっていれば回収する（goの前などに呼ぶ）
    fn ensure_idle(&mut self) {
        if self
            .search_thread
            .as_ref()
            .is_some_and(|h| h.is_finished())
        {
            self.join_search();
        }
    }

    pub fn set_option(&mut self, name: &str, value: &str) -> Result<()> {
        match name.to_ascii_lowercase().as_str() {
            "hash" => {
                let mb: usize = value.parse().context("Hash must be an integer")?;
                self.hash_mb = mb.clamp(1, MAX_SIZE_MB);
                self.halt();
                match Arc::get_mut(&mut self.tt) {
                    Some(tt) => tt.resize(self.hash_mb),
                    None => log::warn!("cannot resize hash while search is running"),
                }
            }
            "contempt" => {
                self.contempt = value.parse().context("Contempt must be an integer")?;
            }
            "ponder" => {} // GUI向けの広告のみ。探索側はgo ponderで判断する。
            "uci_analysemode" => {
                self.analyse_mode = value.eq_ignore_ascii_case("true");
            }
            _ => bail!("unknown option: {name}"),
        }
        Ok(())
    }

    pub fn new_game(&mut self) {
        self.halt();
        if let Some(tt) = Arc::get_mut(&mut self.tt) {
            tt.clear();
        }
        if let Some(worker) = self.worker.as_mut() {
            worker.new_game();
        }
    }

    /// `position` コマンド
    pub fn set_position(&mut self, tokens: &[&str]) -> Result<()> {
        let mut rest = tokens;
        let mut pos = match rest.first() {
            Some(&"startpos") => {
                rest = &rest[1..];
                Position::startpos()
            }
            Some(&"fen") => {
                let end = rest
                    .iter()
                    .position(|&t| t == "moves")
                    .unwrap_or(rest.len());
                let fen = rest[1..end].join(" ");
                let pos = Position::from_fen(&fen)?;
                rest = &rest[end..];
                pos
            }
            _ => bail!("position requires startpos or fen"),
        };

        if rest.first() == Some(&"moves") {
            for token in &rest[1..] {
                let mv = find_move(&mut pos, token)
                    .with_context(|| format!("illegal move in position command: {token}"))?;
                pos.make_move(mv);
            }
        }
        self.position = pos;
        Ok(())
    }

    /// `go` コマンド: 探索スレッドを起動する
    pub fn go(&mut self, params: GoParams) -> Result<()> {
        self.ensure_idle();
        if self.search_thread.is_some() {
            bail!("search already running");
        }
        let Some(mut worker) = self.worker.take() else {
            bail!("search worker unavailable");
        };

        self.stop.store(false, Ordering::Relaxed);
        let clock = GameClock::from_go(
            self.position.side_to_move(),
            params.wtime,
            params.btime,
            params.winc,
            params.binc,
            params.movestogo,
            params.movetime,
            params.infinite,
            params.ponder,
            Arc::clone(&self.stop),
        );
        self.infinite_flag = Some(clock.infinite_flag());

        let limits = SearchLimits {
            max_depth: params.depth.unwrap_or(MAX_PLY - 1).clamp(1, MAX_PLY - 1),
            max_nodes: params.nodes.unwrap_or(u64::MAX),
            ponder: params.ponder,
        };
        worker.set_contempt(self.contempt);
        worker.set_analyse_mode(self.analyse_mode);

        let mut pos = self.position.clone();
        let builder = std::thread::Builder::new()
            .name("search".to_string())
            .stack_size(SEARCH_THREAD_STACK);
        let handle = builder
            .spawn(move || {
                let mut sink = |event: InfoEvent| println!("{}", format_info(&event));
                let result = worker.search(&mut pos, limits, clock, &mut sink);
                println!("{}", format_bestmove(result.best_move, result.ponder_move));
                worker
            })
            .context("failed to spawn search thread")?;
        self.search_thread = Some(handle);
        Ok(())
    }

    pub fn stop(&mut self) {
        self.halt();
    }

    pub fn ponderhit(&mut self) {
        // ponder探索を通常の時間管理に切り替える
        if let Some(flag) = self.infinite_flag.take() {
            flag.store(false, Ordering::Relaxed);
        }
    }

    /// isready: 走行中でなければ同期する
    pub fn sync(&mut self) {
        self.ensure_idle();
    }

    pub fn perft(&mut self, depth: u32) {
        let mut pos = self.position.clone();
        let start = std::time::Instant::now();
        let mut total = 0u64;
        for (mv, nodes) in rchess_core::perft::perft_divide(&mut pos, depth) {
            println!("{mv}: {nodes}");
            total += nodes;
        }
        let elapsed = start.elapsed().max(Duration::from_millis(1));
        println!(
            "\nnodes {} time {}ms nps {}",
            total,
            elapsed.as_millis(),
            total * 1000 / elapsed.as_millis() as u64
        );
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.halt();
    }
}

/// UCI表記の手を現局面の合法手から探す
fn find_move(pos: &mut Position, uci: &str) -> Option<Move> {
    let mut list = MoveList::new();
    generate_all(pos, &mut list);
    for &mv in list.iter() {
        if mv.to_uci() == uci {
            if pos.make_move(mv) {
                pos.unmake_move();
                return Some(mv);
            }
            return None;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rchess_core::position::START_FEN;

    #[test]
    fn test_set_position_startpos_moves() {
        let mut engine = Engine::new(1);
        engine
            .set_position(&["startpos", "moves", "e2e4", "e7e5", "g1f3"])
            .unwrap();
        assert_eq!(
            engine.position.to_fen(),
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2"
        );
    }

    #[test]
    fn test_set_position_fen() {
        let mut engine = Engine::new(1);
        let fen = "4k3/8/8/8/8/8/8/R3K3 w Q - 0 1";
        engine.set_position(&["fen", "4k3/8/8/8/8/8/8/R3K3", "w", "Q", "-", "0", "1"])
            .unwrap();
        assert_eq!(engine.position.to_fen(), fen);
    }

    #[test]
    fn test_set_position_rejects_illegal_move() {
        let mut engine = Engine::new(1);
        assert!(engine
            .set_position(&["startpos", "moves", "e2e5"])
            .is_err());
    }

    #[test]
    fn test_go_and_stop_produce_worker_back() {
        let mut engine = Engine::new(1);
        engine.set_position(&["startpos"]).unwrap();
        let params = GoParams {
            depth: Some(2),
            ..GoParams::default()
        };
        engine.go(params).unwrap();
        engine.stop();
        assert!(engine.worker.is_some());
        // 2回目のgoも通る
        let params = GoParams {
            depth: Some(1),
            ..GoParams::default()
        };
        engine.go(params).unwrap();
        engine.stop();
    }

    #[test]
    fn test_find_move_uses_legal_moves_only() {
        let mut pos = Position::from_fen(START_FEN).unwrap();
        assert!(find_move(&mut pos, "e2e4").is_some());
        assert!(find_move(&mut pos, "e2e5").is_none());
        assert!(find_move(&mut pos, "e7e5").is_none());
    }
}
