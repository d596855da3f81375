//! UCIプロトコルの入出力
//!
//! `go` 引数のパースと `info` / `bestmove` 行の整形。
//! エンジン本体の状態には触らない純粋なテキスト処理。

use std::time::Duration;

use rchess_core::search::InfoEvent;
use rchess_core::types::{Bound, Move, Value};

/// `go` コマンドの引数
#[derive(Debug, Clone, Default)]
pub struct GoParams {
    pub wtime: Option<Duration>,
    pub btime: Option<Duration>,
    pub winc: Option<Duration>,
    pub binc: Option<Duration>,
    pub movestogo: Option<u32>,
    pub depth: Option<i32>,
    pub nodes: Option<u64>,
    pub movetime: Option<Duration>,
    pub infinite: bool,
    pub ponder: bool,
}

impl GoParams {
    /// `go` に続くトークン列をパースする。未知のトークンは読み飛ばす。
    pub fn parse(tokens: &[&str]) -> GoParams {
        fn millis(iter: &mut std::slice::Iter<'_, &str>) -> Option<Duration> {
            iter.next()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
        }

        let mut params = GoParams::default();
        let mut iter = tokens.iter();
        while let Some(&token) = iter.next() {
            match token {
                "wtime" => params.wtime = millis(&mut iter),
                "btime" => params.btime = millis(&mut iter),
                "winc" => params.winc = millis(&mut iter),
                "binc" => params.binc = millis(&mut iter),
                "movetime" => params.movetime = millis(&mut iter),
                "movestogo" => {
                    params.movestogo = iter.next().and_then(|v| v.parse().ok());
                }
                "depth" => params.depth = iter.next().and_then(|v| v.parse().ok()),
                "nodes" => params.nodes = iter.next().and_then(|v| v.parse().ok()),
                "infinite" => params.infinite = true,
                "ponder" => params.ponder = true,
                _ => {}
            }
        }
        params
    }
}

/// スコアをUCI表記にする（cp / mate）
fn format_score(score: Value) -> String {
    if score.is_mate_score() {
        format!("mate {}", score.mate_distance())
    } else {
        format!("cp {}", score.raw())
    }
}

/// infoイベントを1行のUCI infoにする
pub fn format_info(event: &InfoEvent) -> String {
    match event {
        InfoEvent::Iteration {
            depth,
            seldepth,
            score,
            bound,
            nodes,
            elapsed,
            hashfull,
            pv,
        } => {
            let millis = elapsed.as_millis().max(1) as u64;
            let nps = nodes * 1000 / millis;
            let mut line = format!(
                "info depth {} seldepth {} score {}",
                depth,
                seldepth,
                format_score(*score)
            );
            match bound {
                Bound::Lower => line.push_str(" lowerbound"),
                Bound::Upper => line.push_str(" upperbound"),
                _ => {}
            }
            line.push_str(&format!(
                " nodes {} nps {} hashfull {} time {}",
                nodes, nps, hashfull, millis
            ));
            if !pv.is_empty() {
                line.push_str(" pv");
                for mv in pv {
                    line.push(' ');
                    line.push_str(&mv.to_uci());
                }
            }
            line
        }
        InfoEvent::CurrMove {
            depth,
            mv,
            move_number,
            nodes,
        } => format!(
            "info depth {} currmove {} currmovenumber {} nodes {}",
            depth,
            mv.to_uci(),
            move_number,
            nodes
        ),
    }
}

/// bestmove行
pub fn format_bestmove(best: Move, ponder: Option<Move>) -> String {
    match ponder {
        Some(p) if p.is_some() => format!("bestmove {} ponder {}", best.to_uci(), p.to_uci()),
        _ => format!("bestmove {}", best.to_uci()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_go_time_controls() {
        let params =
            GoParams::parse(&["wtime", "60000", "btime", "55000", "winc", "1000", "movestogo", "20"]);
        assert_eq!(params.wtime, Some(Duration::from_millis(60_000)));
        assert_eq!(params.btime, Some(Duration::from_millis(55_000)));
        assert_eq!(params.winc, Some(Duration::from_millis(1_000)));
        assert_eq!(params.movestogo, Some(20));
        assert!(!params.infinite);
    }

    #[test]
    fn test_parse_go_flags() {
        let params = GoParams::parse(&["infinite", "ponder", "depth", "12", "nodes", "100000"]);
        assert!(params.infinite);
        assert!(params.ponder);
        assert_eq!(params.depth, Some(12));
        assert_eq!(params.nodes, Some(100_000));
    }

    #[test]
    fn test_parse_go_skips_unknown() {
        let params = GoParams::parse(&["searchmoves", "e2e4", "depth", "3"]);
        assert_eq!(params.depth, Some(3));
    }

    #[test]
    fn test_format_mate_score() {
        assert_eq!(format_score(Value::mate_in(3)), "mate 2");
        assert_eq!(format_score(Value::mated_in(2)), "mate -1");
        assert_eq!(format_score(Value::new(42)), "cp 42");
    }
}
