//! rchess UCIフロントエンド
//!
//! 標準入出力でUCIプロトコルを話す。探索は専用スレッドで走り、
//! `stop` / `ponderhit` は共有フラグで協調的に伝える。

mod engine;
mod protocol;

use std::io::BufRead;

use anyhow::Result;
use clap::Parser;

use engine::Engine;
use protocol::GoParams;
use rchess_core::tt::DEFAULT_SIZE_MB;

#[derive(Parser)]
#[command(name = "rchess", version, about = "UCI chess engine")]
struct Args {
    /// 置換表サイズ（MB）
    #[arg(long, default_value_t = DEFAULT_SIZE_MB)]
    hash: usize,

    /// 起動直後にperftを実行して終了する
    #[arg(long, value_name = "DEPTH")]
    perft: Option<u32>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    let mut engine = Engine::new(args.hash);
    log::info!("rchess {} started (hash {} MB)", env!("CARGO_PKG_VERSION"), args.hash);

    if let Some(depth) = args.perft {
        engine.perft(depth);
        return Ok(());
    }

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = tokens.first() else {
            continue;
        };

        match command {
            "uci" => Engine::print_id(),
            "isready" => {
                engine.sync();
                println!("readyok");
            }
            "setoption" => {
                // setoption name <Name> value <Value>
                if let Err(err) = handle_setoption(&mut engine, &tokens[1..]) {
                    log::warn!("setoption: {err}");
                }
            }
            "ucinewgame" => engine.new_game(),
            "position" => {
                if let Err(err) = engine.set_position(&tokens[1..]) {
                    log::warn!("position: {err}");
                }
            }
            "go" => {
                if let Err(err) = engine.go(GoParams::parse(&tokens[1..])) {
                    log::warn!("go: {err}");
                }
            }
            "stop" => engine.stop(),
            "ponderhit" => engine.ponderhit(),
            "perft" => {
                let depth = tokens.get(1).and_then(|v| v.parse().ok()).unwrap_or(5);
                engine.perft(depth);
            }
            "quit" => break,
            _ => log::debug!("ignoring unknown command: {line}"),
        }
    }

    engine.halt();
    Ok(())
}

fn handle_setoption(engine: &mut Engine, tokens: &[&str]) -> Result<()> {
    let name_pos = tokens.iter().position(|&t| t == "name");
    let value_pos = tokens.iter().position(|&t| t == "value");
    let (Some(name_pos), Some(value_pos)) = (name_pos, value_pos) else {
        anyhow::bail!("expected: setoption name <id> value <x>");
    };
    if value_pos < name_pos + 1 {
        anyhow::bail!("expected: setoption name <id> value <x>");
    }
    let name = tokens[name_pos + 1..value_pos].join(" ");
    let value = tokens[value_pos + 1..].join(" ");
    engine.set_option(&name, &value)
}
