//! rchess-core
//!
//! UCIチェスエンジンのコアライブラリ。
//!
//! - `types`: 基本型（Color / Square / Piece / Value / Move / Bound）
//! - `bitboard`: ビットボードと利きテーブル
//! - `position`: 局面表現、make/unmake、Zobrist、SEE
//! - `movegen`: 疑似合法手生成とperft
//! - `eval`: 静的評価（マテリアル + PST、フェーズ内挿）
//! - `tt`: 置換表（16バイトXOR自己検証エントリ、2-wayバケット）
//! - `search`: 反復深化 + PVS + 静止探索

pub mod bitboard;
pub mod eval;
pub mod movegen;
pub mod perft;
pub mod position;
pub mod search;
pub mod tt;
pub mod types;

pub use position::Position;
