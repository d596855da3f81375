//! 置換表モジュール
//!
//! 探索結果をキャッシュする置換表（Transposition Table）。
//!
//! - `TtEntry`: エントリ（16バイト、XOR自己検証）
//! - `TranspositionTable`: テーブル本体（2-wayバケット）
//! - probe/store操作と世代カウンター
//!
//! # XOR自己検証
//!
//! エントリは `key = fullHash ^ data` を保持し、読み出し時に
//! `key ^ data == fullHash` で有効性を再導出する。第2のハッシュを持たずに
//! 衝突と不完全な書き込みを検出できるが、XOR結果まで一致する衝突は
//! 判別できない（既知の限界。誤ヒットは「エントリなし」と同じ扱いになる）。

mod entry;
mod table;

pub use entry::{TtData, TtEntry};
pub use table::{TranspositionTable, TtLookup};

/// デフォルトのテーブルサイズ（MB）
pub const DEFAULT_SIZE_MB: usize = 64;

/// テーブルサイズの上限（MB）
pub const MAX_SIZE_MB: usize = 2048;

/// エントリサイズ（バイト）
pub const ENTRY_SIZE: usize = 16;

/// 1MBあたりのエントリ数
pub const ENTRIES_PER_MB: usize = 1024 * 1024 / ENTRY_SIZE;
