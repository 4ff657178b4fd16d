pub mod error;
pub mod stockfish;
pub mod uci;

pub use error::EngineError;
pub use stockfish::StockfishEngine;
pub use uci::{format_uci_move, UciError, UciMessage};

use std::path::PathBuf;
use std::time::Duration;

use cozy_chess::Move;

/// Default engine location on Debian-style systems.
pub const DEFAULT_ENGINE_PATH: &str = "/usr/games/stockfish";

/// Default search depth when no movetime is configured.
pub const DEFAULT_DEPTH: u8 = 15;

/// Configuration for spawning and driving a UCI engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub path: PathBuf,
    pub args: Vec<String>,
    pub limits: SearchLimits,
    pub skill_level: Option<u8>,
    pub threads: Option<u32>,
    pub hash_mb: Option<u32>,
    pub handshake_timeout: Duration,
    pub search_timeout: Duration,
}

impl EngineConfig {
    /// Default configuration pointing at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_ENGINE_PATH),
            args: Vec::new(),
            limits: SearchLimits::default(),
            skill_level: None,
            threads: None,
            hash_mb: None,
            handshake_timeout: Duration::from_secs(10),
            search_timeout: Duration::from_secs(30),
        }
    }
}

/// Limits for the "go" command. Movetime wins over depth when both are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub depth: Option<u8>,
    pub movetime_ms: Option<u64>,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            depth: Some(DEFAULT_DEPTH),
            movetime_ms: None,
        }
    }
}

impl SearchLimits {
    /// Render the UCI "go" command line (without trailing newline).
    pub fn go_command(&self) -> String {
        match (self.movetime_ms, self.depth) {
            (Some(movetime), _) => format!("go movetime {}", movetime),
            (None, Some(depth)) => format!("go depth {}", depth),
            (None, None) => format!("go depth {}", DEFAULT_DEPTH),
        }
    }
}

/// Events decoded from the engine's stdout
#[derive(Debug, Clone)]
pub enum EngineEvent {
    UciOk,
    ReadyOk,
    /// `None` when the engine reports no legal move
    BestMove(Option<Move>),
    Info(EngineInfo),
}

/// Search progress from an "info" line, logged with the final answer
#[derive(Debug, Clone, Default)]
pub struct EngineInfo {
    pub depth: Option<u8>,
    pub seldepth: Option<u8>,
    pub time_ms: Option<u64>,
    pub nodes: Option<u64>,
    pub score: Option<Score>,
    pub pv: Vec<Move>, // Principal variation
    pub nps: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Centipawns(i32),
    Mate(i8), // Negative for being mated
}
