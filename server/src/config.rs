//! Configuration for the best-move server
//!
//! Every setting can be given as a command-line flag or through a
//! `BEST_MOVE_*` environment variable; flags win over the environment, and
//! both win over the compiled-in defaults.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use engine::{EngineConfig, SearchLimits, DEFAULT_DEPTH, DEFAULT_ENGINE_PATH};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "best-move-server",
    about = "Serve best moves from a UCI chess engine over HTTP"
)]
pub struct ServerConfig {
    /// Address to bind.
    #[arg(long, env = "BEST_MOVE_HOST", default_value = DEFAULT_HOST)]
    pub host: IpAddr,

    /// Port to listen on.
    #[arg(long, env = "BEST_MOVE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Path to the UCI engine executable. Bare names are looked up on PATH.
    #[arg(long, env = "BEST_MOVE_ENGINE_PATH", default_value = DEFAULT_ENGINE_PATH)]
    pub engine_path: PathBuf,

    /// Search depth passed to `go depth`.
    #[arg(long, env = "BEST_MOVE_DEPTH", default_value_t = DEFAULT_DEPTH)]
    pub depth: u8,

    /// Fixed thinking time per move; overrides --depth when set.
    #[arg(long, env = "BEST_MOVE_MOVETIME_MS")]
    pub movetime_ms: Option<u64>,

    /// Engine "Skill Level" option (0-20).
    #[arg(long, env = "BEST_MOVE_SKILL_LEVEL")]
    pub skill_level: Option<u8>,

    /// Engine "Threads" option.
    #[arg(long, env = "BEST_MOVE_THREADS")]
    pub threads: Option<u32>,

    /// Engine "Hash" option in MB.
    #[arg(long, env = "BEST_MOVE_HASH_MB")]
    pub hash_mb: Option<u32>,

    /// Give up on a search after this many seconds.
    #[arg(
        long,
        env = "BEST_MOVE_SEARCH_TIMEOUT_SECS",
        default_value_t = DEFAULT_SEARCH_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub search_timeout_secs: u64,

    /// Reject FENs that do not parse before asking the engine.
    #[arg(long, env = "BEST_MOVE_VALIDATE_FEN")]
    pub validate_fen: bool,

    /// Write logs to this file instead of stderr.
    #[arg(long, env = "BEST_MOVE_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            limits: SearchLimits {
                depth: Some(self.depth),
                movetime_ms: self.movetime_ms,
            },
            skill_level: self.skill_level,
            threads: self.threads,
            hash_mb: self.hash_mb,
            search_timeout: Duration::from_secs(self.search_timeout_secs),
            ..EngineConfig::new(&self.engine_path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Explicit flags take precedence over the environment, so these hold
    // whatever BEST_MOVE_* variables the test runner happens to have.

    #[test]
    fn test_flags_build_engine_config() {
        let config = ServerConfig::parse_from([
            "best-move-server",
            "--engine-path",
            "/opt/sf",
            "--depth",
            "12",
            "--movetime-ms",
            "500",
            "--skill-level",
            "5",
            "--search-timeout-secs",
            "3",
        ]);
        let engine = config.engine_config();
        assert_eq!(engine.path, PathBuf::from("/opt/sf"));
        assert_eq!(
            engine.limits,
            SearchLimits {
                depth: Some(12),
                movetime_ms: Some(500)
            }
        );
        assert_eq!(engine.skill_level, Some(5));
        assert_eq!(engine.search_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_socket_addr() {
        let config =
            ServerConfig::parse_from(["best-move-server", "--host", "127.0.0.1", "--port", "8080"]);
        assert_eq!(config.socket_addr(), "127.0.0.1:8080".parse().unwrap());
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::parse_from(["best-move-server"]);
        if std::env::var("BEST_MOVE_PORT").is_err() {
            assert_eq!(config.port, DEFAULT_PORT);
        }
        if std::env::var("BEST_MOVE_HOST").is_err() {
            assert_eq!(config.host, DEFAULT_HOST.parse::<IpAddr>().unwrap());
        }
        if std::env::var("BEST_MOVE_ENGINE_PATH").is_err() {
            assert_eq!(config.engine_path, PathBuf::from(DEFAULT_ENGINE_PATH));
        }
    }

    #[test]
    fn test_zero_search_timeout_is_rejected() {
        let args = ["best-move-server", "--search-timeout-secs", "0"];
        assert!(ServerConfig::try_parse_from(args).is_err());
        let config = ServerConfig::parse_from(["best-move-server", "--search-timeout-secs", "1"]);
        assert_eq!(config.engine_config().search_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        assert!(ServerConfig::try_parse_from(["best-move-server", "--port", "99999"]).is_err());
    }
}
