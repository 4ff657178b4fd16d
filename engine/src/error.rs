use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine executable not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Engine path is not an executable file: {}", .0.display())]
    NotExecutable(PathBuf),
    #[error("Failed to spawn engine: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Engine handshake failed: {0}")]
    Handshake(String),
    #[error("Engine did not answer within {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("Engine process closed")]
    Closed,
}
