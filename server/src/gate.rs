//! Exclusive access to the shared engine process.

use async_trait::async_trait;
use cozy_chess::Move;
use engine::{format_uci_move, EngineError, StockfishEngine};
use tokio::sync::Mutex;

/// The two engine operations the service needs.
#[async_trait]
pub trait SearchEngine: Send {
    async fn set_position(&mut self, fen: &str) -> Result<(), EngineError>;

    async fn best_move(&mut self) -> Result<Option<Move>, EngineError>;
}

#[async_trait]
impl SearchEngine for StockfishEngine {
    async fn set_position(&mut self, fen: &str) -> Result<(), EngineError> {
        StockfishEngine::set_position(self, fen).await
    }

    async fn best_move(&mut self) -> Result<Option<Move>, EngineError> {
        StockfishEngine::best_move(self).await
    }
}

/// Answers "best move for this FEN" as one indivisible operation.
/// Implemented by [`EngineGate`] and by test doubles.
#[async_trait]
pub trait BestMoveSource: Send + Sync {
    /// Returns the move in UCI notation, or `None` when there is no move.
    async fn best_move(&self, fen: &str) -> Result<Option<String>, EngineError>;
}

/// Owns one engine and admits a single request at a time, so a position set
/// by one request can never be searched on behalf of another.
pub struct EngineGate<E> {
    engine: Mutex<E>,
}

impl<E: SearchEngine> EngineGate<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Mutex::new(engine),
        }
    }

    /// Release the engine, e.g. to shut it down.
    pub fn into_inner(self) -> E {
        self.engine.into_inner()
    }
}

#[async_trait]
impl<E: SearchEngine> BestMoveSource for EngineGate<E> {
    async fn best_move(&self, fen: &str) -> Result<Option<String>, EngineError> {
        let mut engine = self.engine.lock().await;
        engine.set_position(fen).await?;
        let mv = engine.best_move().await?;
        Ok(mv.as_ref().map(format_uci_move))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::uci::parse_uci_move;
    use std::sync::Arc;
    use std::time::Duration;

    /// Remembers the last position and answers after a delay, like a real
    /// engine would, giving other tasks a chance to interleave.
    struct SlowEngine {
        fen: Option<String>,
        calls: Vec<String>,
    }

    #[async_trait]
    impl SearchEngine for SlowEngine {
        async fn set_position(&mut self, fen: &str) -> Result<(), EngineError> {
            self.calls.push(format!("position {fen}"));
            self.fen = Some(fen.to_string());
            Ok(())
        }

        async fn best_move(&mut self) -> Result<Option<Move>, EngineError> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.calls.push("go".into());
            let mv = match self.fen.as_deref() {
                Some(fen) if fen.contains(" b ") => "e7e5",
                Some(_) => "e2e4",
                None => return Err(EngineError::Closed),
            };
            Ok(Some(parse_uci_move(mv).unwrap()))
        }
    }

    #[tokio::test]
    async fn test_gate_serialises_position_and_search() {
        let gate = Arc::new(EngineGate::new(SlowEngine {
            fen: None,
            calls: Vec::new(),
        }));

        let white = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.best_move("8/8/8/8/8/8/8/K6k w - - 0 1").await })
        };
        let black = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.best_move("8/8/8/8/8/8/8/K6k b - - 0 1").await })
        };

        assert_eq!(white.await.unwrap().unwrap().as_deref(), Some("e2e4"));
        assert_eq!(black.await.unwrap().unwrap().as_deref(), Some("e7e5"));

        let gate = Arc::try_unwrap(gate).ok().unwrap();
        let calls = gate.into_inner().calls;
        assert_eq!(calls.len(), 4);
        for pair in calls.chunks(2) {
            assert!(pair[0].starts_with("position "));
            assert_eq!(pair[1], "go");
        }
    }

    #[tokio::test]
    async fn test_gate_propagates_engine_errors() {
        struct DeadEngine;

        #[async_trait]
        impl SearchEngine for DeadEngine {
            async fn set_position(&mut self, _fen: &str) -> Result<(), EngineError> {
                Err(EngineError::Closed)
            }

            async fn best_move(&mut self) -> Result<Option<Move>, EngineError> {
                unreachable!("search must not start after a failed set_position")
            }
        }

        let gate = EngineGate::new(DeadEngine);
        let err = gate.best_move("8/8/8/8/8/8/8/K6k w - - 0 1").await.unwrap_err();
        assert!(matches!(err, EngineError::Closed));
    }
}
