//! HTTP front end that asks a UCI engine for the best move in a position.
//!
//! `POST /best_move` takes `{"FEN": "..."}` and answers
//! `{"best_move": "e2e4"}`, or `{"best_move": null}` when the engine has no
//! move. One engine process is shared by all requests through an
//! [`gate::EngineGate`], which serialises the position/search pair.

pub mod api;
pub mod config;
pub mod error;
pub mod gate;
pub mod logging;
