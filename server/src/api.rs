use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::routing::{get, post};
use axum::Router;
use cozy_chess::Board;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::gate::BestMoveSource;

#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn BestMoveSource>,
    /// Reject unparseable FENs before they reach the engine.
    pub validate_fen: bool,
}

#[derive(Debug, Deserialize)]
pub struct PositionRequest {
    #[serde(rename = "FEN", default)]
    pub fen: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MoveResponse {
    pub best_move: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/best_move", post(best_move))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn best_move(
    State(state): State<AppState>,
    payload: Result<Json<PositionRequest>, JsonRejection>,
) -> Result<Json<MoveResponse>, ApiError> {
    let Json(request) = payload?;
    let fen = request
        .fen
        .as_deref()
        .map(str::trim)
        .filter(|fen| !fen.is_empty())
        .ok_or(ApiError::MissingFen)?;

    tracing::info!(fen, "best_move request");

    if state.validate_fen {
        fen.parse::<Board>()
            .map_err(|e| ApiError::InvalidFen(format!("{:?}", e)))?;
    }

    let best_move = state.source.best_move(fen).await?;
    match &best_move {
        Some(mv) => tracing::info!(fen, best_move = %mv, "best_move answered"),
        None => tracing::info!(fen, "engine reported no move"),
    }

    Ok(Json(MoveResponse { best_move }))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
