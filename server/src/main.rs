use std::sync::Arc;

use anyhow::Context;
use best_move_server::api::{self, AppState};
use best_move_server::config::ServerConfig;
use best_move_server::gate::EngineGate;
use best_move_server::logging;
use clap::Parser;
use engine::StockfishEngine;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    let _log_guard = logging::init(config.log_file.as_deref())
        .with_context(|| format!("failed to open log file {:?}", config.log_file))?;

    tracing::info!("Starting best-move server");

    let engine_config = config.engine_config();
    let engine = StockfishEngine::spawn(engine_config)
        .await
        .with_context(|| format!("failed to start engine at {}", config.engine_path.display()))?;
    let gate = Arc::new(EngineGate::new(engine));

    let app = api::router(AppState {
        source: gate.clone(),
        validate_fen: config.validate_fen,
    });

    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped, shutting down engine");
    match Arc::try_unwrap(gate) {
        Ok(gate) => gate.into_inner().shutdown().await,
        Err(_) => tracing::warn!("Engine still in use at exit; it will be killed on drop"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received ctrl-c"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
