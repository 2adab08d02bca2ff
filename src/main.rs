// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use location_recovery::{
    api::router,
    config::{AppConfig, LogFormat, DEFAULT_LOG_FILTER},
    relay::WebSocketRelay,
    session::{SessionEngine, SessionStore},
    state::AppState,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);

    std::fs::create_dir_all(&config.data_dir)?;
    let store = SessionStore::open(&config.session_db_path())?;
    let engine = SessionEngine::new(
        store,
        Arc::new(WebSocketRelay::new()),
        config.engine_settings(),
    );

    match engine.restore().await {
        Ok(Some(info)) => tracing::info!(session_id = ?info.session_id, "Resumed persisted session"),
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "Failed to restore persisted session"),
    }

    let shutdown = CancellationToken::new();
    let app = router(AppState::new(engine, shutdown.clone()));
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(
        addr = %config.bind_addr,
        relay = %config.relay_url,
        "Location recovery server listening (docs at /docs)"
    );

    tokio::spawn(watch_signals(shutdown.clone()));

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    // The persisted session is resumed on the next start.
    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn watch_signals(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
