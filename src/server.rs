use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::AppConfig;
use crate::shared::state::AppState;
use crate::shared::utils::{create_pool, run_migrations};
use crate::web::create_router;

/// Opens the database, applies migrations and serves until Ctrl-C/SIGTERM.
pub async fn serve(config: AppConfig) -> Result<()> {
    let addr = config.server.socket_addr()?;

    let pool = create_pool(&config.database)?;
    let applied = run_migrations(&pool)?;
    if applied > 0 {
        info!("Applied {applied} pending migrations");
    }

    let state = AppState::new(&config, pool)?;
    spawn_session_cleanup(state.clone());
    let app = create_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr} - is another instance running?"))?;
    info!("HTTP server listening on {addr}");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server stopped");
    Ok(())
}

/// Periodically drops expired sessions so the store does not grow forever.
fn spawn_session_cleanup(state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(15 * 60));
        loop {
            interval.tick().await;
            if let Err(e) = state.sessions.cleanup_expired_sessions().await {
                tracing::warn!("Session cleanup failed: {e}");
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
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
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
