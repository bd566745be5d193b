//! vigil server binary.
//!
//! Reads config from the environment (optionally layered over a YAML file),
//! serves the router with peer addresses attached for rate limiting, and
//! drains in-flight requests on Ctrl-C / SIGTERM.

use std::net::SocketAddr;

use tracing_subscriber::{fmt, EnvFilter};

use vigil_core::error::{Result, VigilError};
use vigil_server::{app_state::AppState, config, router};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let cfg = config::from_env()?;
    tracing::debug!(?cfg, "config loaded");
    let listen = SocketAddr::from(([0, 0, 0, 0], cfg.port));

    let state = AppState::new(cfg)?;
    let app = router::build_router(state);

    tracing::info!(%listen, "vigil-server starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| VigilError::Internal(format!("failed to bind {listen}: {e}")))?;

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| VigilError::Internal(format!("server failed: {e}")))?;

    tracing::info!("vigil-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
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
    tracing::info!("shutdown signal received, draining");
}
