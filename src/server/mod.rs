//! HTTP server lifecycle

mod api;
mod router;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

pub use api::{DELETE_MESSAGES, READ_MESSAGES, WRITE_MESSAGES, advertised_scopes};
pub use router::{AppState, create_router};

use crate::config::Config;
use crate::{Error, Result};

/// token-gate server
pub struct Server {
    config: Config,
}

impl Server {
    /// Create a new server
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run until Ctrl-C / SIGTERM
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
            self.config.server.port,
        );

        let state = AppState::from_config(&self.config)?;

        if self.config.auth.prefetch_keys {
            match state.gate.resolver().refresh().await {
                Ok(keys) => info!(keys = keys.len(), "Signing keys prefetched"),
                Err(e) => warn!(
                    error = %e,
                    url = %state.gate.resolver().jwks_url(),
                    "Signing key prefetch failed, keys will be fetched on first request"
                ),
            }
        }

        let app = create_router(&state);
        let listener = TcpListener::bind(addr).await?;

        info!("============================================================");
        info!("TOKEN GATE v{}", env!("CARGO_PKG_VERSION"));
        info!("============================================================");
        info!(host = %self.config.server.host, port = %self.config.server.port, "Listening");
        info!(
            project = %self.config.provider.project_id,
            audience = %self.config.provider.audience(),
            "Verifying provider tokens"
        );
        info!(callback = %self.config.oauth.callback_url, "OAuth proxy callback");
        if self.config.provider.client_id.is_none() || self.config.provider.client_secret.is_none() {
            warn!("OAuth client credentials not set, /oauth/token will answer server_error");
        }
        info!("============================================================");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        info!("Server stopped");
        Ok(())
    }
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
