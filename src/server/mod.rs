//! HTTP surface: `POST /process_image`
//!
//! [`router`] returns a composable `Router` that tests drive in-process;
//! [`serve`] binds it to a TCP listener and runs until the process is
//! stopped.

mod error;
mod routes;

pub use self::routes::{router, AppState, PROCESS_IMAGE_PATH};

use crate::processor::ImageProcessor;
use std::net::SocketAddr;
use std::sync::Arc;

/// Default listen address, matching the port the web UI expects
pub const DEFAULT_BIND: &str = "127.0.0.1:5000";

/// Default upload limit: 25 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Network settings for the HTTP server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind: SocketAddr,
    /// Maximum accepted request body size in bytes
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Bind to `config.bind` and serve requests until shutdown
///
/// Shuts down gracefully on Ctrl-C.
///
/// # Errors
/// - `Io` when the address cannot be bound or the server fails
pub async fn serve(config: ServerConfig, processor: ImageProcessor) -> crate::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    let addr = listener.local_addr()?;

    let state = AppState::new(Arc::new(processor), config.max_upload_bytes);
    tracing::info!(
        %addr,
        max_upload_bytes = config.max_upload_bytes,
        background_removal = state.processor.supports_background_removal(),
        "Resizer server listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Resizer server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
