//! HTTP server lifecycle: bind, spawn the axum server in a background
//! task, return a handle with a shutdown channel.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::api::router::api_router;
use crate::core_state::CoreState;

/// Handle to a running API server.
pub struct ApiServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ApiServer {
    /// Signal graceful shutdown and wait for in-flight requests to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
        if let Err(e) = self.task.await {
            tracing::error!("API server task failed: {e}");
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Server lifecycle
// ═══════════════════════════════════════════════════════════

/// Bind `addr` (port 0 picks an ephemeral port) and start serving.
pub async fn start_api_server(core: Arc<CoreState>, addr: SocketAddr) -> Result<ApiServer, String> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind API server on {addr}: {e}"))?;

    let addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get server address: {e}"))?;

    let app = api_router(core);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("API server received shutdown signal");
        };

        tracing::info!(%addr, "API server started");

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("API server error: {e}");
        }

        tracing::info!("API server stopped");
    });

    Ok(ApiServer {
        addr,
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}

/// Serve until Ctrl-C, then shut down gracefully.
pub async fn serve_until_ctrl_c(core: Arc<CoreState>, addr: SocketAddr) -> Result<(), String> {
    let server = start_api_server(core, addr).await?;
    tracing::info!(addr = %server.addr, "Listening, press Ctrl-C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for Ctrl-C: {e}");
    }
    server.shutdown().await;
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::ModelSettings;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn test_core(dir: &tempfile::TempDir) -> Arc<CoreState> {
        Arc::new(CoreState::with_client(
            dir.path().join("p.db"),
            ModelSettings::default(),
            None,
        ))
    }

    #[tokio::test]
    async fn start_on_ephemeral_port_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let server = start_api_server(test_core(&dir), "127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        assert_ne!(server.addr.port(), 0);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn serves_health_over_tcp() {
        let dir = tempfile::tempdir().unwrap();
        let server = start_api_server(test_core(&dir), "127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();

        let mut stream = tokio::net::TcpStream::connect(server.addr).await.unwrap();
        stream
            .write_all(b"GET /api/health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let response = String::from_utf8_lossy(&raw);

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("\"ai_configured\":false"));
        server.shutdown().await;
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let first = start_api_server(test_core(&dir), "127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let err = start_api_server(test_core(&dir), first.addr).await.err().unwrap();
        assert!(err.contains("Failed to bind"));
        first.shutdown().await;
    }
}
