//! Axum-based HTTP server.

use crate::error::RpcError;
use crate::handlers::{self, AppState};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use tokio::sync::broadcast;
use tracing::info;

/// Build the API router over a shared cloud sync service.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/nodes",
            post(handlers::register_node).get(handlers::list_nodes),
        )
        .route("/v1/nodes/:id", get(handlers::get_node))
        .route("/v1/nodes/:id/activate", post(handlers::activate_node))
        .route("/v1/nodes/:id/revoke", post(handlers::revoke_node))
        .route("/v1/sync/batches", post(handlers::submit_batch))
        .route("/v1/elections/:id/root", get(handlers::election_root))
        .route(
            "/v1/elections/:id/proofs/:position",
            get(handlers::election_proof),
        )
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
}

pub struct RpcServer {
    pub port: u16,
    state: AppState,
}

impl RpcServer {
    pub fn new(port: u16, state: AppState) -> Self {
        Self { port, state }
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn start(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), RpcError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| RpcError::Server(format!("bind {addr}: {e}")))?;
        info!(%addr, "RPC server listening");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await
            .map_err(|e| RpcError::Server(e.to_string()))?;
        info!("RPC server stopped");
        Ok(())
    }
}
