//! RPC error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use edgevote_sync::SyncError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    /// Failure from an administrative or query route.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Failure while processing a submitted batch.
    #[error(transparent)]
    Batch(SyncError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("server error: {0}")]
    Server(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    retryable: bool,
}

impl RpcError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Batch(SyncError::UnknownNode(_)) => StatusCode::FORBIDDEN,
            Self::Sync(err) | Self::Batch(err) => sync_status(err),
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Sync(err) | Self::Batch(err) => err.code(),
            Self::InvalidRequest(_) => "invalid_request",
            Self::NotFound(_) => "not_found",
            Self::Server(_) => "server",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Sync(err) | Self::Batch(err) => err.is_retryable(),
            _ => false,
        }
    }
}

fn sync_status(err: &SyncError) -> StatusCode {
    match err {
        SyncError::BatchTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        SyncError::NodeNotAuthorized { .. } => StatusCode::FORBIDDEN,
        SyncError::InvalidBatchSignature(_) => StatusCode::UNAUTHORIZED,
        SyncError::MerkleRootMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        SyncError::UnknownNode(_) | SyncError::PositionOutOfRange { .. } => StatusCode::NOT_FOUND,
        SyncError::InvalidTransition { .. } | SyncError::UnexpectedAck { .. } => {
            StatusCode::CONFLICT
        }
        SyncError::StorageExhausted { .. } | SyncError::ChannelClosed => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        SyncError::Ledger(_) | SyncError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
            retryable: self.retryable(),
        };
        (status, Json(body)).into_response()
    }
}
