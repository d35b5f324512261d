//! RPC request handlers.

use crate::error::RpcError;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use edgevote_ledger::MerkleProof;
use edgevote_sync::{CloudSync, EdgeNode, NodeRegistration, SyncResult, VoteSyncBatch};
use edgevote_types::{ElectionId, MerkleHash, NodeId, QuestionId, VoteEntry};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

pub type AppState = Arc<CloudSync>;

// ── Nodes ────────────────────────────────────────────────────────────────

pub async fn register_node(
    State(cloud): State<AppState>,
    Json(registration): Json<NodeRegistration>,
) -> Result<(StatusCode, Json<EdgeNode>), RpcError> {
    if registration.name.trim().is_empty() {
        return Err(RpcError::InvalidRequest("node name must not be empty".into()));
    }
    let (node, created) = cloud
        .nodes()
        .register_or_existing(registration, cloud.clock().now());
    info!(node = %node.id, status = %node.status, created, "POST /v1/nodes");
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(node)))
}

pub async fn list_nodes(State(cloud): State<AppState>) -> Json<Vec<EdgeNode>> {
    Json(cloud.nodes().list())
}

pub async fn get_node(
    State(cloud): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EdgeNode>, RpcError> {
    cloud
        .nodes()
        .get(&NodeId::new(id.as_str()))
        .map(Json)
        .ok_or_else(|| RpcError::NotFound(format!("edge node {id}")))
}

pub async fn activate_node(
    State(cloud): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EdgeNode>, RpcError> {
    Ok(Json(cloud.nodes().activate(&NodeId::new(id))?))
}

pub async fn revoke_node(
    State(cloud): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EdgeNode>, RpcError> {
    Ok(Json(cloud.nodes().revoke(&NodeId::new(id))?))
}

// ── Sync ─────────────────────────────────────────────────────────────────

pub async fn submit_batch(
    State(cloud): State<AppState>,
    Json(batch): Json<VoteSyncBatch>,
) -> Result<Json<SyncResult>, RpcError> {
    cloud.process_batch(batch).await.map(Json).map_err(RpcError::Batch)
}

// ── Ledger ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RootResponse {
    pub election_id: ElectionId,
    pub root: MerkleHash,
    pub length: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofResponse {
    pub election_id: ElectionId,
    pub question_id: Option<QuestionId>,
    pub entry: Option<VoteEntry>,
    pub proof: MerkleProof,
}

pub async fn election_root(
    State(cloud): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RootResponse>, RpcError> {
    let election_id = ElectionId::new(id);
    let root = cloud.root(&election_id).await?;
    let length = cloud.len(&election_id).await?;
    Ok(Json(RootResponse {
        election_id,
        root,
        length,
    }))
}

pub async fn election_proof(
    State(cloud): State<AppState>,
    Path((id, position)): Path<(String, u64)>,
) -> Result<Json<ProofResponse>, RpcError> {
    let election_id = ElectionId::new(id);
    let proof = cloud.proof(&election_id, position).await?;
    let stored = cloud.entry(&election_id, position).await?;
    let (question_id, entry) = match stored {
        Some(stored) => (Some(stored.question_id), Some(stored.entry)),
        None => (None, None),
    };
    Ok(Json(ProofResponse {
        election_id,
        question_id,
        entry,
        proof,
    }))
}

// ── Telemetry ────────────────────────────────────────────────────────────

pub async fn metrics(State(cloud): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        cloud.metrics().encode(),
    )
}
