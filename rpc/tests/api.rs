use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use edgevote_crypto::keypair_from_seed;
use edgevote_nullables::{NullClock, NullVerifier};
use edgevote_rpc::router;
use edgevote_store::MemoryStore;
use edgevote_sync::{CloudSync, NodeRegistration, SyncConfig, SyncVote, VoteSyncBatch};
use edgevote_types::{
    BatchId, Blob, ElectionId, KeyPair, MerkleHash, NodeId, Nullifier, QuestionId, Signature,
    Timestamp, VoteEntry, VoteId,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn cloud(max_batch_size: usize) -> Arc<CloudSync> {
    let config = SyncConfig {
        max_batch_size,
        ..SyncConfig::default()
    };
    Arc::new(CloudSync::new(
        &config,
        Arc::new(MemoryStore::new()),
        Arc::new(NullVerifier::new()),
        Arc::new(NullClock::new(Timestamp::from_millis(1_000))),
    ))
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, value)
}

fn active_node(cloud: &CloudSync, seed: u8) -> (NodeId, KeyPair) {
    let keys = keypair_from_seed(&[seed; 32]);
    let node = cloud.nodes().register(
        NodeRegistration {
            name: format!("precinct-{seed}"),
            jurisdiction_id: "J1".into(),
            public_key: keys.public,
        },
        Timestamp::from_millis(1),
    );
    cloud.nodes().activate(&node.id).unwrap();
    (node.id, keys)
}

fn vote(i: u8) -> SyncVote {
    SyncVote {
        entry: VoteEntry {
            id: VoteId::new(format!("v{i}")),
            encrypted_vote: Blob::new(vec![i; 8]),
            commitment: Blob::new(vec![i; 4]),
            zk_proof: Blob::new(vec![1, 2, 3]),
            nullifier: Nullifier::new([i; 32]),
            timestamp: Timestamp::from_millis(500),
            credential_signature: None,
        },
        question_id: QuestionId::new("Q1"),
        local_position: u64::from(i),
        local_merkle_root: MerkleHash::ZERO,
    }
}

fn signed_batch(id: &str, node: &NodeId, keys: &KeyPair, votes: Vec<SyncVote>) -> VoteSyncBatch {
    VoteSyncBatch::new_signed(
        BatchId::new(id),
        node.clone(),
        ElectionId::new("E1"),
        votes,
        Timestamp::from_millis(900),
        &keys.private,
    )
}

#[tokio::test]
async fn node_administration_lifecycle() {
    let app = router(cloud(10));
    let keys = keypair_from_seed(&[3; 32]);

    let (status, node) = call(
        &app,
        "POST",
        "/v1/nodes",
        Some(json!({
            "name": "precinct-3",
            "jurisdictionId": "J1",
            "publicKey": keys.public,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(node["status"], "pending");
    let id = node["id"].as_str().unwrap().to_string();

    let (status, same) = call(
        &app,
        "POST",
        "/v1/nodes",
        Some(json!({
            "name": "precinct-3-renamed",
            "jurisdictionId": "J1",
            "publicKey": keys.public,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(same["id"], id.as_str());
    assert_eq!(same["name"], "precinct-3");

    let (status, fetched) = call(&app, "GET", &format!("/v1/nodes/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"], "precinct-3");

    let (status, active) = call(&app, "POST", &format!("/v1/nodes/{id}/activate"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(active["status"], "active");

    let (status, revoked) = call(&app, "POST", &format!("/v1/nodes/{id}/revoke"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(revoked["status"], "revoked");

    let (status, err) = call(&app, "POST", &format!("/v1/nodes/{id}/activate"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "invalid_transition");

    let (status, list) = call(&app, "GET", "/v1/nodes", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, _) = call(&app, "GET", "/v1/nodes/nobody", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&app, "POST", "/v1/nodes/nobody/revoke", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_node_name_is_rejected() {
    let app = router(cloud(10));
    let keys = keypair_from_seed(&[4; 32]);
    let (status, err) = call(
        &app,
        "POST",
        "/v1/nodes",
        Some(json!({"name": " ", "jurisdictionId": "J1", "publicKey": keys.public})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "invalid_request");
}

#[tokio::test]
async fn batch_intake_and_replay() {
    let cloud = cloud(10);
    let app = router(cloud.clone());
    let (node, keys) = active_node(&cloud, 1);
    let batch = signed_batch("B1", &node, &keys, vec![vote(1), vote(2)]);
    let body = serde_json::to_value(&batch).unwrap();

    let (status, first) = call(&app, "POST", "/v1/sync/batches", Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["batchId"], "B1");
    assert_eq!(first["accepted"], 2);
    assert_eq!(first["cloudStartPosition"], 0);

    let (status, replay) = call(&app, "POST", "/v1/sync/batches", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replay, first);

    let (status, root) = call(&app, "GET", "/v1/elections/E1/root", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(root["length"], 2);
    assert_eq!(root["root"], first["cloudMerkleRoot"]);

    let (status, proof) = call(&app, "GET", "/v1/elections/E1/proofs/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(proof["entry"]["id"], "v2");
    assert_eq!(proof["questionId"], "Q1");
    assert_eq!(proof["proof"]["root"], root["root"]);

    let (status, err) = call(&app, "GET", "/v1/elections/E1/proofs/7", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], "position_out_of_range");
}

#[tokio::test]
async fn structural_batch_failures_map_to_client_errors() {
    let cloud = cloud(2);
    let app = router(cloud.clone());
    let (node, keys) = active_node(&cloud, 1);

    let big = signed_batch("big", &node, &keys, vec![vote(1), vote(2), vote(3)]);
    let (status, err) = call(&app, "POST", "/v1/sync/batches", Some(serde_json::to_value(&big).unwrap())).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(err["retryable"], false);

    let mut forged = signed_batch("forged", &node, &keys, vec![vote(1)]);
    forged.signature = Signature([0u8; 64]);
    let (status, _) = call(&app, "POST", "/v1/sync/batches", Some(serde_json::to_value(&forged).unwrap())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut tampered = signed_batch("tampered", &node, &keys, vec![vote(1)]);
    tampered.votes[0].entry.commitment = Blob::new(vec![0xff]);
    let (status, _) = call(&app, "POST", "/v1/sync/batches", Some(serde_json::to_value(&tampered).unwrap())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let stranger = keypair_from_seed(&[9; 32]);
    let unknown = signed_batch("x", &NodeId::new("stranger"), &stranger, vec![]);
    let (status, err) = call(&app, "POST", "/v1/sync/batches", Some(serde_json::to_value(&unknown).unwrap())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(err["error"], "unknown_node");

    cloud.nodes().revoke(&node).unwrap();
    let late = signed_batch("late", &node, &keys, vec![vote(1)]);
    let (status, _) = call(&app, "POST", "/v1/sync/batches", Some(serde_json::to_value(&late).unwrap())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn metrics_are_exposed_as_text() {
    let cloud = cloud(10);
    let app = router(cloud.clone());
    let (node, keys) = active_node(&cloud, 1);
    let batch = signed_batch("B1", &node, &keys, vec![vote(1)]);
    call(&app, "POST", "/v1/sync/batches", Some(serde_json::to_value(&batch).unwrap())).await;

    let (status, body) = call(&app, "GET", "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().unwrap();
    assert!(text.contains("edgevote_batches_processed_total 1"));
}
