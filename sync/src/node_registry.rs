//! Edge-node registration and trust status.
//!
//! ```text
//! pending --activate--> active <--> syncing
//!                         |  ^
//!              mark_inactive  activate
//!                         v  |
//!                       inactive
//! any non-revoked --revoke--> revoked (terminal)
//! ```

use crate::SyncError;
use edgevote_crypto::derive_node_id;
use edgevote_types::{EdgeNodeStatus, NodeId, PublicKey, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info, warn};

/// Registration request from an edge node or its operator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRegistration {
    pub name: String,
    pub jurisdiction_id: String,
    pub public_key: PublicKey,
}

/// A registered edge node. Never deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeNode {
    pub id: NodeId,
    pub name: String,
    pub jurisdiction_id: String,
    pub public_key: PublicKey,
    pub status: EdgeNodeStatus,
    pub last_sync_at: Option<Timestamp>,
    pub registered_at: Timestamp,
}

#[derive(Debug)]
struct NodeSlot {
    node: EdgeNode,
    /// Batches from this node currently being processed.
    in_flight: u32,
}

/// The cloud's table of edge nodes.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: RwLock<HashMap<NodeId, NodeSlot>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node in `pending` status.
    ///
    /// The id is derived from the public key, so registering the same key
    /// again returns the existing node unchanged.
    pub fn register(&self, registration: NodeRegistration, now: Timestamp) -> EdgeNode {
        self.register_or_existing(registration, now).0
    }

    /// Like [`register`](Self::register), also reporting whether the node
    /// was newly created.
    pub fn register_or_existing(
        &self,
        registration: NodeRegistration,
        now: Timestamp,
    ) -> (EdgeNode, bool) {
        let id = derive_node_id(&registration.public_key);
        let mut nodes = self.nodes.write().unwrap();
        if let Some(slot) = nodes.get(&id) {
            debug!(node = %id, "node already registered");
            return (slot.node.clone(), false);
        }
        let node = EdgeNode {
            id: id.clone(),
            name: registration.name,
            jurisdiction_id: registration.jurisdiction_id,
            public_key: registration.public_key,
            status: EdgeNodeStatus::Pending,
            last_sync_at: None,
            registered_at: now,
        };
        info!(node = %id, name = %node.name, jurisdiction = %node.jurisdiction_id, "edge node registered");
        nodes.insert(
            id,
            NodeSlot {
                node: node.clone(),
                in_flight: 0,
            },
        );
        (node, true)
    }

    /// Admit a pending or inactive node. Activating an already active or
    /// syncing node is a no-op.
    pub fn activate(&self, id: &NodeId) -> Result<EdgeNode, SyncError> {
        self.transition(id, "activate", |status| match status {
            EdgeNodeStatus::Pending | EdgeNodeStatus::Inactive => Some(EdgeNodeStatus::Active),
            EdgeNodeStatus::Active | EdgeNodeStatus::Syncing => Some(status),
            EdgeNodeStatus::Revoked => None,
        })
    }

    /// Permanently withdraw trust. Revoking twice is a no-op.
    pub fn revoke(&self, id: &NodeId) -> Result<EdgeNode, SyncError> {
        self.transition(id, "revoke", |_| Some(EdgeNodeStatus::Revoked))
    }

    /// Called by the external health monitor when a node goes stale.
    pub fn mark_inactive(&self, id: &NodeId) -> Result<EdgeNode, SyncError> {
        self.transition(id, "mark inactive", |status| match status {
            EdgeNodeStatus::Active | EdgeNodeStatus::Inactive => Some(EdgeNodeStatus::Inactive),
            _ => None,
        })
    }

    fn transition(
        &self,
        id: &NodeId,
        action: &'static str,
        next: impl FnOnce(EdgeNodeStatus) -> Option<EdgeNodeStatus>,
    ) -> Result<EdgeNode, SyncError> {
        let mut nodes = self.nodes.write().unwrap();
        let slot = nodes
            .get_mut(id)
            .ok_or_else(|| SyncError::UnknownNode(id.clone()))?;
        let from = slot.node.status;
        let to = next(from).ok_or(SyncError::InvalidTransition {
            node: id.clone(),
            from,
            action,
        })?;
        if from != to {
            slot.node.status = to;
            info!(node = %id, %from, %to, "edge node status changed");
        }
        Ok(slot.node.clone())
    }

    pub fn get(&self, id: &NodeId) -> Option<EdgeNode> {
        self.nodes.read().unwrap().get(id).map(|slot| slot.node.clone())
    }

    /// All nodes, oldest registration first.
    pub fn list(&self) -> Vec<EdgeNode> {
        let mut nodes: Vec<EdgeNode> = self
            .nodes
            .read()
            .unwrap()
            .values()
            .map(|slot| slot.node.clone())
            .collect();
        nodes.sort_by(|a, b| a.registered_at.cmp(&b.registered_at).then_with(|| a.id.cmp(&b.id)));
        nodes
    }

    /// Authorize a batch from `id` and move the node to `syncing`.
    ///
    /// The returned lease puts the node back to `active` when the last
    /// concurrent batch from it finishes.
    pub fn begin_sync(&self, id: &NodeId) -> Result<SyncLease<'_>, SyncError> {
        let mut nodes = self.nodes.write().unwrap();
        let slot = nodes
            .get_mut(id)
            .ok_or_else(|| SyncError::UnknownNode(id.clone()))?;
        if !slot.node.status.can_submit() {
            warn!(node = %id, status = %slot.node.status, "batch from unauthorized node");
            return Err(SyncError::NodeNotAuthorized {
                node: id.clone(),
                status: slot.node.status,
            });
        }
        slot.in_flight += 1;
        slot.node.status = EdgeNodeStatus::Syncing;
        Ok(SyncLease {
            registry: self,
            node_id: id.clone(),
            public_key: slot.node.public_key,
            finished: false,
        })
    }

    fn end_sync(&self, id: &NodeId, synced_at: Option<Timestamp>) {
        let mut nodes = self.nodes.write().unwrap();
        let Some(slot) = nodes.get_mut(id) else {
            return;
        };
        slot.in_flight = slot.in_flight.saturating_sub(1);
        if let Some(at) = synced_at {
            slot.node.last_sync_at = Some(at);
        }
        // A revocation or staleness mark during the batch takes precedence.
        if slot.in_flight == 0 && slot.node.status == EdgeNodeStatus::Syncing {
            slot.node.status = EdgeNodeStatus::Active;
        }
    }
}

/// One authorized in-flight batch. Dropping it without
/// [`complete`](Self::complete) ends the sync without recording it.
#[derive(Debug)]
pub struct SyncLease<'a> {
    registry: &'a NodeRegistry,
    node_id: NodeId,
    public_key: PublicKey,
    finished: bool,
}

impl SyncLease<'_> {
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// The batch was processed; record `now` as the node's last sync.
    pub fn complete(mut self, now: Timestamp) {
        self.finished = true;
        self.registry.end_sync(&self.node_id, Some(now));
    }
}

impl Drop for SyncLease<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.registry.end_sync(&self.node_id, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgevote_crypto::keypair_from_seed;

    fn registration(seed: u8) -> NodeRegistration {
        NodeRegistration {
            name: format!("precinct-{seed}"),
            jurisdiction_id: "J1".into(),
            public_key: keypair_from_seed(&[seed; 32]).public,
        }
    }

    #[test]
    fn registration_is_idempotent_by_key() {
        let reg = NodeRegistry::new();
        let a = reg.register(registration(1), Timestamp::from_millis(1));
        let mut again = registration(1);
        again.name = "renamed".into();
        let (b, created) = reg.register_or_existing(again, Timestamp::from_millis(2));
        assert!(!created);
        assert_eq!(a, b);
        assert_eq!(b.status, EdgeNodeStatus::Pending);
        assert_eq!(reg.list().len(), 1);
        assert!(reg.register_or_existing(registration(2), Timestamp::EPOCH).1);
    }

    #[test]
    fn lifecycle_transitions() {
        let reg = NodeRegistry::new();
        let id = reg.register(registration(1), Timestamp::EPOCH).id;
        assert_eq!(reg.activate(&id).unwrap().status, EdgeNodeStatus::Active);
        assert_eq!(reg.mark_inactive(&id).unwrap().status, EdgeNodeStatus::Inactive);
        assert_eq!(reg.activate(&id).unwrap().status, EdgeNodeStatus::Active);
        assert_eq!(reg.revoke(&id).unwrap().status, EdgeNodeStatus::Revoked);
        assert!(matches!(
            reg.activate(&id),
            Err(SyncError::InvalidTransition { .. })
        ));
        assert_eq!(reg.revoke(&id).unwrap().status, EdgeNodeStatus::Revoked);
    }

    #[test]
    fn pending_node_cannot_be_marked_inactive() {
        let reg = NodeRegistry::new();
        let id = reg.register(registration(1), Timestamp::EPOCH).id;
        assert!(reg.mark_inactive(&id).is_err());
    }

    #[test]
    fn unknown_node_errors() {
        let reg = NodeRegistry::new();
        let id = NodeId::new("node_missing");
        assert!(matches!(reg.activate(&id), Err(SyncError::UnknownNode(_))));
        assert!(matches!(reg.begin_sync(&id), Err(SyncError::UnknownNode(_))));
    }

    #[test]
    fn only_active_nodes_may_sync() {
        let reg = NodeRegistry::new();
        let id = reg.register(registration(1), Timestamp::EPOCH).id;
        assert!(matches!(
            reg.begin_sync(&id),
            Err(SyncError::NodeNotAuthorized {
                status: EdgeNodeStatus::Pending,
                ..
            })
        ));
    }

    #[test]
    fn node_returns_to_active_after_last_concurrent_batch() {
        let reg = NodeRegistry::new();
        let id = reg.register(registration(1), Timestamp::EPOCH).id;
        reg.activate(&id).unwrap();

        let first = reg.begin_sync(&id).unwrap();
        let second = reg.begin_sync(&id).unwrap();
        assert_eq!(reg.get(&id).unwrap().status, EdgeNodeStatus::Syncing);

        first.complete(Timestamp::from_millis(5));
        assert_eq!(reg.get(&id).unwrap().status, EdgeNodeStatus::Syncing);
        drop(second);
        let node = reg.get(&id).unwrap();
        assert_eq!(node.status, EdgeNodeStatus::Active);
        assert_eq!(node.last_sync_at, Some(Timestamp::from_millis(5)));
    }

    #[test]
    fn revocation_during_sync_sticks() {
        let reg = NodeRegistry::new();
        let id = reg.register(registration(1), Timestamp::EPOCH).id;
        reg.activate(&id).unwrap();
        let lease = reg.begin_sync(&id).unwrap();
        reg.revoke(&id).unwrap();
        lease.complete(Timestamp::from_millis(1));
        assert_eq!(reg.get(&id).unwrap().status, EdgeNodeStatus::Revoked);
    }
}
