//! Replicated handler table (C6.4): node-local message dispatch gated by
//! cluster leadership.
//!
//! Handler closures stay local to each node — they aren't the kind of
//! thing a replicated log entry can carry. What `Distributed` replicates
//! here is just the *set of registered names*, so every node agrees on
//! which message kinds the cluster understands even though each node's
//! own closures are privately held.

use std::collections::HashMap;
use std::sync::Arc;

use pioneer_consensus::{Distributed, PeerId};
use pioneer_core::{PioneerError, PioneerResult};
use tokio::sync::RwLock;
use tracing::debug;

pub type Predicate = Arc<dyn Fn(&serde_json::Value) -> bool + Send + Sync>;
pub type Handler = Arc<dyn Fn(&serde_json::Value) -> serde_json::Value + Send + Sync>;

struct Registration {
    predicate: Predicate,
    handler: Handler,
}

/// Routes messages to the leader's `handle_message`, used for
/// cache-invalidation and cross-wrapper notifications.
pub struct MessagingBus {
    registered_names: Distributed<Vec<String>>,
    handlers: RwLock<HashMap<String, Registration>>,
}

impl MessagingBus {
    pub fn new(this_node: PeerId, peers: Arc<RwLock<Vec<PeerId>>>) -> Self {
        Self {
            registered_names: Distributed::new(this_node, peers, Vec::new()),
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Register `name -> (predicate, handler)` locally, and, if this node
    /// is leader, publish the name into the replicated registry so
    /// followers can tell a handler exists somewhere in the cluster.
    pub async fn register(&self, name: impl Into<String>, predicate: Predicate, handler: Handler) {
        let name = name.into();
        self.handlers.write().await.insert(name.clone(), Registration { predicate, handler });
        if self.registered_names.is_master().await {
            let mut names = self.registered_names.current().await;
            if !names.contains(&name) {
                names.push(name);
                self.registered_names.propose(names).await;
            }
        }
    }

    /// Dispatch `message` to the leader's `handle_message`. `node` is
    /// currently always `"leader"` — there is no cross-node RPC transport
    /// in this engine, so routing to a specific follower by name isn't
    /// supported (see DESIGN.md).
    pub async fn route(&self, message: serde_json::Value, node: &str) -> PioneerResult<serde_json::Value> {
        if node != "leader" {
            return Err(PioneerError::BackendError(anyhow::anyhow!(
                "messaging bus can only route to \"leader\" in this engine, got {node:?}"
            )));
        }
        if !self.registered_names.is_master().await {
            return Err(PioneerError::BackendError(anyhow::anyhow!(
                "this node is not leader; no transport to forward the message"
            )));
        }
        self.handle_message(&message).await
    }

    /// Select the first registered handler whose predicate matches and run it.
    pub async fn handle_message(&self, message: &serde_json::Value) -> PioneerResult<serde_json::Value> {
        let handlers = self.handlers.read().await;
        for registration in handlers.values() {
            if (registration.predicate)(message) {
                return Ok((registration.handler)(message));
            }
        }
        debug!(?message, "no handler matched message");
        Err(PioneerError::NotFound("no handler matched message".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn route_dispatches_first_matching_handler() {
        let peers = Arc::new(RwLock::new(Vec::new()));
        let bus = MessagingBus::new("a".to_string(), peers);
        bus.register(
            "invalidate",
            Arc::new(|m: &serde_json::Value| m.get("kind").and_then(|v| v.as_str()) == Some("invalidate")),
            Arc::new(|_m: &serde_json::Value| serde_json::json!({"ok": true})),
        )
        .await;
        let result = bus.route(serde_json::json!({"kind": "invalidate"}), "leader").await.unwrap();
        assert_eq!(result, serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn route_with_no_matching_handler_fails() {
        let peers = Arc::new(RwLock::new(Vec::new()));
        let bus = MessagingBus::new("a".to_string(), peers);
        assert!(bus.route(serde_json::json!({"kind": "noop"}), "leader").await.is_err());
    }

    #[tokio::test]
    async fn route_to_non_leader_target_is_rejected() {
        let peers = Arc::new(RwLock::new(Vec::new()));
        let bus = MessagingBus::new("a".to_string(), peers);
        assert!(bus.route(serde_json::json!({}), "follower-1").await.is_err());
    }
}
