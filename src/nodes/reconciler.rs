//! Node inventory reconciler
//!
//! Keeps the last node snapshot and, in node-port mode, requests a full
//! resync of every known virtual server whenever the snapshot changes. Any
//! node-set change can alter which pool members are reachable, so there is
//! no incremental path.
//!
//! The first successful poll only seeds the cache. Snapshots are compared as
//! ordered lists: the same records in a different order count as a change.

use k8s_openapi::api::core::v1::Node;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use super::poller::NodeListener;
use super::record::{records_from_nodes, AddressFamily, NodeRecord};
use super::resync::{ResourceKey, ResyncQueue, VirtualServerLister};
use crate::config::ControllerMode;
use crate::errors::AgentError;
use crate::observability::MetricsRecorder;

/// What one poll did to the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeUpdateOutcome {
    /// The poll reported an error; nothing changed.
    Skipped,
    /// First snapshot stored without side effects.
    Seeded,
    Unchanged,
    /// Cache replaced; `enqueued` keys were queued for resync.
    Changed { enqueued: usize },
}

#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub address_family: AddressFamily,
    pub controller_mode: ControllerMode,
    /// Watched namespaces; empty means all.
    pub namespaces: Vec<String>,
}

impl ReconcilerSettings {
    pub fn watching_all_namespaces(&self) -> bool {
        self.namespaces.is_empty()
    }
}

#[derive(Debug, Default)]
struct InventoryState {
    initialized: bool,
    nodes: Vec<NodeRecord>,
}

pub struct NodeInventoryReconciler {
    settings: ReconcilerSettings,
    lister: Arc<dyn VirtualServerLister>,
    queue: Arc<dyn ResyncQueue>,
    state: RwLock<InventoryState>,
    metrics: MetricsRecorder,
}

impl std::fmt::Debug for NodeInventoryReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeInventoryReconciler")
            .field("settings", &self.settings)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl NodeInventoryReconciler {
    pub fn new(
        settings: ReconcilerSettings,
        lister: Arc<dyn VirtualServerLister>,
        queue: Arc<dyn ResyncQueue>,
    ) -> Self {
        Self {
            settings,
            lister,
            queue,
            state: RwLock::new(InventoryState::default()),
            metrics: MetricsRecorder::new(),
        }
    }

    pub fn address_family(&self) -> AddressFamily {
        self.settings.address_family
    }

    /// Apply one poll result to the inventory.
    pub fn process_node_update(
        &self,
        update: std::result::Result<&[Node], &AgentError>,
    ) -> NodeUpdateOutcome {
        let nodes = match update {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!(error = %e, "Unable to get list of nodes");
                return NodeUpdateOutcome::Skipped;
            }
        };

        let records = records_from_nodes(nodes, self.settings.address_family);
        let mut state = self.state.write().expect("node inventory lock poisoned");

        if !state.initialized {
            debug!(nodes = records.len(), "Seeding node inventory");
            self.metrics.update_node_count(records.len());
            state.nodes = records;
            state.initialized = true;
            return NodeUpdateOutcome::Seeded;
        }

        if state.nodes == records {
            return NodeUpdateOutcome::Unchanged;
        }

        info!(previous = state.nodes.len(), current = records.len(), "Node inventory changed");
        self.metrics.update_node_count(records.len());
        state.nodes = records;
        drop(state);

        let enqueued = match self.settings.controller_mode {
            ControllerMode::NodePort => self.enqueue_all_virtual_servers(),
            ControllerMode::Cluster => 0,
        };
        NodeUpdateOutcome::Changed { enqueued }
    }

    fn enqueue_all_virtual_servers(&self) -> usize {
        let virtual_servers = if self.settings.watching_all_namespaces() {
            self.lister.list(None)
        } else {
            self.settings.namespaces.iter().flat_map(|ns| self.lister.list(Some(ns))).collect()
        };

        for vs in &virtual_servers {
            self.queue.enqueue(ResourceKey::virtual_server(&vs.namespace, &vs.name));
        }

        info!(keys = virtual_servers.len(), "Queued virtual servers for resync after node change");
        self.metrics.record_node_resync(virtual_servers.len());
        virtual_servers.len()
    }

    /// Independent copy of the cached snapshot.
    pub fn get_nodes_from_cache(&self) -> Vec<NodeRecord> {
        self.state.read().expect("node inventory lock poisoned").nodes.clone()
    }

    /// Cached nodes carrying the label in `selector`.
    ///
    /// `selector` must be exactly one `key=value` pair; anything else is
    /// logged and matches nothing.
    pub fn get_nodes_with_label(&self, selector: &str) -> Vec<NodeRecord> {
        let parts: Vec<&str> = selector.split('=').collect();
        let [key, value] = parts.as_slice() else {
            warn!(selector, "Invalid node member label selector");
            return Vec::new();
        };

        self.get_nodes_from_cache().into_iter().filter(|node| node.has_label(key, value)).collect()
    }
}

impl NodeListener for NodeInventoryReconciler {
    fn name(&self) -> &str {
        "node-inventory"
    }

    fn on_poll(&self, update: std::result::Result<&[Node], &AgentError>) {
        self.process_node_update(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::record::fixtures::internal_node;
    use crate::nodes::resync::{ChannelResyncQueue, VirtualServerIndex};
    use tokio::sync::mpsc::UnboundedReceiver;
    use tracing_test::traced_test;

    fn reconciler(
        mode: ControllerMode,
        namespaces: &[&str],
    ) -> (NodeInventoryReconciler, UnboundedReceiver<ResourceKey>) {
        let index = Arc::new(VirtualServerIndex::new());
        index.upsert("prod", "web");
        index.upsert("prod", "api");
        index.upsert("dev", "web");

        let (queue, receiver) = ChannelResyncQueue::new();
        let settings = ReconcilerSettings {
            address_family: AddressFamily::Internal,
            controller_mode: mode,
            namespaces: namespaces.iter().map(|s| s.to_string()).collect(),
        };
        (NodeInventoryReconciler::new(settings, index, Arc::new(queue)), receiver)
    }

    fn drain(receiver: &mut UnboundedReceiver<ResourceKey>) -> Vec<ResourceKey> {
        let mut keys = Vec::new();
        while let Ok(key) = receiver.try_recv() {
            keys.push(key);
        }
        keys
    }

    fn two_nodes() -> Vec<Node> {
        vec![
            internal_node("n1", "10.0.0.1", &[("env", "prod")]),
            internal_node("n2", "10.0.0.2", &[("env", "dev")]),
        ]
    }

    #[test]
    fn test_first_poll_seeds_without_resync() {
        let (reconciler, mut receiver) = reconciler(ControllerMode::NodePort, &[]);

        assert_eq!(reconciler.process_node_update(Ok(&two_nodes())), NodeUpdateOutcome::Seeded);
        assert_eq!(reconciler.get_nodes_from_cache().len(), 2);
        assert!(drain(&mut receiver).is_empty());
    }

    #[test]
    fn test_unchanged_snapshot_is_noop() {
        let (reconciler, mut receiver) = reconciler(ControllerMode::NodePort, &[]);
        reconciler.process_node_update(Ok(&two_nodes()));

        assert_eq!(reconciler.process_node_update(Ok(&two_nodes())), NodeUpdateOutcome::Unchanged);
        assert!(drain(&mut receiver).is_empty());
    }

    #[test]
    fn test_change_enqueues_all_namespaces() {
        let (reconciler, mut receiver) = reconciler(ControllerMode::NodePort, &[]);
        reconciler.process_node_update(Ok(&two_nodes()));

        let mut nodes = two_nodes();
        nodes.push(internal_node("n3", "10.0.0.3", &[]));
        assert_eq!(
            reconciler.process_node_update(Ok(&nodes)),
            NodeUpdateOutcome::Changed { enqueued: 3 }
        );
        assert_eq!(
            drain(&mut receiver),
            vec![
                ResourceKey::virtual_server("dev", "web"),
                ResourceKey::virtual_server("prod", "api"),
                ResourceKey::virtual_server("prod", "web"),
            ]
        );
        assert_eq!(reconciler.get_nodes_from_cache().len(), 3);
    }

    #[test]
    fn test_change_enqueues_configured_namespaces_only() {
        let (reconciler, mut receiver) = reconciler(ControllerMode::NodePort, &["prod"]);
        reconciler.process_node_update(Ok(&two_nodes()));
        reconciler.process_node_update(Ok(&two_nodes()[..1]));

        let keys = drain(&mut receiver);
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|k| k.namespace == "prod"));
    }

    #[test]
    fn test_cluster_mode_updates_cache_without_resync() {
        let (reconciler, mut receiver) = reconciler(ControllerMode::Cluster, &[]);
        reconciler.process_node_update(Ok(&two_nodes()));

        assert_eq!(
            reconciler.process_node_update(Ok(&two_nodes()[..1])),
            NodeUpdateOutcome::Changed { enqueued: 0 }
        );
        assert!(drain(&mut receiver).is_empty());
        assert_eq!(reconciler.get_nodes_from_cache().len(), 1);
    }

    #[test]
    fn test_reordered_snapshot_counts_as_change() {
        let (reconciler, mut receiver) = reconciler(ControllerMode::NodePort, &[]);
        reconciler.process_node_update(Ok(&two_nodes()));

        let mut reordered = two_nodes();
        reordered.reverse();
        assert_eq!(
            reconciler.process_node_update(Ok(&reordered)),
            NodeUpdateOutcome::Changed { enqueued: 3 }
        );
        assert_eq!(drain(&mut receiver).len(), 3);
    }

    #[traced_test]
    #[test]
    fn test_poll_error_leaves_state_untouched() {
        let (reconciler, mut receiver) = reconciler(ControllerMode::NodePort, &[]);
        reconciler.process_node_update(Ok(&two_nodes()));

        let error = AgentError::poll("api unavailable");
        assert_eq!(reconciler.process_node_update(Err(&error)), NodeUpdateOutcome::Skipped);
        assert_eq!(reconciler.get_nodes_from_cache().len(), 2);
        assert!(drain(&mut receiver).is_empty());
        assert!(logs_contain("Unable to get list of nodes"));
    }

    #[test]
    fn test_error_before_first_poll_does_not_seed() {
        let (reconciler, _receiver) = reconciler(ControllerMode::NodePort, &[]);
        let error = AgentError::poll("api unavailable");
        reconciler.process_node_update(Err(&error));

        assert_eq!(reconciler.process_node_update(Ok(&two_nodes())), NodeUpdateOutcome::Seeded);
    }

    #[test]
    fn test_nodes_with_label() {
        let (reconciler, _receiver) = reconciler(ControllerMode::NodePort, &[]);
        reconciler.process_node_update(Ok(&two_nodes()));

        let prod = reconciler.get_nodes_with_label("env=prod");
        assert_eq!(prod.len(), 1);
        assert_eq!(prod[0].name, "n1");
        assert!(reconciler.get_nodes_with_label("env=staging").is_empty());
        assert!(reconciler.get_nodes_with_label("zone=").is_empty());
    }

    #[traced_test]
    #[test]
    fn test_malformed_label_selector_matches_nothing() {
        let (reconciler, _receiver) = reconciler(ControllerMode::NodePort, &[]);
        reconciler.process_node_update(Ok(&two_nodes()));

        assert!(reconciler.get_nodes_with_label("bad-label").is_empty());
        assert!(reconciler.get_nodes_with_label("a=b=c").is_empty());
        assert!(logs_contain("Invalid node member label selector"));
    }

    #[test]
    fn test_cache_copy_is_independent() {
        let (reconciler, _receiver) = reconciler(ControllerMode::NodePort, &[]);
        reconciler.process_node_update(Ok(&two_nodes()));

        let mut copy = reconciler.get_nodes_from_cache();
        copy[0].addr = "192.0.2.1".to_string();
        copy.clear();

        let cached = reconciler.get_nodes_from_cache();
        assert_eq!(cached.len(), 2);
        assert_eq!(cached[0].addr, "10.0.0.1");
    }
}
