//! Resync requests
//!
//! The reconciler never drains work itself; it enqueues resource keys for an
//! external consumer that resynthesizes them. Consumption is assumed to be
//! idempotent, so duplicate keys are harmless.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::RwLock;
use tokio::sync::mpsc;
use tracing::warn;

/// Kind of routing resource a key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    VirtualServer,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::VirtualServer => f.write_str("VirtualServer"),
        }
    }
}

/// Queue key identifying one routing resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub namespace: String,
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceKey {
    pub fn virtual_server(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), kind: ResourceKind::VirtualServer, name: name.into() }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

/// Work queue the reconciler enqueues into.
pub trait ResyncQueue: Send + Sync {
    fn enqueue(&self, key: ResourceKey);
}

/// Unbounded channel-backed queue; the receiver is the consumer side.
#[derive(Debug, Clone)]
pub struct ChannelResyncQueue {
    sender: mpsc::UnboundedSender<ResourceKey>,
}

impl ChannelResyncQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ResourceKey>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ResyncQueue for ChannelResyncQueue {
    fn enqueue(&self, key: ResourceKey) {
        if let Err(e) = self.sender.send(key) {
            warn!(key = %e.0, "Resync consumer has gone away, dropping key");
        }
    }
}

/// Namespace and name of a known virtual server.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct VirtualServerRef {
    pub namespace: String,
    pub name: String,
}

/// Read access to the virtual servers the watch layer currently knows.
pub trait VirtualServerLister: Send + Sync {
    /// Virtual servers in `namespace`, or in every namespace when `None`.
    fn list(&self, namespace: Option<&str>) -> Vec<VirtualServerRef>;
}

/// In-memory index of known virtual servers, grouped by namespace.
#[derive(Debug, Default)]
pub struct VirtualServerIndex {
    entries: RwLock<BTreeMap<String, BTreeSet<String>>>,
}

impl VirtualServerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, namespace: &str, name: &str) {
        let mut entries = self.entries.write().expect("virtual server index lock poisoned");
        entries.entry(namespace.to_string()).or_default().insert(name.to_string());
    }

    pub fn remove(&self, namespace: &str, name: &str) {
        let mut entries = self.entries.write().expect("virtual server index lock poisoned");
        if let Some(names) = entries.get_mut(namespace) {
            names.remove(name);
            if names.is_empty() {
                entries.remove(namespace);
            }
        }
    }
}

impl VirtualServerLister for VirtualServerIndex {
    fn list(&self, namespace: Option<&str>) -> Vec<VirtualServerRef> {
        let entries = self.entries.read().expect("virtual server index lock poisoned");
        entries
            .iter()
            .filter(|(ns, _)| namespace.is_none() || namespace == Some(ns.as_str()))
            .flat_map(|(ns, names)| {
                names.iter().map(move |name| VirtualServerRef {
                    namespace: ns.clone(),
                    name: name.clone(),
                })
            })
            .collect()
    }
}
