//! # Node Inventory
//!
//! Periodic node polling and the reconciler that turns node-set changes into
//! resync requests.
//!
//! ```text
//! NodeSource ──► NodePoller ──► [listeners, in registration order]
//!                                 ├─ NodeInventoryReconciler ──► ResyncQueue
//!                                 └─ overlay subscriber (optional)
//! ```

pub mod poller;
pub mod reconciler;
pub mod record;
pub mod resync;
pub mod source;

pub use poller::{NodeListener, NodePoller};
pub use reconciler::{NodeInventoryReconciler, NodeUpdateOutcome, ReconcilerSettings};
pub use record::{records_from_nodes, AddressFamily, NodeRecord};
pub use resync::{
    ChannelResyncQueue, ResourceKey, ResourceKind, ResyncQueue, VirtualServerIndex,
    VirtualServerLister, VirtualServerRef,
};
pub use source::{FileNodeSource, NodeSource, StaticNodeSource};
