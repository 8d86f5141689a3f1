//! # Overlay Membership Wiring
//!
//! When the appliance reaches pods over a VXLAN tunnel, a second subscriber
//! watches the same node polls as the inventory reconciler and also reads
//! the pool-member publications from the dispatcher. This module wires that
//! subscriber in; maintaining the tunnel's forwarding entries is the
//! subscriber's own business.

use k8s_openapi::api::core::v1::Node;
use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::NodeConfig;
use crate::agent::MemberEvents;
use crate::domain::Member;
use crate::errors::{AgentError, Result};
use crate::nodes::{
    records_from_nodes, AddressFamily, NodeInventoryReconciler, NodeListener, NodePoller,
    NodeSource,
};

/// Partition used when the tunnel name carries none.
pub const DEFAULT_TUNNEL_PARTITION: &str = "Common";

/// A tunnel reference split into partition and tunnel name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelRef {
    pub partition: String,
    pub name: String,
}

impl TunnelRef {
    /// Parse `/<partition>/<tunnel>` or a bare tunnel name.
    pub fn parse(vxlan_name: &str) -> Self {
        let clean = vxlan_name.trim_start_matches('/');
        match clean.split_once('/') {
            Some((partition, name)) => {
                Self { partition: partition.to_string(), name: name.to_string() }
            }
            None => Self {
                partition: DEFAULT_TUNNEL_PARTITION.to_string(),
                name: vxlan_name.to_string(),
            },
        }
    }
}

/// Subscriber to both node polls and member publications.
pub trait OverlayManager: NodeListener {
    /// Consume member publications until the sender goes away.
    fn process_member_events(self: Arc<Self>, events: MemberEvents) -> JoinHandle<()>;
}

#[derive(Debug, Default)]
struct MembershipState {
    node_addrs: Vec<String>,
    members: Vec<Member>,
}

/// Tracks tunnel endpoints (node addresses) and the pool members reachable
/// through them.
#[derive(Debug)]
pub struct TunnelMembership {
    mode: String,
    tunnel: TunnelRef,
    family: AddressFamily,
    state: RwLock<MembershipState>,
}

impl TunnelMembership {
    pub fn new(mode: impl Into<String>, tunnel: TunnelRef, family: AddressFamily) -> Self {
        Self { mode: mode.into(), tunnel, family, state: RwLock::new(MembershipState::default()) }
    }

    pub fn tunnel(&self) -> &TunnelRef {
        &self.tunnel
    }

    pub fn node_addresses(&self) -> Vec<String> {
        self.state.read().expect("membership lock poisoned").node_addrs.clone()
    }

    pub fn members(&self) -> Vec<Member> {
        self.state.read().expect("membership lock poisoned").members.clone()
    }

    fn update_members(&self, members: Vec<Member>) {
        let mut state = self.state.write().expect("membership lock poisoned");
        if state.members != members {
            debug!(
                tunnel = %self.tunnel.name,
                mode = %self.mode,
                members = members.len(),
                "Tunnel members updated"
            );
            state.members = members;
        }
    }
}

impl NodeListener for TunnelMembership {
    fn name(&self) -> &str {
        "overlay"
    }

    fn on_poll(&self, update: std::result::Result<&[Node], &AgentError>) {
        let nodes = match update {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!(tunnel = %self.tunnel.name, error = %e, "Skipping tunnel update, node poll failed");
                return;
            }
        };

        let addrs: Vec<String> =
            records_from_nodes(nodes, self.family).into_iter().map(|record| record.addr).collect();

        let mut state = self.state.write().expect("membership lock poisoned");
        if state.node_addrs != addrs {
            debug!(tunnel = %self.tunnel.name, endpoints = addrs.len(), "Tunnel endpoints updated");
            state.node_addrs = addrs;
        }
    }
}

impl OverlayManager for TunnelMembership {
    fn process_member_events(
        self: Arc<Self>,
        mut events: MemberEvents,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(members) = events.recv().await {
                self.update_members(members);
            }
            debug!(tunnel = %self.tunnel.name, "Member event channel closed");
        })
    }
}

/// The overlay subscriber created by [`setup_node_polling`].
#[derive(Debug)]
pub struct OverlayHandle {
    pub manager: Arc<TunnelMembership>,
    /// Task draining member publications, if a channel was supplied.
    pub events_task: Option<JoinHandle<()>>,
}

impl OverlayHandle {
    /// Partition the tunnel lives in.
    pub fn vxlan_partition(&self) -> &str {
        &self.manager.tunnel().partition
    }
}

/// Register the inventory reconciler on `poller` and, when a VXLAN mode is
/// configured, the overlay subscriber after it.
///
/// `member_events` is handed to the overlay subscriber; it is ignored when
/// no VXLAN mode is set.
pub fn setup_node_polling<S: NodeSource>(
    poller: &NodePoller<S>,
    reconciler: Arc<NodeInventoryReconciler>,
    config: &NodeConfig,
    member_events: Option<MemberEvents>,
) -> Result<Option<OverlayHandle>> {
    let family = reconciler.address_family();
    poller.register_listener(reconciler)?;

    let Some(mode) = config.vxlan_mode.as_deref().filter(|m| !m.is_empty()) else {
        return Ok(None);
    };
    let vxlan_name = config.vxlan_name.as_deref().ok_or_else(|| {
        AgentError::config(format!("VXLAN mode '{}' requires a VXLAN tunnel name", mode))
    })?;

    let tunnel = TunnelRef::parse(vxlan_name);
    info!(mode, tunnel = %tunnel.name, partition = %tunnel.partition, "Enabling overlay membership");

    let manager = Arc::new(TunnelMembership::new(mode, tunnel, family));
    poller.register_listener(manager.clone())?;

    let events_task = member_events.map(|events| manager.clone().process_member_events(events));

    Ok(Some(OverlayHandle { manager, events_task }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerMode;
    use crate::agent::{MemberPublisher, PublishOutcome, PUBLISH_TIMEOUT};
    use crate::nodes::record::fixtures::internal_node;
    use crate::nodes::{ChannelResyncQueue, ReconcilerSettings, StaticNodeSource, VirtualServerIndex};
    use std::time::Duration;

    fn reconciler() -> Arc<NodeInventoryReconciler> {
        let (queue, _receiver) = ChannelResyncQueue::new();
        Arc::new(NodeInventoryReconciler::new(
            ReconcilerSettings {
                address_family: AddressFamily::Internal,
                controller_mode: ControllerMode::NodePort,
                namespaces: vec![],
            },
            Arc::new(VirtualServerIndex::new()),
            Arc::new(queue),
        ))
    }

    fn poller() -> NodePoller<StaticNodeSource> {
        let source = StaticNodeSource::new(vec![
            internal_node("n1", "10.0.0.1", &[]),
            internal_node("n2", "10.0.0.2", &[]),
        ]);
        NodePoller::new(source, Duration::from_secs(30), None)
    }

    #[test]
    fn test_tunnel_ref_parse() {
        assert_eq!(
            TunnelRef::parse("/Common/vxlan-tunnel"),
            TunnelRef { partition: "Common".to_string(), name: "vxlan-tunnel".to_string() }
        );
        assert_eq!(
            TunnelRef::parse("/k8s/flannel_vxlan"),
            TunnelRef { partition: "k8s".to_string(), name: "flannel_vxlan".to_string() }
        );
        assert_eq!(
            TunnelRef::parse("flannel_vxlan"),
            TunnelRef { partition: "Common".to_string(), name: "flannel_vxlan".to_string() }
        );
    }

    #[tokio::test]
    async fn test_setup_without_vxlan_registers_reconciler_only() {
        let poller = poller();
        let handle =
            setup_node_polling(&poller, reconciler(), &NodeConfig::default(), None).unwrap();

        assert!(handle.is_none());
        assert_eq!(poller.listener_count(), 1);
    }

    #[tokio::test]
    async fn test_setup_with_vxlan_registers_overlay_second() {
        let poller = poller();
        let reconciler = reconciler();
        let config = NodeConfig {
            vxlan_mode: Some("maintain".to_string()),
            vxlan_name: Some("/k8s/flannel_vxlan".to_string()),
            ..Default::default()
        };
        let (publisher, events) = MemberPublisher::channel(PUBLISH_TIMEOUT);

        let handle =
            setup_node_polling(&poller, reconciler.clone(), &config, Some(events)).unwrap().unwrap();
        assert_eq!(poller.listener_count(), 2);
        assert_eq!(handle.vxlan_partition(), "k8s");
        assert_eq!(handle.manager.tunnel().name, "flannel_vxlan");

        poller.poll_once().await;
        assert_eq!(reconciler.get_nodes_from_cache().len(), 2);
        assert_eq!(handle.manager.node_addresses(), vec!["10.0.0.1", "10.0.0.2"]);

        let outcome = publisher.publish(vec![Member::new("10.244.1.5", 8080)]).await;
        assert_eq!(outcome, PublishOutcome::Delivered);
        drop(publisher);
        handle.events_task.unwrap().await.unwrap();
        assert_eq!(handle.manager.members(), vec![Member::new("10.244.1.5", 8080)]);
    }

    #[tokio::test]
    async fn test_setup_with_vxlan_mode_but_no_name_fails() {
        let poller = poller();
        let config = NodeConfig { vxlan_mode: Some("maintain".to_string()), ..Default::default() };

        let result = setup_node_polling(&poller, reconciler(), &config, None);
        assert!(matches!(result, Err(AgentError::Config { .. })));
    }
}
