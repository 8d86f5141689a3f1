//! Node records
//!
//! The reconciler only cares about one address per node. The address family
//! is chosen once at startup and never changes for the life of the process.

use k8s_openapi::api::core::v1::Node;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::errors::AgentError;

/// One cluster node eligible as a load-balancing destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    pub addr: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl NodeRecord {
    /// True when the label map holds exactly `key=value`.
    pub fn has_label(&self, key: &str, value: &str) -> bool {
        self.labels.get(key).is_some_and(|v| v == value)
    }
}

/// Which node address family is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressFamily {
    #[default]
    Internal,
    External,
}

impl AddressFamily {
    pub fn from_use_internal(use_internal: bool) -> Self {
        if use_internal {
            AddressFamily::Internal
        } else {
            AddressFamily::External
        }
    }

    /// The node status address type for this family.
    pub fn address_type(&self) -> &'static str {
        match self {
            AddressFamily::Internal => "InternalIP",
            AddressFamily::External => "ExternalIP",
        }
    }
}

impl FromStr for AddressFamily {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "InternalIP" => Ok(AddressFamily::Internal),
            "ExternalIP" => Ok(AddressFamily::External),
            other => Err(AgentError::validation_field(
                format!("Unknown node address type '{}'", other),
                "address_family",
            )),
        }
    }
}

/// Convert polled nodes into records, in poll order.
///
/// A node contributes the first address of `family`; nodes without one are
/// skipped.
pub fn records_from_nodes(nodes: &[Node], family: AddressFamily) -> Vec<NodeRecord> {
    let wanted = family.address_type();

    nodes
        .iter()
        .filter_map(|node| {
            let addr = node
                .status
                .as_ref()?
                .addresses
                .as_ref()?
                .iter()
                .find(|address| address.type_ == wanted)?
                .address
                .clone();

            Some(NodeRecord {
                name: node.metadata.name.clone().unwrap_or_default(),
                addr,
                labels: node.metadata.labels.clone().unwrap_or_default(),
            })
        })
        .collect()
}
