//! Routing resource domain types
//!
//! A `ResourceConfig` is the processed intent of one routing resource as
//! produced by the watch layer: one virtual listener, the pools it can reach
//! and the endpoint policies attached to it.

use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};

use super::policy::Policy;

/// One backend endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    pub address: String,
    pub port: u16,
}

impl Member {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self { address: address.into(), port }
    }
}

/// A named backend member group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    pub name: String,
    #[serde(default)]
    pub partition: String,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub service_port: u16,
    #[serde(default)]
    pub members: Vec<Member>,
}

/// Reference from a virtual to an endpoint policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PolicyRef {
    pub name: String,
    #[serde(default)]
    pub partition: String,
}

impl PolicyRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), partition: String::new() }
    }
}

/// Externally reachable listener definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Virtual {
    pub name: String,
    /// Pool bound directly when no policy is attached; may be a full path.
    #[serde(default)]
    pub pool_name: String,
    /// Path whose final segment is `ip:port`, e.g. `/k8s/10.0.0.1:80`.
    pub destination: String,
    #[serde(default = "default_ip_protocol")]
    pub ip_protocol: String,
    #[serde(default)]
    pub policies: Vec<PolicyRef>,
    #[serde(default)]
    pub irules: Vec<String>,
}

fn default_ip_protocol() -> String {
    "tcp".to_string()
}

/// Processed intent of one routing resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConfig {
    #[serde(rename = "virtual")]
    pub virtual_server: Virtual,
    #[serde(default)]
    pub pools: Vec<Pool>,
    #[serde(default)]
    pub policies: Vec<Policy>,
    /// Upgrades the emitted service to its HTTPS variant.
    #[serde(default)]
    pub tls_enabled: bool,
}

impl ResourceConfig {
    pub fn name(&self) -> &str {
        &self.virtual_server.name
    }
}

/// All resource configs of one synthesis cycle, keyed by virtual name.
///
/// Keeping them in a sorted map makes declaration output and member
/// publication order deterministic across cycles.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceConfigs {
    configs: BTreeMap<String, ResourceConfig>,
}

impl ResourceConfigs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a config, returning the one it replaced under the same name.
    pub fn insert(&mut self, config: ResourceConfig) -> Option<ResourceConfig> {
        self.configs.insert(config.name().to_string(), config)
    }

    pub fn iter(&self) -> btree_map::Values<'_, String, ResourceConfig> {
        self.configs.values()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Every pool member across every resource, pools and members in input order.
    pub fn all_pool_members(&self) -> Vec<Member> {
        self.configs
            .values()
            .flat_map(|cfg| cfg.pools.iter())
            .flat_map(|pool| pool.members.iter().cloned())
            .collect()
    }
}

impl FromIterator<ResourceConfig> for ResourceConfigs {
    fn from_iter<I: IntoIterator<Item = ResourceConfig>>(iter: I) -> Self {
        let mut configs = Self::new();
        for config in iter {
            configs.insert(config);
        }
        configs
    }
}

impl<'a> IntoIterator for &'a ResourceConfigs {
    type Item = &'a ResourceConfig;
    type IntoIter = btree_map::Values<'a, String, ResourceConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.configs.values()
    }
}
