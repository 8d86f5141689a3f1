//! Resource file loading
//!
//! The binary reads processed resource intent from a JSON file instead of a
//! live watch: an array of resource configs, each optionally tagged with the
//! namespace its virtual server lives in.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::resource::{ResourceConfig, ResourceConfigs};
use crate::errors::{AgentError, Result};

pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceEntry {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(flatten)]
    pub config: ResourceConfig,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

/// Parse resource entries from JSON text.
pub fn parse_resource_entries(raw: &str) -> Result<Vec<ResourceEntry>> {
    let entries: Vec<ResourceEntry> = serde_json::from_str(raw)
        .map_err(|e| AgentError::serialization(e, "Failed to parse resource entries"))?;

    if let Some(entry) = entries.iter().find(|e| e.config.name().is_empty()) {
        return Err(AgentError::validation_field(
            format!("Resource in namespace '{}' has an empty virtual name", entry.namespace),
            "virtual.name",
        ));
    }
    Ok(entries)
}

/// Read and parse a resource file.
pub async fn load_resource_file(path: &Path) -> Result<Vec<ResourceEntry>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AgentError::io(e, format!("Failed to read {}", path.display())))?;
    parse_resource_entries(&raw)
}

/// Collect entries into the per-cycle config set.
pub fn into_configs(entries: &[ResourceEntry]) -> ResourceConfigs {
    entries.iter().map(|entry| entry.config.clone()).collect()
}
