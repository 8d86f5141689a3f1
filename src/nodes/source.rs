//! Node list sources
//!
//! A [`NodeSource`] produces the raw node list for one poll cycle, filtered
//! by the poller's label selector. Selectors use the equality subset of the
//! cluster selector syntax: comma-separated `key=value` terms, all of which
//! must match.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::errors::{AgentError, Result};

#[async_trait]
pub trait NodeSource: Send + Sync {
    async fn list_nodes(&self, label_selector: Option<&str>) -> Result<Vec<Node>>;
}

/// Parse an equality label selector into its terms.
pub fn parse_selector(selector: &str) -> Result<Vec<(String, String)>> {
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(|term| match term.split_once('=') {
            Some((key, value)) if !key.is_empty() && !value.contains('=') => {
                Ok((key.trim().to_string(), value.trim().to_string()))
            }
            _ => Err(AgentError::poll(format!("Invalid label selector term '{}'", term))),
        })
        .collect()
}

fn matches_all(labels: Option<&BTreeMap<String, String>>, terms: &[(String, String)]) -> bool {
    terms.iter().all(|(key, value)| labels.and_then(|l| l.get(key)).is_some_and(|v| v == value))
}

/// Keep only the nodes matching `selector`.
pub fn filter_nodes(nodes: Vec<Node>, selector: Option<&str>) -> Result<Vec<Node>> {
    let Some(selector) = selector else {
        return Ok(nodes);
    };
    let terms = parse_selector(selector)?;
    Ok(nodes.into_iter().filter(|node| matches_all(node.metadata.labels.as_ref(), &terms)).collect())
}

/// Reads a JSON array of nodes from a file on every poll.
#[derive(Debug, Clone)]
pub struct FileNodeSource {
    path: PathBuf,
}

impl FileNodeSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl NodeSource for FileNodeSource {
    async fn list_nodes(&self, label_selector: Option<&str>) -> Result<Vec<Node>> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            AgentError::poll(format!("Failed to read node list {}: {}", self.path.display(), e))
        })?;
        let nodes: Vec<Node> = serde_json::from_str(&raw).map_err(|e| {
            AgentError::poll(format!("Failed to parse node list {}: {}", self.path.display(), e))
        })?;
        filter_nodes(nodes, label_selector)
    }
}

/// Fixed node list, or a fixed failure.
#[derive(Debug, Clone)]
pub struct StaticNodeSource {
    nodes: std::result::Result<Vec<Node>, String>,
}

impl StaticNodeSource {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes: Ok(nodes) }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self { nodes: Err(message.into()) }
    }
}

#[async_trait]
impl NodeSource for StaticNodeSource {
    async fn list_nodes(&self, label_selector: Option<&str>) -> Result<Vec<Node>> {
        match &self.nodes {
            Ok(nodes) => filter_nodes(nodes.clone(), label_selector),
            Err(message) => Err(AgentError::poll(message.clone())),
        }
    }
}
