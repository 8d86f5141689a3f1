//! # Configuration Settings
//!
//! Defines the configuration structure for the adcplane agent.

use crate::errors::{AgentError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct AppConfig {
    /// Declaration synthesis settings
    #[validate(nested)]
    pub agent: AgentConfig,

    /// Node polling settings
    #[validate(nested)]
    pub nodes: NodeConfig,

    /// Declaration writer settings
    #[validate(nested)]
    pub writer: WriterConfig,

    /// Logging and metrics settings
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load every section from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            agent: AgentConfig::from_env()?,
            nodes: NodeConfig::from_env()?,
            writer: WriterConfig::from_env(),
            observability: ObservabilityConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(AgentError::from)?;
        self.validate_custom()
    }

    fn validate_custom(&self) -> Result<()> {
        if self.nodes.vxlan_mode.is_some() && self.nodes.vxlan_name.is_none() {
            return Err(AgentError::validation_field(
                "VXLAN name is required when a VXLAN mode is configured",
                "vxlan_name",
            ));
        }

        Ok(())
    }
}

/// How pool members reach application pods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ControllerMode {
    /// Pool members are node addresses with the service's node port.
    #[default]
    NodePort,
    /// Pool members are pod addresses.
    Cluster,
}

impl FromStr for ControllerMode {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nodeport" => Ok(Self::NodePort),
            "cluster" => Ok(Self::Cluster),
            other => Err(AgentError::validation_field(
                format!("Unknown controller mode '{}'", other),
                "controller_mode",
            )),
        }
    }
}

/// Declaration synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AgentConfig {
    /// Appliance partition the tenant is derived from
    #[validate(length(min = 1, message = "Partition cannot be empty"))]
    pub partition: String,

    /// Routing mode for pool members
    pub controller_mode: ControllerMode,

    /// Namespaces to watch (empty = all namespaces)
    pub namespaces: Vec<String>,

    /// Optional JSON file holding the routing resource configs
    pub resources_file: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            partition: "k8s".to_string(),
            controller_mode: ControllerMode::NodePort,
            namespaces: vec![],
            resources_file: None,
        }
    }
}

impl AgentConfig {
    /// Create AgentConfig from environment variables
    pub fn from_env() -> Result<Self> {
        let partition = std::env::var("ADCPLANE_PARTITION").unwrap_or_else(|_| "k8s".to_string());

        let controller_mode = match std::env::var("ADCPLANE_CONTROLLER_MODE") {
            Ok(mode) => mode.parse()?,
            Err(_) => ControllerMode::NodePort,
        };

        let namespaces = std::env::var("ADCPLANE_NAMESPACES")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|ns| !ns.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let resources_file = std::env::var("ADCPLANE_RESOURCES_FILE").ok().map(PathBuf::from);

        Ok(Self { partition, controller_mode, namespaces, resources_file })
    }
}

/// Node polling configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NodeConfig {
    /// Select the node InternalIP (true) or ExternalIP (false)
    pub use_node_internal: bool,

    /// Seconds between node polls
    #[validate(range(
        min = 1,
        max = 3600,
        message = "Node poll interval must be between 1 and 3600 seconds"
    ))]
    pub poll_interval_seconds: u64,

    /// Label selector passed to the node source
    pub label_selector: Option<String>,

    /// Overlay tunnel mode (e.g. "maintain")
    pub vxlan_mode: Option<String>,

    /// Overlay tunnel name, optionally prefixed with its partition
    pub vxlan_name: Option<String>,

    /// Optional JSON file holding the node list
    pub nodes_file: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            use_node_internal: true,
            poll_interval_seconds: 30,
            label_selector: None,
            vxlan_mode: None,
            vxlan_name: None,
            nodes_file: None,
        }
    }
}

impl NodeConfig {
    /// Create NodeConfig from environment variables
    pub fn from_env() -> Result<Self> {
        let use_node_internal = std::env::var("ADCPLANE_USE_NODE_INTERNAL")
            .map(|s| s.to_lowercase() == "true" || s == "1")
            .unwrap_or(true);

        let poll_interval_seconds = match std::env::var("ADCPLANE_NODE_POLL_INTERVAL") {
            Ok(raw) => raw.parse::<u64>().map_err(|e| {
                AgentError::config_with_source(
                    format!("Invalid node poll interval '{}'", raw),
                    Box::new(e),
                )
            })?,
            Err(_) => 30,
        };

        Ok(Self {
            use_node_internal,
            poll_interval_seconds,
            label_selector: non_empty_var("ADCPLANE_NODE_LABEL_SELECTOR"),
            vxlan_mode: non_empty_var("ADCPLANE_VXLAN_MODE"),
            vxlan_name: non_empty_var("ADCPLANE_VXLAN_NAME"),
            nodes_file: non_empty_var("ADCPLANE_NODES_FILE").map(PathBuf::from),
        })
    }

    /// Get the poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    /// Whether an overlay subscriber will be wired: it needs a VXLAN mode and
    /// a node source to poll.
    pub fn overlay_enabled(&self) -> bool {
        self.nodes_file.is_some() && self.vxlan_mode.as_deref().is_some_and(|m| !m.is_empty())
    }
}

/// Declaration writer configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WriterConfig {
    /// File the persisted declaration is written to
    pub output_path: PathBuf,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self { output_path: PathBuf::from("./declaration.json") }
    }
}

impl WriterConfig {
    /// Create WriterConfig from environment variables
    pub fn from_env() -> Self {
        let output_path = std::env::var("ADCPLANE_DECLARATION_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./declaration.json"));
        Self { output_path }
    }
}

/// Observability configuration for logging and metrics
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    /// Service name attached to metrics
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,

    /// Log level (trace, debug, info, warn, error)
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,

    /// Prometheus exporter port (0 = disabled)
    pub metrics_port: u16,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "adcplane".to_string(),
            log_level: "info".to_string(),
            json_logging: false,
            metrics_port: 0,
        }
    }
}

impl ObservabilityConfig {
    /// Create ObservabilityConfig from environment variables
    pub fn from_env() -> Result<Self> {
        let log_level =
            std::env::var("ADCPLANE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let json_logging = std::env::var("ADCPLANE_JSON_LOGS")
            .map(|s| s.to_lowercase() == "true" || s == "1")
            .unwrap_or(false);

        let metrics_port = match std::env::var("ADCPLANE_METRICS_PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|e| AgentError::config_with_source("Invalid metrics port", Box::new(e)))?,
            Err(_) => 0,
        };

        Ok(Self { service_name: "adcplane".to_string(), log_level, json_logging, metrics_port })
    }

    /// Get metrics bind address (None if disabled)
    pub fn metrics_bind_address(&self) -> Option<String> {
        if self.metrics_port == 0 {
            None
        } else {
            Some(format!("0.0.0.0:{}", self.metrics_port))
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}
