//! # Metrics Collection
//!
//! Prometheus counters for declaration dispatch and node reconciliation.

use crate::config::ObservabilityConfig;
use crate::errors::{AgentError, Result};
use ::tracing::info;
use metrics::{counter, describe_counter, gauge, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Metrics recorder that tracks agent activity
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    /// Create a new metrics recorder instance
    pub fn new() -> Self {
        Self
    }

    /// Record the outcome of a dispatch cycle
    pub fn record_declaration(&self, changed: bool) {
        let outcome = if changed { "persisted" } else { "unchanged" };
        counter!("adcplane_declarations_total", "outcome" => outcome).increment(1);
    }

    /// Record the outcome of a member publication
    pub fn record_publication(&self, delivered: bool, members: usize) {
        let outcome = if delivered { "delivered" } else { "dropped" };
        counter!("adcplane_member_publications_total", "outcome" => outcome).increment(1);
        gauge!("adcplane_pool_members").set(members as f64);
    }

    /// Record a node-triggered full resync
    pub fn record_node_resync(&self, keys_enqueued: usize) {
        counter!("adcplane_node_resyncs_total").increment(1);
        counter!("adcplane_resync_keys_total").increment(keys_enqueued as u64);
    }

    /// Update the cached node count
    pub fn update_node_count(&self, nodes: usize) {
        gauge!("adcplane_nodes").set(nodes as f64);
    }
}

/// Install the Prometheus exporter when a metrics port is configured.
pub fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    let Some(bind_address) = config.metrics_bind_address() else {
        return Ok(());
    };

    let socket_addr: SocketAddr = bind_address
        .parse()
        .map_err(|e| AgentError::config(format!("Invalid metrics address: {}", e)))?;

    PrometheusBuilder::new()
        .with_http_listener(socket_addr)
        .add_global_label("service", &config.service_name)
        .install()
        .map_err(|e| {
            AgentError::config(format!("Failed to initialize metrics exporter: {}", e))
        })?;

    describe_counter!(
        "adcplane_declarations_total",
        Unit::Count,
        "Dispatch cycles by outcome (persisted or unchanged)"
    );
    describe_counter!(
        "adcplane_member_publications_total",
        Unit::Count,
        "Pool member publications by outcome (delivered or dropped)"
    );
    describe_counter!(
        "adcplane_node_resyncs_total",
        Unit::Count,
        "Full resyncs triggered by node inventory changes"
    );

    info!(metrics_address = %socket_addr, "Prometheus metrics exporter started");
    Ok(())
}
