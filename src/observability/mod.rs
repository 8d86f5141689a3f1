//! # Observability Infrastructure
//!
//! Structured logging and metrics for the adcplane agent.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, log_config_info};
pub use metrics::{init_metrics, MetricsRecorder};

use crate::config::ObservabilityConfig;
use crate::errors::Result;
use ::tracing::info;

/// Initialize logging and, when configured, the metrics exporter
pub fn init_observability(config: &ObservabilityConfig) -> Result<()> {
    let installed = init_logging(config);

    init_metrics(config)?;

    info!(
        service_name = %config.service_name,
        log_level = %config.log_level,
        json_logging = config.json_logging,
        subscriber_installed = installed,
        "Observability initialized"
    );

    Ok(())
}
