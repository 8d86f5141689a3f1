//! # Structured Logging
//!
//! Subscriber setup and span macros for the synthesis and node-poll paths.

use crate::config::ObservabilityConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Create a tracing span for one declaration synthesis cycle
#[macro_export]
macro_rules! synth_span {
    ($tenant:expr) => {
        tracing::debug_span!(
            "synthesis",
            tenant = %$tenant,
            cycle_id = %uuid::Uuid::new_v4()
        )
    };
    ($tenant:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "synthesis",
            tenant = %$tenant,
            cycle_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Create a tracing span for one node poll cycle
#[macro_export]
macro_rules! node_span {
    ($listener:expr) => {
        tracing::debug_span!(
            "node_poll",
            listener = %$listener,
            poll_id = %uuid::Uuid::new_v4()
        )
    };
    ($listener:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "node_poll",
            listener = %$listener,
            poll_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level when set. Returns `false` when a
/// subscriber was already installed (e.g. by a test harness).
pub fn init_logging(config: &ObservabilityConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json_logging {
        registry.with(fmt::layer().json().with_target(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    result.is_ok()
}

/// Log configuration at startup
pub fn log_config_info(config: &crate::config::AppConfig) {
    tracing::info!(
        partition = %config.agent.partition,
        controller_mode = ?config.agent.controller_mode,
        namespaces = ?config.agent.namespaces,
        use_node_internal = config.nodes.use_node_internal,
        poll_interval_seconds = config.nodes.poll_interval_seconds,
        vxlan_mode = ?config.nodes.vxlan_mode,
        declaration_path = %config.writer.output_path.display(),
        "adcplane agent configuration"
    );
}
