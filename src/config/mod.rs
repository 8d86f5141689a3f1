//! # Configuration Management
//!
//! Environment-driven configuration for the adcplane agent. Every section has
//! a `Default` and a `from_env` constructor; `AppConfig::validate` runs the
//! `validator` rules plus cross-field checks.

pub mod settings;

pub use settings::{
    AgentConfig, AppConfig, ControllerMode, NodeConfig, ObservabilityConfig, WriterConfig,
};
