//! # adcplane
//!
//! Control-plane core of an external load-balancer configuration agent.
//! Routing resources are synthesized into a class-tagged declaration for the
//! load-balancing appliance, while cluster node membership is tracked
//! separately and turned into resync requests.
//!
//! ## Architecture
//!
//! ```text
//! ResourceConfigs → Synthesizer → ActiveConfigDispatcher ─┬→ ConfigWriter
//!                                                        └→ member channel → overlay
//!
//! NodeSource → NodePoller ─┬→ NodeInventoryReconciler → ResyncQueue
//!                          └→ overlay subscriber
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use adcplane::agent::{Agent, AgentParams, FileConfigWriter};
//! use adcplane::domain::ResourceConfigs;
//!
//! #[tokio::main]
//! async fn main() {
//!     let writer = Arc::new(FileConfigWriter::start("declaration.json"));
//!     let agent = Agent::new(
//!         AgentParams { partition: "k8s".to_string(), publish_members: false },
//!         writer,
//!     );
//!     agent.post_config(&ResourceConfigs::new()).await;
//!     agent.stop().await;
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod declaration;
pub mod domain;
pub mod errors;
pub mod nodes;
pub mod observability;
pub mod overlay;

// Re-export commonly used types
pub use agent::{Agent, AgentParams, ApplyOutcome};
pub use config::AppConfig;
pub use declaration::{synthesize, Declaration, SynthesisContext};
pub use errors::{AgentError, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
