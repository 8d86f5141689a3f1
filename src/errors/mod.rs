//! # Error Handling
//!
//! Error types shared by the synthesizer, dispatcher and node reconciler.
//! Most failures inside the control-plane core are logged and degraded rather
//! than returned; the error type covers configuration, I/O and collaborator
//! failures at the edges.

pub mod types;

pub use types::{AgentError, Result};
