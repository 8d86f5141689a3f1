//! # Command Line Interface
//!
//! Flags override the environment-derived configuration. Without a
//! subcommand the agent runs until interrupted.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::declaration::{synthesize, Declaration, SynthesisContext};
use crate::domain::{into_configs, load_resource_file};
use crate::errors::{AgentError, Result};

#[derive(Parser, Debug)]
#[command(name = "adcplane")]
#[command(about = "Load-balancer declaration agent")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Partition override
    #[arg(long, global = true)]
    pub partition: Option<String>,

    /// Resource file override
    #[arg(long, global = true)]
    pub resources: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the agent (default)
    Run,

    /// Synthesize the declaration for the resource file and print it
    Render {
        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,
    },
}

impl Cli {
    /// Apply flag overrides to `config`.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(partition) = &self.partition {
            config.agent.partition = partition.clone();
        }
        if let Some(resources) = &self.resources {
            config.agent.resources_file = Some(resources.clone());
        }
        if self.verbose {
            config.observability.log_level = "debug".to_string();
        }
    }
}

/// Synthesize the declaration for the configured resource file.
pub async fn render_declaration(config: &AppConfig) -> Result<Declaration> {
    let path = config.agent.resources_file.as_deref().ok_or_else(|| {
        AgentError::config("A resource file is required to render a declaration")
    })?;
    let entries = load_resource_file(path).await?;
    let ctx = SynthesisContext::new(&config.agent.partition);
    Ok(synthesize(&ctx, &into_configs(&entries)))
}
