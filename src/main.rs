use std::path::Path;
use std::sync::Arc;

use adcplane::{
    agent::{Agent, AgentParams, FileConfigWriter},
    cli::{render_declaration, Cli, Commands},
    config::AppConfig,
    domain::{into_configs, load_resource_file},
    nodes::{
        AddressFamily, ChannelResyncQueue, FileNodeSource, NodeInventoryReconciler, NodePoller,
        ReconcilerSettings, ResourceKey, VirtualServerIndex, VirtualServerLister,
    },
    observability::{init_observability, log_config_info},
    overlay::setup_node_polling,
    APP_NAME, VERSION,
};
use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists; must happen before any config is read
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("Failed to load configuration")?;
    cli.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;

    init_observability(&config.observability)?;
    info!(app_name = APP_NAME, version = VERSION, "Starting adcplane agent");
    log_config_info(&config);

    if let Some(Commands::Render { pretty }) = cli.command {
        let declaration = render_declaration(&config).await?;
        let output = if pretty {
            serde_json::to_string_pretty(&declaration)?
        } else {
            serde_json::to_string(&declaration)?
        };
        println!("{}", output);
        return Ok(());
    }

    let writer = Arc::new(FileConfigWriter::start(&config.writer.output_path));
    let agent = Arc::new(Agent::new(
        AgentParams {
            partition: config.agent.partition.clone(),
            publish_members: config.nodes.overlay_enabled(),
        },
        writer,
    ));

    let index = Arc::new(VirtualServerIndex::new());
    let resources_file = config.agent.resources_file.clone();
    sync_resources(&agent, &index, resources_file.as_deref()).await;

    let shutdown = CancellationToken::new();
    let mut tasks = Vec::new();

    if let Some(nodes_file) = &config.nodes.nodes_file {
        let (queue, resync_rx) = ChannelResyncQueue::new();
        let reconciler = Arc::new(NodeInventoryReconciler::new(
            ReconcilerSettings {
                address_family: AddressFamily::from_use_internal(config.nodes.use_node_internal),
                controller_mode: config.agent.controller_mode,
                namespaces: config.agent.namespaces.clone(),
            },
            index.clone(),
            Arc::new(queue),
        ));

        let poller = Arc::new(NodePoller::new(
            FileNodeSource::new(nodes_file),
            config.nodes.poll_interval(),
            config.nodes.label_selector.clone(),
        ));

        let overlay = setup_node_polling(
            &*poller,
            reconciler,
            &config.nodes,
            agent.take_member_events(),
        )
        .context("Failed to set up node polling")?;
        if let Some(overlay) = &overlay {
            info!(vxlan_partition = overlay.vxlan_partition(), "Overlay membership enabled");
        }

        let poll_shutdown = shutdown.clone();
        tasks.push(tokio::spawn(async move { poller.run(poll_shutdown).await }));

        let resync_agent = agent.clone();
        let resync_index = index.clone();
        let resync_shutdown = shutdown.clone();
        tasks.push(tokio::spawn(async move {
            consume_resyncs(resync_rx, resync_agent, resync_index, resources_file, resync_shutdown)
                .await
        }));
    } else {
        info!("No node source configured, node polling disabled");
    }

    signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    shutdown.cancel();
    for task in tasks {
        if let Err(e) = task.await {
            error!(error = %e, "Background task failed during shutdown");
        }
    }
    agent.stop().await;

    info!("adcplane shutdown completed");
    Ok(())
}

/// Load the resource file, refresh the virtual server index and post the
/// resulting configs. Load failures are logged and leave the active
/// declaration untouched.
async fn sync_resources(agent: &Agent, index: &VirtualServerIndex, path: Option<&Path>) {
    let Some(path) = path else {
        debug!("No resource file configured, skipping synthesis");
        return;
    };

    let entries = match load_resource_file(path).await {
        Ok(entries) => entries,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to load resources");
            return;
        }
    };

    for stale in index.list(None) {
        let current = entries
            .iter()
            .any(|e| e.namespace == stale.namespace && e.config.name() == stale.name);
        if !current {
            index.remove(&stale.namespace, &stale.name);
        }
    }
    for entry in &entries {
        index.upsert(&entry.namespace, entry.config.name());
    }

    let outcome = agent.post_config(&into_configs(&entries)).await;
    debug!(?outcome, resources = entries.len(), "Posted resource configs");
}

/// Drain resync requests; every batch of keys triggers one full resynthesis.
async fn consume_resyncs(
    mut keys: mpsc::UnboundedReceiver<ResourceKey>,
    agent: Arc<Agent>,
    index: Arc<VirtualServerIndex>,
    resources_file: Option<std::path::PathBuf>,
    shutdown: CancellationToken,
) {
    loop {
        let first = tokio::select! {
            _ = shutdown.cancelled() => break,
            key = keys.recv() => match key {
                Some(key) => key,
                None => break,
            },
        };

        let mut batch = 1;
        while keys.try_recv().is_ok() {
            batch += 1;
        }
        debug!(first = %first, batch, "Resynthesizing after node change");

        sync_resources(&agent, &index, resources_file.as_deref()).await;
    }
}
