//! Node poller
//!
//! A single timer drives poll cycles. Each cycle fetches the node list once
//! and hands it to every registered listener, synchronously and in
//! registration order, on the poller's own task. Listeners must return
//! promptly; anything slow belongs on a separate task.

use k8s_openapi::api::core::v1::Node;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::source::NodeSource;
use crate::errors::{AgentError, Result};
use crate::node_span;

/// Subscriber to node poll cycles.
pub trait NodeListener: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Called once per poll cycle with the node list or the poll error.
    fn on_poll(&self, update: std::result::Result<&[Node], &AgentError>);
}

pub struct NodePoller<S> {
    source: S,
    interval: Duration,
    label_selector: Option<String>,
    listeners: RwLock<Vec<Arc<dyn NodeListener>>>,
    started: AtomicBool,
}

impl<S> std::fmt::Debug for NodePoller<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodePoller")
            .field("interval", &self.interval)
            .field("label_selector", &self.label_selector)
            .field("listeners", &self.listeners.read().map(|l| l.len()).unwrap_or_default())
            .finish_non_exhaustive()
    }
}

impl<S: NodeSource> NodePoller<S> {
    pub fn new(source: S, interval: Duration, label_selector: Option<String>) -> Self {
        Self {
            source,
            interval,
            label_selector,
            listeners: RwLock::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Register a listener. Listeners are only accepted before `run`.
    pub fn register_listener(&self, listener: Arc<dyn NodeListener>) -> Result<()> {
        if self.started.load(Ordering::SeqCst) {
            return Err(AgentError::internal(format!(
                "Cannot register node listener '{}' after the poller started",
                listener.name()
            )));
        }

        let mut listeners = self.listeners.write().expect("listener lock poisoned");
        debug!(listener = listener.name(), position = listeners.len(), "Registered node listener");
        listeners.push(listener);
        Ok(())
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().expect("listener lock poisoned").len()
    }

    /// Run one poll cycle and notify every listener.
    pub async fn poll_once(&self) {
        let result = self.source.list_nodes(self.label_selector.as_deref()).await;
        let listeners = self.listeners.read().expect("listener lock poisoned").clone();

        for listener in &listeners {
            let span = node_span!(listener.name());
            let _guard = span.enter();
            match &result {
                Ok(nodes) => listener.on_poll(Ok(nodes.as_slice())),
                Err(e) => listener.on_poll(Err(e)),
            }
        }
    }

    /// Poll on the configured interval until `shutdown` is cancelled.
    ///
    /// The first cycle runs immediately.
    pub async fn run(&self, shutdown: CancellationToken) {
        self.started.store(true, Ordering::SeqCst);
        info!(
            interval_seconds = self.interval.as_secs(),
            listeners = self.listener_count(),
            "Node poller started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => self.poll_once().await,
            }
        }

        info!("Node poller stopped");
    }
}
