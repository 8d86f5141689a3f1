//! # Agent
//!
//! The facade the watch layer talks to. Each call to
//! [`Agent::post_config`] runs one synthesis cycle over the full resource
//! set and hands the result to the dispatcher.

pub mod dispatcher;
pub mod publisher;
pub mod writer;

pub use dispatcher::{ActiveConfigDispatcher, ApplyOutcome};
pub use publisher::{MemberEvents, MemberPublisher, PublishOutcome, PUBLISH_TIMEOUT};
pub use writer::{ConfigWriter, FileConfigWriter};

use std::sync::{Arc, Mutex};
use tracing::info;

use crate::declaration::{synthesize, SynthesisContext};
use crate::domain::ResourceConfigs;

/// Startup parameters of the agent.
#[derive(Debug, Clone)]
pub struct AgentParams {
    pub partition: String,
    /// Open the member publication channel for an overlay subscriber.
    pub publish_members: bool,
}

pub struct Agent {
    context: SynthesisContext,
    dispatcher: ActiveConfigDispatcher,
    writer: Arc<dyn ConfigWriter>,
    member_events: Mutex<Option<MemberEvents>>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("context", &self.context)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl Agent {
    pub fn new(params: AgentParams, writer: Arc<dyn ConfigWriter>) -> Self {
        let (publisher, receiver) = if params.publish_members {
            let (publisher, receiver) = MemberPublisher::channel(PUBLISH_TIMEOUT);
            (Some(publisher), Some(receiver))
        } else {
            (None, None)
        };

        let context = SynthesisContext::new(&params.partition);
        info!(
            tenant = %context.tenant(),
            publish_members = params.publish_members,
            "Agent created"
        );

        Self {
            context,
            dispatcher: ActiveConfigDispatcher::new(writer.clone(), publisher),
            writer,
            member_events: Mutex::new(receiver),
        }
    }

    pub fn context(&self) -> &SynthesisContext {
        &self.context
    }

    pub fn dispatcher(&self) -> &ActiveConfigDispatcher {
        &self.dispatcher
    }

    /// Synthesize a declaration from `configs` and apply it. The published
    /// member list is taken from the configs, ordered by resource name.
    pub async fn post_config(&self, configs: &ResourceConfigs) -> ApplyOutcome {
        let declaration = synthesize(&self.context, configs);
        self.dispatcher.apply(declaration, configs.all_pool_members()).await
    }

    /// Take the member publication receiver. Returns `None` when publication
    /// is disabled or the receiver was already taken.
    pub fn take_member_events(&self) -> Option<MemberEvents> {
        self.member_events.lock().expect("member events lock poisoned").take()
    }

    /// Stop the config writer.
    pub async fn stop(&self) {
        self.writer.stop().await;
        info!("Agent stopped");
    }
}
