//! Active configuration dispatcher
//!
//! Holds the last declaration handed to the writer and decides, per
//! candidate, whether anything needs to happen. Comparison is structural over
//! the typed model; key order and formatting never register as a change.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::publisher::{MemberPublisher, PublishOutcome};
use super::writer::ConfigWriter;
use crate::declaration::Declaration;
use crate::domain::Member;
use crate::errors::AgentError;
use crate::observability::MetricsRecorder;

/// What `apply` did with a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Candidate equals the active declaration; nothing was written.
    Unchanged,
    /// Candidate was handed to the writer and became active.
    /// `publication` is `None` when no member subscriber is configured.
    Applied { publication: Option<PublishOutcome> },
}

pub struct ActiveConfigDispatcher {
    writer: Arc<dyn ConfigWriter>,
    publisher: Option<MemberPublisher>,
    active: Mutex<Option<Declaration>>,
    metrics: MetricsRecorder,
}

impl std::fmt::Debug for ActiveConfigDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveConfigDispatcher")
            .field("publisher", &self.publisher)
            .finish_non_exhaustive()
    }
}

impl ActiveConfigDispatcher {
    pub fn new(writer: Arc<dyn ConfigWriter>, publisher: Option<MemberPublisher>) -> Self {
        Self { writer, publisher, active: Mutex::new(None), metrics: MetricsRecorder::new() }
    }

    /// Copy of the active declaration, if one has been applied.
    pub async fn active(&self) -> Option<Declaration> {
        self.active.lock().await.clone()
    }

    /// Compare `candidate` with the active declaration and, when it differs,
    /// persist it, make it active and publish `members`.
    ///
    /// Write failures are logged and the candidate still becomes active. The
    /// active declaration stays locked until publication finishes, so
    /// concurrent callers publish in the order their declarations became
    /// active.
    pub async fn apply(&self, candidate: Declaration, members: Vec<Member>) -> ApplyOutcome {
        let mut active = self.active.lock().await;

        if active.as_ref() == Some(&candidate) {
            debug!("Declaration unchanged, skipping write");
            self.metrics.record_declaration(false);
            return ApplyOutcome::Unchanged;
        }

        match serde_json::to_string(&candidate) {
            Ok(serialized) => {
                let bytes = serialized.len();
                match self.writer.write(serialized).await {
                    Ok(()) => info!(bytes, "Declaration handed to config writer"),
                    Err(e) => error!(error = %e, "Config writer rejected declaration"),
                }
            }
            Err(e) => {
                let e = AgentError::serialization(e, "Failed to serialize declaration");
                error!(error = %e, "Skipping declaration write");
            }
        }

        *active = Some(candidate);
        self.metrics.record_declaration(true);

        let Some(publisher) = &self.publisher else {
            return ApplyOutcome::Applied { publication: None };
        };

        let count = members.len();
        let outcome = publisher.publish(members).await;
        self.metrics.record_publication(outcome.is_delivered(), count);
        ApplyOutcome::Applied { publication: Some(outcome) }
    }
}
