//! Pool member publication
//!
//! A single shared channel carries the full member list after every
//! persisted declaration. Delivery is a rendezvous: a publication counts as
//! delivered only once the subscriber has taken it. One that no subscriber
//! takes within the publish timeout is dropped and never retried, and the
//! subscriber skips it if it is still queued when it next reads.

use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::domain::Member;

/// How long a publication may wait for the subscriber before being dropped.
pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(3);

/// Result of one publication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Delivered,
    Dropped,
}

impl PublishOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, PublishOutcome::Delivered)
    }
}

#[derive(Debug)]
struct MemberUpdate {
    members: Vec<Member>,
    accepted: oneshot::Sender<()>,
}

/// Sending half of the member event channel.
#[derive(Debug, Clone)]
pub struct MemberPublisher {
    sender: mpsc::Sender<MemberUpdate>,
    timeout: Duration,
}

/// Receiving half of the member event channel.
#[derive(Debug)]
pub struct MemberEvents {
    receiver: mpsc::Receiver<MemberUpdate>,
}

impl MemberPublisher {
    /// Create a publisher and its receiving half.
    pub fn channel(timeout: Duration) -> (Self, MemberEvents) {
        let (sender, receiver) = mpsc::channel(1);
        (Self { sender, timeout }, MemberEvents { receiver })
    }

    /// Send `members` and wait, at most the publish timeout, for the
    /// subscriber to take them.
    pub async fn publish(&self, members: Vec<Member>) -> PublishOutcome {
        let count = members.len();
        let (accepted, taken) = oneshot::channel();

        let delivery = async {
            self.sender.send(MemberUpdate { members, accepted }).await.map_err(|_| ())?;
            taken.await.map_err(|_| ())
        };

        match tokio::time::timeout(self.timeout, delivery).await {
            Ok(Ok(())) => {
                debug!(members = count, "Published pool members");
                PublishOutcome::Delivered
            }
            Ok(Err(())) => {
                warn!(members = count, "Member subscriber has gone away, dropping update");
                PublishOutcome::Dropped
            }
            Err(_) => {
                debug!(
                    members = count,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Member subscriber did not accept update in time, dropping"
                );
                PublishOutcome::Dropped
            }
        }
    }
}

impl MemberEvents {
    /// Wait for the next member list. Returns `None` once every publisher
    /// is gone.
    pub async fn recv(&mut self) -> Option<Vec<Member>> {
        while let Some(update) = self.receiver.recv().await {
            if let Some(members) = update.accept() {
                return Some(members);
            }
        }
        None
    }

    /// Take a pending member list without waiting.
    pub fn try_recv(&mut self) -> Option<Vec<Member>> {
        while let Ok(update) = self.receiver.try_recv() {
            if let Some(members) = update.accept() {
                return Some(members);
            }
        }
        None
    }
}

impl MemberUpdate {
    // None when the publisher already gave up on this update
    fn accept(self) -> Option<Vec<Member>> {
        match self.accepted.send(()) {
            Ok(()) => Some(self.members),
            Err(()) => {
                debug!(members = self.members.len(), "Skipping member update dropped by publisher");
                None
            }
        }
    }
}
