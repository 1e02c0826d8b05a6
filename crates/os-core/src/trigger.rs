//! Bounded hand-off from the service to the review loop.

use crate::types::ReviewWatchId;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

pub const DEFAULT_TRIGGER_CAPACITY: usize = 64;

pub type ReviewPollQueue = mpsc::Receiver<ReviewWatchId>;

#[derive(Debug, Clone)]
pub struct ReviewPollTrigger {
    sender: mpsc::Sender<ReviewWatchId>,
}

impl ReviewPollTrigger {
    pub fn channel(capacity: usize) -> (Self, ReviewPollQueue) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Asks the review loop to poll `id` ahead of its next tick. Never blocks;
    /// returns false when the request was dropped.
    pub fn request(&self, id: &ReviewWatchId) -> bool {
        match self.sender.try_send(id.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(id)) => {
                tracing::warn!(review_watch_id = %id, "review poll queue full; waiting for next tick");
                false
            }
            Err(TrySendError::Closed(id)) => {
                tracing::debug!(review_watch_id = %id, "review poll queue closed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn full_queue_drops_requests() {
        let (trigger, mut queue) = ReviewPollTrigger::channel(1);
        let first = ReviewWatchId::generate();
        let second = ReviewWatchId::generate();

        assert!(trigger.request(&first));
        assert!(!trigger.request(&second));
        assert_eq!(queue.recv().await, Some(first));
        assert!(trigger.request(&second));
    }

    #[tokio::test]
    async fn closed_queue_is_reported() {
        let (trigger, queue) = ReviewPollTrigger::channel(4);
        drop(queue);
        assert!(!trigger.request(&ReviewWatchId::generate()));
    }
}
