//! src/eventbus/mod.rs
//!
//! Outbound side effects of the reward engine. Services publish
//! `RewardEffect`s without awaiting them; a single dispatcher task
//! (see `dispatcher`) executes them against the badge evaluator and the
//! notifier. A failed or dropped effect never affects the write that
//! produced it.

pub mod dispatcher;

use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::trace;
use uuid::Uuid;
use tally_common::error::Error;
use tally_common::models::{BadgeId, NotificationRequest};

/// Badge work produced by a first-earn or a claim.
#[derive(Debug, Clone, PartialEq)]
pub struct BadgeAward {
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    /// Badges linked directly to the task and/or reward.
    pub badge_ids: Vec<BadgeId>,
    pub reason: String,
    /// Re-run every criteria-based badge after the direct awards.
    pub reevaluate: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RewardEffect {
    Notify(NotificationRequest),
    AwardBadges(BadgeAward),
}

impl RewardEffect {
    pub fn effect_type(&self) -> String {
        match self {
            RewardEffect::Notify(req) => format!("notify:{}", req.event),
            RewardEffect::AwardBadges(_) => "badges".to_string(),
        }
    }
}

/// Bounded queue between the transactional core and the dispatcher.
///
/// - `publish` never waits: if the buffer is full or the dispatcher is gone
///   the effect is dropped and `Error::EffectQueue` comes back.
/// - `shutdown` tells the dispatcher to drain what is queued and exit.
#[derive(Clone)]
pub struct EffectQueue {
    tx: mpsc::Sender<RewardEffect>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    pub shutdown_rx: watch::Receiver<bool>,
}

impl EffectQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<RewardEffect>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let queue = Self {
            tx,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        };
        (queue, rx)
    }

    pub fn publish(&self, effect: RewardEffect) -> Result<(), Error> {
        let kind = effect.effect_type();
        match self.tx.try_send(effect) {
            Ok(()) => {
                trace!("Queued effect {}", kind);
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(Error::EffectQueue(format!("queue full; dropped {}", kind))),
            Err(TrySendError::Closed(_)) => Err(Error::EffectQueue(format!("dispatcher is gone; dropped {}", kind))),
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tally_common::models::NotificationEvent;

    fn notify(event: NotificationEvent) -> RewardEffect {
        RewardEffect::Notify(NotificationRequest {
            recipients: vec![Uuid::new_v4()],
            event,
            tenant_id: None,
            data: json!({}),
        })
    }

    #[tokio::test]
    async fn test_published_effects_arrive_in_order() {
        let (queue, mut rx) = EffectQueue::new(4);
        queue.publish(notify(NotificationEvent::TaskCompleted)).unwrap();
        queue.publish(notify(NotificationEvent::RewardEarned)).unwrap();

        let first = rx.recv().await.expect("first effect");
        let second = rx.recv().await.expect("second effect");
        assert_eq!(first.effect_type(), "notify:task.completed");
        assert_eq!(second.effect_type(), "notify:reward.earned");
    }

    #[tokio::test]
    async fn test_full_queue_drops_instead_of_blocking() {
        let (queue, mut rx) = EffectQueue::new(1);
        queue.publish(notify(NotificationEvent::TaskCompleted)).unwrap();
        let err = queue.publish(notify(NotificationEvent::RewardEarned)).unwrap_err();
        assert!(matches!(err, Error::EffectQueue(ref msg) if msg.contains("notify:reward.earned")));

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_queue_reports_drop() {
        let (queue, rx) = EffectQueue::new(1);
        drop(rx);
        assert!(matches!(
            queue.publish(notify(NotificationEvent::RewardClaimed)),
            Err(Error::EffectQueue(_))
        ));
    }

    #[test]
    fn test_shutdown_flag() {
        let (queue, _rx) = EffectQueue::new(1);
        assert!(!queue.is_shutdown());
        queue.shutdown();
        assert!(queue.is_shutdown());
    }
}
