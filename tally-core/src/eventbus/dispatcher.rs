//! src/eventbus/dispatcher.rs
//!
//! Spawns the task that executes queued `RewardEffect`s. Every failure is
//! logged and swallowed. On shutdown the queue is drained before the task
//! exits.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tally_common::traits::{BadgeEvaluator, Notifier, UserRewardsRepository};

use crate::eventbus::{BadgeAward, EffectQueue, RewardEffect};
use tally_common::models::NotificationRequest;

/// Executes effects against the external collaborators.
pub struct EffectDispatcher {
    notifier: Arc<dyn Notifier>,
    badge_evaluator: Arc<dyn BadgeEvaluator>,
    user_rewards_repo: Arc<dyn UserRewardsRepository>,
}

impl EffectDispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        badge_evaluator: Arc<dyn BadgeEvaluator>,
        user_rewards_repo: Arc<dyn UserRewardsRepository>,
    ) -> Self {
        Self {
            notifier,
            badge_evaluator,
            user_rewards_repo,
        }
    }

    pub async fn execute(&self, effect: RewardEffect) {
        match effect {
            RewardEffect::Notify(req) => self.notify(&req).await,
            RewardEffect::AwardBadges(award) => self.award_badges(&award).await,
        }
    }

    async fn notify(&self, req: &NotificationRequest) {
        match self.notifier.send(req).await {
            Ok(sent) => debug!("Sent {} '{}' notification(s)", sent.len(), req.event),
            Err(e) => warn!("Notification '{}' failed: {:?}", req.event, e),
        }
    }

    async fn award_badges(&self, award: &BadgeAward) {
        for badge_id in &award.badge_ids {
            match self
                .badge_evaluator
                .award_badge_directly(award.user_id, *badge_id, award.tenant_id, award.reason.clone())
                .await
            {
                Ok(true) => {
                    info!("Awarded badge {} to user {}", badge_id, award.user_id);
                    if let Err(e) = self.user_rewards_repo.add_badge(award.user_id, *badge_id).await {
                        warn!("Could not record badge {} for user {}: {:?}", badge_id, award.user_id, e);
                    }
                }
                Ok(false) => debug!("User {} already holds badge {}", award.user_id, badge_id),
                Err(e) => warn!("Direct award of badge {} to user {} failed: {:?}", badge_id, award.user_id, e),
            }
        }

        if award.reevaluate {
            if let Err(e) = self
                .badge_evaluator
                .check_and_award_eligible_badges(award.user_id, award.tenant_id)
                .await
            {
                warn!("Badge re-evaluation for user {} failed: {:?}", award.user_id, e);
            }
        }
    }
}

/// Spawns the dispatcher loop. Returns a `JoinHandle<()>` so shutdown logic
/// (and tests) can await the final drain.
pub fn spawn_effect_dispatcher(
    queue: &EffectQueue,
    mut rx: mpsc::Receiver<RewardEffect>,
    dispatcher: Arc<EffectDispatcher>,
) -> JoinHandle<()> {
    let mut shutdown_rx = queue.shutdown_rx.clone();

    tokio::spawn(async move {
        info!("Effect dispatcher started.");

        loop {
            if *shutdown_rx.borrow() {
                info!("Effect dispatcher shutting down => break from loop.");
                break;
            }
            tokio::select! {
                biased;
                maybe_effect = rx.recv() => {
                    match maybe_effect {
                        Some(effect) => dispatcher.execute(effect).await,
                        None => {
                            info!("Effect queue closed => break from loop.");
                            break;
                        }
                    }
                },
                Ok(_) = shutdown_rx.changed() => {
                    // re-checked at the top of the loop
                },
            }
        }

        let mut drained = 0usize;
        while let Ok(effect) = rx.try_recv() {
            dispatcher.execute(effect).await;
            drained += 1;
        }
        if drained > 0 {
            info!("Effect dispatcher drained {} queued effect(s).", drained);
        }
        info!("Effect dispatcher exited.");
    })
}
