// File: tally-core/src/services/badge_bridge.rs
//
// Hands badge work to the effect dispatcher. Badge references were already
// normalized to `BadgeId` when the template was loaded, so an unresolvable
// reference simply shows up as `None` here and is skipped.

use tracing::{debug, warn};
use uuid::Uuid;
use tally_common::models::{BadgeId, RewardTemplate, Task};

use crate::eventbus::{BadgeAward, EffectQueue, RewardEffect};

#[derive(Clone)]
pub struct BadgeBridge {
    queue: EffectQueue,
}

impl BadgeBridge {
    pub fn new(queue: EffectQueue) -> Self {
        Self { queue }
    }

    /// Direct awards for the task and reward badges, followed by a full
    /// re-evaluation of criteria-based badges.
    pub fn on_earned(&self, user_id: Uuid, tenant_id: Option<Uuid>, reward: &RewardTemplate, task: Option<&Task>) {
        let mut badge_ids: Vec<BadgeId> = Vec::new();
        for id in [task.and_then(|t| t.badge_id), reward.badge_id].into_iter().flatten() {
            if !badge_ids.contains(&id) {
                badge_ids.push(id);
            }
        }

        let reason = match task {
            Some(t) => format!("Completed task '{}' of reward '{}'", t.title, reward.name),
            None => format!("Earned reward '{}'", reward.name),
        };
        let effect = RewardEffect::AwardBadges(BadgeAward {
            user_id,
            tenant_id,
            badge_ids,
            reason,
            reevaluate: true,
        });
        if let Err(e) = self.queue.publish(effect) {
            warn!("Badge evaluation for user {} skipped: {}", user_id, e);
        }
    }

    /// Direct award of the reward's own badge on claim, if it has one.
    pub fn on_claimed(&self, user_id: Uuid, tenant_id: Option<Uuid>, reward: &RewardTemplate) {
        let Some(badge_id) = reward.claim_badge() else {
            debug!("Reward '{}' has no badge to hand out on claim", reward.name);
            return;
        };
        let effect = RewardEffect::AwardBadges(BadgeAward {
            user_id,
            tenant_id,
            badge_ids: vec![badge_id],
            reason: format!("Claimed reward '{}'", reward.name),
            reevaluate: false,
        });
        if let Err(e) = self.queue.publish(effect) {
            warn!("Claim badge {} for user {} skipped: {}", badge_id, user_id, e);
        }
    }
}
