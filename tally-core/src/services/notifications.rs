// File: tally-core/src/services/notifications.rs

use serde_json::json;
use tracing::warn;
use uuid::Uuid;
use tally_common::models::{NotificationEvent, NotificationRequest, RewardActivity, RewardTemplate};

use crate::eventbus::{EffectQueue, RewardEffect};

/// Builds the engine's notifications and hands them to the effect queue.
/// Nothing here waits on delivery.
#[derive(Clone)]
pub struct NotificationPublisher {
    queue: EffectQueue,
}

impl NotificationPublisher {
    pub fn new(queue: EffectQueue) -> Self {
        Self { queue }
    }

    fn publish(&self, event: NotificationEvent, recipient: Uuid, tenant_id: Option<Uuid>, data: serde_json::Value) {
        let effect = RewardEffect::Notify(NotificationRequest {
            recipients: vec![recipient],
            event,
            tenant_id,
            data,
        });
        if let Err(e) = self.queue.publish(effect) {
            warn!("Notification for user {} not sent: {}", recipient, e);
        }
    }

    /// Sent on the first earn, even while verification is still pending.
    pub fn task_completed(&self, reward: &RewardTemplate, activity: &RewardActivity) {
        let task_title = activity
            .task_id
            .and_then(|id| reward.task(id))
            .map(|t| t.title.clone());
        self.publish(
            NotificationEvent::TaskCompleted,
            activity.user_id,
            activity.tenant_id,
            json!({
                "rewardId": reward.reward_id,
                "rewardName": reward.name,
                "taskId": activity.task_id,
                "taskTitle": task_title,
                "activityId": activity.activity_id,
                "verificationRequired": activity.verification.required,
            }),
        );
    }

    pub fn reward_earned(&self, reward: &RewardTemplate, activity: &RewardActivity, points: i64) {
        self.publish(
            NotificationEvent::RewardEarned,
            activity.user_id,
            activity.tenant_id,
            json!({
                "rewardId": reward.reward_id,
                "rewardName": reward.name,
                "activityId": activity.activity_id,
                "points": points,
            }),
        );
    }

    pub fn reward_claimed(&self, reward: &RewardTemplate, activity: &RewardActivity) {
        self.publish(
            NotificationEvent::RewardClaimed,
            activity.user_id,
            activity.tenant_id,
            json!({
                "rewardId": reward.reward_id,
                "rewardName": reward.name,
                "activityId": activity.activity_id,
                "voucherCode": activity.voucher_code,
            }),
        );
    }
}
