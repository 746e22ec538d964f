// File: tally-core/src/services/payout.rs

use std::sync::Arc;
use chrono::Utc;
use tracing::{debug, error, info, warn};
use tally_common::models::{RewardActivity, RewardTemplate};
use tally_common::traits::RewardActivityRepository;

use crate::services::{BadgeBridge, NotificationPublisher, PointsService};
use crate::Error;

/// What happens once an earned activity's points are released: ledger
/// credit, badge bridge, and the "reward.earned" notification.
///
/// The activity's `points_credited` flag is claimed first, so concurrent
/// callers that all see the points as owed pay them out once. A failed
/// ledger write releases the claim again and the next progress step or
/// approval on that activity retries the payout.
pub struct RewardPayout {
    activity_repo: Arc<dyn RewardActivityRepository>,
    points: Arc<PointsService>,
    badges: BadgeBridge,
    notifications: NotificationPublisher,
}

impl RewardPayout {
    pub fn new(
        activity_repo: Arc<dyn RewardActivityRepository>,
        points: Arc<PointsService>,
        badges: BadgeBridge,
        notifications: NotificationPublisher,
    ) -> Self {
        Self {
            activity_repo,
            points,
            badges,
            notifications,
        }
    }

    /// Returns false if another call already credited this activity.
    pub async fn credit(&self, reward: &RewardTemplate, activity: &RewardActivity, points: i64) -> Result<bool, Error> {
        if !self.activity_repo.claim_credit(activity.activity_id, Utc::now()).await? {
            debug!("Points of activity {} were already credited", activity.activity_id);
            return Ok(false);
        }

        info!(
            "Crediting {} points to user {} for reward '{}' (activity {})",
            points, activity.user_id, reward.name, activity.activity_id
        );
        if let Err(e) = self.points.update_user_points(activity.user_id, points).await {
            warn!(
                "Ledger write for activity {} failed ({}); releasing its credit for a retry",
                activity.activity_id, e
            );
            if let Err(release_err) = self.activity_repo.release_credit(activity.activity_id, Utc::now()).await {
                error!(
                    "Could not release the credit of activity {}: {}",
                    activity.activity_id, release_err
                );
            }
            return Err(e);
        }

        let task = activity.task_id.and_then(|id| reward.task(id));
        self.badges.on_earned(activity.user_id, activity.tenant_id, reward, task);
        self.notifications.reward_earned(reward, activity, points);
        Ok(true)
    }
}
