// File: tally-core/src/services/points_service.rs

use std::sync::Arc;
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;
use tally_common::models::{PointsChange, UserRewardsState, UserTierInfo};
use tally_common::traits::{RewardActivityRepository, UserRewardsRepository};

use crate::Error;

/// The points ledger plus the tier read path.
pub struct PointsService {
    user_rewards_repo: Arc<dyn UserRewardsRepository>,
    activity_repo: Arc<dyn RewardActivityRepository>,
}

impl PointsService {
    pub fn new(
        user_rewards_repo: Arc<dyn UserRewardsRepository>,
        activity_repo: Arc<dyn RewardActivityRepository>,
    ) -> Self {
        Self {
            user_rewards_repo,
            activity_repo,
        }
    }

    /// Adds `delta` to the user's total (clamped at zero) and recomputes the tier.
    pub async fn update_user_points(&self, user_id: Uuid, delta: i64) -> Result<PointsChange, Error> {
        let change = self.user_rewards_repo.add_points(user_id, delta, Utc::now()).await?;
        debug!(
            "Points for user {}: {} -> {} (delta {})",
            user_id, change.previous.total_points, change.current.total_points, delta
        );
        if change.tier_changed() {
            info!(
                "User {} moved from {} to {} ({} points)",
                user_id, change.previous.current_tier, change.current.current_tier, change.current.total_points
            );
        }
        Ok(change)
    }

    /// Reads the user's tier standing. If the stored total is zero but the
    /// user's credited activities add up to more, the stored state is resynced
    /// from that sum first.
    pub async fn get_user_tier_info(&self, user_id: Uuid) -> Result<UserTierInfo, Error> {
        let mut state = self
            .user_rewards_repo
            .get_state(user_id)
            .await?
            .unwrap_or_else(|| UserRewardsState::new(user_id));

        if state.total_points == 0 {
            let credited = self.activity_repo.sum_credited_points(user_id).await?;
            if credited > state.total_points {
                info!(
                    "Reconciling points for user {}: stored {} but activities sum to {}",
                    user_id, state.total_points, credited
                );
                state = self.user_rewards_repo.set_total(user_id, credited, Utc::now()).await?;
            }
        }

        Ok(UserTierInfo::from(&state))
    }
}
