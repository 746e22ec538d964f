use std::collections::BTreeSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::badge::BadgeId;
use crate::models::tier::{tier_info, Tier, TierInfo};

/// A user's standing in the points ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRewardsState {
    pub user_id: Uuid,
    pub total_points: i64,
    pub current_tier: Tier,
    pub tier_points: i64,
    pub badges: BTreeSet<BadgeId>,
    pub last_points_update: Option<DateTime<Utc>>,
}

impl UserRewardsState {
    /// The lazily initialized state of a user who never earned anything.
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            total_points: 0,
            current_tier: Tier::Bronze,
            tier_points: 0,
            badges: BTreeSet::new(),
            last_points_update: None,
        }
    }

    /// Adds `delta` (clamped so the total never goes negative) and recomputes
    /// the tier fields.
    pub fn apply_delta(&mut self, delta: i64, at: DateTime<Utc>) {
        self.set_total(self.total_points.saturating_add(delta), at);
    }

    pub fn set_total(&mut self, total: i64, at: DateTime<Utc>) {
        self.total_points = total.max(0);
        let info = tier_info(self.total_points);
        self.current_tier = info.current_tier;
        self.tier_points = info.tier_points;
        self.last_points_update = Some(at);
    }

    pub fn tier_info(&self) -> TierInfo {
        tier_info(self.total_points)
    }
}

/// Result of one ledger write.
#[derive(Debug, Clone)]
pub struct PointsChange {
    pub previous: UserRewardsState,
    pub current: UserRewardsState,
}

impl PointsChange {
    pub fn tier_changed(&self) -> bool {
        self.previous.current_tier != self.current.current_tier
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTierInfo {
    pub user_id: Uuid,
    pub total_points: i64,
    #[serde(flatten)]
    pub tier: TierInfo,
    pub badges: BTreeSet<BadgeId>,
    pub last_points_update: Option<DateTime<Utc>>,
}

impl From<&UserRewardsState> for UserTierInfo {
    fn from(state: &UserRewardsState) -> Self {
        Self {
            user_id: state.user_id,
            total_points: state.total_points,
            tier: state.tier_info(),
            badges: state.badges.clone(),
            last_points_update: state.last_points_update,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRewardsSummary {
    pub total_rewards: u64,
    pub earned_rewards: u64,
    pub redeemed_rewards: u64,
    /// Pending and in-progress activities.
    pub pending_rewards: u64,
    pub total_points: i64,
}
