use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Error;
use crate::models::{
    ActivityKey, BadgeId, Page, PointsChange, ProgressOutcome, ProgressUpdate, Redemption,
    RewardActivity, RewardQuery, RewardTemplate, UserRewardsState, VerificationOutcome,
    VerificationResolution,
};

#[async_trait]
pub trait RewardTemplateRepository: Send + Sync {
    async fn create_reward(&self, reward: &RewardTemplate) -> Result<(), Error>;
    async fn get_reward(&self, reward_id: Uuid) -> Result<Option<RewardTemplate>, Error>;
    async fn update_reward(&self, reward: &RewardTemplate) -> Result<(), Error>;
    /// Removes the template; its activities go with it.
    async fn delete_reward(&self, reward_id: Uuid) -> Result<(), Error>;
    /// Applies tenant scope, the active filter, and the optional visibility
    /// window, then paginates.
    async fn list_rewards(&self, query: &RewardQuery) -> Result<Page<RewardTemplate>, Error>;
}

/// Storage of per-user progress records.
///
/// Every mutating method is atomic per activity: implementations must
/// serialize concurrent calls for the same key (row lock, shard lock, ...)
/// and apply the transition methods of [`RewardActivity`] inside that
/// critical section.
#[async_trait]
pub trait RewardActivityRepository: Send + Sync {
    /// Find-or-create the activity for `update.key` and apply one progress step.
    async fn apply_progress(&self, update: &ProgressUpdate) -> Result<ProgressOutcome, Error>;

    async fn get_activity(&self, activity_id: Uuid) -> Result<Option<RewardActivity>, Error>;
    async fn find_activity(&self, key: &ActivityKey) -> Result<Option<RewardActivity>, Error>;

    async fn list_for_user_reward(&self, user_id: Uuid, reward_id: Uuid) -> Result<Vec<RewardActivity>, Error>;

    /// Newest first. `tenant_id = None` lists every tenant.
    async fn list_for_user(&self, user_id: Uuid, tenant_id: Option<Uuid>) -> Result<Vec<RewardActivity>, Error>;

    async fn redeem_activity(&self, activity_id: Uuid, redemption: &Redemption) -> Result<RewardActivity, Error>;

    async fn resolve_verification(
        &self,
        activity_id: Uuid,
        resolution: &VerificationResolution,
    ) -> Result<VerificationOutcome, Error>;

    /// Sets `points_credited` if it is still clear. `Ok(true)` means this call
    /// won the credit and the caller must write the ledger next.
    async fn claim_credit(&self, activity_id: Uuid, at: DateTime<Utc>) -> Result<bool, Error>;

    /// Clears a claim whose ledger write failed, so a later call can retry it.
    async fn release_credit(&self, activity_id: Uuid, at: DateTime<Utc>) -> Result<(), Error>;

    /// Sum of `points_awarded` over completed activities whose points were credited.
    async fn sum_credited_points(&self, user_id: Uuid) -> Result<i64, Error>;

    async fn delete_for_reward(&self, reward_id: Uuid) -> Result<u64, Error>;
}

/// The points ledger. Writes are atomic per user.
#[async_trait]
pub trait UserRewardsRepository: Send + Sync {
    async fn get_state(&self, user_id: Uuid) -> Result<Option<UserRewardsState>, Error>;

    /// Initializes the state if missing, adds `delta` (never below zero) and
    /// recomputes the tier.
    async fn add_points(&self, user_id: Uuid, delta: i64, at: DateTime<Utc>) -> Result<PointsChange, Error>;

    /// Overwrites the total; used by reconciliation.
    async fn set_total(&self, user_id: Uuid, total: i64, at: DateTime<Utc>) -> Result<UserRewardsState, Error>;

    /// Returns false if the user already held the badge.
    async fn add_badge(&self, user_id: Uuid, badge_id: BadgeId) -> Result<bool, Error>;
}
