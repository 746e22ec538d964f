// File: tally-core/src/services/reward_service.rs

use std::sync::Arc;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;
use tally_common::models::{ActivityStatus, Page, RewardActivity, RewardQuery, RewardTemplate, UserRewardsSummary};
use tally_common::traits::{RewardActivityRepository, RewardTemplateRepository};

use crate::services::PointsService;
use crate::Error;

/// Reward catalog plus the per-user read models.
pub struct RewardService {
    reward_repo: Arc<dyn RewardTemplateRepository>,
    activity_repo: Arc<dyn RewardActivityRepository>,
    points: Arc<PointsService>,
}

impl RewardService {
    pub fn new(
        reward_repo: Arc<dyn RewardTemplateRepository>,
        activity_repo: Arc<dyn RewardActivityRepository>,
        points: Arc<PointsService>,
    ) -> Self {
        Self {
            reward_repo,
            activity_repo,
            points,
        }
    }

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    pub async fn create_reward(&self, reward: RewardTemplate) -> Result<RewardTemplate, Error> {
        reward.validate()?;
        self.reward_repo.create_reward(&reward).await?;
        info!("Created reward '{}' ({})", reward.name, reward.reward_id);
        Ok(reward)
    }

    pub async fn get_reward(&self, reward_id: Uuid) -> Result<RewardTemplate, Error> {
        self.reward_repo
            .get_reward(reward_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("reward {}", reward_id)))
    }

    pub async fn update_reward(&self, mut reward: RewardTemplate) -> Result<RewardTemplate, Error> {
        reward.validate()?;
        reward.updated_at = Utc::now();
        self.reward_repo.update_reward(&reward).await?;
        Ok(reward)
    }

    /// Deletes the template and every activity recorded against it.
    pub async fn delete_reward(&self, reward_id: Uuid) -> Result<(), Error> {
        let reward = self.get_reward(reward_id).await?;
        let removed = self.activity_repo.delete_for_reward(reward_id).await?;
        self.reward_repo.delete_reward(reward_id).await?;
        info!("Deleted reward '{}' along with {} activities", reward.name, removed);
        Ok(())
    }

    pub async fn list_rewards(&self, query: &RewardQuery) -> Result<Page<RewardTemplate>, Error> {
        if query.per_page == 0 {
            return Err(Error::InvalidInput("per_page must be at least 1".into()));
        }
        self.reward_repo.list_rewards(query).await
    }

    // ------------------------------------------------------------------
    // Per-user views
    // ------------------------------------------------------------------

    pub async fn get_user_activities(&self, user_id: Uuid, tenant_id: Option<Uuid>) -> Result<Vec<RewardActivity>, Error> {
        self.activity_repo.list_for_user(user_id, tenant_id).await
    }

    pub async fn get_user_summary(&self, user_id: Uuid, tenant_id: Option<Uuid>) -> Result<UserRewardsSummary, Error> {
        let activities = self.activity_repo.list_for_user(user_id, tenant_id).await?;
        let mut summary = UserRewardsSummary {
            total_rewards: activities.len() as u64,
            ..Default::default()
        };
        for a in &activities {
            match a.status {
                ActivityStatus::Earned => summary.earned_rewards += 1,
                ActivityStatus::Redeemed => summary.redeemed_rewards += 1,
                ActivityStatus::Pending | ActivityStatus::InProgress => summary.pending_rewards += 1,
            }
        }
        summary.total_points = self.points.get_user_tier_info(user_id).await?.total_points;
        Ok(summary)
    }
}
