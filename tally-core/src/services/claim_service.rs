// File: tally-core/src/services/claim_service.rs

use std::sync::Arc;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;
use tally_common::models::{ActivityStatus, Redemption, RewardActivity};
use tally_common::traits::{RewardActivityRepository, RewardTemplateRepository};

use crate::services::{BadgeBridge, NotificationPublisher};
use crate::Error;

#[derive(Debug, Clone, Default)]
pub struct ClaimRequest {
    pub voucher_code: Option<String>,
    pub note: Option<String>,
    pub issuer_id: Option<Uuid>,
}

/// Redemption handler: earned -> redeemed, voucher issue, claim badge.
pub struct ClaimService {
    reward_repo: Arc<dyn RewardTemplateRepository>,
    activity_repo: Arc<dyn RewardActivityRepository>,
    badges: BadgeBridge,
    notifications: NotificationPublisher,
    voucher_prefix: String,
}

impl ClaimService {
    pub fn new(
        reward_repo: Arc<dyn RewardTemplateRepository>,
        activity_repo: Arc<dyn RewardActivityRepository>,
        badges: BadgeBridge,
        notifications: NotificationPublisher,
        voucher_prefix: String,
    ) -> Self {
        Self {
            reward_repo,
            activity_repo,
            badges,
            notifications,
            voucher_prefix,
        }
    }

    /// Redeems one earned activity of the reward. Any earned task activity
    /// qualifies; one that already passed verification is preferred.
    pub async fn claim_reward(&self, reward_id: Uuid, user_id: Uuid, req: ClaimRequest) -> Result<RewardActivity, Error> {
        let reward = self
            .reward_repo
            .get_reward(reward_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("reward {}", reward_id)))?;

        let activities = self.activity_repo.list_for_user_reward(user_id, reward_id).await?;
        let earned: Vec<&RewardActivity> = activities
            .iter()
            .filter(|a| a.status == ActivityStatus::Earned)
            .collect();
        let candidate = earned
            .iter()
            .find(|a| a.verification.is_satisfied())
            .or(earned.first())
            .copied()
            .ok_or_else(|| Error::NotFound("Reward not ready for redemption".into()))?;

        let redemption = Redemption {
            voucher_code: req.voucher_code,
            note: req.note,
            issuer_id: req.issuer_id,
            voucher_prefix: self.voucher_prefix.clone(),
            at: Utc::now(),
        };
        let redeemed = self.activity_repo.redeem_activity(candidate.activity_id, &redemption).await?;
        info!(
            "User {} claimed reward '{}' (activity {}, voucher {})",
            user_id,
            reward.name,
            redeemed.activity_id,
            redeemed.voucher_code.as_deref().unwrap_or("-")
        );

        self.badges.on_claimed(user_id, redeemed.tenant_id, &reward);
        self.notifications.reward_claimed(&reward, &redeemed);
        Ok(redeemed)
    }
}
