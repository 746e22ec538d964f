// File: tally-core/src/services/verification_service.rs

use std::sync::Arc;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;
use tally_common::models::{RewardActivity, VerificationDecision, VerificationResolution};
use tally_common::traits::{RewardActivityRepository, RewardTemplateRepository};

use crate::services::RewardPayout;
use crate::Error;

/// Staff side of the verification gate.
pub struct VerificationService {
    reward_repo: Arc<dyn RewardTemplateRepository>,
    activity_repo: Arc<dyn RewardActivityRepository>,
    payout: Arc<RewardPayout>,
}

impl VerificationService {
    pub fn new(
        reward_repo: Arc<dyn RewardTemplateRepository>,
        activity_repo: Arc<dyn RewardActivityRepository>,
        payout: Arc<RewardPayout>,
    ) -> Self {
        Self {
            reward_repo,
            activity_repo,
            payout,
        }
    }

    pub async fn approve_verification(
        &self,
        activity_id: Uuid,
        reviewer_id: Option<Uuid>,
        note: Option<String>,
    ) -> Result<RewardActivity, Error> {
        self.resolve(activity_id, VerificationDecision::Approve, reviewer_id, note).await
    }

    pub async fn reject_verification(
        &self,
        activity_id: Uuid,
        reviewer_id: Option<Uuid>,
        note: Option<String>,
    ) -> Result<RewardActivity, Error> {
        self.resolve(activity_id, VerificationDecision::Reject, reviewer_id, note).await
    }

    async fn resolve(
        &self,
        activity_id: Uuid,
        decision: VerificationDecision,
        reviewer_id: Option<Uuid>,
        note: Option<String>,
    ) -> Result<RewardActivity, Error> {
        let resolution = VerificationResolution {
            decision,
            reviewer_id,
            note,
            at: Utc::now(),
        };
        let outcome = self.activity_repo.resolve_verification(activity_id, &resolution).await?;
        let mut activity = outcome.activity;

        if outcome.transition.changed {
            info!(
                "Verification of activity {} for user {} is now {}",
                activity.activity_id, activity.user_id, activity.verification.status
            );
        }

        if let Some(points) = outcome.transition.credit_points {
            let reward = self
                .reward_repo
                .get_reward(activity.reward_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("reward {}", activity.reward_id)))?;
            if self.payout.credit(&reward, &activity, points).await? {
                activity.points_credited = true;
            }
        }

        Ok(activity)
    }
}
