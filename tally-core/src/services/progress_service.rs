// File: tally-core/src/services/progress_service.rs

use std::sync::Arc;
use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;
use tally_common::models::{ActivityKey, ProgressOutcome, ProgressUpdate, RewardTemplate, Task};
use tally_common::traits::{RewardActivityRepository, RewardTemplateRepository};

use crate::services::{NotificationPublisher, RewardPayout};
use crate::Error;

/// Caller-supplied context of a progress call.
#[derive(Debug, Clone, Default)]
pub struct ProgressContext {
    /// Forces manual verification even if the task does not ask for it.
    pub requires_verification: bool,
    pub note: Option<String>,
    /// Merged into the activity's metadata snapshot.
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct ProgressRequest {
    pub reward_id: Uuid,
    pub task_id: Option<Uuid>,
    pub amount: f64,
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub context: ProgressContext,
}

impl ProgressRequest {
    pub fn new(reward_id: Uuid, task_id: Option<Uuid>, amount: f64, user_id: Uuid, tenant_id: Option<Uuid>) -> Self {
        Self {
            reward_id,
            task_id,
            amount,
            user_id,
            tenant_id,
            context: ProgressContext::default(),
        }
    }
}

/// The task progress tracker.
pub struct ProgressService {
    reward_repo: Arc<dyn RewardTemplateRepository>,
    activity_repo: Arc<dyn RewardActivityRepository>,
    payout: Arc<RewardPayout>,
    notifications: NotificationPublisher,
    require_explicit_task: bool,
}

impl ProgressService {
    pub fn new(
        reward_repo: Arc<dyn RewardTemplateRepository>,
        activity_repo: Arc<dyn RewardActivityRepository>,
        payout: Arc<RewardPayout>,
        notifications: NotificationPublisher,
        require_explicit_task: bool,
    ) -> Self {
        Self {
            reward_repo,
            activity_repo,
            payout,
            notifications,
            require_explicit_task,
        }
    }

    /// Applies one progress step. In the returned outcome `credit_points` is
    /// set only when this call paid the points out.
    pub async fn record_progress(&self, req: &ProgressRequest) -> Result<ProgressOutcome, Error> {
        if !req.amount.is_finite() || req.amount < 0.0 {
            return Err(Error::InvalidInput(format!(
                "progress amount must be a non-negative number (got {})",
                req.amount
            )));
        }

        let reward = self
            .reward_repo
            .get_reward(req.reward_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("reward {}", req.reward_id)))?;

        let task = self.resolve_task(&reward, req.task_id)?;
        let progress_target = task
            .and_then(|t| t.target_value)
            .or_else(|| reward.first_task().and_then(|t| t.target_value))
            .unwrap_or(if reward.points > 0 { 1.0 } else { 0.0 });
        let requires_verification =
            task.is_some_and(|t| t.requires_verification()) || req.context.requires_verification;
        let points_awarded = task.and_then(|t| t.points).unwrap_or(reward.points);

        let update = ProgressUpdate {
            key: ActivityKey {
                user_id: req.user_id,
                reward_id: reward.reward_id,
                task_id: task.map(|t| t.task_id),
            },
            tenant_id: req.tenant_id,
            amount: req.amount,
            progress_target,
            points_awarded,
            requires_verification,
            note: req.context.note.clone(),
            metadata: req.context.metadata.clone(),
            at: Utc::now(),
        };

        let mut outcome = self.activity_repo.apply_progress(&update).await?;
        let activity = &outcome.activity;
        debug!(
            "Progress for user {} on reward '{}': {}/{} ({})",
            req.user_id, reward.name, activity.progress_value, activity.progress_target, activity.status
        );

        if outcome.transition.just_earned {
            info!(
                "User {} earned reward '{}' (activity {}, verification required: {})",
                req.user_id, reward.name, activity.activity_id, activity.verification.required
            );
            self.notifications.task_completed(&reward, activity);
        }
        if let Some(points) = outcome.transition.credit_points {
            if !outcome.transition.just_earned {
                debug!("Retrying the unpaid credit of activity {}", activity.activity_id);
            }
            if self.payout.credit(&reward, activity, points).await? {
                outcome.activity.points_credited = true;
            } else {
                outcome.transition.credit_points = None;
            }
        }

        Ok(outcome)
    }

    fn resolve_task<'a>(&self, reward: &'a RewardTemplate, task_id: Option<Uuid>) -> Result<Option<&'a Task>, Error> {
        if let Some(id) = task_id {
            return reward
                .task(id)
                .map(Some)
                .ok_or_else(|| Error::NotFound(format!("task {} on reward {}", id, reward.reward_id)));
        }

        if reward.tasks.len() > 1 {
            if self.require_explicit_task {
                return Err(Error::InvalidInput(format!(
                    "reward '{}' has {} tasks; a task id is required",
                    reward.name,
                    reward.tasks.len()
                )));
            }
            warn!(
                "No task id given for reward '{}' with {} tasks; falling back to the first task",
                reward.name,
                reward.tasks.len()
            );
        }
        Ok(reward.first_task())
    }
}
