// File: tally-core/src/engine.rs
//
// Wires repositories, services, triggers and the effect queue together and
// exposes the engine's operations in one place.

use std::sync::Arc;
use sqlx::{Pool, Postgres};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;
use tally_common::models::{
    EngagementEvent, Page, ProgressOutcome, RewardActivity, RewardQuery, RewardTemplate,
    UserRewardsSummary, UserTierInfo,
};
use tally_common::traits::{
    BadgeEvaluator, Notifier, RewardActivityRepository, RewardTemplateRepository,
    UserRewardsRepository,
};

use crate::config::EngineConfig;
use crate::eventbus::dispatcher::{spawn_effect_dispatcher, EffectDispatcher};
use crate::eventbus::{EffectQueue, RewardEffect};
use crate::repositories::{
    InMemoryRewardActivityRepository, InMemoryRewardTemplateRepository,
    InMemoryUserRewardsRepository, PostgresRewardActivityRepository,
    PostgresRewardTemplateRepository, PostgresUserRewardsRepository,
};
use crate::services::{
    BadgeBridge, ClaimRequest, ClaimService, NotificationPublisher, PointsService, ProgressRequest,
    ProgressService, RewardPayout, RewardService, VerificationService,
};
use crate::triggers::{register_builtin_handlers, TriggerRegistry, TriggerReport};
use crate::Error;

/// The three stores the engine runs on.
#[derive(Clone)]
pub struct Repositories {
    pub rewards: Arc<dyn RewardTemplateRepository>,
    pub activities: Arc<dyn RewardActivityRepository>,
    pub user_rewards: Arc<dyn UserRewardsRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            rewards: Arc::new(InMemoryRewardTemplateRepository::new()),
            activities: Arc::new(InMemoryRewardActivityRepository::new()),
            user_rewards: Arc::new(InMemoryUserRewardsRepository::new()),
        }
    }

    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            rewards: Arc::new(PostgresRewardTemplateRepository::new(pool.clone())),
            activities: Arc::new(PostgresRewardActivityRepository::new(pool.clone())),
            user_rewards: Arc::new(PostgresUserRewardsRepository::new(pool)),
        }
    }
}

pub struct RewardEngine {
    repos: Repositories,
    queue: EffectQueue,
    points: Arc<PointsService>,
    tracker: Arc<ProgressService>,
    verification: VerificationService,
    claims: ClaimService,
    catalog: RewardService,
    triggers: TriggerRegistry,
}

impl RewardEngine {
    /// Builds the engine with the built-in triggers registered. The returned
    /// receiver is the other end of the effect queue; hand it to
    /// [`RewardEngine::start_dispatcher`].
    pub async fn new(
        repos: Repositories,
        config: &EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<RewardEffect>), Error> {
        config.validate()?;
        let (queue, rx) = EffectQueue::new(config.effect_queue_capacity);

        let badges = BadgeBridge::new(queue.clone());
        let notifications = NotificationPublisher::new(queue.clone());
        let points = Arc::new(PointsService::new(
            repos.user_rewards.clone(),
            repos.activities.clone(),
        ));
        let payout = Arc::new(RewardPayout::new(
            repos.activities.clone(),
            points.clone(),
            badges.clone(),
            notifications.clone(),
        ));
        let tracker = Arc::new(ProgressService::new(
            repos.rewards.clone(),
            repos.activities.clone(),
            payout.clone(),
            notifications.clone(),
            config.require_explicit_task,
        ));
        let verification = VerificationService::new(repos.rewards.clone(), repos.activities.clone(), payout);
        let claims = ClaimService::new(
            repos.rewards.clone(),
            repos.activities.clone(),
            badges,
            notifications,
            config.voucher_prefix.clone(),
        );
        let catalog = RewardService::new(repos.rewards.clone(), repos.activities.clone(), points.clone());

        let triggers = TriggerRegistry::new(
            repos.rewards.clone(),
            tracker.clone(),
            config.enforce_schedule,
            config.trigger_page_size,
        );
        register_builtin_handlers(&triggers).await?;

        let engine = Self {
            repos,
            queue,
            points,
            tracker,
            verification,
            claims,
            catalog,
            triggers,
        };
        Ok((engine, rx))
    }

    /// Spawns the task that executes badge and notification effects.
    pub fn start_dispatcher(
        &self,
        rx: mpsc::Receiver<RewardEffect>,
        notifier: Arc<dyn Notifier>,
        badge_evaluator: Arc<dyn BadgeEvaluator>,
    ) -> JoinHandle<()> {
        let dispatcher = Arc::new(EffectDispatcher::new(
            notifier,
            badge_evaluator,
            self.repos.user_rewards.clone(),
        ));
        spawn_effect_dispatcher(&self.queue, rx, dispatcher)
    }

    /// Signals the dispatcher to drain what is queued and exit.
    pub fn shutdown(&self) {
        info!("Reward engine shutting down.");
        self.queue.shutdown();
    }

    pub fn repositories(&self) -> &Repositories {
        &self.repos
    }

    pub fn triggers(&self) -> &TriggerRegistry {
        &self.triggers
    }

    // ------------------------------------------------------------------
    // Exposed operations
    // ------------------------------------------------------------------

    pub async fn record_task_progress(&self, req: &ProgressRequest) -> Result<ProgressOutcome, Error> {
        self.tracker.record_progress(req).await
    }

    pub async fn claim_reward(&self, reward_id: Uuid, user_id: Uuid, req: ClaimRequest) -> Result<RewardActivity, Error> {
        self.claims.claim_reward(reward_id, user_id, req).await
    }

    pub async fn approve_verification(
        &self,
        activity_id: Uuid,
        reviewer_id: Option<Uuid>,
        note: Option<String>,
    ) -> Result<RewardActivity, Error> {
        self.verification.approve_verification(activity_id, reviewer_id, note).await
    }

    pub async fn reject_verification(
        &self,
        activity_id: Uuid,
        reviewer_id: Option<Uuid>,
        note: Option<String>,
    ) -> Result<RewardActivity, Error> {
        self.verification.reject_verification(activity_id, reviewer_id, note).await
    }

    pub async fn update_user_points(&self, user_id: Uuid, delta: i64) -> Result<UserTierInfo, Error> {
        let change = self.points.update_user_points(user_id, delta).await?;
        Ok(UserTierInfo::from(&change.current))
    }

    pub async fn get_user_tier_info(&self, user_id: Uuid) -> Result<UserTierInfo, Error> {
        self.points.get_user_tier_info(user_id).await
    }

    pub async fn get_user_summary(&self, user_id: Uuid, tenant_id: Option<Uuid>) -> Result<UserRewardsSummary, Error> {
        self.catalog.get_user_summary(user_id, tenant_id).await
    }

    pub async fn get_user_activities(&self, user_id: Uuid, tenant_id: Option<Uuid>) -> Result<Vec<RewardActivity>, Error> {
        self.catalog.get_user_activities(user_id, tenant_id).await
    }

    /// Feeds an engagement event through the triggers. Never fails.
    pub async fn handle_event(&self, event: &EngagementEvent) -> TriggerReport {
        self.triggers.dispatch(event).await
    }

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    pub async fn create_reward(&self, reward: RewardTemplate) -> Result<RewardTemplate, Error> {
        self.catalog.create_reward(reward).await
    }

    pub async fn get_reward(&self, reward_id: Uuid) -> Result<RewardTemplate, Error> {
        self.catalog.get_reward(reward_id).await
    }

    pub async fn update_reward(&self, reward: RewardTemplate) -> Result<RewardTemplate, Error> {
        self.catalog.update_reward(reward).await
    }

    pub async fn delete_reward(&self, reward_id: Uuid) -> Result<(), Error> {
        self.catalog.delete_reward(reward_id).await
    }

    pub async fn list_rewards(&self, query: &RewardQuery) -> Result<Page<RewardTemplate>, Error> {
        self.catalog.list_rewards(query).await
    }
}
