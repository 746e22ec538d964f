// File: tally-core/tests/test_utils/mod.rs
#![allow(dead_code)]

use std::sync::Arc;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;
use tally_common::models::{
    BadgeId, Notification, NotificationEvent, NotificationRequest, RewardTemplate, Task,
};
use tally_common::traits::{BadgeEvaluator, Notifier};
use tally_core::{EngineConfig, Error, Repositories, RewardEngine};

/// Notifier that remembers every request.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<NotificationRequest>>,
}

impl RecordingNotifier {
    pub async fn count(&self, event: NotificationEvent) -> usize {
        self.sent.lock().await.iter().filter(|r| r.event == event).count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, request: &NotificationRequest) -> Result<Vec<Notification>, Error> {
        self.sent.lock().await.push(request.clone());
        Ok(request
            .recipients
            .iter()
            .map(|r| Notification {
                notification_id: Uuid::new_v4(),
                recipient: *r,
                event: request.event,
                data: request.data.clone(),
                created_at: Utc::now(),
            })
            .collect())
    }
}

/// Badge evaluator that remembers direct awards and re-evaluations. Set
/// `fail` to make every call error.
#[derive(Default)]
pub struct RecordingBadgeEvaluator {
    pub direct: Mutex<Vec<(Uuid, BadgeId)>>,
    pub reevaluations: Mutex<Vec<Uuid>>,
    pub fail: bool,
}

impl RecordingBadgeEvaluator {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl BadgeEvaluator for RecordingBadgeEvaluator {
    async fn award_badge_directly(
        &self,
        user_id: Uuid,
        badge_id: BadgeId,
        _tenant_id: Option<Uuid>,
        _reason: String,
    ) -> Result<bool, Error> {
        if self.fail {
            return Err(Error::Collaborator("badge service unavailable".into()));
        }
        let mut direct = self.direct.lock().await;
        if direct.contains(&(user_id, badge_id)) {
            return Ok(false);
        }
        direct.push((user_id, badge_id));
        Ok(true)
    }

    async fn check_and_award_eligible_badges(&self, user_id: Uuid, _tenant_id: Option<Uuid>) -> Result<(), Error> {
        if self.fail {
            return Err(Error::Collaborator("badge service unavailable".into()));
        }
        self.reevaluations.lock().await.push(user_id);
        Ok(())
    }
}

/// An in-memory engine with its dispatcher running against recording fakes.
pub struct TestEngine {
    pub engine: RewardEngine,
    pub repos: Repositories,
    pub notifier: Arc<RecordingNotifier>,
    pub badges: Arc<RecordingBadgeEvaluator>,
    dispatcher: JoinHandle<()>,
}

impl TestEngine {
    pub async fn start() -> Result<Self, Error> {
        Self::start_with(EngineConfig::default(), RecordingBadgeEvaluator::default()).await
    }

    pub async fn start_with(config: EngineConfig, badges: RecordingBadgeEvaluator) -> Result<Self, Error> {
        Self::start_on(Repositories::in_memory(), config, badges).await
    }

    pub async fn start_on(
        repos: Repositories,
        config: EngineConfig,
        badges: RecordingBadgeEvaluator,
    ) -> Result<Self, Error> {
        let (engine, rx) = RewardEngine::new(repos.clone(), &config).await?;
        let notifier = Arc::new(RecordingNotifier::default());
        let badges = Arc::new(badges);
        let dispatcher = engine.start_dispatcher(rx, notifier.clone(), badges.clone());
        Ok(Self {
            engine,
            repos,
            notifier,
            badges,
            dispatcher,
        })
    }

    /// Stops the dispatcher after it has executed every queued effect.
    pub async fn finish(self) -> (Arc<RecordingNotifier>, Arc<RecordingBadgeEvaluator>, Repositories) {
        self.engine.shutdown();
        self.dispatcher.await.expect("dispatcher panicked");
        (self.notifier, self.badges, self.repos)
    }
}

/// One automated task with the given target; reward worth `points`.
pub fn single_task_reward(name: &str, target: f64, points: i64) -> RewardTemplate {
    let task = Task::new(&format!("{} task", name), None, target);
    RewardTemplate::new(name, points, vec![task], None)
}

pub fn verified_task_reward(name: &str, target: f64, points: i64) -> RewardTemplate {
    let mut reward = single_task_reward(name, target, points);
    reward.tasks[0]
        .metadata
        .insert("requiresVerification".into(), Value::Bool(true));
    reward
}
