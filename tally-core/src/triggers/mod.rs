// File: tally-core/src/triggers/mod.rs
//
// Integration triggers: translate engagement events from other features into
// task progress. `TriggerRegistry::dispatch` never fails; every tracking
// error is logged so the feature that emitted the event is unaffected.

pub mod handler;
pub mod handlers;

use std::collections::HashMap;
use std::sync::Arc;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use tally_common::models::{EngagementEvent, RewardQuery, RewardTemplate};
use tally_common::traits::RewardTemplateRepository;

use crate::services::{ProgressContext, ProgressRequest, ProgressService};
use crate::Error;

pub use handler::EngagementHandler;
pub use handlers::register_builtin_handlers;

/// What one dispatched event did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TriggerReport {
    /// Automated tasks that matched the event.
    pub matched: u32,
    /// Progress calls that succeeded.
    pub recorded: u32,
    /// Progress calls that failed (logged).
    pub failed: u32,
}

pub struct TriggerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn EngagementHandler>>>,
    reward_repo: Arc<dyn RewardTemplateRepository>,
    tracker: Arc<ProgressService>,
    enforce_schedule: bool,
    page_size: u32,
}

impl TriggerRegistry {
    pub fn new(
        reward_repo: Arc<dyn RewardTemplateRepository>,
        tracker: Arc<ProgressService>,
        enforce_schedule: bool,
        page_size: u32,
    ) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            reward_repo,
            tracker,
            enforce_schedule,
            page_size: page_size.max(1),
        }
    }

    pub async fn register(&self, handler: Arc<dyn EngagementHandler>) -> Result<(), Error> {
        let handler_id = handler.id().to_string();
        let mut map = self.handlers.write().await;
        if map.contains_key(&handler_id) {
            return Err(Error::InvalidInput(format!(
                "Handler with ID '{}' already registered",
                handler_id
            )));
        }
        info!("Registering engagement handler '{}' for '{}'", handler_id, handler.action_type());
        map.insert(handler_id, handler);
        Ok(())
    }

    pub async fn handler_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.handlers.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn dispatch(&self, event: &EngagementEvent) -> TriggerReport {
        let mut report = TriggerReport::default();

        let accepting: Vec<Arc<dyn EngagementHandler>> = {
            let map = self.handlers.read().await;
            let mut list: Vec<_> = map.values().filter(|h| h.accepts(event)).cloned().collect();
            list.sort_by(|a, b| a.id().cmp(b.id()));
            list
        };
        if accepting.is_empty() {
            debug!("No engagement handler accepts {} event for user {}", event.action_type(), event.user_id());
            return report;
        }

        let rewards = match self.load_active_rewards(event).await {
            Ok(r) => r,
            Err(e) => {
                error!("Could not load rewards for {} event of user {}: {:?}", event.action_type(), event.user_id(), e);
                return report;
            }
        };

        for handler in &accepting {
            for reward in &rewards {
                for task in reward.tasks.iter().filter(|t| t.is_automated && handler.matches(t)) {
                    report.matched += 1;

                    let mut metadata = Map::new();
                    metadata.insert("lastSource".into(), json!(handler.id()));
                    let req = ProgressRequest {
                        reward_id: reward.reward_id,
                        task_id: Some(task.task_id),
                        amount: handler.amount(event, task),
                        user_id: event.user_id(),
                        tenant_id: event.tenant_id(),
                        context: ProgressContext {
                            requires_verification: false,
                            note: Some(handler.note(event)),
                            metadata,
                        },
                    };

                    match self.tracker.record_progress(&req).await {
                        Ok(_) => report.recorded += 1,
                        Err(e) => {
                            report.failed += 1;
                            warn!(
                                "Handler '{}' failed to record progress on reward '{}' task '{}' for user {}: {:?}",
                                handler.id(), reward.name, task.title, event.user_id(), e
                            );
                        }
                    }
                }
            }
        }

        debug!("{} event for user {} => {:?}", event.action_type(), event.user_id(), report);
        report
    }

    /// Every active reward in the event's tenant scope, walking all pages.
    async fn load_active_rewards(&self, event: &EngagementEvent) -> Result<Vec<RewardTemplate>, Error> {
        let mut query = RewardQuery {
            tenant_id: event.tenant_id(),
            active_only: true,
            visible_at: self.enforce_schedule.then(Utc::now),
            page: 1,
            per_page: self.page_size,
        };

        let mut rewards = Vec::new();
        loop {
            let page = self.reward_repo.list_rewards(&query).await?;
            let more = page.has_more() && !page.items.is_empty();
            // an event without a tenant only reaches global rewards
            rewards.extend(page.items.into_iter().filter(|r| r.is_in_scope(query.tenant_id)));
            if !more {
                break;
            }
            query.page += 1;
        }
        Ok(rewards)
    }
}
