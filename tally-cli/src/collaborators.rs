//! tally-cli/src/collaborators.rs
//!
//! Stand-ins for the badge and notification services when the engine runs
//! from the command line: both just log what they were asked to do.

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;
use tally_common::models::{BadgeId, Notification, NotificationRequest};
use tally_common::traits::{BadgeEvaluator, Notifier};
use tally_core::Error;

pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn send(&self, request: &NotificationRequest) -> Result<Vec<Notification>, Error> {
        info!(
            "notify [{}] -> {} recipient(s): {}",
            request.event,
            request.recipients.len(),
            request.data
        );
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

pub struct LoggingBadgeEvaluator;

#[async_trait]
impl BadgeEvaluator for LoggingBadgeEvaluator {
    async fn award_badge_directly(
        &self,
        user_id: Uuid,
        badge_id: BadgeId,
        tenant_id: Option<Uuid>,
        reason: String,
    ) -> Result<bool, Error> {
        info!("award badge {} to user {} (tenant={:?}): {}", badge_id, user_id, tenant_id, reason);
        Ok(true)
    }

    async fn check_and_award_eligible_badges(&self, user_id: Uuid, tenant_id: Option<Uuid>) -> Result<(), Error> {
        info!("re-evaluate badges for user {} (tenant={:?})", user_id, tenant_id);
        Ok(())
    }
}
