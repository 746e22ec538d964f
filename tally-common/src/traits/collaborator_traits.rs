// File: tally-common/src/traits/collaborator_traits.rs
//
// Services owned by other parts of the platform. The engine only calls them
// from the effect dispatcher, never from a primary write path.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Error;
use crate::models::{BadgeId, Notification, NotificationRequest};

#[async_trait]
pub trait BadgeEvaluator: Send + Sync {
    /// Returns whether the badge was newly awarded.
    async fn award_badge_directly(
        &self,
        user_id: Uuid,
        badge_id: BadgeId,
        tenant_id: Option<Uuid>,
        reason: String,
    ) -> Result<bool, Error>;

    /// Re-evaluates every criteria-based badge for the user.
    async fn check_and_award_eligible_badges(&self, user_id: Uuid, tenant_id: Option<Uuid>) -> Result<(), Error>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, request: &NotificationRequest) -> Result<Vec<Notification>, Error>;
}
