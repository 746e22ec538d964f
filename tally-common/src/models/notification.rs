use std::fmt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationEvent {
    #[serde(rename = "task.completed")]
    TaskCompleted,
    #[serde(rename = "reward.earned")]
    RewardEarned,
    #[serde(rename = "reward.claimed")]
    RewardClaimed,
}

impl NotificationEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationEvent::TaskCompleted => "task.completed",
            NotificationEvent::RewardEarned => "reward.earned",
            NotificationEvent::RewardClaimed => "reward.claimed",
        }
    }
}

impl fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub recipients: Vec<Uuid>,
    pub event: NotificationEvent,
    pub tenant_id: Option<Uuid>,
    pub data: serde_json::Value,
}

/// A notification as recorded by the delivery service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub notification_id: Uuid,
    pub recipient: Uuid,
    pub event: NotificationEvent,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
