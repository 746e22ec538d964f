// File: tally-common/src/models/reward.rs

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::Error;
use crate::models::badge::{deserialize_badge_ref, BadgeId};

/// What kind of action a task counts. Unknown strings are preserved in `Other`
/// so templates authored against newer feature sets still load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionType {
    CommunityPost,
    EventAttendance,
    Donation,
    JobPost,
    Mentorship,
    CommunityJoin,
    ProfileCompletion,
    Other(String),
}

impl ActionType {
    pub fn as_str(&self) -> &str {
        match self {
            ActionType::CommunityPost => "community_post",
            ActionType::EventAttendance => "event_attendance",
            ActionType::Donation => "donation",
            ActionType::JobPost => "job_post",
            ActionType::Mentorship => "mentorship",
            ActionType::CommunityJoin => "community_join",
            ActionType::ProfileCompletion => "profile_completion",
            ActionType::Other(s) => s.as_str(),
        }
    }
}

impl From<String> for ActionType {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "community_post" | "post" | "create_post" => ActionType::CommunityPost,
            "event_attendance" | "event_rsvp" | "attend_event" | "rsvp" => ActionType::EventAttendance,
            "donation" | "donate" => ActionType::Donation,
            "job_post" | "post_job" => ActionType::JobPost,
            "mentorship" | "mentorship_session" | "mentor" => ActionType::Mentorship,
            "community_join" | "join_community" => ActionType::CommunityJoin,
            "profile_completion" | "complete_profile" | "profile_complete" => ActionType::ProfileCompletion,
            _ => ActionType::Other(s),
        }
    }
}

impl From<ActionType> for String {
    fn from(a: ActionType) -> Self {
        a.as_str().to_string()
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a task's progress is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Count,
    Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardKind {
    #[default]
    Points,
    Badge,
    Voucher,
    Perk,
}

impl fmt::Display for RewardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RewardKind::Points => "points",
            RewardKind::Badge => "badge",
            RewardKind::Voucher => "voucher",
            RewardKind::Perk => "perk",
        };
        f.write_str(s)
    }
}

impl FromStr for RewardKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "points" => Ok(RewardKind::Points),
            "badge" => Ok(RewardKind::Badge),
            "voucher" => Ok(RewardKind::Voucher),
            "perk" => Ok(RewardKind::Perk),
            other => Err(Error::Parse(format!("Unknown reward kind '{}'", other))),
        }
    }
}

/// A sub-goal of a reward template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub action_type: Option<ActionType>,
    #[serde(default)]
    pub metric: Metric,
    #[serde(default)]
    pub target_value: Option<f64>,
    #[serde(default)]
    pub is_automated: bool,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Overrides the template's points when set.
    #[serde(default)]
    pub points: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_badge_ref", alias = "badge")]
    pub badge_id: Option<BadgeId>,
}

impl Task {
    pub fn new(title: &str, action_type: Option<ActionType>, target_value: f64) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            title: title.to_string(),
            action_type,
            metric: Metric::Count,
            target_value: Some(target_value),
            is_automated: true,
            metadata: Map::new(),
            points: None,
            badge_id: None,
        }
    }

    /// Reads a boolean flag from the task metadata. Accepts both camelCase and
    /// snake_case keys, and `"true"` strings as written by older admin tools.
    pub fn flag(&self, key: &str) -> bool {
        let snake = to_snake_case(key);
        [key, snake.as_str()]
            .iter()
            .filter_map(|k| self.metadata.get(*k))
            .any(|v| match v {
                Value::Bool(b) => *b,
                Value::String(s) => s.eq_ignore_ascii_case("true"),
                _ => false,
            })
    }

    pub fn requires_verification(&self) -> bool {
        self.flag("requiresVerification")
    }
}

fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Definition of an achievable reward, optionally decomposed into tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardTemplate {
    pub reward_id: Uuid,
    /// `None` means the template is visible to every tenant.
    #[serde(default)]
    pub tenant_id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub kind: RewardKind,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default, deserialize_with = "deserialize_badge_ref", alias = "badge")]
    pub badge_id: Option<BadgeId>,
    pub is_active: bool,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RewardTemplate {
    pub fn new(name: &str, points: i64, tasks: Vec<Task>, tenant_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            reward_id: Uuid::new_v4(),
            tenant_id,
            name: name.to_string(),
            description: None,
            kind: RewardKind::Points,
            points,
            tasks,
            badge_id: None,
            is_active: true,
            starts_at: None,
            ends_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn task(&self, task_id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }

    pub fn first_task(&self) -> Option<&Task> {
        self.tasks.first()
    }

    /// True if `now` falls inside the optional `[starts_at, ends_at]` window.
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        let started = self.starts_at.map_or(true, |s| s <= now);
        let not_ended = self.ends_at.map_or(true, |e| e >= now);
        started && not_ended
    }

    pub fn is_in_scope(&self, tenant_id: Option<Uuid>) -> bool {
        self.tenant_id.is_none() || self.tenant_id == tenant_id
    }

    /// Badge handed out when the reward is claimed. A badge-typed reward whose
    /// reference did not resolve hands out nothing.
    pub fn claim_badge(&self) -> Option<BadgeId> {
        self.badge_id
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput("reward name must not be empty".into()));
        }
        if self.points < 0 {
            return Err(Error::InvalidInput(format!(
                "reward '{}' has negative points ({})",
                self.name, self.points
            )));
        }
        if let (Some(start), Some(end)) = (self.starts_at, self.ends_at) {
            if start > end {
                return Err(Error::InvalidInput(format!(
                    "reward '{}' ends before it starts",
                    self.name
                )));
            }
        }
        for task in &self.tasks {
            if let Some(target) = task.target_value {
                if !target.is_finite() || target < 0.0 {
                    return Err(Error::InvalidInput(format!(
                        "task '{}' has an invalid target ({})",
                        task.title, target
                    )));
                }
            }
            if task.points.is_some_and(|p| p < 0) {
                return Err(Error::InvalidInput(format!(
                    "task '{}' has negative points",
                    task.title
                )));
            }
        }
        Ok(())
    }
}

/// Filter for listing reward templates.
#[derive(Debug, Clone)]
pub struct RewardQuery {
    pub tenant_id: Option<Uuid>,
    pub active_only: bool,
    /// When set, only templates whose window contains this instant are returned.
    pub visible_at: Option<DateTime<Utc>>,
    /// 1-based.
    pub page: u32,
    pub per_page: u32,
}

impl Default for RewardQuery {
    fn default() -> Self {
        Self {
            tenant_id: None,
            active_only: false,
            visible_at: None,
            page: 1,
            per_page: 50,
        }
    }
}

impl RewardQuery {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.per_page)
    }

    pub fn matches(&self, reward: &RewardTemplate) -> bool {
        if self.tenant_id.is_some() && !reward.is_in_scope(self.tenant_id) {
            return false;
        }
        if self.active_only && !reward.is_active {
            return false;
        }
        match self.visible_at {
            Some(now) => reward.is_visible_at(now),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        u64::from(self.page) * u64::from(self.per_page) < self.total
    }
}
