// File: tally-core/src/triggers/handler.rs

use tally_common::models::{ActionType, EngagementEvent, Task};

/// Adapter between one kind of engagement event and reward tasks.
pub trait EngagementHandler: Send + Sync {
    /// Unique identifier for this handler.
    fn id(&self) -> &str;

    fn action_type(&self) -> ActionType;

    /// Metadata flag (camelCase) that opts an untyped task in, e.g. `trackCommunityPosts`.
    fn tracking_flag(&self) -> &str;

    /// Lowercase keywords; an untyped task whose title contains any of them matches.
    fn title_keywords(&self) -> &[&str];

    /// Whether this event should drive progress at all.
    fn accepts(&self, event: &EngagementEvent) -> bool {
        event.action_type() == self.action_type()
    }

    /// A typed task matches on its action type alone. An untyped task matches
    /// on the tracking flag or a title keyword.
    fn matches(&self, task: &Task) -> bool {
        match &task.action_type {
            Some(action) => *action == self.action_type(),
            None => {
                if task.flag(self.tracking_flag()) {
                    return true;
                }
                let title = task.title.to_lowercase();
                self.title_keywords().iter().any(|k| title.contains(k))
            }
        }
    }

    /// Progress contributed by one event.
    fn amount(&self, _event: &EngagementEvent, _task: &Task) -> f64 {
        1.0
    }

    /// History note written on the activity.
    fn note(&self, event: &EngagementEvent) -> String {
        format!("{} {}", self.action_type(), event.source_id())
    }
}
