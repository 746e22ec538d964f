use tally_common::models::{ActionType, EngagementEvent};

use crate::triggers::EngagementHandler;

/// Fires once the profile is fully complete.
pub struct ProfileCompletionHandler;

impl ProfileCompletionHandler {
    pub fn new() -> Self {
        Self
    }
}

impl EngagementHandler for ProfileCompletionHandler {
    fn id(&self) -> &str {
        "engagement.profile_completion"
    }

    fn action_type(&self) -> ActionType {
        ActionType::ProfileCompletion
    }

    fn tracking_flag(&self) -> &str {
        "trackProfileCompletion"
    }

    fn title_keywords(&self) -> &[&str] {
        &["profile"]
    }

    fn accepts(&self, event: &EngagementEvent) -> bool {
        matches!(event, EngagementEvent::ProfileUpdated { completeness, .. } if *completeness >= 100)
    }
}
