use tally_common::models::ActionType;

use crate::triggers::EngagementHandler;

pub struct MentorshipHandler;

impl MentorshipHandler {
    pub fn new() -> Self {
        Self
    }
}

impl EngagementHandler for MentorshipHandler {
    fn id(&self) -> &str {
        "engagement.mentorship"
    }

    fn action_type(&self) -> ActionType {
        ActionType::Mentorship
    }

    fn tracking_flag(&self) -> &str {
        "trackMentorship"
    }

    fn title_keywords(&self) -> &[&str] {
        &["mentor"]
    }
}
