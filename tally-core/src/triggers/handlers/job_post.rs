use tally_common::models::ActionType;

use crate::triggers::EngagementHandler;

pub struct JobPostHandler;

impl JobPostHandler {
    pub fn new() -> Self {
        Self
    }
}

impl EngagementHandler for JobPostHandler {
    fn id(&self) -> &str {
        "engagement.job_post"
    }

    fn action_type(&self) -> ActionType {
        ActionType::JobPost
    }

    fn tracking_flag(&self) -> &str {
        "trackJobPosts"
    }

    fn title_keywords(&self) -> &[&str] {
        &["job", "hiring"]
    }
}
