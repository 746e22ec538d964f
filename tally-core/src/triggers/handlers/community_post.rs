use tally_common::models::ActionType;

use crate::triggers::EngagementHandler;

pub struct CommunityPostHandler;

impl CommunityPostHandler {
    pub fn new() -> Self {
        Self
    }
}

impl EngagementHandler for CommunityPostHandler {
    fn id(&self) -> &str {
        "engagement.community_post"
    }

    fn action_type(&self) -> ActionType {
        ActionType::CommunityPost
    }

    fn tracking_flag(&self) -> &str {
        "trackCommunityPosts"
    }

    fn title_keywords(&self) -> &[&str] {
        &["post", "community"]
    }
}
