use tally_common::models::ActionType;

use crate::triggers::EngagementHandler;

pub struct CommunityJoinHandler;

impl CommunityJoinHandler {
    pub fn new() -> Self {
        Self
    }
}

impl EngagementHandler for CommunityJoinHandler {
    fn id(&self) -> &str {
        "engagement.community_join"
    }

    fn action_type(&self) -> ActionType {
        ActionType::CommunityJoin
    }

    fn tracking_flag(&self) -> &str {
        "trackCommunityJoins"
    }

    fn title_keywords(&self) -> &[&str] {
        &["join"]
    }
}
