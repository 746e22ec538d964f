// File: tally-common/src/models/engagement.rs
//
// Domain events emitted by the features that feed reward progress.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::reward::ActionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsvpResponse {
    Going,
    Interested,
    NotGoing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentorshipRole {
    Mentor,
    Mentee,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngagementEvent {
    CommunityPost {
        user_id: Uuid,
        tenant_id: Option<Uuid>,
        community_id: Uuid,
        post_id: Uuid,
    },
    EventRsvp {
        user_id: Uuid,
        tenant_id: Option<Uuid>,
        event_id: Uuid,
        response: RsvpResponse,
    },
    Donation {
        user_id: Uuid,
        tenant_id: Option<Uuid>,
        donation_id: Uuid,
        amount: f64,
        #[serde(default)]
        campaign_id: Option<Uuid>,
    },
    JobPosted {
        user_id: Uuid,
        tenant_id: Option<Uuid>,
        job_id: Uuid,
    },
    MentorshipSession {
        user_id: Uuid,
        tenant_id: Option<Uuid>,
        session_id: Uuid,
        role: MentorshipRole,
    },
    CommunityJoined {
        user_id: Uuid,
        tenant_id: Option<Uuid>,
        community_id: Uuid,
    },
    ProfileUpdated {
        user_id: Uuid,
        tenant_id: Option<Uuid>,
        /// 0..=100
        completeness: u8,
    },
}

impl EngagementEvent {
    pub fn user_id(&self) -> Uuid {
        match self {
            EngagementEvent::CommunityPost { user_id, .. }
            | EngagementEvent::EventRsvp { user_id, .. }
            | EngagementEvent::Donation { user_id, .. }
            | EngagementEvent::JobPosted { user_id, .. }
            | EngagementEvent::MentorshipSession { user_id, .. }
            | EngagementEvent::CommunityJoined { user_id, .. }
            | EngagementEvent::ProfileUpdated { user_id, .. } => *user_id,
        }
    }

    pub fn tenant_id(&self) -> Option<Uuid> {
        match self {
            EngagementEvent::CommunityPost { tenant_id, .. }
            | EngagementEvent::EventRsvp { tenant_id, .. }
            | EngagementEvent::Donation { tenant_id, .. }
            | EngagementEvent::JobPosted { tenant_id, .. }
            | EngagementEvent::MentorshipSession { tenant_id, .. }
            | EngagementEvent::CommunityJoined { tenant_id, .. }
            | EngagementEvent::ProfileUpdated { tenant_id, .. } => *tenant_id,
        }
    }

    pub fn action_type(&self) -> ActionType {
        match self {
            EngagementEvent::CommunityPost { .. } => ActionType::CommunityPost,
            EngagementEvent::EventRsvp { .. } => ActionType::EventAttendance,
            EngagementEvent::Donation { .. } => ActionType::Donation,
            EngagementEvent::JobPosted { .. } => ActionType::JobPost,
            EngagementEvent::MentorshipSession { .. } => ActionType::Mentorship,
            EngagementEvent::CommunityJoined { .. } => ActionType::CommunityJoin,
            EngagementEvent::ProfileUpdated { .. } => ActionType::ProfileCompletion,
        }
    }

    /// Id of the record that caused the event, for history notes.
    pub fn source_id(&self) -> Uuid {
        match self {
            EngagementEvent::CommunityPost { post_id, .. } => *post_id,
            EngagementEvent::EventRsvp { event_id, .. } => *event_id,
            EngagementEvent::Donation { donation_id, .. } => *donation_id,
            EngagementEvent::JobPosted { job_id, .. } => *job_id,
            EngagementEvent::MentorshipSession { session_id, .. } => *session_id,
            EngagementEvent::CommunityJoined { community_id, .. } => *community_id,
            EngagementEvent::ProfileUpdated { user_id, .. } => *user_id,
        }
    }
}
