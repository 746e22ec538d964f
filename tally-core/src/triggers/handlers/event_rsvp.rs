use tally_common::models::{ActionType, EngagementEvent, RsvpResponse};

use crate::triggers::EngagementHandler;

/// Only "going" responses count as attendance.
pub struct EventRsvpHandler;

impl EventRsvpHandler {
    pub fn new() -> Self {
        Self
    }
}

impl EngagementHandler for EventRsvpHandler {
    fn id(&self) -> &str {
        "engagement.event_rsvp"
    }

    fn action_type(&self) -> ActionType {
        ActionType::EventAttendance
    }

    fn tracking_flag(&self) -> &str {
        "trackEventAttendance"
    }

    fn title_keywords(&self) -> &[&str] {
        &["event", "attend", "rsvp"]
    }

    fn accepts(&self, event: &EngagementEvent) -> bool {
        matches!(
            event,
            EngagementEvent::EventRsvp { response: RsvpResponse::Going, .. }
        )
    }
}
