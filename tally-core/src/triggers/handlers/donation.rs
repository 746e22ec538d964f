use tally_common::models::{ActionType, EngagementEvent, Metric, Task};

use crate::triggers::EngagementHandler;

pub struct DonationHandler;

impl DonationHandler {
    pub fn new() -> Self {
        Self
    }
}

impl EngagementHandler for DonationHandler {
    fn id(&self) -> &str {
        "engagement.donation"
    }

    fn action_type(&self) -> ActionType {
        ActionType::Donation
    }

    fn tracking_flag(&self) -> &str {
        "trackDonations"
    }

    fn title_keywords(&self) -> &[&str] {
        &["donat", "give"]
    }

    /// Amount-metric tasks advance by the donated amount; count tasks by one.
    fn amount(&self, event: &EngagementEvent, task: &Task) -> f64 {
        match (event, task.metric) {
            (EngagementEvent::Donation { amount, .. }, Metric::Amount) => amount.max(0.0),
            _ => 1.0,
        }
    }
}
