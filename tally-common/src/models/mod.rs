// File: tally-common/src/models/mod.rs
pub mod activity;
pub mod badge;
pub mod engagement;
pub mod notification;
pub mod reward;
pub mod tier;
pub mod user_rewards;

pub use activity::{
    ActivityHistoryEntry, ActivityKey, ActivityStatus, HistoryAction, ProgressOutcome,
    ProgressTransition, ProgressUpdate, Redemption, RewardActivity, VerificationDecision,
    VerificationEvent, VerificationOutcome, VerificationResolution, VerificationState,
    VerificationStatus, VerificationTransition,
};
pub use badge::BadgeId;
pub use engagement::{EngagementEvent, MentorshipRole, RsvpResponse};
pub use notification::{Notification, NotificationEvent, NotificationRequest};
pub use reward::{ActionType, Metric, Page, RewardKind, RewardQuery, RewardTemplate, Task};
pub use tier::{tier_info, Tier, TierInfo};
pub use user_rewards::{PointsChange, UserRewardsState, UserRewardsSummary, UserTierInfo};
