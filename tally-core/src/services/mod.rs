// File: src/services/mod.rs

pub mod badge_bridge;
pub mod claim_service;
pub mod notifications;
pub mod payout;
pub mod points_service;
pub mod progress_service;
pub mod reward_service;
pub mod verification_service;

pub use badge_bridge::BadgeBridge;
pub use claim_service::{ClaimRequest, ClaimService};
pub use notifications::NotificationPublisher;
pub use payout::RewardPayout;
pub use points_service::PointsService;
pub use progress_service::{ProgressContext, ProgressRequest, ProgressService};
pub use reward_service::RewardService;
pub use verification_service::VerificationService;
