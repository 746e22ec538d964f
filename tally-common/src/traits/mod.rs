pub mod collaborator_traits;
pub mod repository_traits;

pub use collaborator_traits::{BadgeEvaluator, Notifier};
pub use repository_traits::{RewardActivityRepository, RewardTemplateRepository, UserRewardsRepository};
