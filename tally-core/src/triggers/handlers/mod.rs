pub mod community_join;
pub mod community_post;
pub mod donation;
pub mod event_rsvp;
pub mod job_post;
pub mod mentorship;
pub mod profile_completion;

use std::sync::Arc;

use crate::triggers::TriggerRegistry;
use crate::Error;

pub use community_join::CommunityJoinHandler;
pub use community_post::CommunityPostHandler;
pub use donation::DonationHandler;
pub use event_rsvp::EventRsvpHandler;
pub use job_post::JobPostHandler;
pub use mentorship::MentorshipHandler;
pub use profile_completion::ProfileCompletionHandler;

/// Register all built-in engagement handlers with the registry
pub async fn register_builtin_handlers(registry: &TriggerRegistry) -> Result<(), Error> {
    registry.register(Arc::new(CommunityPostHandler::new())).await?;
    registry.register(Arc::new(EventRsvpHandler::new())).await?;
    registry.register(Arc::new(DonationHandler::new())).await?;
    registry.register(Arc::new(JobPostHandler::new())).await?;
    registry.register(Arc::new(MentorshipHandler::new())).await?;
    registry.register(Arc::new(CommunityJoinHandler::new())).await?;
    registry.register(Arc::new(ProfileCompletionHandler::new())).await?;
    Ok(())
}
