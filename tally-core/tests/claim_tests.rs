// tests/claim_tests.rs

mod test_utils;

use uuid::Uuid;
use tally_common::models::{
    ActivityStatus, BadgeId, HistoryAction, NotificationEvent, RewardKind, VerificationStatus,
};
use tally_core::services::{ClaimRequest, ProgressRequest};
use tally_core::Error;
use test_utils::{single_task_reward, verified_task_reward, TestEngine};

#[tokio::test]
async fn test_verification_holds_points_and_claim_until_approved() -> Result<(), Error> {
    let t = TestEngine::start().await?;
    let reward = t.engine.create_reward(verified_task_reward("Mentor", 1.0, 50)).await?;
    let user = Uuid::new_v4();
    let staff = Uuid::new_v4();

    let out = t
        .engine
        .record_task_progress(&ProgressRequest::new(reward.reward_id, None, 1.0, user, None))
        .await?;
    assert_eq!(out.activity.status, ActivityStatus::Earned);
    assert!(out.activity.verification.required);
    assert_eq!(out.activity.verification.status, VerificationStatus::Pending);
    assert_eq!(t.engine.get_user_tier_info(user).await?.total_points, 0);

    let blocked = t.engine.claim_reward(reward.reward_id, user, ClaimRequest::default()).await;
    match blocked {
        Err(e @ Error::VerificationPending(_)) => {
            assert!(e.is_user_actionable());
            assert!(e.to_string().contains("awaiting staff approval"));
        }
        other => panic!("expected VerificationPending, got {:?}", other),
    }
    let unchanged = t.engine.get_user_activities(user, None).await?;
    assert_eq!(unchanged[0].status, ActivityStatus::Earned);
    assert!(unchanged[0].voucher_code.is_none());

    let approved = t
        .engine
        .approve_verification(out.activity.activity_id, Some(staff), Some("looks good".into()))
        .await?;
    assert_eq!(approved.verification.status, VerificationStatus::Approved);
    assert_eq!(approved.verification.reviewed_by, Some(staff));
    assert_eq!(t.engine.get_user_tier_info(user).await?.total_points, 50);

    // approving twice is a no-op and pays nothing more
    t.engine.approve_verification(out.activity.activity_id, Some(staff), None).await?;
    assert_eq!(t.engine.get_user_tier_info(user).await?.total_points, 50);

    let claimed = t.engine.claim_reward(reward.reward_id, user, ClaimRequest::default()).await?;
    assert_eq!(claimed.status, ActivityStatus::Redeemed);
    assert!(claimed.redeemed_at.is_some());
    let voucher = claimed.voucher_code.clone().expect("voucher issued");
    assert!(voucher.starts_with("RV-"));
    assert_eq!(voucher, voucher.to_uppercase());
    assert_eq!(claimed.history.last().map(|h| h.action), Some(HistoryAction::Redeemed));

    let (notifier, _, _) = t.finish().await;
    assert_eq!(notifier.count(NotificationEvent::TaskCompleted).await, 1);
    assert_eq!(notifier.count(NotificationEvent::RewardEarned).await, 1);
    assert_eq!(notifier.count(NotificationEvent::RewardClaimed).await, 1);
    Ok(())
}

#[tokio::test]
async fn test_rejected_verification_blocks_claim_for_good() -> Result<(), Error> {
    let t = TestEngine::start().await?;
    let reward = t.engine.create_reward(verified_task_reward("Job", 1.0, 30)).await?;
    let user = Uuid::new_v4();

    let out = t
        .engine
        .record_task_progress(&ProgressRequest::new(reward.reward_id, None, 1.0, user, None))
        .await?;
    let rejected = t
        .engine
        .reject_verification(out.activity.activity_id, None, Some("duplicate".into()))
        .await?;
    assert_eq!(rejected.verification.status, VerificationStatus::Rejected);

    let claim = t.engine.claim_reward(reward.reward_id, user, ClaimRequest::default()).await;
    assert!(matches!(claim, Err(Error::VerificationRejected(_))));

    let flip = t.engine.approve_verification(out.activity.activity_id, None, None).await;
    assert!(matches!(flip, Err(Error::InvalidTransition(_))));

    // more progress does not reopen the decision
    let again = t
        .engine
        .record_task_progress(&ProgressRequest::new(reward.reward_id, None, 1.0, user, None))
        .await?;
    assert_eq!(again.activity.verification.status, VerificationStatus::Rejected);
    assert_eq!(t.engine.get_user_tier_info(user).await?.total_points, 0);
    Ok(())
}

#[tokio::test]
async fn test_verifying_an_activity_that_needs_none_is_invalid() -> Result<(), Error> {
    let t = TestEngine::start().await?;
    let reward = t.engine.create_reward(single_task_reward("Open", 1.0, 5)).await?;
    let out = t
        .engine
        .record_task_progress(&ProgressRequest::new(reward.reward_id, None, 1.0, Uuid::new_v4(), None))
        .await?;

    let res = t.engine.approve_verification(out.activity.activity_id, None, None).await;
    assert!(matches!(res, Err(Error::InvalidTransition(_))));

    let missing = t.engine.approve_verification(Uuid::new_v4(), None, None).await;
    assert!(matches!(missing, Err(Error::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn test_claim_requires_an_earned_activity() -> Result<(), Error> {
    let t = TestEngine::start().await?;
    let reward = t.engine.create_reward(single_task_reward("Far", 10.0, 5)).await?;
    let user = Uuid::new_v4();

    let none_yet = t.engine.claim_reward(reward.reward_id, user, ClaimRequest::default()).await;
    assert!(matches!(none_yet, Err(Error::NotFound(ref m)) if m == "Reward not ready for redemption"));

    t.engine
        .record_task_progress(&ProgressRequest::new(reward.reward_id, None, 3.0, user, None))
        .await?;
    let in_progress = t.engine.claim_reward(reward.reward_id, user, ClaimRequest::default()).await;
    assert!(matches!(in_progress, Err(Error::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn test_repeated_claims_keep_the_first_voucher() -> Result<(), Error> {
    let t = TestEngine::start().await?;
    let reward = t.engine.create_reward(single_task_reward("Voucher", 1.0, 5)).await?;
    let user = Uuid::new_v4();
    t.engine
        .record_task_progress(&ProgressRequest::new(reward.reward_id, None, 1.0, user, None))
        .await?;

    let first = t
        .engine
        .claim_reward(
            reward.reward_id,
            user,
            ClaimRequest {
                voucher_code: Some("SPRING-2024".into()),
                note: Some("front desk".into()),
                issuer_id: Some(Uuid::new_v4()),
            },
        )
        .await?;
    assert_eq!(first.voucher_code.as_deref(), Some("SPRING-2024"));

    let second = t
        .engine
        .claim_reward(
            reward.reward_id,
            user,
            ClaimRequest {
                voucher_code: Some("OTHER".into()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(second, Err(Error::NotFound(_))));

    let stored = t.engine.get_user_activities(user, None).await?;
    assert_eq!(stored[0].voucher_code.as_deref(), Some("SPRING-2024"));
    Ok(())
}

#[tokio::test]
async fn test_claiming_a_badge_reward_awards_and_records_the_badge() -> Result<(), Error> {
    let t = TestEngine::start().await?;
    let badge = BadgeId(Uuid::new_v4());
    let mut reward = single_task_reward("Helper", 1.0, 0);
    reward.kind = RewardKind::Badge;
    reward.badge_id = Some(badge);
    let reward = t.engine.create_reward(reward).await?;
    let user = Uuid::new_v4();

    t.engine
        .record_task_progress(&ProgressRequest::new(reward.reward_id, None, 1.0, user, None))
        .await?;
    t.engine.claim_reward(reward.reward_id, user, ClaimRequest::default()).await?;

    let (_, badges, repos) = t.finish().await;
    // awarded on earn, already held on claim
    assert_eq!(badges.direct.lock().await.as_slice(), &[(user, badge)]);
    let state = repos.user_rewards.get_state(user).await?.expect("state exists");
    assert!(state.badges.contains(&badge));
    Ok(())
}

#[tokio::test]
async fn test_summary_counts_and_cascade_delete() -> Result<(), Error> {
    let t = TestEngine::start().await?;
    let tenant = Some(Uuid::new_v4());
    let user = Uuid::new_v4();

    let done = t.engine.create_reward(single_task_reward("Done", 1.0, 10)).await?;
    let claimed = t.engine.create_reward(single_task_reward("Claimed", 1.0, 20)).await?;
    let started = t.engine.create_reward(single_task_reward("Started", 5.0, 40)).await?;

    for (reward, amount) in [(&done, 1.0), (&claimed, 1.0), (&started, 1.0)] {
        t.engine
            .record_task_progress(&ProgressRequest::new(reward.reward_id, None, amount, user, tenant))
            .await?;
    }
    t.engine.claim_reward(claimed.reward_id, user, ClaimRequest::default()).await?;

    let summary = t.engine.get_user_summary(user, tenant).await?;
    assert_eq!(summary.total_rewards, 3);
    assert_eq!(summary.earned_rewards, 1);
    assert_eq!(summary.redeemed_rewards, 1);
    assert_eq!(summary.pending_rewards, 1);
    assert_eq!(summary.total_points, 30);

    // another tenant sees nothing
    let other = t.engine.get_user_summary(user, Some(Uuid::new_v4())).await?;
    assert_eq!(other.total_rewards, 0);

    t.engine.delete_reward(started.reward_id).await?;
    assert_eq!(t.engine.get_user_activities(user, None).await?.len(), 2);
    assert!(matches!(t.engine.get_reward(started.reward_id).await, Err(Error::NotFound(_))));
    Ok(())
}
