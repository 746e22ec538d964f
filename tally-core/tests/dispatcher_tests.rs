// tests/dispatcher_tests.rs

use std::sync::Arc;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::mock;
use mockall::predicate::eq;
use serde_json::json;
use uuid::Uuid;
use tally_common::models::{
    BadgeId, Notification, NotificationEvent, NotificationRequest, PointsChange, UserRewardsState,
};
use tally_common::traits::{BadgeEvaluator, Notifier, UserRewardsRepository};
use tally_core::eventbus::dispatcher::{spawn_effect_dispatcher, EffectDispatcher};
use tally_core::eventbus::{BadgeAward, EffectQueue, RewardEffect};
use tally_core::Error;

mock! {
    Badges {}
    #[async_trait]
    impl BadgeEvaluator for Badges {
        async fn award_badge_directly(
            &self,
            user_id: Uuid,
            badge_id: BadgeId,
            tenant_id: Option<Uuid>,
            reason: String,
        ) -> Result<bool, Error>;
        async fn check_and_award_eligible_badges(&self, user_id: Uuid, tenant_id: Option<Uuid>) -> Result<(), Error>;
    }
}

mock! {
    Notify {}
    #[async_trait]
    impl Notifier for Notify {
        async fn send(&self, request: &NotificationRequest) -> Result<Vec<Notification>, Error>;
    }
}

mock! {
    Ledger {}
    #[async_trait]
    impl UserRewardsRepository for Ledger {
        async fn get_state(&self, user_id: Uuid) -> Result<Option<UserRewardsState>, Error>;
        async fn add_points(&self, user_id: Uuid, delta: i64, at: DateTime<Utc>) -> Result<PointsChange, Error>;
        async fn set_total(&self, user_id: Uuid, total: i64, at: DateTime<Utc>) -> Result<UserRewardsState, Error>;
        async fn add_badge(&self, user_id: Uuid, badge_id: BadgeId) -> Result<bool, Error>;
    }
}

fn award(user_id: Uuid, badge_ids: Vec<BadgeId>, reevaluate: bool) -> BadgeAward {
    BadgeAward {
        user_id,
        tenant_id: None,
        badge_ids,
        reason: "Earned reward 'Helper'".to_string(),
        reevaluate,
    }
}

fn quiet_notifier() -> MockNotify {
    let mut notifier = MockNotify::new();
    notifier.expect_send().never();
    notifier
}

#[tokio::test]
async fn test_new_badge_is_recorded_then_reevaluated() {
    let user = Uuid::new_v4();
    let badge = BadgeId(Uuid::new_v4());

    let mut badges = MockBadges::new();
    badges
        .expect_award_badge_directly()
        .withf(move |u, b, _, _| *u == user && *b == badge)
        .times(1)
        .returning(|_, _, _, _| Ok(true));
    badges
        .expect_check_and_award_eligible_badges()
        .with(eq(user), eq(None))
        .times(1)
        .returning(|_, _| Ok(()));

    let mut ledger = MockLedger::new();
    ledger
        .expect_add_badge()
        .with(eq(user), eq(badge))
        .times(1)
        .returning(|_, _| Ok(true));

    let dispatcher = EffectDispatcher::new(Arc::new(quiet_notifier()), Arc::new(badges), Arc::new(ledger));
    dispatcher.execute(RewardEffect::AwardBadges(award(user, vec![badge], true))).await;
}

#[tokio::test]
async fn test_already_held_badge_is_not_recorded_again() {
    let user = Uuid::new_v4();
    let badge = BadgeId(Uuid::new_v4());

    let mut badges = MockBadges::new();
    badges.expect_award_badge_directly().times(1).returning(|_, _, _, _| Ok(false));
    badges.expect_check_and_award_eligible_badges().never();

    let mut ledger = MockLedger::new();
    ledger.expect_add_badge().never();

    let dispatcher = EffectDispatcher::new(Arc::new(quiet_notifier()), Arc::new(badges), Arc::new(ledger));
    dispatcher.execute(RewardEffect::AwardBadges(award(user, vec![badge], false))).await;
}

#[tokio::test]
async fn test_failed_direct_award_still_reevaluates() {
    let user = Uuid::new_v4();

    let mut badges = MockBadges::new();
    badges
        .expect_award_badge_directly()
        .times(2)
        .returning(|_, _, _, _| Err(Error::Collaborator("badge service down".into())));
    badges
        .expect_check_and_award_eligible_badges()
        .times(1)
        .returning(|_, _| Ok(()));

    let mut ledger = MockLedger::new();
    ledger.expect_add_badge().never();

    let dispatcher = EffectDispatcher::new(Arc::new(quiet_notifier()), Arc::new(badges), Arc::new(ledger));
    let ids = vec![BadgeId(Uuid::new_v4()), BadgeId(Uuid::new_v4())];
    dispatcher.execute(RewardEffect::AwardBadges(award(user, ids, true))).await;
}

#[tokio::test]
async fn test_notifier_failures_do_not_stop_the_loop() {
    let mut notifier = MockNotify::new();
    notifier
        .expect_send()
        .times(3)
        .returning(|_| Err(Error::Collaborator("smtp unavailable".into())));

    let mut badges = MockBadges::new();
    badges.expect_award_badge_directly().never();
    let dispatcher = Arc::new(EffectDispatcher::new(
        Arc::new(notifier),
        Arc::new(badges),
        Arc::new(MockLedger::new()),
    ));

    let (queue, rx) = EffectQueue::new(8);
    for event in [
        NotificationEvent::TaskCompleted,
        NotificationEvent::RewardEarned,
        NotificationEvent::RewardClaimed,
    ] {
        queue
            .publish(RewardEffect::Notify(NotificationRequest {
                recipients: vec![Uuid::new_v4()],
                event,
                tenant_id: None,
                data: json!({ "rewardName": "Helper" }),
            }))
            .expect("queue has room");
    }

    let handle = spawn_effect_dispatcher(&queue, rx, dispatcher);
    queue.shutdown();
    handle.await.expect("dispatcher task panicked");
}
