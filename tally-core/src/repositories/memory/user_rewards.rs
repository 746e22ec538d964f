// File: tally-core/src/repositories/memory/user_rewards.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;
use tally_common::error::Error;
use tally_common::models::{BadgeId, PointsChange, UserRewardsState};
use tally_common::traits::UserRewardsRepository;

#[derive(Default)]
pub struct InMemoryUserRewardsRepository {
    states: DashMap<Uuid, UserRewardsState>,
}

impl InMemoryUserRewardsRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRewardsRepository for InMemoryUserRewardsRepository {
    async fn get_state(&self, user_id: Uuid) -> Result<Option<UserRewardsState>, Error> {
        Ok(self.states.get(&user_id).map(|s| s.clone()))
    }

    async fn add_points(&self, user_id: Uuid, delta: i64, at: DateTime<Utc>) -> Result<PointsChange, Error> {
        let mut entry = self
            .states
            .entry(user_id)
            .or_insert_with(|| UserRewardsState::new(user_id));
        let previous = entry.clone();
        entry.apply_delta(delta, at);
        Ok(PointsChange {
            previous,
            current: entry.clone(),
        })
    }

    async fn set_total(&self, user_id: Uuid, total: i64, at: DateTime<Utc>) -> Result<UserRewardsState, Error> {
        let mut entry = self
            .states
            .entry(user_id)
            .or_insert_with(|| UserRewardsState::new(user_id));
        entry.set_total(total, at);
        Ok(entry.clone())
    }

    async fn add_badge(&self, user_id: Uuid, badge_id: BadgeId) -> Result<bool, Error> {
        let mut entry = self
            .states
            .entry(user_id)
            .or_insert_with(|| UserRewardsState::new(user_id));
        Ok(entry.badges.insert(badge_id))
    }
}
