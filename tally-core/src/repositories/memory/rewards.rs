// File: tally-core/src/repositories/memory/rewards.rs

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;
use tally_common::error::Error;
use tally_common::models::{Page, RewardQuery, RewardTemplate};
use tally_common::traits::RewardTemplateRepository;

#[derive(Default)]
pub struct InMemoryRewardTemplateRepository {
    rewards: DashMap<Uuid, RewardTemplate>,
}

impl InMemoryRewardTemplateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RewardTemplateRepository for InMemoryRewardTemplateRepository {
    async fn create_reward(&self, reward: &RewardTemplate) -> Result<(), Error> {
        if self.rewards.contains_key(&reward.reward_id) {
            return Err(Error::InvalidInput(format!(
                "reward {} already exists",
                reward.reward_id
            )));
        }
        self.rewards.insert(reward.reward_id, reward.clone());
        Ok(())
    }

    async fn get_reward(&self, reward_id: Uuid) -> Result<Option<RewardTemplate>, Error> {
        Ok(self.rewards.get(&reward_id).map(|r| r.clone()))
    }

    async fn update_reward(&self, reward: &RewardTemplate) -> Result<(), Error> {
        match self.rewards.get_mut(&reward.reward_id) {
            Some(mut existing) => {
                let mut updated = reward.clone();
                updated.updated_at = Utc::now();
                *existing = updated;
                Ok(())
            }
            None => Err(Error::NotFound(format!("reward {}", reward.reward_id))),
        }
    }

    async fn delete_reward(&self, reward_id: Uuid) -> Result<(), Error> {
        self.rewards.remove(&reward_id);
        Ok(())
    }

    async fn list_rewards(&self, query: &RewardQuery) -> Result<Page<RewardTemplate>, Error> {
        let mut matching: Vec<RewardTemplate> = self
            .rewards
            .iter()
            .filter(|r| query.matches(r.value()))
            .map(|r| r.value().clone())
            .collect();
        matching.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.reward_id.cmp(&b.reward_id))
        });

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.per_page as usize)
            .collect();

        Ok(Page {
            items,
            total,
            page: query.page.max(1),
            per_page: query.per_page,
        })
    }
}
