// File: tally-core/src/repositories/memory/activities.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;
use tally_common::error::Error;
use tally_common::models::{
    ActivityKey, ProgressOutcome, ProgressUpdate, Redemption, RewardActivity,
    VerificationOutcome, VerificationResolution,
};
use tally_common::traits::RewardActivityRepository;

#[derive(Default)]
pub struct InMemoryRewardActivityRepository {
    by_key: DashMap<ActivityKey, RewardActivity>,
    /// activity_id -> key
    index: DashMap<Uuid, ActivityKey>,
}

impl InMemoryRewardActivityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn key_for(&self, activity_id: Uuid) -> Result<ActivityKey, Error> {
        self.index
            .get(&activity_id)
            .map(|k| *k)
            .ok_or_else(|| Error::NotFound(format!("activity {}", activity_id)))
    }

    /// Runs `f` on the activity while holding its shard write guard.
    fn with_activity<T, F>(&self, activity_id: Uuid, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut RewardActivity) -> Result<T, Error>,
    {
        let key = self.key_for(activity_id)?;
        let mut entry = self
            .by_key
            .get_mut(&key)
            .ok_or_else(|| Error::NotFound(format!("activity {}", activity_id)))?;
        f(entry.value_mut())
    }
}

#[async_trait]
impl RewardActivityRepository for InMemoryRewardActivityRepository {
    async fn apply_progress(&self, update: &ProgressUpdate) -> Result<ProgressOutcome, Error> {
        let mut entry = self.by_key.entry(update.key).or_insert_with(|| {
            let fresh = RewardActivity::new(update.key, update.tenant_id, update.progress_target, update.at);
            // Indexed under the shard guard: no reader sees the record before its id resolves.
            self.index.insert(fresh.activity_id, update.key);
            fresh
        });
        let transition = entry.apply_progress(update);
        Ok(ProgressOutcome {
            activity: entry.clone(),
            transition,
        })
    }

    async fn get_activity(&self, activity_id: Uuid) -> Result<Option<RewardActivity>, Error> {
        let key = match self.index.get(&activity_id) {
            Some(k) => *k,
            None => return Ok(None),
        };
        Ok(self.by_key.get(&key).map(|a| a.clone()))
    }

    async fn find_activity(&self, key: &ActivityKey) -> Result<Option<RewardActivity>, Error> {
        Ok(self.by_key.get(key).map(|a| a.clone()))
    }

    async fn list_for_user_reward(&self, user_id: Uuid, reward_id: Uuid) -> Result<Vec<RewardActivity>, Error> {
        let mut list: Vec<RewardActivity> = self
            .by_key
            .iter()
            .filter(|e| e.key().user_id == user_id && e.key().reward_id == reward_id)
            .map(|e| e.value().clone())
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(list)
    }

    async fn list_for_user(&self, user_id: Uuid, tenant_id: Option<Uuid>) -> Result<Vec<RewardActivity>, Error> {
        let mut list: Vec<RewardActivity> = self
            .by_key
            .iter()
            .filter(|e| e.key().user_id == user_id)
            .filter(|e| tenant_id.is_none() || e.value().tenant_id == tenant_id)
            .map(|e| e.value().clone())
            .collect();
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(list)
    }

    async fn redeem_activity(&self, activity_id: Uuid, redemption: &Redemption) -> Result<RewardActivity, Error> {
        self.with_activity(activity_id, |activity| {
            activity.redeem(redemption)?;
            Ok(activity.clone())
        })
    }

    async fn resolve_verification(
        &self,
        activity_id: Uuid,
        resolution: &VerificationResolution,
    ) -> Result<VerificationOutcome, Error> {
        self.with_activity(activity_id, |activity| {
            let transition = activity.resolve_verification(resolution)?;
            Ok(VerificationOutcome {
                activity: activity.clone(),
                transition,
            })
        })
    }

    async fn claim_credit(&self, activity_id: Uuid, at: DateTime<Utc>) -> Result<bool, Error> {
        self.with_activity(activity_id, |activity| Ok(activity.mark_credited(at)))
    }

    async fn release_credit(&self, activity_id: Uuid, at: DateTime<Utc>) -> Result<(), Error> {
        self.with_activity(activity_id, |activity| {
            activity.release_credit(at);
            Ok(())
        })
    }

    async fn sum_credited_points(&self, user_id: Uuid) -> Result<i64, Error> {
        Ok(self
            .by_key
            .iter()
            .filter(|e| e.key().user_id == user_id)
            .filter(|e| e.value().points_credited && e.value().status.is_completed())
            .map(|e| e.value().points_awarded)
            .sum())
    }

    async fn delete_for_reward(&self, reward_id: Uuid) -> Result<u64, Error> {
        let doomed: Vec<(ActivityKey, Uuid)> = self
            .by_key
            .iter()
            .filter(|e| e.key().reward_id == reward_id)
            .map(|e| (*e.key(), e.value().activity_id))
            .collect();
        for (key, activity_id) in &doomed {
            self.by_key.remove(key);
            self.index.remove(activity_id);
        }
        Ok(doomed.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use serde_json::Map;

    fn update(key: ActivityKey, amount: f64) -> ProgressUpdate {
        ProgressUpdate {
            key,
            tenant_id: None,
            amount,
            progress_target: 10.0,
            points_awarded: 25,
            requires_verification: false,
            note: None,
            metadata: Map::new(),
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_one_record_per_key() -> Result<(), Error> {
        let repo = InMemoryRewardActivityRepository::new();
        let key = ActivityKey { user_id: Uuid::new_v4(), reward_id: Uuid::new_v4(), task_id: None };

        let a = repo.apply_progress(&update(key, 1.0)).await?;
        let b = repo.apply_progress(&update(key, 2.0)).await?;
        assert_eq!(a.activity.activity_id, b.activity.activity_id);
        assert_eq!(b.activity.progress_value, 3.0);
        assert_eq!(repo.list_for_user(key.user_id, None).await?.len(), 1);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_progress_is_not_lost_and_credits_once() -> Result<(), Error> {
        let repo = Arc::new(InMemoryRewardActivityRepository::new());
        let key = ActivityKey { user_id: Uuid::new_v4(), reward_id: Uuid::new_v4(), task_id: Some(Uuid::new_v4()) };

        let mut handles = Vec::new();
        for _ in 0..50 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move { repo.apply_progress(&update(key, 1.0)).await }));
        }

        let mut owed = Vec::new();
        for h in handles {
            let outcome = h.await.expect("task panicked")?;
            if outcome.transition.credit_points.is_some() {
                owed.push(outcome.activity.activity_id);
            }
        }
        assert!(!owed.is_empty());

        let mut credits = 0;
        for activity_id in owed {
            if repo.claim_credit(activity_id, Utc::now()).await? {
                credits += 1;
            }
        }

        let activity = repo.find_activity(&key).await?.expect("activity exists");
        assert_eq!(activity.progress_value, 50.0);
        assert_eq!(credits, 1);
        assert_eq!(repo.sum_credited_points(key.user_id).await?, 25);
        Ok(())
    }

    #[tokio::test]
    async fn test_released_credit_can_be_claimed_again() -> Result<(), Error> {
        let repo = InMemoryRewardActivityRepository::new();
        let key = ActivityKey { user_id: Uuid::new_v4(), reward_id: Uuid::new_v4(), task_id: None };
        let earned = repo.apply_progress(&update(key, 10.0)).await?;
        let id = earned.activity.activity_id;

        assert!(repo.claim_credit(id, Utc::now()).await?);
        assert!(!repo.claim_credit(id, Utc::now()).await?);
        assert_eq!(repo.sum_credited_points(key.user_id).await?, 25);

        repo.release_credit(id, Utc::now()).await?;
        assert_eq!(repo.sum_credited_points(key.user_id).await?, 0);
        assert!(repo.claim_credit(id, Utc::now()).await?);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_new_activities_resolve_by_id_as_soon_as_listed() -> Result<(), Error> {
        let repo = Arc::new(InMemoryRewardActivityRepository::new());
        let user_id = Uuid::new_v4();
        let reward_id = Uuid::new_v4();

        let writer = {
            let repo = repo.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    let key = ActivityKey { user_id, reward_id, task_id: Some(Uuid::new_v4()) };
                    repo.apply_progress(&update(key, 10.0)).await?;
                }
                Ok::<(), Error>(())
            })
        };

        let reader = {
            let repo = repo.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    for listed in repo.list_for_user_reward(user_id, reward_id).await? {
                        assert!(repo.get_activity(listed.activity_id).await?.is_some());
                    }
                    tokio::task::yield_now().await;
                }
                Ok::<(), Error>(())
            })
        };

        writer.await.expect("writer panicked")?;
        reader.await.expect("reader panicked")?;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_delete_racing_creation_leaves_no_stale_index() -> Result<(), Error> {
        let repo = Arc::new(InMemoryRewardActivityRepository::new());
        let reward_id = Uuid::new_v4();

        let mut handles = Vec::new();
        for i in 0..100 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                if i % 5 == 0 {
                    repo.delete_for_reward(reward_id).await.map(|_| ())
                } else {
                    let key = ActivityKey { user_id: Uuid::new_v4(), reward_id, task_id: None };
                    repo.apply_progress(&update(key, 1.0)).await.map(|_| ())
                }
            }));
        }
        for h in handles {
            h.await.expect("task panicked")?;
        }

        for entry in repo.index.iter() {
            let record = repo.by_key.get(entry.value()).expect("indexed key has a record");
            assert_eq!(record.activity_id, *entry.key());
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_for_reward_removes_index_too() -> Result<(), Error> {
        let repo = InMemoryRewardActivityRepository::new();
        let key = ActivityKey { user_id: Uuid::new_v4(), reward_id: Uuid::new_v4(), task_id: None };
        let created = repo.apply_progress(&update(key, 1.0)).await?;

        assert_eq!(repo.delete_for_reward(key.reward_id).await?, 1);
        assert!(repo.get_activity(created.activity.activity_id).await?.is_none());
        Ok(())
    }
}
