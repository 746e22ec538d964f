// File: tally-core/src/repositories/postgres/user_rewards.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use uuid::Uuid;
use tally_common::error::Error;
use tally_common::models::{BadgeId, PointsChange, Tier, UserRewardsState};
use tally_common::traits::UserRewardsRepository;

use super::with_retry;

pub struct PostgresUserRewardsRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresUserRewardsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Creates the row if missing and returns it locked.
    async fn lock_state(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> Result<UserRewardsState, Error> {
        sqlx::query(
            r#"
            INSERT INTO user_rewards (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
            .bind(user_id)
            .execute(&mut **tx)
            .await?;

        let row = sqlx::query(
            r#"
            SELECT user_id, total_points, current_tier, tier_points, badges, last_points_update
            FROM user_rewards
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
            .bind(user_id)
            .fetch_one(&mut **tx)
            .await?;
        row_to_state(&row)
    }

    async fn store(tx: &mut Transaction<'_, Postgres>, state: &UserRewardsState) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE user_rewards
            SET total_points = $2,
                current_tier = $3,
                tier_points = $4,
                last_points_update = $5
            WHERE user_id = $1
            "#,
        )
            .bind(state.user_id)
            .bind(state.total_points)
            .bind(state.current_tier.as_str())
            .bind(state.tier_points)
            .bind(state.last_points_update)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn add_points_once(&self, user_id: Uuid, delta: i64, at: DateTime<Utc>) -> Result<PointsChange, Error> {
        let mut tx = self.pool.begin().await?;
        let previous = Self::lock_state(&mut tx, user_id).await?;
        let mut current = previous.clone();
        current.apply_delta(delta, at);
        Self::store(&mut tx, &current).await?;
        tx.commit().await?;
        Ok(PointsChange { previous, current })
    }

    async fn set_total_once(&self, user_id: Uuid, total: i64, at: DateTime<Utc>) -> Result<UserRewardsState, Error> {
        let mut tx = self.pool.begin().await?;
        let mut state = Self::lock_state(&mut tx, user_id).await?;
        state.set_total(total, at);
        Self::store(&mut tx, &state).await?;
        tx.commit().await?;
        Ok(state)
    }
}

fn row_to_state(r: &PgRow) -> Result<UserRewardsState, Error> {
    let tier: String = r.try_get("current_tier")?;
    let badges: Vec<Uuid> = r.try_get("badges")?;
    Ok(UserRewardsState {
        user_id: r.try_get("user_id")?,
        total_points: r.try_get("total_points")?,
        current_tier: tier.parse::<Tier>()?,
        tier_points: r.try_get("tier_points")?,
        badges: badges.into_iter().map(BadgeId).collect(),
        last_points_update: r.try_get("last_points_update")?,
    })
}

#[async_trait]
impl UserRewardsRepository for PostgresUserRewardsRepository {
    async fn get_state(&self, user_id: Uuid) -> Result<Option<UserRewardsState>, Error> {
        let row_opt = sqlx::query(
            r#"
            SELECT user_id, total_points, current_tier, tier_points, badges, last_points_update
            FROM user_rewards
            WHERE user_id = $1
            "#,
        )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row_opt.as_ref().map(row_to_state).transpose()
    }

    async fn add_points(&self, user_id: Uuid, delta: i64, at: DateTime<Utc>) -> Result<PointsChange, Error> {
        with_retry("add_points", || self.add_points_once(user_id, delta, at)).await
    }

    async fn set_total(&self, user_id: Uuid, total: i64, at: DateTime<Utc>) -> Result<UserRewardsState, Error> {
        with_retry("set_total", || self.set_total_once(user_id, total, at)).await
    }

    async fn add_badge(&self, user_id: Uuid, badge_id: BadgeId) -> Result<bool, Error> {
        // Single statement: the upsert takes the row lock, and the array is
        // only appended to when the badge is missing.
        let row_opt = sqlx::query(
            r#"
            INSERT INTO user_rewards (user_id, badges)
            VALUES ($1, ARRAY[$2]::uuid[])
            ON CONFLICT (user_id) DO UPDATE
                SET badges = array_append(user_rewards.badges, $2)
                WHERE NOT ($2 = ANY(user_rewards.badges))
            RETURNING user_id
            "#,
        )
            .bind(user_id)
            .bind(badge_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row_opt.is_some())
    }
}
