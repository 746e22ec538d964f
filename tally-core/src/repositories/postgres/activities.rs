// File: tally-core/src/repositories/postgres/activities.rs
//
// Every mutation runs in one transaction that holds the activity row lock
// (SELECT ... FOR UPDATE) while the model transition is applied, so
// concurrent progress for the same (user, reward, task) serializes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{Pool, Postgres, Row, Transaction};
use serde_json::{Map, Value};
use uuid::Uuid;
use tally_common::error::Error;
use tally_common::models::{
    ActivityHistoryEntry, ActivityKey, ActivityStatus, ProgressOutcome, ProgressUpdate,
    Redemption, RewardActivity, VerificationOutcome, VerificationResolution, VerificationState,
};
use tally_common::traits::RewardActivityRepository;

use super::with_retry;

const SELECT_COLUMNS: &str = r#"
    SELECT
        activity_id,
        user_id,
        reward_id,
        task_id,
        tenant_id,
        status,
        progress_value,
        progress_target,
        points_awarded,
        points_credited,
        earned_at,
        redeemed_at,
        voucher_code,
        verification,
        history,
        metadata,
        created_at,
        updated_at
    FROM reward_activities
"#;

pub struct PostgresRewardActivityRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresRewardActivityRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn lock_by_key(
        tx: &mut Transaction<'_, Postgres>,
        key: &ActivityKey,
    ) -> Result<Option<RewardActivity>, Error> {
        let sql = format!(
            "{} WHERE user_id = $1 AND reward_id = $2 AND task_id IS NOT DISTINCT FROM $3 FOR UPDATE",
            SELECT_COLUMNS
        );
        let row_opt = sqlx::query(&sql)
            .bind(key.user_id)
            .bind(key.reward_id)
            .bind(key.task_id)
            .fetch_optional(&mut **tx)
            .await?;
        row_opt.as_ref().map(row_to_activity).transpose()
    }

    async fn lock_by_id(
        tx: &mut Transaction<'_, Postgres>,
        activity_id: Uuid,
    ) -> Result<RewardActivity, Error> {
        let sql = format!("{} WHERE activity_id = $1 FOR UPDATE", SELECT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(activity_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| Error::NotFound(format!("activity {}", activity_id)))?;
        row_to_activity(&row)
    }

    /// Writes back every mutable column of a locked activity.
    async fn store(tx: &mut Transaction<'_, Postgres>, a: &RewardActivity) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE reward_activities
            SET tenant_id = $2,
                status = $3,
                progress_value = $4,
                progress_target = $5,
                points_awarded = $6,
                points_credited = $7,
                earned_at = $8,
                redeemed_at = $9,
                voucher_code = $10,
                verification = $11,
                history = $12,
                metadata = $13,
                updated_at = $14
            WHERE activity_id = $1
            "#,
        )
            .bind(a.activity_id)
            .bind(a.tenant_id)
            .bind(a.status.as_str())
            .bind(a.progress_value)
            .bind(a.progress_target)
            .bind(a.points_awarded)
            .bind(a.points_credited)
            .bind(a.earned_at)
            .bind(a.redeemed_at)
            .bind(&a.voucher_code)
            .bind(Json(&a.verification))
            .bind(Json(&a.history))
            .bind(Json(&a.metadata))
            .bind(a.updated_at)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn apply_progress_once(&self, update: &ProgressUpdate) -> Result<ProgressOutcome, Error> {
        let mut tx = self.pool.begin().await?;

        let fresh = RewardActivity::new(update.key, update.tenant_id, update.progress_target, update.at);
        sqlx::query(
            r#"
            INSERT INTO reward_activities (
                activity_id, user_id, reward_id, task_id, tenant_id,
                status, progress_target, verification, created_at, updated_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
            ON CONFLICT ON CONSTRAINT uq_reward_activity_key DO NOTHING
            "#,
        )
            .bind(fresh.activity_id)
            .bind(fresh.user_id)
            .bind(fresh.reward_id)
            .bind(fresh.task_id)
            .bind(fresh.tenant_id)
            .bind(fresh.status.as_str())
            .bind(fresh.progress_target)
            .bind(Json(&fresh.verification))
            .bind(fresh.created_at)
            .bind(fresh.updated_at)
            .execute(&mut *tx)
            .await?;

        let mut activity = Self::lock_by_key(&mut tx, &update.key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("activity for user {}", update.key.user_id)))?;
        let transition = activity.apply_progress(update);
        Self::store(&mut tx, &activity).await?;
        tx.commit().await?;

        Ok(ProgressOutcome { activity, transition })
    }

    async fn redeem_once(&self, activity_id: Uuid, redemption: &Redemption) -> Result<RewardActivity, Error> {
        let mut tx = self.pool.begin().await?;
        let mut activity = Self::lock_by_id(&mut tx, activity_id).await?;
        activity.redeem(redemption)?;
        Self::store(&mut tx, &activity).await?;
        tx.commit().await?;
        Ok(activity)
    }

    async fn resolve_once(
        &self,
        activity_id: Uuid,
        resolution: &VerificationResolution,
    ) -> Result<VerificationOutcome, Error> {
        let mut tx = self.pool.begin().await?;
        let mut activity = Self::lock_by_id(&mut tx, activity_id).await?;
        let transition = activity.resolve_verification(resolution)?;
        Self::store(&mut tx, &activity).await?;
        tx.commit().await?;
        Ok(VerificationOutcome { activity, transition })
    }
}

fn row_to_activity(r: &PgRow) -> Result<RewardActivity, Error> {
    let status: String = r.try_get("status")?;
    let verification: Json<VerificationState> = r.try_get("verification")?;
    let history: Json<Vec<ActivityHistoryEntry>> = r.try_get("history")?;
    let metadata: Json<Map<String, Value>> = r.try_get("metadata")?;
    Ok(RewardActivity {
        activity_id: r.try_get("activity_id")?,
        user_id: r.try_get("user_id")?,
        reward_id: r.try_get("reward_id")?,
        task_id: r.try_get("task_id")?,
        tenant_id: r.try_get("tenant_id")?,
        status: status.parse::<ActivityStatus>()?,
        progress_value: r.try_get("progress_value")?,
        progress_target: r.try_get("progress_target")?,
        points_awarded: r.try_get("points_awarded")?,
        points_credited: r.try_get("points_credited")?,
        earned_at: r.try_get("earned_at")?,
        redeemed_at: r.try_get("redeemed_at")?,
        voucher_code: r.try_get("voucher_code")?,
        verification: verification.0,
        history: history.0,
        metadata: metadata.0,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

fn rows_to_activities(rows: &[PgRow]) -> Result<Vec<RewardActivity>, Error> {
    rows.iter().map(row_to_activity).collect()
}

#[async_trait]
impl RewardActivityRepository for PostgresRewardActivityRepository {
    async fn apply_progress(&self, update: &ProgressUpdate) -> Result<ProgressOutcome, Error> {
        with_retry("apply_progress", || self.apply_progress_once(update)).await
    }

    async fn get_activity(&self, activity_id: Uuid) -> Result<Option<RewardActivity>, Error> {
        let sql = format!("{} WHERE activity_id = $1", SELECT_COLUMNS);
        let row_opt = sqlx::query(&sql)
            .bind(activity_id)
            .fetch_optional(&self.pool)
            .await?;
        row_opt.as_ref().map(row_to_activity).transpose()
    }

    async fn find_activity(&self, key: &ActivityKey) -> Result<Option<RewardActivity>, Error> {
        let sql = format!(
            "{} WHERE user_id = $1 AND reward_id = $2 AND task_id IS NOT DISTINCT FROM $3",
            SELECT_COLUMNS
        );
        let row_opt = sqlx::query(&sql)
            .bind(key.user_id)
            .bind(key.reward_id)
            .bind(key.task_id)
            .fetch_optional(&self.pool)
            .await?;
        row_opt.as_ref().map(row_to_activity).transpose()
    }

    async fn list_for_user_reward(&self, user_id: Uuid, reward_id: Uuid) -> Result<Vec<RewardActivity>, Error> {
        let sql = format!(
            "{} WHERE user_id = $1 AND reward_id = $2 ORDER BY created_at ASC",
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(reward_id)
            .fetch_all(&self.pool)
            .await?;
        rows_to_activities(&rows)
    }

    async fn list_for_user(&self, user_id: Uuid, tenant_id: Option<Uuid>) -> Result<Vec<RewardActivity>, Error> {
        let sql = format!(
            "{} WHERE user_id = $1 AND ($2::uuid IS NULL OR tenant_id = $2) ORDER BY updated_at DESC",
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?;
        rows_to_activities(&rows)
    }

    async fn redeem_activity(&self, activity_id: Uuid, redemption: &Redemption) -> Result<RewardActivity, Error> {
        with_retry("redeem_activity", || self.redeem_once(activity_id, redemption)).await
    }

    async fn resolve_verification(
        &self,
        activity_id: Uuid,
        resolution: &VerificationResolution,
    ) -> Result<VerificationOutcome, Error> {
        with_retry("resolve_verification", || self.resolve_once(activity_id, resolution)).await
    }

    async fn claim_credit(&self, activity_id: Uuid, at: DateTime<Utc>) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            UPDATE reward_activities
            SET points_credited = TRUE,
                updated_at = $2
            WHERE activity_id = $1
              AND NOT points_credited
            "#,
        )
            .bind(activity_id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() > 0 {
            return Ok(true);
        }
        match self.get_activity(activity_id).await? {
            Some(_) => Ok(false),
            None => Err(Error::NotFound(format!("activity {}", activity_id))),
        }
    }

    async fn release_credit(&self, activity_id: Uuid, at: DateTime<Utc>) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE reward_activities
            SET points_credited = FALSE,
                updated_at = $2
            WHERE activity_id = $1
            "#,
        )
            .bind(activity_id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn sum_credited_points(&self, user_id: Uuid) -> Result<i64, Error> {
        let total: Option<i64> = sqlx::query(
            r#"
            SELECT SUM(points_awarded)::BIGINT AS total
            FROM reward_activities
            WHERE user_id = $1
              AND points_credited
              AND status IN ('earned', 'redeemed')
            "#,
        )
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?
            .try_get("total")?;
        Ok(total.unwrap_or(0))
    }

    async fn delete_for_reward(&self, reward_id: Uuid) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM reward_activities WHERE reward_id = $1")
            .bind(reward_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
