// File: tally-core/src/repositories/postgres/rewards.rs

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;
use tally_common::error::Error;
use tally_common::models::{BadgeId, Page, RewardKind, RewardQuery, RewardTemplate, Task};
use tally_common::traits::RewardTemplateRepository;

const SELECT_COLUMNS: &str = r#"
    SELECT
        reward_id,
        tenant_id,
        name,
        description,
        kind,
        points,
        tasks,
        badge_id,
        is_active,
        starts_at,
        ends_at,
        created_at,
        updated_at
    FROM reward_templates
"#;

/// Shared filter for list + count. `$1` tenant, `$2` active_only, `$3` visible_at.
const LIST_FILTER: &str = r#"
    WHERE ($1::uuid IS NULL OR tenant_id IS NULL OR tenant_id = $1)
      AND (NOT $2 OR is_active)
      AND ($3::timestamptz IS NULL OR (
            (starts_at IS NULL OR starts_at <= $3)
        AND (ends_at IS NULL OR ends_at >= $3)))
"#;

pub struct PostgresRewardTemplateRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresRewardTemplateRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn row_to_reward(r: &PgRow) -> Result<RewardTemplate, Error> {
    let kind: String = r.try_get("kind")?;
    let tasks: Json<Vec<Task>> = r.try_get("tasks")?;
    let badge_id: Option<Uuid> = r.try_get("badge_id")?;
    Ok(RewardTemplate {
        reward_id: r.try_get("reward_id")?,
        tenant_id: r.try_get("tenant_id")?,
        name: r.try_get("name")?,
        description: r.try_get("description")?,
        kind: kind.parse::<RewardKind>()?,
        points: r.try_get("points")?,
        tasks: tasks.0,
        badge_id: badge_id.map(BadgeId),
        is_active: r.try_get("is_active")?,
        starts_at: r.try_get("starts_at")?,
        ends_at: r.try_get("ends_at")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

#[async_trait]
impl RewardTemplateRepository for PostgresRewardTemplateRepository {
    async fn create_reward(&self, reward: &RewardTemplate) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO reward_templates (
                reward_id,
                tenant_id,
                name,
                description,
                kind,
                points,
                tasks,
                badge_id,
                is_active,
                starts_at,
                ends_at,
                created_at,
                updated_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
            "#,
        )
            .bind(reward.reward_id)
            .bind(reward.tenant_id)
            .bind(&reward.name)
            .bind(&reward.description)
            .bind(reward.kind.to_string())
            .bind(reward.points)
            .bind(Json(&reward.tasks))
            .bind(reward.badge_id.map(|b| b.0))
            .bind(reward.is_active)
            .bind(reward.starts_at)
            .bind(reward.ends_at)
            .bind(reward.created_at)
            .bind(reward.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_reward(&self, reward_id: Uuid) -> Result<Option<RewardTemplate>, Error> {
        let sql = format!("{} WHERE reward_id = $1", SELECT_COLUMNS);
        let row_opt = sqlx::query(&sql)
            .bind(reward_id)
            .fetch_optional(&self.pool)
            .await?;

        match row_opt {
            Some(r) => Ok(Some(row_to_reward(&r)?)),
            None => Ok(None),
        }
    }

    async fn update_reward(&self, reward: &RewardTemplate) -> Result<(), Error> {
        let result = sqlx::query(
            r#"
            UPDATE reward_templates
            SET tenant_id = $2,
                name = $3,
                description = $4,
                kind = $5,
                points = $6,
                tasks = $7,
                badge_id = $8,
                is_active = $9,
                starts_at = $10,
                ends_at = $11,
                updated_at = $12
            WHERE reward_id = $1
            "#,
        )
            .bind(reward.reward_id)
            .bind(reward.tenant_id)
            .bind(&reward.name)
            .bind(&reward.description)
            .bind(reward.kind.to_string())
            .bind(reward.points)
            .bind(Json(&reward.tasks))
            .bind(reward.badge_id.map(|b| b.0))
            .bind(reward.is_active)
            .bind(reward.starts_at)
            .bind(reward.ends_at)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("reward {}", reward.reward_id)));
        }
        Ok(())
    }

    async fn delete_reward(&self, reward_id: Uuid) -> Result<(), Error> {
        // reward_activities rows go with it (ON DELETE CASCADE)
        sqlx::query("DELETE FROM reward_templates WHERE reward_id = $1")
            .bind(reward_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_rewards(&self, query: &RewardQuery) -> Result<Page<RewardTemplate>, Error> {
        let count_sql = format!("SELECT COUNT(*) AS total FROM reward_templates {}", LIST_FILTER);
        let total: i64 = sqlx::query(&count_sql)
            .bind(query.tenant_id)
            .bind(query.active_only)
            .bind(query.visible_at)
            .fetch_one(&self.pool)
            .await?
            .try_get("total")?;

        let list_sql = format!(
            "{} {} ORDER BY created_at ASC, reward_id ASC LIMIT $4 OFFSET $5",
            SELECT_COLUMNS, LIST_FILTER
        );
        let rows = sqlx::query(&list_sql)
            .bind(query.tenant_id)
            .bind(query.active_only)
            .bind(query.visible_at)
            .bind(i64::from(query.per_page))
            .bind(query.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        for r in &rows {
            items.push(row_to_reward(r)?);
        }

        Ok(Page {
            items,
            total: total.max(0) as u64,
            page: query.page.max(1),
            per_page: query.per_page,
        })
    }
}
