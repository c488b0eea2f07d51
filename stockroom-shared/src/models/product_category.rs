/// Per-team product categories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};

use super::pagination::{Page, PageRequest};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductCategory {
    pub id: i64,
    pub team_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductCategory {
    pub async fn create<'e, E>(executor: E, team_id: i64, name: &str) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ProductCategory>(
            r#"
            INSERT INTO product_categories (team_id, name)
            VALUES ($1, $2)
            RETURNING id, team_id, name, created_at, updated_at
            "#,
        )
        .bind(team_id)
        .bind(name)
        .fetch_one(executor)
        .await
    }

    pub async fn find<'e, E>(executor: E, team_id: i64, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ProductCategory>(
            r#"
            SELECT id, team_id, name, created_at, updated_at
            FROM product_categories
            WHERE team_id = $1 AND id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(team_id)
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn rename<'e, E>(executor: E, team_id: i64, id: i64, name: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ProductCategory>(
            r#"
            UPDATE product_categories
            SET name = $3, updated_at = NOW()
            WHERE team_id = $1 AND id = $2 AND deleted_at IS NULL
            RETURNING id, team_id, name, created_at, updated_at
            "#,
        )
        .bind(team_id)
        .bind(id)
        .bind(name)
        .fetch_optional(executor)
        .await
    }

    /// Soft delete; false when nothing matched
    pub async fn delete<'e, E>(executor: E, team_id: i64, id: i64) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE product_categories
            SET deleted_at = NOW()
            WHERE team_id = $1 AND id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(team_id)
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list(
        pool: &PgPool,
        team_id: i64,
        name_pattern: Option<String>,
        page: PageRequest,
    ) -> Result<Page<Self>, sqlx::Error> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM product_categories
            WHERE team_id = $1 AND deleted_at IS NULL
              AND ($2::TEXT IS NULL OR name ILIKE $2)
            "#,
        )
        .bind(team_id)
        .bind(name_pattern.as_deref())
        .fetch_one(pool)
        .await?;

        let categories = sqlx::query_as::<_, ProductCategory>(
            r#"
            SELECT id, team_id, name, created_at, updated_at
            FROM product_categories
            WHERE team_id = $1 AND deleted_at IS NULL
              AND ($2::TEXT IS NULL OR name ILIKE $2)
            ORDER BY name, id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(team_id)
        .bind(name_pattern.as_deref())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

        Ok(Page::new(categories, page, total))
    }

    /// How many of `ids` are live categories of the team
    pub async fn count_owned<'e, E>(executor: E, team_id: i64, ids: &[i64]) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(DISTINCT id)
            FROM product_categories
            WHERE team_id = $1 AND id = ANY($2) AND deleted_at IS NULL
            "#,
        )
        .bind(team_id)
        .bind(ids)
        .fetch_one(executor)
        .await
    }
}
