/// Teams
///
/// A team is the tenant boundary: products, categories and sequences all
/// carry a `team_id`. The `username` is the team's public handle and is unique
/// among live teams.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};

use super::pagination::{Page, PageRequest};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Team fields supplied on create and update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamInput {
    pub name: String,
    pub username: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// A team seen through one of its members
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MemberTeam {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub team: Team,

    pub team_role_id: i64,
}

impl Team {
    pub async fn create<'e, E>(executor: E, data: TeamInput) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Team>(
            r#"
            INSERT INTO teams (name, username, description, address, phone, email)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, username, description, address, phone, email,
                      created_at, updated_at
            "#,
        )
        .bind(data.name)
        .bind(data.username)
        .bind(data.description)
        .bind(data.address)
        .bind(data.phone)
        .bind(data.email)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Team>(
            r#"
            SELECT id, name, username, description, address, phone, email,
                   created_at, updated_at
            FROM teams
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Replaces the editable fields; `None` when the team is gone
    pub async fn update<'e, E>(executor: E, id: i64, data: TeamInput) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Team>(
            r#"
            UPDATE teams
            SET name = $2, username = $3, description = $4, address = $5,
                phone = $6, email = $7, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id, name, username, description, address, phone, email,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(data.name)
        .bind(data.username)
        .bind(data.description)
        .bind(data.address)
        .bind(data.phone)
        .bind(data.email)
        .fetch_optional(executor)
        .await
    }

    /// All live teams, optionally filtered by an `ILIKE` name pattern
    pub async fn list(
        pool: &PgPool,
        name_pattern: Option<String>,
        page: PageRequest,
    ) -> Result<Page<Self>, sqlx::Error> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM teams
            WHERE deleted_at IS NULL AND ($1::TEXT IS NULL OR name ILIKE $1)
            "#,
        )
        .bind(name_pattern.as_deref())
        .fetch_one(pool)
        .await?;

        let teams = sqlx::query_as::<_, Team>(
            r#"
            SELECT id, name, username, description, address, phone, email,
                   created_at, updated_at
            FROM teams
            WHERE deleted_at IS NULL AND ($1::TEXT IS NULL OR name ILIKE $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(name_pattern.as_deref())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

        Ok(Page::new(teams, page, total))
    }

    /// Teams where the user holds an active membership
    pub async fn list_for_member(
        pool: &PgPool,
        user_id: i64,
        page: PageRequest,
    ) -> Result<Page<MemberTeam>, sqlx::Error> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM team_members tm
            JOIN teams t ON t.id = tm.team_id AND t.deleted_at IS NULL
            WHERE tm.user_id = $1 AND tm.is_active AND tm.deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        let teams = sqlx::query_as::<_, MemberTeam>(
            r#"
            SELECT t.id, t.name, t.username, t.description, t.address, t.phone,
                   t.email, t.created_at, t.updated_at, tm.team_role_id
            FROM team_members tm
            JOIN teams t ON t.id = tm.team_id AND t.deleted_at IS NULL
            WHERE tm.user_id = $1 AND tm.is_active AND tm.deleted_at IS NULL
            ORDER BY t.created_at DESC, t.id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

        Ok(Page::new(teams, page, total))
    }
}
