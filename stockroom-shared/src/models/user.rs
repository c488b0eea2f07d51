/// User accounts
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id BIGSERIAL PRIMARY KEY,
///     username TEXT NOT NULL,
///     password TEXT NOT NULL,          -- Argon2id PHC string
///     email TEXT NOT NULL,
///     email_verified BOOLEAN NOT NULL DEFAULT FALSE,
///     full_name TEXT NOT NULL DEFAULT '',
///     role_id BIGINT NOT NULL DEFAULT 1 REFERENCES roles(id),
///     created_at, updated_at, deleted_at
/// );
/// ```
///
/// Usernames and (case-insensitive) emails are unique among live rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

use super::image::Image;

/// User account row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,

    pub username: String,

    /// Password hash, never serialized
    #[serde(skip_serializing, default)]
    pub password: String,

    pub email: String,

    pub email_verified: bool,

    pub full_name: String,

    /// Global role id, see [`super::role::Role`]
    pub role_id: i64,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub full_name: String,
    pub role_id: i64,
}

/// Link between a user and an uploaded image
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProfileImage {
    pub id: i64,
    pub user_id: i64,
    pub image_id: i64,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Inserts a user row
    ///
    /// # Errors
    ///
    /// Unique violation when the username or email is already taken.
    pub async fn create<'e, E>(executor: E, data: CreateUser) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password, email, full_name, role_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, username, password, email, email_verified, full_name,
                      role_id, created_at, updated_at
            "#,
        )
        .bind(data.username)
        .bind(data.password_hash)
        .bind(data.email)
        .bind(data.full_name)
        .bind(data.role_id)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password, email, email_verified, full_name,
                   role_id, created_at, updated_at
            FROM users
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Whether a live user with this id exists
    pub async fn exists<'e, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(id)
        .fetch_one(executor)
        .await
    }

    /// Looks up a login by username or email
    pub async fn find_by_username_or_email<'e, E>(
        executor: E,
        login: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password, email, email_verified, full_name,
                   role_id, created_at, updated_at
            FROM users
            WHERE (username = $1 OR LOWER(email) = LOWER($1))
              AND deleted_at IS NULL
            LIMIT 1
            "#,
        )
        .bind(login)
        .fetch_optional(executor)
        .await
    }

    pub async fn username_taken<'e, E>(executor: E, username: &str) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE username = $1 AND deleted_at IS NULL)",
        )
        .bind(username)
        .fetch_one(executor)
        .await
    }

    pub async fn email_taken<'e, E>(executor: E, email: &str) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE LOWER(email) = LOWER($1) AND deleted_at IS NULL)",
        )
        .bind(email)
        .fetch_one(executor)
        .await
    }

    /// Username prefix search, capped at ten rows
    pub async fn search_by_username<'e, E>(
        executor: E,
        pattern: &str,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password, email, email_verified, full_name,
                   role_id, created_at, updated_at
            FROM users
            WHERE username ILIKE $1 AND deleted_at IS NULL
            ORDER BY username
            LIMIT 10
            "#,
        )
        .bind(pattern)
        .fetch_all(executor)
        .await
    }

    /// Marks the email as verified; false when the user is gone
    pub async fn mark_email_verified<'e, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email_verified = TRUE, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// `None` when the user does not exist
    pub async fn is_email_verified<'e, E>(executor: E, id: i64) -> Result<Option<bool>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, bool>(
            "SELECT email_verified FROM users WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }
}

impl ProfileImage {
    pub async fn create<'e, E>(executor: E, user_id: i64, image_id: i64) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ProfileImage>(
            r#"
            INSERT INTO profile_images (user_id, image_id)
            VALUES ($1, $2)
            RETURNING id, user_id, image_id, created_at
            "#,
        )
        .bind(user_id)
        .bind(image_id)
        .fetch_one(executor)
        .await
    }

    /// The most recently attached profile image
    pub async fn latest_for_user<'e, E>(executor: E, user_id: i64) -> Result<Option<Image>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Image>(
            r#"
            SELECT i.id, i.path, i.url, i.size, i.width, i.height, i.mime_type,
                   i.user_id, i.created_at
            FROM profile_images pi
            JOIN images i ON i.id = pi.image_id AND i.deleted_at IS NULL
            WHERE pi.user_id = $1 AND pi.deleted_at IS NULL
            ORDER BY pi.created_at DESC, pi.id DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(executor)
        .await
    }
}
