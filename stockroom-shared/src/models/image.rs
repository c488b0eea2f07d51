/// Uploaded image metadata. Storage of the bytes is outside this service;
/// rows only record where the file lives and its dimensions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Image {
    pub id: i64,
    pub path: String,
    pub url: String,
    pub size: f64,
    pub width: i32,
    pub height: i32,
    pub mime_type: String,
    /// Uploader
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateImage {
    pub path: String,
    pub url: String,
    pub size: f64,
    pub width: i32,
    pub height: i32,
    pub mime_type: String,
}

impl Image {
    pub async fn create<'e, E>(executor: E, user_id: i64, data: CreateImage) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Image>(
            r#"
            INSERT INTO images (path, url, size, width, height, mime_type, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, path, url, size, width, height, mime_type, user_id, created_at
            "#,
        )
        .bind(data.path)
        .bind(data.url)
        .bind(data.size)
        .bind(data.width)
        .bind(data.height)
        .bind(data.mime_type)
        .bind(user_id)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Image>(
            r#"
            SELECT id, path, url, size, width, height, mime_type, user_id, created_at
            FROM images
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }
}
