/// Global report templates. Not team scoped; access goes through the global
/// permission policy instead of team membership.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};

use super::pagination::{Page, PageRequest};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReportTemplate {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub display_name: String,
    pub icon: String,
    pub report_json_schema_type_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportTemplateInput {
    pub code: String,
    pub name: String,
    pub display_name: String,
    pub icon: String,
    pub report_json_schema_type_id: i64,
}

impl ReportTemplate {
    pub async fn create<'e, E>(executor: E, data: ReportTemplateInput) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ReportTemplate>(
            r#"
            INSERT INTO report_templates (code, name, display_name, icon, report_json_schema_type_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, code, name, display_name, icon, report_json_schema_type_id,
                      created_at, updated_at
            "#,
        )
        .bind(data.code)
        .bind(data.name)
        .bind(data.display_name)
        .bind(data.icon)
        .bind(data.report_json_schema_type_id)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ReportTemplate>(
            r#"
            SELECT id, code, name, display_name, icon, report_json_schema_type_id,
                   created_at, updated_at
            FROM report_templates
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn update<'e, E>(executor: E, id: i64, data: ReportTemplateInput) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ReportTemplate>(
            r#"
            UPDATE report_templates
            SET code = $2, name = $3, display_name = $4, icon = $5,
                report_json_schema_type_id = $6, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id, code, name, display_name, icon, report_json_schema_type_id,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(data.code)
        .bind(data.name)
        .bind(data.display_name)
        .bind(data.icon)
        .bind(data.report_json_schema_type_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE report_templates SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list(pool: &PgPool, page: PageRequest) -> Result<Page<Self>, sqlx::Error> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM report_templates WHERE deleted_at IS NULL")
                .fetch_one(pool)
                .await?;

        let templates = sqlx::query_as::<_, ReportTemplate>(
            r#"
            SELECT id, code, name, display_name, icon, report_json_schema_type_id,
                   created_at, updated_at
            FROM report_templates
            WHERE deleted_at IS NULL
            ORDER BY code, id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

        Ok(Page::new(templates, page, total))
    }
}
