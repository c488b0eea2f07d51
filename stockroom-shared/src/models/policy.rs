/// Persisted authorization rules in the casbin-style `casbin_rule` table.
///
/// `p` rows are permissions `(subject, object, action)` in `v0..v2`;
/// `g` rows are groupings `(member, role)` in `v0..v1`.

use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PolicyRule {
    pub ptype: String,
    pub v0: String,
    pub v1: String,
    pub v2: String,
}

impl PolicyRule {
    pub fn permission(subject: &str, object: &str, action: &str) -> Self {
        Self {
            ptype: "p".to_string(),
            v0: subject.to_string(),
            v1: object.to_string(),
            v2: action.to_string(),
        }
    }

    pub fn grouping(member: &str, role: &str) -> Self {
        Self {
            ptype: "g".to_string(),
            v0: member.to_string(),
            v1: role.to_string(),
            v2: String::new(),
        }
    }

    pub async fn load_all<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, PolicyRule>(
            "SELECT ptype, v0, v1, v2 FROM casbin_rule ORDER BY id",
        )
        .fetch_all(executor)
        .await
    }

    /// Inserts the rule unless an identical one exists; true when inserted
    pub async fn insert<'e, E>(executor: E, rule: &PolicyRule) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO casbin_rule (ptype, v0, v1, v2)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&rule.ptype)
        .bind(&rule.v0)
        .bind(&rule.v1)
        .bind(&rule.v2)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes a rule; true when a row was removed
    pub async fn remove<'e, E>(executor: E, rule: &PolicyRule) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "DELETE FROM casbin_rule WHERE ptype = $1 AND v0 = $2 AND v1 = $3 AND v2 = $4",
        )
        .bind(&rule.ptype)
        .bind(&rule.v0)
        .bind(&rule.v1)
        .bind(&rule.v2)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
