/// Team membership rows
///
/// # Schema
///
/// ```sql
/// CREATE TABLE team_members (
///     id BIGSERIAL PRIMARY KEY,
///     team_id BIGINT NOT NULL REFERENCES teams(id),
///     user_id BIGINT NOT NULL REFERENCES users(id),
///     team_role_id BIGINT NOT NULL REFERENCES team_roles(id),
///     is_active BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at, updated_at, deleted_at
/// );
/// CREATE UNIQUE INDEX team_members_team_user_key
///     ON team_members (team_id, user_id) WHERE deleted_at IS NULL;
/// ```
///
/// # Lifecycle
///
/// ```text
/// None ──invite / request join──▶ Pending (is_active = false, role = Member)
/// Pending ──accept──▶ Active (is_active = true, role = assigned)
/// None ──create team / join by link──▶ Active
/// ```
///
/// The transitions themselves live in `writes::membership`; this module only
/// holds the single-statement queries they are built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, PgPool};

use super::pagination::{Page, PageRequest};
use super::role::TeamRole;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamMember {
    pub id: i64,
    pub team_id: i64,
    pub user_id: i64,
    pub team_role_id: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Where a (team, user) pair sits in the membership lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipState {
    None,
    Pending,
    Active,
}

impl MembershipState {
    pub fn of(member: Option<&TeamMember>) -> Self {
        match member {
            None => MembershipState::None,
            Some(m) if m.is_active => MembershipState::Active,
            Some(_) => MembershipState::Pending,
        }
    }
}

impl TeamMember {
    pub fn role(&self) -> Option<TeamRole> {
        TeamRole::from_id(self.team_role_id)
    }

    pub fn state(&self) -> MembershipState {
        MembershipState::of(Some(self))
    }
}

/// Member row joined with the public parts of the user
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MemberProfile {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub member: TeamMember,

    pub username: String,
    pub email: String,
    pub full_name: String,
}

impl TeamMember {
    /// Inserts a membership row
    ///
    /// # Errors
    ///
    /// Unique violation when the user already has a live row in the team.
    pub async fn create<'e, E>(
        executor: E,
        team_id: i64,
        user_id: i64,
        role: TeamRole,
        is_active: bool,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, TeamMember>(
            r#"
            INSERT INTO team_members (team_id, user_id, team_role_id, is_active)
            VALUES ($1, $2, $3, $4)
            RETURNING id, team_id, user_id, team_role_id, is_active, created_at, updated_at
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .bind(role.id())
        .bind(is_active)
        .fetch_one(executor)
        .await
    }

    pub async fn find<'e, E>(executor: E, team_id: i64, user_id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, TeamMember>(
            r#"
            SELECT id, team_id, user_id, team_role_id, is_active, created_at, updated_at
            FROM team_members
            WHERE team_id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await
    }

    /// Same as [`TeamMember::find`] but holds a row lock until the transaction ends
    pub async fn find_for_update(
        conn: &mut PgConnection,
        team_id: i64,
        user_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TeamMember>(
            r#"
            SELECT id, team_id, user_id, team_role_id, is_active, created_at, updated_at
            FROM team_members
            WHERE team_id = $1 AND user_id = $2 AND deleted_at IS NULL
            FOR UPDATE
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_optional(conn)
        .await
    }

    /// Role id of an active membership, if any
    ///
    /// Pending rows are invisible here; the guard treats them as no membership.
    pub async fn active_role_id<'e, E>(executor: E, team_id: i64, user_id: i64) -> Result<Option<i64>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT tm.team_role_id
            FROM team_members tm
            JOIN teams t ON t.id = tm.team_id AND t.deleted_at IS NULL
            WHERE tm.team_id = $1 AND tm.user_id = $2
              AND tm.is_active AND tm.deleted_at IS NULL
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await
    }

    /// Pending → Active with the assigned role. Returns false when no pending row matched.
    pub async fn activate<'e, E>(executor: E, team_id: i64, user_id: i64, role: TeamRole) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE team_members
            SET team_role_id = $3, is_active = TRUE, updated_at = NOW()
            WHERE team_id = $1 AND user_id = $2
              AND is_active = FALSE AND deleted_at IS NULL
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .bind(role.id())
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Changes the role of an active member. Returns false when no active row matched.
    pub async fn set_role<'e, E>(executor: E, team_id: i64, user_id: i64, role: TeamRole) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE team_members
            SET team_role_id = $3, updated_at = NOW()
            WHERE team_id = $1 AND user_id = $2
              AND is_active AND deleted_at IS NULL
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .bind(role.id())
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Locks every active owner row of the team and returns how many there are
    pub async fn lock_owners(conn: &mut PgConnection, team_id: i64) -> Result<i64, sqlx::Error> {
        let owners: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT id
            FROM team_members
            WHERE team_id = $1 AND team_role_id = $2
              AND is_active AND deleted_at IS NULL
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(team_id)
        .bind(TeamRole::Owner.id())
        .fetch_all(conn)
        .await?;

        Ok(owners.len() as i64)
    }

    /// Number of active (or pending) memberships in the team
    pub async fn count<'e, E>(executor: E, team_id: i64, is_active: bool) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM team_members
            WHERE team_id = $1 AND is_active = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(team_id)
        .bind(is_active)
        .fetch_one(executor)
        .await
    }

    /// Active (or pending) members with their profile, filtered by username pattern
    pub async fn list_profiles(
        pool: &PgPool,
        team_id: i64,
        is_active: bool,
        username_pattern: Option<String>,
        page: PageRequest,
    ) -> Result<Page<MemberProfile>, sqlx::Error> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM team_members tm
            JOIN users u ON u.id = tm.user_id AND u.deleted_at IS NULL
            WHERE tm.team_id = $1 AND tm.is_active = $2 AND tm.deleted_at IS NULL
              AND ($3::TEXT IS NULL OR u.username ILIKE $3)
            "#,
        )
        .bind(team_id)
        .bind(is_active)
        .bind(username_pattern.as_deref())
        .fetch_one(pool)
        .await?;

        let members = sqlx::query_as::<_, MemberProfile>(
            r#"
            SELECT tm.id, tm.team_id, tm.user_id, tm.team_role_id, tm.is_active,
                   tm.created_at, tm.updated_at, u.username, u.email, u.full_name
            FROM team_members tm
            JOIN users u ON u.id = tm.user_id AND u.deleted_at IS NULL
            WHERE tm.team_id = $1 AND tm.is_active = $2 AND tm.deleted_at IS NULL
              AND ($3::TEXT IS NULL OR u.username ILIKE $3)
            ORDER BY tm.team_role_id, u.username
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(team_id)
        .bind(is_active)
        .bind(username_pattern.as_deref())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

        Ok(Page::new(members, page, total))
    }

    /// Emails of the team's active owners and admins
    pub async fn manager_emails<'e, E>(executor: E, team_id: i64) -> Result<Vec<String>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT u.email
            FROM team_members tm
            JOIN users u ON u.id = tm.user_id AND u.deleted_at IS NULL
            WHERE tm.team_id = $1 AND tm.team_role_id IN ($2, $3)
              AND tm.is_active AND tm.deleted_at IS NULL
            ORDER BY tm.team_role_id, u.email
            "#,
        )
        .bind(team_id)
        .bind(TeamRole::Owner.id())
        .bind(TeamRole::Admin.id())
        .fetch_all(executor)
        .await
    }
}
