/// Startup seeding
///
/// Runs after migrations on every start. Each insert is `ON CONFLICT DO
/// NOTHING`, so re-running is harmless and rules edited by operators are
/// never overwritten, only missing defaults are restored.
///
/// Seeded:
///
/// - `roles`, `team_roles` and `report_json_schema_types` catalogs
/// - default team-scope rules (`team:member` < `team:admin` < `team:owner`)
/// - default global rules and the `role:*` hierarchy for `/reports`

use futures::FutureExt;
use sqlx::{PgConnection, PgPool};
use tracing::info;

use super::transaction::TransactionRunner;
use crate::models::{
    policy::PolicyRule,
    role::{ReportSchemaType, Role, TeamRole},
};

/// Counts of rows actually inserted by one seeding run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub catalog_rows: u64,
    pub policy_rules: u64,
}

/// Permission rules every deployment starts with
pub fn default_policy_rules() -> Vec<PolicyRule> {
    let member = TeamRole::Member.policy_subject();
    let admin = TeamRole::Admin.policy_subject();
    let owner = TeamRole::Owner.policy_subject();

    vec![
        // Team scope
        PolicyRule::permission(member, "/teams/:team_id", "GET"),
        PolicyRule::permission(member, "/teams/:team_id/member-count", "GET"),
        PolicyRule::permission(member, "/teams/:team_id/members", "GET"),
        PolicyRule::permission(member, "/teams/:team_id/user-me", "GET"),
        PolicyRule::permission(member, "/teams/:team_id/product_category", "GET|POST"),
        PolicyRule::permission(member, "/teams/:team_id/product_category/*", "GET|PUT"),
        PolicyRule::permission(member, "/teams/:team_id/products", "GET|POST"),
        PolicyRule::permission(member, "/teams/:team_id/products/*", "GET|PUT|POST"),
        PolicyRule::permission(member, "/teams/:team_id/sequences/:entity_type/next", "POST"),
        PolicyRule::permission(admin, "/teams/:team_id", "PUT"),
        PolicyRule::permission(admin, "/teams/:team_id/pending-member-count", "GET"),
        PolicyRule::permission(admin, "/teams/:team_id/pending-members", "GET"),
        PolicyRule::permission(admin, "/teams/:team_id/pending-member", "POST"),
        PolicyRule::permission(admin, "/teams/:team_id/accept", "POST"),
        PolicyRule::permission(admin, "/teams/:team_id/shared-link", "POST"),
        PolicyRule::permission(admin, "/teams/:team_id/product_category/*", "DELETE"),
        PolicyRule::permission(admin, "/teams/:team_id/products/*", "DELETE"),
        PolicyRule::permission(admin, "/teams/:team_id/sequences/:entity_type/reset", "POST"),
        PolicyRule::permission(owner, "/teams/:team_id/member-role", "PUT"),
        PolicyRule::grouping(owner, admin),
        PolicyRule::grouping(admin, member),
        // Global scope
        PolicyRule::permission(Role::User.policy_subject(), "/reports", "GET"),
        PolicyRule::permission(Role::User.policy_subject(), "/reports/*", "GET"),
        PolicyRule::permission(Role::Admin.policy_subject(), "/reports", "*"),
        PolicyRule::permission(Role::Admin.policy_subject(), "/reports/*", "*"),
        PolicyRule::grouping(Role::SuperAdmin.policy_subject(), Role::Admin.policy_subject()),
        PolicyRule::grouping(Role::Admin.policy_subject(), Role::Moderator.policy_subject()),
        PolicyRule::grouping(Role::Moderator.policy_subject(), Role::User.policy_subject()),
    ]
}

/// Grouping that gives a user account its global role
pub fn user_role_grouping(user_id: i64, role: Role) -> PolicyRule {
    PolicyRule::grouping(&user_id.to_string(), role.policy_subject())
}

/// Seeds catalogs and default rules in one transaction
pub async fn seed(pool: &PgPool) -> Result<SeedReport, sqlx::Error> {
    let report = TransactionRunner::new(pool.clone())
        .with_transaction(|conn| seed_in(conn).boxed())
        .await?;

    info!(
        catalog_rows = report.catalog_rows,
        policy_rules = report.policy_rules,
        "Seed data applied"
    );

    Ok(report)
}

async fn seed_in(conn: &mut PgConnection) -> Result<SeedReport, sqlx::Error> {
    let mut report = SeedReport::default();

    for role in Role::ALL {
        report.catalog_rows += insert_catalog_row(conn, "roles", role.id(), role.name()).await?;
    }

    for role in TeamRole::ALL {
        report.catalog_rows += insert_catalog_row(conn, "team_roles", role.id(), role.name()).await?;
    }

    for kind in ReportSchemaType::ALL {
        report.catalog_rows +=
            insert_catalog_row(conn, "report_json_schema_types", kind.id(), kind.name()).await?;
    }

    for rule in default_policy_rules() {
        if PolicyRule::insert(&mut *conn, &rule).await? {
            report.policy_rules += 1;
        }
    }

    Ok(report)
}

async fn insert_catalog_row(
    conn: &mut PgConnection,
    table: &'static str,
    id: i64,
    name: &str,
) -> Result<u64, sqlx::Error> {
    let sql = format!(
        "INSERT INTO {} (id, name) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        table
    );

    let result = sqlx::query(&sql).bind(id).bind(name).execute(conn).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::policy::Policy;

    fn policy() -> Policy {
        Policy::from_rules(default_policy_rules())
    }

    #[test]
    fn test_member_can_read_and_edit_catalog() {
        let policy = policy();

        assert!(policy.enforce("team:member", "/teams/7", "GET"));
        assert!(policy.enforce("team:member", "/teams/7/products", "POST"));
        assert!(policy.enforce("team:member", "/teams/7/products/3", "PUT"));
        assert!(policy.enforce("team:member", "/teams/7/products/3/upload_image", "POST"));
        assert!(policy.enforce("team:member", "/teams/7/product_category/2", "GET"));
        assert!(policy.enforce("team:member", "/teams/7/sequences/SO/next", "POST"));
    }

    #[test]
    fn test_member_cannot_manage_team() {
        let policy = policy();

        assert!(!policy.enforce("team:member", "/teams/7", "PUT"));
        assert!(!policy.enforce("team:member", "/teams/7/pending-member", "POST"));
        assert!(!policy.enforce("team:member", "/teams/7/accept", "POST"));
        assert!(!policy.enforce("team:member", "/teams/7/products/3", "DELETE"));
        assert!(!policy.enforce("team:member", "/teams/7/sequences/SO/reset", "POST"));
    }

    #[test]
    fn test_role_inheritance() {
        let policy = policy();

        assert!(policy.enforce("team:admin", "/teams/7/products", "GET"));
        assert!(policy.enforce("team:admin", "/teams/7/accept", "POST"));
        assert!(!policy.enforce("team:admin", "/teams/7/member-role", "PUT"));

        assert!(policy.enforce("team:owner", "/teams/7/member-role", "PUT"));
        assert!(policy.enforce("team:owner", "/teams/7/product_category/1", "DELETE"));
    }

    #[test]
    fn test_global_report_rules() {
        let mut rules = default_policy_rules();
        rules.push(user_role_grouping(5, Role::User));
        rules.push(user_role_grouping(6, Role::SuperAdmin));
        let policy = Policy::from_rules(rules);

        assert!(policy.enforce("5", "/reports", "GET"));
        assert!(policy.enforce("5", "/reports/12", "GET"));
        assert!(!policy.enforce("5", "/reports", "POST"));
        assert!(!policy.enforce("5", "/reports/12", "DELETE"));

        assert!(policy.enforce("6", "/reports", "POST"));
        assert!(policy.enforce("6", "/reports/12", "DELETE"));

        // Unknown user id has no grouping at all
        assert!(!policy.enforce("7", "/reports", "GET"));
    }

    #[test]
    fn test_team_subjects_do_not_leak_into_global_scope() {
        let policy = policy();

        assert!(!policy.enforce("team:owner", "/reports", "GET"));
        assert!(!policy.enforce("role:superadmin", "/teams/7", "GET"));
    }
}
