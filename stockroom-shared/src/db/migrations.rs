/// Schema migrations compiled into the binary from `stockroom-shared/migrations/`.

use sqlx::{
    migrate::{MigrateDatabase, MigrateError, Migrator},
    postgres::PgPool,
    Postgres,
};
use tracing::{error, info};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStatus {
    pub applied_migrations: usize,
    pub latest_version: Option<i64>,
    /// No embedded migration is left to apply
    pub is_up_to_date: bool,
}

/// Applies pending migrations; a no-op on an up-to-date schema
///
/// # Errors
///
/// A failing migration, or a checksum mismatch on one that was edited after
/// being applied.
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    if let Err(e) = MIGRATOR.run(pool).await {
        error!(error = %e, "Migrations failed");
        return Err(e);
    }

    info!(embedded = MIGRATOR.migrations.len(), "Schema up to date");
    Ok(())
}

/// Compares the `_sqlx_migrations` ledger with the embedded set
pub async fn get_migration_status(pool: &PgPool) -> Result<MigrationStatus, sqlx::Error> {
    let ledger: Option<String> = sqlx::query_scalar("SELECT to_regclass('_sqlx_migrations')::TEXT")
        .fetch_one(pool)
        .await?;

    let (applied, latest_version) = match ledger {
        None => (0, None),
        Some(_) => {
            let (count, latest): (i64, Option<i64>) =
                sqlx::query_as("SELECT COUNT(*), MAX(version) FROM _sqlx_migrations WHERE success")
                    .fetch_one(pool)
                    .await?;
            (usize::try_from(count).unwrap_or(0), latest)
        }
    };

    Ok(MigrationStatus {
        applied_migrations: applied,
        latest_version,
        is_up_to_date: applied >= MIGRATOR.migrations.len(),
    })
}

/// Creates the database named in `database_url` if it does not exist
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if Postgres::database_exists(database_url).await? {
        return Ok(());
    }

    info!("Creating missing database");
    Postgres::create_database(database_url).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_schema_is_embedded() {
        assert!(MIGRATOR
            .migrations
            .iter()
            .any(|m| m.description.contains("initial schema")));
    }
}
