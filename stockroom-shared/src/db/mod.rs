/// Database layer for Stockroom
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool management with health checks
/// - `migrations`: embedded schema migrations
/// - `seed`: startup seeding of role catalogs and default policy rules
/// - `transaction`: the scoped transaction runner used by every multi-table write
///
/// Queries that run a single statement take any `PgExecutor`, so callers pass
/// either `&pool` or `&mut *conn` from an open transaction. Queries that need
/// several statements to see the same snapshot take `&mut PgConnection`.
///
/// # Example
///
/// ```no_run
/// use stockroom_shared::db::pool::{create_pool, DatabaseConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig {
///         url: std::env::var("DATABASE_URL")?,
///         ..Default::default()
///     };
///
///     let pool = create_pool(config).await?;
///     Ok(())
/// }
/// ```

pub mod migrations;
pub mod pool;
pub mod seed;
pub mod transaction;

/// Returns true when the error is a unique-constraint violation
///
/// Used by writes that translate duplicate keys into a conflict instead of
/// an internal error.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

/// Returns true when the error is a foreign-key violation
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23503"),
        _ => false,
    }
}
