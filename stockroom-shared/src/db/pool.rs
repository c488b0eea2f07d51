/// Bounded PostgreSQL pool.
///
/// The pool is the service's only shared mutable resource. When every
/// connection is checked out, a caller waits up to `acquire_timeout_seconds`
/// and then gets `PoolTimedOut`.

use serde::Serialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// Pool sizing and timeouts, in seconds to match the environment variables
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,

    /// `None` keeps idle connections forever
    pub idle_timeout_seconds: Option<u64>,

    /// `None` never recycles a connection
    pub max_lifetime_seconds: Option<u64>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 2,
            acquire_timeout_seconds: 30,
            idle_timeout_seconds: Some(600),
            max_lifetime_seconds: Some(1800),
        }
    }
}

/// Connects and proves the server answers before returning
pub async fn create_pool(config: DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
        .idle_timeout(config.idle_timeout_seconds.map(Duration::from_secs))
        .max_lifetime(config.max_lifetime_seconds.map(Duration::from_secs))
        .connect(&config.url)
        .await?;

    health_check(&pool).await?;

    info!(
        max = config.max_connections,
        min = config.min_connections,
        acquire_timeout_seconds = config.acquire_timeout_seconds,
        "Database pool ready"
    );
    Ok(pool)
}

pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await?;
    Ok(())
}

/// Pool occupancy at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub active_connections: usize,
    pub idle_connections: usize,
    pub total_connections: usize,
}

pub fn get_pool_stats(pool: &PgPool) -> PoolStats {
    let total = pool.size() as usize;
    let idle = pool.num_idle();

    PoolStats {
        active_connections: total.saturating_sub(idle),
        idle_connections: idle,
        total_connections: total,
    }
}

/// Waits for checked-out connections to return, then closes everything
pub async fn close_pool(pool: PgPool) {
    pool.close().await;
    info!("Database pool closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_recycle_connections() {
        let config = DatabaseConfig::default();

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.acquire_timeout_seconds, 30);
        assert_eq!(config.idle_timeout_seconds, Some(600));
        assert_eq!(config.max_lifetime_seconds, Some(1800));
    }

    #[tokio::test]
    async fn test_lazy_pool_starts_empty() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgresql://stockroom@127.0.0.1:1/unused")
            .unwrap();

        assert_eq!(
            get_pool_stats(&pool),
            PoolStats {
                active_connections: 0,
                idle_connections: 0,
                total_connections: 0,
            }
        );
    }
}
