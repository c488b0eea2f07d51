/// Per-team document numbering.
///
/// A counter is identified by its scope `(entity_type, team_id, entity_id)`
/// and stored as one row of `auto_increment_sequences`. Allocation locks that
/// row with `SELECT ... FOR UPDATE`, so concurrent callers on the same scope
/// serialize while different scopes never block each other.
///
/// Rollover: transaction documents (`SO`, `CN`, `PO`) restart at 1 on the
/// first allocation of a new UTC day. Product and lot counters never restart.
///
/// ```no_run
/// use stockroom_shared::sequence::{EntityType, SequenceGenerator};
///
/// # async fn example(generator: SequenceGenerator) -> Result<(), Box<dyn std::error::Error>> {
/// // Standalone: the generator opens and commits its own transaction.
/// let n = generator.next(None, EntityType::SaleTransaction, 42, 0).await?;
/// println!("next sale document: {}", n);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::db::transaction::TransactionRunner;

/// Kind of counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    #[serde(rename = "SO")]
    SaleTransaction,
    #[serde(rename = "CN")]
    ReturnTransaction,
    #[serde(rename = "PO")]
    PurchaseTransaction,
    #[serde(rename = "product")]
    Product,
    #[serde(rename = "lot")]
    Lot,
}

impl EntityType {
    /// Value stored in `auto_increment_sequences.entity_type`
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::SaleTransaction => "SO",
            EntityType::ReturnTransaction => "CN",
            EntityType::PurchaseTransaction => "PO",
            EntityType::Product => "product",
            EntityType::Lot => "lot",
        }
    }

    /// Whether the counter restarts at 1 on a new day
    pub fn resets_daily(&self) -> bool {
        !matches!(self, EntityType::Product | EntityType::Lot)
    }

    /// Human-facing code for an allocated value
    ///
    /// Daily counters embed the allocation date (`SO-20240601-0007`); running
    /// counters are zero padded (`P000042`, `LOT000003`).
    pub fn format_code(&self, value: u64, at: DateTime<Utc>) -> String {
        match self {
            EntityType::Product => format!("P{:06}", value),
            EntityType::Lot => format!("LOT{:06}", value),
            daily => format!("{}-{}-{:04}", daily.as_str(), at.format("%Y%m%d"), value),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = SequenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SO" => Ok(EntityType::SaleTransaction),
            "CN" => Ok(EntityType::ReturnTransaction),
            "PO" => Ok(EntityType::PurchaseTransaction),
            "product" => Ok(EntityType::Product),
            "lot" => Ok(EntityType::Lot),
            other => Err(SequenceError::UnknownEntityType(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    /// Reset of a scope that was never allocated
    #[error("sequence not found")]
    NotFound,

    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Value following `current` for a counter last written at `last_updated`
pub fn next_value(
    entity_type: EntityType,
    current: u64,
    last_updated: DateTime<Utc>,
    now: DateTime<Utc>,
) -> u64 {
    let same_day = last_updated.date_naive() == now.date_naive();

    if same_day || !entity_type.resets_daily() {
        current + 1
    } else {
        1
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LockedSequence {
    id: i64,
    sequence: i64,
    updated_at: DateTime<Utc>,
    now: DateTime<Utc>,
}

/// Allocates and resets counters
#[derive(Debug, Clone)]
pub struct SequenceGenerator {
    runner: TransactionRunner,
}

impl SequenceGenerator {
    pub fn new(pool: PgPool) -> Self {
        Self {
            runner: TransactionRunner::new(pool),
        }
    }

    /// Allocates the next value of the scope
    ///
    /// With `Some(conn)` the allocation joins the caller's transaction and the
    /// row lock is held until that transaction ends. With `None` the generator
    /// runs in its own transaction.
    pub async fn next(
        &self,
        conn: Option<&mut PgConnection>,
        entity_type: EntityType,
        team_id: i64,
        entity_id: i64,
    ) -> Result<u64, SequenceError> {
        match conn {
            Some(conn) => next_in(conn, entity_type, team_id, entity_id).await,
            None => {
                self.runner
                    .with_transaction(move |conn| {
                        next_in(conn, entity_type, team_id, entity_id).boxed()
                    })
                    .await
            }
        }
    }

    /// Sets the scope's counter back to 0
    ///
    /// # Errors
    ///
    /// [`SequenceError::NotFound`] when the scope has never been allocated.
    pub async fn reset(
        &self,
        conn: Option<&mut PgConnection>,
        entity_type: EntityType,
        team_id: i64,
        entity_id: i64,
    ) -> Result<(), SequenceError> {
        let query = sqlx::query(
            r#"
            UPDATE auto_increment_sequences
            SET sequence = 0, updated_at = NOW()
            WHERE entity_type = $1 AND team_id = $2 AND entity_id = $3
              AND deleted_at IS NULL
            "#,
        )
        .bind(entity_type.as_str())
        .bind(team_id)
        .bind(entity_id);

        let result = match conn {
            Some(conn) => query.execute(conn).await?,
            None => query.execute(self.runner.pool()).await?,
        };

        if result.rows_affected() == 0 {
            return Err(SequenceError::NotFound);
        }

        debug!(entity_type = %entity_type, team_id, entity_id, "Sequence reset");
        Ok(())
    }
}

/// Allocation body; must run inside a transaction so the lock spans read and write
async fn next_in(
    conn: &mut PgConnection,
    entity_type: EntityType,
    team_id: i64,
    entity_id: i64,
) -> Result<u64, SequenceError> {
    let locked = match lock_row(conn, entity_type, team_id, entity_id).await? {
        Some(row) => row,
        None => {
            let inserted: Option<i64> = sqlx::query_scalar(
                r#"
                INSERT INTO auto_increment_sequences (entity_type, team_id, entity_id, sequence)
                VALUES ($1, $2, $3, 1)
                ON CONFLICT (entity_type, team_id, entity_id) WHERE deleted_at IS NULL
                DO NOTHING
                RETURNING sequence
                "#,
            )
            .bind(entity_type.as_str())
            .bind(team_id)
            .bind(entity_id)
            .fetch_optional(&mut *conn)
            .await?;

            if inserted.is_some() {
                debug!(entity_type = %entity_type, team_id, entity_id, "Sequence created");
                return Ok(1);
            }

            // Another transaction created the scope first; its row is visible once it commits.
            lock_row(conn, entity_type, team_id, entity_id)
                .await?
                .ok_or(SequenceError::Database(sqlx::Error::RowNotFound))?
        }
    };

    let value = next_value(
        entity_type,
        locked.sequence.max(0) as u64,
        locked.updated_at,
        locked.now,
    );

    sqlx::query(
        r#"
        UPDATE auto_increment_sequences
        SET sequence = $2, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(locked.id)
    .bind(value as i64)
    .execute(&mut *conn)
    .await?;

    Ok(value)
}

async fn lock_row(
    conn: &mut PgConnection,
    entity_type: EntityType,
    team_id: i64,
    entity_id: i64,
) -> Result<Option<LockedSequence>, sqlx::Error> {
    sqlx::query_as::<_, LockedSequence>(
        r#"
        SELECT id, sequence, updated_at, NOW() AS now
        FROM auto_increment_sequences
        WHERE entity_type = $1 AND team_id = $2 AND entity_id = $3
          AND deleted_at IS NULL
        FOR UPDATE
        "#,
    )
    .bind(entity_type.as_str())
    .bind(team_id)
    .bind(entity_id)
    .fetch_optional(&mut *conn)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_same_day_increments_for_every_type() {
        for entity_type in [
            EntityType::SaleTransaction,
            EntityType::ReturnTransaction,
            EntityType::PurchaseTransaction,
            EntityType::Product,
            EntityType::Lot,
        ] {
            assert_eq!(next_value(entity_type, 5, at(1, 8), at(1, 23)), 6);
        }
    }

    #[test]
    fn test_transactions_restart_on_new_day() {
        assert_eq!(next_value(EntityType::SaleTransaction, 17, at(1, 23), at(2, 0)), 1);
        assert_eq!(next_value(EntityType::PurchaseTransaction, 3, at(1, 12), at(5, 12)), 1);
        assert_eq!(next_value(EntityType::ReturnTransaction, 1, at(1, 12), at(2, 12)), 1);
    }

    #[test]
    fn test_running_counters_never_restart() {
        assert_eq!(next_value(EntityType::Lot, 41, at(1, 23), at(2, 0)), 42);
        assert_eq!(next_value(EntityType::Product, 9, at(1, 12), at(30, 12)), 10);
    }

    #[test]
    fn test_reset_counter_starts_again_at_one() {
        assert_eq!(next_value(EntityType::Product, 0, at(1, 12), at(1, 13)), 1);
    }

    #[test]
    fn test_entity_type_round_trip() {
        for raw in ["SO", "CN", "PO", "product", "lot"] {
            let parsed: EntityType = raw.parse().unwrap();
            assert_eq!(parsed.as_str(), raw);
        }
        assert!("so".parse::<EntityType>().is_err());
    }

    #[test]
    fn test_format_code() {
        assert_eq!(EntityType::Product.format_code(42, at(1, 0)), "P000042");
        assert_eq!(EntityType::Lot.format_code(3, at(1, 0)), "LOT000003");
        assert_eq!(
            EntityType::SaleTransaction.format_code(7, at(1, 0)),
            "SO-20240601-0007"
        );
    }
}
