/// Scoped transactions
///
/// [`TransactionRunner::with_transaction`] is the only way multi-statement
/// writes open a transaction. The callback receives the transactional
/// connection and hands it down to every query it runs; nothing inside the
/// callback opens a second transaction.
///
/// Outcome handling:
///
/// - `Ok` commits. A failed commit is returned as the error.
/// - `Err` rolls back, then returns the callback's error unchanged.
/// - A panic inside the callback rolls back, then resumes unwinding.
/// - Dropping the returned future (request cancelled, timeout) drops the open
///   transaction, which rolls it back.
///
/// # Example
///
/// ```no_run
/// use futures::FutureExt;
/// use stockroom_shared::db::transaction::TransactionRunner;
///
/// # async fn example(runner: TransactionRunner) -> Result<(), sqlx::Error> {
/// let total: i64 = runner
///     .with_transaction(|conn| {
///         async move {
///             sqlx::query("UPDATE products SET price = price + 1 WHERE team_id = 1")
///                 .execute(&mut *conn)
///                 .await?;
///             let (total,): (i64,) = sqlx::query_as("SELECT COALESCE(SUM(price), 0)::BIGINT FROM products")
///                 .fetch_one(&mut *conn)
///                 .await?;
///             Ok::<_, sqlx::Error>(total)
///         }
///         .boxed()
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```

use futures::{future::BoxFuture, FutureExt};
use sqlx::{PgConnection, PgPool};
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, warn};

/// Opens, commits and rolls back transactions on behalf of write protocols
#[derive(Debug, Clone)]
pub struct TransactionRunner {
    pool: PgPool,
}

impl TransactionRunner {
    /// Creates a runner over the given pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The pool transactions are drawn from
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs `f` inside a single transaction
    ///
    /// The callback must only capture owned values; it gets the connection
    /// for the lifetime of the returned future.
    ///
    /// # Errors
    ///
    /// Returns the callback's error after rolling back, or the begin/commit
    /// failure converted through `E: From<sqlx::Error>`.
    pub async fn with_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T, E>>,
        E: From<sqlx::Error>,
    {
        let mut tx = self.pool.begin().await?;

        let outcome = AssertUnwindSafe(f(&mut *tx)).catch_unwind().await;

        match outcome {
            Ok(Ok(value)) => {
                tx.commit().await?;
                debug!("Transaction committed");
                Ok(value)
            }
            Ok(Err(err)) => {
                if let Err(rollback_err) = tx.rollback().await {
                    // The connection is discarded by the pool either way.
                    warn!(error = %rollback_err, "Rollback failed after callback error");
                }
                debug!("Transaction rolled back");
                Err(err)
            }
            Err(panic) => {
                if let Err(rollback_err) = tx.rollback().await {
                    error!(error = %rollback_err, "Rollback failed after panic");
                }
                std::panic::resume_unwind(panic)
            }
        }
    }
}
