/// Multi-table write protocols
///
/// Each protocol runs in exactly one transaction from
/// [`TransactionRunner`](crate::db::transaction::TransactionRunner). Any
/// failure rolls the whole write back before the error reaches the caller, so
/// a team never exists without its owner and a product never exists with a
/// partial category set.
///
/// - [`account`]: registration, profile image
/// - [`team`]: team creation and updates
/// - [`product`]: products with category links, image attach and detach
/// - [`membership`]: invite, join, accept and role changes

pub mod account;
pub mod membership;
pub mod product;
pub mod team;

use crate::db::{is_foreign_key_violation, is_unique_violation};
use crate::sequence::SequenceError;

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// The write collides with existing state (duplicate key, wrong lifecycle state)
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    /// The input refers to rows the caller may not use
    #[error("{0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl WriteError {
    /// Maps a unique violation to `Conflict(message)`, anything else to `Database`
    pub fn conflict_on_duplicate(err: sqlx::Error, message: &str) -> Self {
        if is_unique_violation(&err) {
            WriteError::Conflict(message.to_string())
        } else if is_foreign_key_violation(&err) {
            WriteError::Validation("Referenced row does not exist".to_string())
        } else {
            WriteError::Database(err)
        }
    }
}

impl From<SequenceError> for WriteError {
    fn from(err: SequenceError) -> Self {
        match err {
            SequenceError::NotFound => WriteError::NotFound("Sequence not found".to_string()),
            SequenceError::UnknownEntityType(kind) => {
                WriteError::Validation(format!("Unknown entity type: {}", kind))
            }
            SequenceError::Database(err) => WriteError::Database(err),
        }
    }
}
