//! # Stockroom Shared Library
//!
//! Domain types, persistence and the authorization core used by the
//! Stockroom API server.
//!
//! ## Module Organization
//!
//! - `auth`: credentials, password hashing, policy evaluation and the request guard
//! - `db`: connection pool, migrations, seed data and the transaction runner
//! - `models`: table-level models and their queries
//! - `sequence`: per-team document numbering
//! - `writes`: multi-table write protocols (teams, products, memberships, accounts)
//! - `mailer`: outbound notification seam

pub mod auth;
pub mod db;
pub mod mailer;
pub mod models;
pub mod sequence;
pub mod writes;

/// Current version of the Stockroom shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
