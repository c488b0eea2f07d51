/// Authentication and authorization
///
/// - [`jwt`]: token issuing and validation ([`jwt::CredentialService`])
/// - [`password`]: Argon2id hashing
/// - [`identity`]: the caller bound to a request
/// - [`policy`]: rule evaluation over `casbin_rule`
/// - [`guard`]: the per-request state machine tying the above together

pub mod guard;
pub mod identity;
pub mod jwt;
pub mod password;
pub mod policy;
