/// Request guard
///
/// Every protected request walks this state machine before its handler runs:
///
/// ```text
/// Start ──protect / protect_refresh──▶ IdentityResolved
/// IdentityResolved ──permission / team_permission──▶ Admitted
/// any state ──failure──▶ Rejected (Unauthorized)
/// ```
///
/// - **protect**: token from the `session` cookie, else from
///   `Authorization: Bearer <token>`; validated as an access token; the user
///   must still exist.
/// - **protect_refresh**: header only, validated as a refresh token.
/// - **permission**: global rule check with the user id as subject.
/// - **team_permission**: the user needs an active membership in the team
///   named by the `:team_id` path parameter, and the membership's role must
///   have a rule for the request path and method.
///
/// Every failure becomes the same [`GuardError`] family and the same external
/// response; which check failed is only written to the log.
///
/// The guard reaches storage through the [`UserDirectory`],
/// [`MembershipDirectory`] and [`PolicyStore`] traits. [`PgDirectory`] and
/// [`PgPolicyStore`](super::policy::PgPolicyStore) are the production
/// implementations.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, error};

use super::identity::Identity;
use super::jwt::{CredentialService, JwtError};
use super::policy::{PolicyEnforcer, PolicyError, PolicyStore};
use crate::models::{membership::TeamMember, role::TeamRole, user::User};

/// Name of the cookie carrying the access token
pub const SESSION_COOKIE: &str = "session";

/// Why a request was rejected
///
/// Displayed only in logs. Responses always say "Unauthorized".
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("no token presented")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(#[from] JwtError),

    #[error("token subject {0} does not exist")]
    UnknownUser(i64),

    #[error("team id {0:?} is not valid")]
    InvalidTeamId(String),

    #[error("user {user_id} has no active membership in team {team_id}")]
    NotMember { team_id: i64, user_id: i64 },

    #[error("policy denied {subject} {action} {object}")]
    Denied {
        subject: String,
        object: String,
        action: String,
    },

    #[error("policy unavailable: {0}")]
    PolicyUnavailable(#[from] PolicyError),

    #[error("directory lookup failed: {0}")]
    Lookup(#[from] sqlx::Error),
}

impl GuardError {
    /// Rejections caused by a failing dependency rather than by the caller
    pub fn is_internal(&self) -> bool {
        matches!(self, GuardError::PolicyUnavailable(_) | GuardError::Lookup(_))
    }
}

/// Existence check for token subjects
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_exists(&self, user_id: i64) -> Result<bool, sqlx::Error>;
}

/// Active team memberships
#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    /// Role of the user's active membership; `None` when absent or pending
    async fn active_role(&self, team_id: i64, user_id: i64) -> Result<Option<TeamRole>, sqlx::Error>;
}

/// PostgreSQL-backed directories
#[derive(Debug, Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgDirectory {
    async fn user_exists(&self, user_id: i64) -> Result<bool, sqlx::Error> {
        User::exists(&self.pool, user_id).await
    }
}

#[async_trait]
impl MembershipDirectory for PgDirectory {
    async fn active_role(&self, team_id: i64, user_id: i64) -> Result<Option<TeamRole>, sqlx::Error> {
        let role_id = TeamMember::active_role_id(&self.pool, team_id, user_id).await?;
        Ok(role_id.and_then(TeamRole::from_id))
    }
}

/// Result of a successful team check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamAccess {
    pub team_id: i64,
    pub role: TeamRole,
}

/// Authentication and authorization checks for one request
#[derive(Clone)]
pub struct AuthGuard {
    credentials: Arc<CredentialService>,
    users: Arc<dyn UserDirectory>,
    memberships: Arc<dyn MembershipDirectory>,
    policy: PolicyEnforcer,
}

impl AuthGuard {
    pub fn new(
        credentials: Arc<CredentialService>,
        users: Arc<dyn UserDirectory>,
        memberships: Arc<dyn MembershipDirectory>,
        policy_store: Arc<dyn PolicyStore>,
    ) -> Self {
        Self {
            credentials,
            users,
            memberships,
            policy: PolicyEnforcer::new(policy_store),
        }
    }

    /// Resolves the caller from an access token
    ///
    /// A non-empty session cookie wins over the Authorization header.
    pub async fn protect(
        &self,
        session_cookie: Option<&str>,
        authorization: Option<&str>,
    ) -> Result<Identity, GuardError> {
        let token = session_cookie
            .filter(|token| !token.is_empty())
            .or_else(|| authorization.and_then(bearer_token))
            .ok_or(GuardError::MissingToken);

        let identity = match token {
            Ok(token) => self
                .credentials
                .identity_from_access_token(token)
                .map_err(GuardError::from),
            Err(err) => Err(err),
        };

        self.ensure_user(identity).await.map_err(rejected)
    }

    /// Resolves the caller from a refresh token in the Authorization header
    pub async fn protect_refresh(&self, authorization: Option<&str>) -> Result<Identity, GuardError> {
        let identity = authorization
            .and_then(bearer_token)
            .ok_or(GuardError::MissingToken)
            .and_then(|token| {
                self.credentials
                    .identity_from_refresh_token(token)
                    .map_err(GuardError::from)
            });

        self.ensure_user(identity).await.map_err(rejected)
    }

    /// Global rule check: subject is the user id
    pub async fn permission(&self, identity: &Identity, path: &str, method: &str) -> Result<(), GuardError> {
        self.check(&identity.policy_subject(), path, method)
            .await
            .map_err(rejected)
    }

    /// Team-scoped check for `raw_team_id` taken from the path
    ///
    /// Membership is checked before anything about the team itself is read,
    /// so a team that does not exist is indistinguishable from one the caller
    /// does not belong to.
    pub async fn team_permission(
        &self,
        identity: &Identity,
        raw_team_id: Option<&str>,
        path: &str,
        method: &str,
    ) -> Result<TeamAccess, GuardError> {
        self.team_check(identity, raw_team_id, path, method)
            .await
            .map_err(rejected)
    }

    async fn team_check(
        &self,
        identity: &Identity,
        raw_team_id: Option<&str>,
        path: &str,
        method: &str,
    ) -> Result<TeamAccess, GuardError> {
        let raw = raw_team_id.unwrap_or_default();
        let team_id = raw
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| GuardError::InvalidTeamId(raw.to_string()))?;

        let role = self
            .memberships
            .active_role(team_id, identity.user_id)
            .await?
            .ok_or(GuardError::NotMember {
                team_id,
                user_id: identity.user_id,
            })?;

        self.check(role.policy_subject(), path, method).await?;

        Ok(TeamAccess { team_id, role })
    }

    async fn check(&self, subject: &str, path: &str, method: &str) -> Result<(), GuardError> {
        if self.policy.enforce(subject, path, method).await? {
            Ok(())
        } else {
            Err(GuardError::Denied {
                subject: subject.to_string(),
                object: path.to_string(),
                action: method.to_string(),
            })
        }
    }

    async fn ensure_user(&self, identity: Result<Identity, GuardError>) -> Result<Identity, GuardError> {
        let identity = identity?;

        if self.users.user_exists(identity.user_id).await? {
            Ok(identity)
        } else {
            Err(GuardError::UnknownUser(identity.user_id))
        }
    }
}

/// Token from an `Authorization` value of the form `Bearer <token>`
pub fn bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() => {
            Some(token)
        }
        _ => None,
    }
}

fn rejected(err: GuardError) -> GuardError {
    if err.is_internal() {
        error!(reason = %err, "Request rejected");
    } else {
        debug!(reason = %err, "Request rejected");
    }
    err
}
