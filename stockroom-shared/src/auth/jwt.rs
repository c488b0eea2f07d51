/// Token issuing and validation
///
/// All tokens are HS256 JWTs with issuer `stockroom`. Each kind is signed
/// with its own key and carries its kind as a claim, so a token is accepted
/// only where that kind is expected. A refresh token presented as an access
/// token fails signature verification before the kind is even looked at.
///
/// # Token kinds
///
/// | Kind           | Key     | Default lifetime | Carries          |
/// |----------------|---------|------------------|------------------|
/// | `access`       | access  | 24 hours         | user id          |
/// | `refresh`      | refresh | 30 days          | user id          |
/// | `email_verify` | link    | 24 hours         | user id          |
/// | `team_invite`  | link    | 7 days           | user id, team id |
/// | `team_link`    | link    | 7 days           | team id          |
///
/// # Example
///
/// ```
/// use stockroom_shared::auth::jwt::{CredentialService, JwtSettings};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let credentials = CredentialService::new(JwtSettings::new(
///     "access-secret-at-least-32-bytes-long!!",
///     "refresh-secret-at-least-32-bytes-long!",
///     "link-secret-at-least-32-bytes-long!!!!",
/// ));
///
/// let token = credentials.issue_access_token(42)?;
/// assert_eq!(credentials.identity_from_access_token(&token)?.user_id, 42);
///
/// // The same string is not a refresh token.
/// assert!(credentials.identity_from_refresh_token(&token).is_err());
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::identity::Identity;

const ISSUER: &str = "stockroom";

/// Error type for token operations
///
/// Callers on the request path map every variant to Unauthorized; the
/// variants only exist so the reason can be logged.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("failed to create token: {0}")]
    CreateError(String),

    #[error("token has expired")]
    Expired,

    #[error("token is not a {expected} token")]
    WrongKind { expected: &'static str },

    #[error("token is missing the {0} claim")]
    MissingClaim(&'static str),

    #[error("invalid token: {0}")]
    Invalid(String),
}

/// What a token may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
    EmailVerify,
    TeamInvite,
    TeamLink,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
            TokenKind::EmailVerify => "email_verify",
            TokenKind::TeamInvite => "team_invite",
            TokenKind::TeamLink => "team_link",
        }
    }
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id; 0 for tokens that are not bound to a user
    pub sub: i64,

    pub iss: String,

    pub iat: i64,

    pub exp: i64,

    pub nbf: i64,

    pub kind: TokenKind,

    /// Team the token refers to (invites and shared links)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<i64>,
}

impl Claims {
    pub fn new(user_id: i64, kind: TokenKind, expires_in: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            kind,
            team_id: None,
        }
    }

    pub fn with_team(mut self, team_id: i64) -> Self {
        self.team_id = Some(team_id);
        self
    }
}

/// Signs claims with HS256
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&Header::new(Algorithm::HS256), claims, &key)
        .map_err(|e| JwtError::CreateError(e.to_string()))
}

/// Verifies signature, issuer, `exp`, `nbf` and the expected kind
pub fn validate_token(token: &str, secret: &str, expected: TokenKind) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    let claims = decode::<Claims>(token, &key, &validation)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
            _ => JwtError::Invalid(e.to_string()),
        })?
        .claims;

    if claims.kind != expected {
        return Err(JwtError::WrongKind {
            expected: expected.as_str(),
        });
    }

    Ok(claims)
}

/// Secrets and lifetimes for [`CredentialService`]
#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    pub link_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub email_verify_ttl: Duration,
    pub team_invite_ttl: Duration,
}

impl JwtSettings {
    /// Settings with the default lifetimes
    pub fn new(
        access_secret: impl Into<String>,
        refresh_secret: impl Into<String>,
        link_secret: impl Into<String>,
    ) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            link_secret: link_secret.into(),
            access_ttl: Duration::hours(24),
            refresh_ttl: Duration::days(30),
            email_verify_ttl: Duration::hours(24),
            team_invite_ttl: Duration::days(7),
        }
    }
}

/// Access and refresh token issued together at login and refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub token: String,
    pub refresh_token: String,
}

/// Issues and validates every token the service hands out
#[derive(Debug, Clone)]
pub struct CredentialService {
    settings: JwtSettings,
}

impl CredentialService {
    pub fn new(settings: JwtSettings) -> Self {
        Self { settings }
    }

    pub fn issue_access_token(&self, user_id: i64) -> Result<String, JwtError> {
        let claims = Claims::new(user_id, TokenKind::Access, self.settings.access_ttl);
        create_token(&claims, &self.settings.access_secret)
    }

    pub fn issue_refresh_token(&self, user_id: i64) -> Result<String, JwtError> {
        let claims = Claims::new(user_id, TokenKind::Refresh, self.settings.refresh_ttl);
        create_token(&claims, &self.settings.refresh_secret)
    }

    pub fn issue_token_pair(&self, user_id: i64) -> Result<TokenPair, JwtError> {
        Ok(TokenPair {
            token: self.issue_access_token(user_id)?,
            refresh_token: self.issue_refresh_token(user_id)?,
        })
    }

    pub fn identity_from_access_token(&self, token: &str) -> Result<Identity, JwtError> {
        let claims = validate_token(token, &self.settings.access_secret, TokenKind::Access)?;
        Ok(Identity::new(claims.sub))
    }

    pub fn identity_from_refresh_token(&self, token: &str) -> Result<Identity, JwtError> {
        let claims = validate_token(token, &self.settings.refresh_secret, TokenKind::Refresh)?;
        Ok(Identity::new(claims.sub))
    }

    pub fn issue_email_verify_token(&self, user_id: i64) -> Result<String, JwtError> {
        let claims = Claims::new(user_id, TokenKind::EmailVerify, self.settings.email_verify_ttl);
        create_token(&claims, &self.settings.link_secret)
    }

    /// User id whose email the token verifies
    pub fn user_from_email_verify_token(&self, token: &str) -> Result<i64, JwtError> {
        let claims = validate_token(token, &self.settings.link_secret, TokenKind::EmailVerify)?;
        Ok(claims.sub)
    }

    /// Token mailed to a user invited into a team
    pub fn issue_team_invite_token(&self, team_id: i64, user_id: i64) -> Result<String, JwtError> {
        let claims = Claims::new(user_id, TokenKind::TeamInvite, self.settings.team_invite_ttl)
            .with_team(team_id);
        create_token(&claims, &self.settings.link_secret)
    }

    /// `(team_id, user_id)` of an invite
    pub fn team_invite_from_token(&self, token: &str) -> Result<(i64, i64), JwtError> {
        let claims = validate_token(token, &self.settings.link_secret, TokenKind::TeamInvite)?;
        let team_id = claims.team_id.ok_or(JwtError::MissingClaim("team_id"))?;
        Ok((team_id, claims.sub))
    }

    /// Shareable link token; anyone holding it may join the team
    pub fn issue_team_link_token(&self, team_id: i64) -> Result<String, JwtError> {
        let claims =
            Claims::new(0, TokenKind::TeamLink, self.settings.team_invite_ttl).with_team(team_id);
        create_token(&claims, &self.settings.link_secret)
    }

    pub fn team_from_link_token(&self, token: &str) -> Result<i64, JwtError> {
        let claims = validate_token(token, &self.settings.link_secret, TokenKind::TeamLink)?;
        claims.team_id.ok_or(JwtError::MissingClaim("team_id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS: &str = "test-access-secret-at-least-32-bytes";
    const REFRESH: &str = "test-refresh-secret-at-least-32-bytes";
    const LINK: &str = "test-link-secret-at-least-32-bytes!!";

    fn service() -> CredentialService {
        CredentialService::new(JwtSettings::new(ACCESS, REFRESH, LINK))
    }

    #[test]
    fn test_access_token_round_trip() {
        let credentials = service();
        let token = credentials.issue_access_token(7).unwrap();

        let identity = credentials.identity_from_access_token(&token).unwrap();
        assert_eq!(identity.user_id, 7);
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let credentials = service();
        let refresh = credentials.issue_refresh_token(7).unwrap();

        assert!(credentials.identity_from_access_token(&refresh).is_err());
        assert_eq!(credentials.identity_from_refresh_token(&refresh).unwrap().user_id, 7);
    }

    #[test]
    fn test_access_token_rejected_as_refresh() {
        let credentials = service();
        let access = credentials.issue_access_token(7).unwrap();

        assert!(credentials.identity_from_refresh_token(&access).is_err());
    }

    #[test]
    fn test_kind_claim_checked_even_with_shared_secret() {
        // Same key for both kinds: only the kind claim separates them.
        let claims = Claims::new(7, TokenKind::Refresh, Duration::hours(1));
        let token = create_token(&claims, ACCESS).unwrap();

        let result = validate_token(&token, ACCESS, TokenKind::Access);
        assert!(matches!(result, Err(JwtError::WrongKind { expected: "access" })));
    }

    #[test]
    fn test_expired_token() {
        let claims = Claims::new(7, TokenKind::Access, Duration::seconds(-60));
        let token = create_token(&claims, ACCESS).unwrap();

        let result = validate_token(&token, ACCESS, TokenKind::Access);
        assert!(matches!(result, Err(JwtError::Expired)));
    }

    #[test]
    fn test_wrong_secret_and_garbage() {
        let claims = Claims::new(7, TokenKind::Access, Duration::hours(1));
        let token = create_token(&claims, "some-other-secret-that-is-long-enough").unwrap();

        assert!(service().identity_from_access_token(&token).is_err());
        assert!(service().identity_from_access_token("not.a.jwt").is_err());
        assert!(service().identity_from_access_token("").is_err());
    }

    #[test]
    fn test_wrong_issuer() {
        let mut claims = Claims::new(7, TokenKind::Access, Duration::hours(1));
        claims.iss = "someone-else".to_string();
        let token = create_token(&claims, ACCESS).unwrap();

        assert!(matches!(
            validate_token(&token, ACCESS, TokenKind::Access),
            Err(JwtError::Invalid(_))
        ));
    }

    #[test]
    fn test_team_invite_token() {
        let credentials = service();
        let token = credentials.issue_team_invite_token(3, 9).unwrap();

        assert_eq!(credentials.team_invite_from_token(&token).unwrap(), (3, 9));
        assert!(credentials.team_from_link_token(&token).is_err());
        assert!(credentials.identity_from_access_token(&token).is_err());
    }

    #[test]
    fn test_team_link_and_email_tokens() {
        let credentials = service();

        let link = credentials.issue_team_link_token(5).unwrap();
        assert_eq!(credentials.team_from_link_token(&link).unwrap(), 5);

        let verify = credentials.issue_email_verify_token(11).unwrap();
        assert_eq!(credentials.user_from_email_verify_token(&verify).unwrap(), 11);
        assert!(credentials.user_from_email_verify_token(&link).is_err());
    }
}
