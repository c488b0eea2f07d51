/// Authentication endpoints
///
/// ```text
/// POST /auth/register          public
/// POST /auth/login             public, sets the session cookie
/// POST /auth/logout            public, clears the session cookie
/// GET  /auth/email/verify      public, ?token=
/// POST /auth/refresh           refresh token (Authorization header only)
/// POST /auth/email/send-verify access token
/// ```
///
/// Login failures never say whether the account exists: an unknown login and
/// a wrong password are the same 401.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    response::ApiResponse,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use stockroom_shared::{
    auth::{identity::Identity, jwt::TokenPair, password},
    mailer::MailMessage,
    models::user::User,
    writes::account::{self, Registration},
};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be 3 to 50 characters"))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Strength is checked separately
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "Full name must be 1 to 100 characters"))]
    pub full_name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username or email is required"))]
    pub username_or_email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build((state.config.cookie.name.clone(), token))
        .path("/")
        .http_only(true)
        .secure(state.config.cookie.secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Creates an account with the `User` role
///
/// # Errors
///
/// - `422`: field validation or weak password
/// - `409`: username or email taken
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<ApiResponse<User>> {
    req.validate()?;
    password::validate_password_strength(&req.password)
        .map_err(|msg| ApiError::invalid("password", msg))?;

    let password_hash = password::hash_password(&req.password)?;

    let user = account::register(
        &state.runner,
        Registration {
            username: req.username.trim().to_string(),
            email: req.email.trim().to_string(),
            password_hash,
            full_name: req.full_name.trim().to_string(),
        },
    )
    .await?;

    Ok(ApiResponse::created(user))
}

/// Issues a token pair and sets the access token as the session cookie
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> ApiResult<(CookieJar, ApiResponse<TokenPair>)> {
    req.validate()?;

    let user = User::find_by_username_or_email(&state.db, req.username_or_email.trim())
        .await?
        .ok_or_else(|| {
            tracing::debug!("Login for unknown account");
            ApiError::Unauthorized
        })?;

    if !password::verify_password(&req.password, &user.password)? {
        tracing::debug!(user_id = user.id, "Login with wrong password");
        return Err(ApiError::Unauthorized);
    }

    let pair = state.credentials.issue_token_pair(user.id)?;
    let jar = jar.add(session_cookie(&state, pair.token.clone()));

    tracing::info!(user_id = user.id, "User logged in");
    Ok((jar, ApiResponse::ok(pair)))
}

/// Rotates both tokens for the holder of a valid refresh token
pub async fn refresh(
    State(state): State<AppState>,
    identity: Identity,
    jar: CookieJar,
) -> ApiResult<(CookieJar, ApiResponse<TokenPair>)> {
    let pair = state.credentials.issue_token_pair(identity.user_id)?;
    let jar = jar.add(session_cookie(&state, pair.token.clone()));

    Ok((jar, ApiResponse::ok(pair)))
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, ApiResponse<()>) {
    // Sent even when the request had no cookie
    let mut expired = session_cookie(&state, String::new());
    expired.make_removal();
    let jar = jar.add(expired);

    (jar, ApiResponse::message(StatusCode::OK, "Logged out"))
}

/// Mails a verification link to the caller's address
pub async fn send_verify_email(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<ApiResponse<()>> {
    let user = User::find_by_id(&state.db, identity.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if user.email_verified {
        return Err(ApiError::Conflict("Email already verified".to_string()));
    }

    let token = state.credentials.issue_email_verify_token(user.id)?;
    state
        .mailer
        .send(MailMessage::email_verification(
            &user.email,
            &state.config.api.base_url,
            &token,
        ))
        .await?;

    Ok(ApiResponse::message(StatusCode::OK, "Verification email sent"))
}

/// Marks the token's user as verified
///
/// Verifying twice is not an error.
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> ApiResult<ApiResponse<()>> {
    let user_id = state.credentials.user_from_email_verify_token(&query.token)?;

    if !User::mark_email_verified(&state.db, user_id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    tracing::info!(user_id, "Email verified");
    Ok(ApiResponse::message(StatusCode::OK, "Email verified"))
}
