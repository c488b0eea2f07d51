/// User endpoints (access token required)
///
/// ```text
/// GET  /users/me
/// GET  /users/:id
/// GET  /users/by-username?username=
/// GET  /users/verify-email
/// POST /users/profile-image
/// ```

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    response::ApiResponse,
    routes::ImageRequest,
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use stockroom_shared::{
    auth::identity::Identity,
    models::{
        image::Image,
        pagination::prefix_pattern,
        user::{ProfileImage, User},
    },
    writes::account,
};
use validator::Validate;

/// A user with their current profile image
#[derive(Debug, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub profile_image: Option<Image>,
}

#[derive(Debug, Deserialize)]
pub struct UsernameQuery {
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EmailVerifiedResponse {
    pub email_verified: bool,
}

async fn profile(state: &AppState, user_id: i64) -> ApiResult<UserProfile> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    let profile_image = ProfileImage::latest_for_user(&state.db, user_id).await?;

    Ok(UserProfile { user, profile_image })
}

pub async fn me(State(state): State<AppState>, identity: Identity) -> ApiResult<ApiResponse<UserProfile>> {
    Ok(ApiResponse::ok(profile(&state, identity.user_id).await?))
}

pub async fn get_user(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<ApiResponse<UserProfile>> {
    Ok(ApiResponse::ok(profile(&state, id).await?))
}

/// Username prefix search, at most ten matches; an empty filter matches nobody
pub async fn search_by_username(
    State(state): State<AppState>,
    Query(query): Query<UsernameQuery>,
) -> ApiResult<ApiResponse<Vec<User>>> {
    let users = match prefix_pattern(query.username.as_deref()) {
        Some(pattern) => User::search_by_username(&state.db, &pattern).await?,
        None => Vec::new(),
    };

    Ok(ApiResponse::ok(users))
}

pub async fn email_verified(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<ApiResponse<EmailVerifiedResponse>> {
    let email_verified = User::is_email_verified(&state.db, identity.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(ApiResponse::ok(EmailVerifiedResponse { email_verified }))
}

/// Records the image and makes it the caller's profile image
pub async fn upload_profile_image(
    State(state): State<AppState>,
    identity: Identity,
    Json(req): Json<ImageRequest>,
) -> ApiResult<ApiResponse<Image>> {
    req.validate()?;

    let image = account::attach_profile_image(&state.runner, identity.user_id, req.into()).await?;

    Ok(ApiResponse::created(image))
}
