/// Guard adapters
///
/// Thin `from_fn_with_state` wrappers around
/// [`AuthGuard`](stockroom_shared::auth::guard::AuthGuard). They are applied
/// with `route_layer`, so they only run for matched routes and see the path
/// parameters. The resolved [`Identity`] (and [`TeamAccess`] for team routes)
/// is stored in request extensions for handlers to extract.
///
/// ```text
/// protect / protect_refresh   →  Identity
/// permission                  →  requires Identity
/// team_permission             →  requires Identity, adds TeamAccess
/// ```

use axum::{
    extract::{Path, Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use std::collections::HashMap;
use stockroom_shared::auth::{guard::TeamAccess, identity::Identity};

use crate::{app::AppState, error::ApiError};

/// Name of the path parameter team routes must declare
pub const TEAM_ID_PARAM: &str = "team_id";

// Owned copies: the request body is not Sync, so nothing borrowed from the
// request may be held across an await.
fn authorization(req: &Request) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

fn target(req: &Request) -> (String, String) {
    (req.uri().path().to_owned(), req.method().as_str().to_owned())
}

fn identity(req: &Request) -> Result<Identity, ApiError> {
    req.extensions()
        .get::<Identity>()
        .copied()
        .ok_or(ApiError::Unauthorized)
}

/// Access token from the session cookie or the Authorization header
pub async fn protect(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let cookie = jar.get(&state.config.cookie.name).map(|c| c.value().to_string());
    let header = authorization(&req);

    let identity = state
        .guard
        .protect(cookie.as_deref(), header.as_deref())
        .await?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Refresh token from the Authorization header only
pub async fn protect_refresh(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = authorization(&req);
    let identity = state.guard.protect_refresh(header.as_deref()).await?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Global rule check for the request path and method
pub async fn permission(State(state): State<AppState>, req: Request, next: Next) -> Result<Response, ApiError> {
    let identity = identity(&req)?;
    let (path, method) = target(&req);

    state.guard.permission(&identity, &path, &method).await?;

    Ok(next.run(req).await)
}

/// Team membership and team rule check
pub async fn team_permission(
    State(state): State<AppState>,
    params: Option<Path<HashMap<String, String>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = identity(&req)?;
    let (path, method) = target(&req);
    let raw_team_id = params
        .as_ref()
        .and_then(|Path(params)| params.get(TEAM_ID_PARAM))
        .map(String::as_str);

    let access: TeamAccess = state
        .guard
        .team_permission(&identity, raw_team_id, &path, &method)
        .await?;

    req.extensions_mut().insert(access);
    Ok(next.run(req).await)
}
