/// Sequence endpoints under `/teams/:team_id/sequences/:entity_type`
///
/// `entity_id` narrows the scope below the team (per warehouse, per
/// customer, ...) and defaults to 0.

use crate::{app::AppState, error::ApiResult, response::ApiResponse};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use stockroom_shared::{auth::guard::TeamAccess, sequence::EntityType};

#[derive(Debug, Default, Deserialize)]
pub struct ScopeQuery {
    #[serde(default)]
    pub entity_id: i64,
}

#[derive(Debug, Serialize)]
pub struct NextSequence {
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub value: u64,
    /// Display code for `value`, e.g. `SO-20240601-0007`
    pub code: String,
}

pub async fn next(
    State(state): State<AppState>,
    Extension(access): Extension<TeamAccess>,
    Path((_, entity_type)): Path<(i64, String)>,
    Query(scope): Query<ScopeQuery>,
) -> ApiResult<ApiResponse<NextSequence>> {
    let entity_type: EntityType = entity_type.parse()?;

    let value = state
        .sequences
        .next(None, entity_type, access.team_id, scope.entity_id)
        .await?;

    Ok(ApiResponse::ok(NextSequence {
        entity_type,
        entity_id: scope.entity_id,
        value,
        code: entity_type.format_code(value, Utc::now()),
    }))
}

/// Sets the counter back so the next allocation returns 1
pub async fn reset(
    State(state): State<AppState>,
    Extension(access): Extension<TeamAccess>,
    Path((_, entity_type)): Path<(i64, String)>,
    Query(scope): Query<ScopeQuery>,
) -> ApiResult<ApiResponse<()>> {
    let entity_type: EntityType = entity_type.parse()?;

    state
        .sequences
        .reset(None, entity_type, access.team_id, scope.entity_id)
        .await?;

    tracing::info!(team_id = access.team_id, entity_type = %entity_type, entity_id = scope.entity_id, "Sequence reset");
    Ok(ApiResponse::message(StatusCode::OK, "Sequence reset"))
}
