/// Product categories, scoped to `/teams/:team_id/product_category`
///
/// A category id from another team behaves exactly like a missing one.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    response::ApiResponse,
    routes::NameFilter,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use stockroom_shared::{
    auth::guard::TeamAccess,
    models::{
        pagination::{contains_pattern, PageRequest},
        product_category::ProductCategory,
    },
};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,
}

fn not_found() -> ApiError {
    ApiError::NotFound("Product category not found".to_string())
}

pub async fn list(
    State(state): State<AppState>,
    Extension(access): Extension<TeamAccess>,
    Query(page): Query<PageRequest>,
    Query(filter): Query<NameFilter>,
) -> ApiResult<ApiResponse<Vec<ProductCategory>>> {
    let page = ProductCategory::list(
        &state.db,
        access.team_id,
        contains_pattern(filter.name.as_deref()),
        page.normalized(),
    )
    .await?;

    Ok(ApiResponse::page(page))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(access): Extension<TeamAccess>,
    Path((_, id)): Path<(i64, i64)>,
) -> ApiResult<ApiResponse<ProductCategory>> {
    let category = ProductCategory::find(&state.db, access.team_id, id)
        .await?
        .ok_or_else(not_found)?;

    Ok(ApiResponse::ok(category))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(access): Extension<TeamAccess>,
    Json(req): Json<CategoryRequest>,
) -> ApiResult<ApiResponse<ProductCategory>> {
    req.validate()?;

    let category = ProductCategory::create(&state.db, access.team_id, req.name.trim()).await?;
    Ok(ApiResponse::created(category))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(access): Extension<TeamAccess>,
    Path((_, id)): Path<(i64, i64)>,
    Json(req): Json<CategoryRequest>,
) -> ApiResult<ApiResponse<ProductCategory>> {
    req.validate()?;

    let category = ProductCategory::rename(&state.db, access.team_id, id, req.name.trim())
        .await?
        .ok_or_else(not_found)?;

    Ok(ApiResponse::ok(category))
}

/// Soft delete; existing product links are left in place
pub async fn delete(
    State(state): State<AppState>,
    Extension(access): Extension<TeamAccess>,
    Path((_, id)): Path<(i64, i64)>,
) -> ApiResult<ApiResponse<()>> {
    if !ProductCategory::delete(&state.db, access.team_id, id).await? {
        return Err(not_found());
    }

    Ok(ApiResponse::message(StatusCode::OK, "Product category deleted"))
}
