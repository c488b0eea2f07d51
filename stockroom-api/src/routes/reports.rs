/// Report templates under `/reports`
///
/// Global resources: access is decided by the global policy on the caller's
/// user id, not by team membership.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    response::ApiResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use stockroom_shared::models::{
    pagination::PageRequest,
    report::{ReportTemplate, ReportTemplateInput},
    role::ReportSchemaType,
};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct ReportRequest {
    #[validate(length(min = 1, max = 50, message = "Code must be 1 to 50 characters"))]
    pub code: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 255, message = "Display name must be 1 to 255 characters"))]
    pub display_name: String,

    #[serde(default)]
    #[validate(length(max = 100, message = "Icon must be at most 100 characters"))]
    pub icon: String,

    pub report_json_schema_type_id: i64,
}

impl ReportRequest {
    fn into_input(self) -> ApiResult<ReportTemplateInput> {
        if ReportSchemaType::from_id(self.report_json_schema_type_id).is_none() {
            return Err(ApiError::invalid(
                "report_json_schema_type_id",
                "Unknown report schema type",
            ));
        }

        Ok(ReportTemplateInput {
            code: self.code.trim().to_string(),
            name: self.name.trim().to_string(),
            display_name: self.display_name,
            icon: self.icon,
            report_json_schema_type_id: self.report_json_schema_type_id,
        })
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound("Report template not found".to_string())
}

pub async fn list(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
) -> ApiResult<ApiResponse<Vec<ReportTemplate>>> {
    let page = ReportTemplate::list(&state.db, page.normalized()).await?;
    Ok(ApiResponse::page(page))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<ApiResponse<ReportTemplate>> {
    let report = ReportTemplate::find_by_id(&state.db, id).await?.ok_or_else(not_found)?;
    Ok(ApiResponse::ok(report))
}

/// # Errors
///
/// `409` when the code is already used by a live template.
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<ReportRequest>,
) -> ApiResult<ApiResponse<ReportTemplate>> {
    req.validate()?;

    let report = ReportTemplate::create(&state.db, req.into_input()?).await?;
    Ok(ApiResponse::created(report))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ReportRequest>,
) -> ApiResult<ApiResponse<ReportTemplate>> {
    req.validate()?;

    let report = ReportTemplate::update(&state.db, id, req.into_input()?)
        .await?
        .ok_or_else(not_found)?;

    Ok(ApiResponse::ok(report))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<ApiResponse<()>> {
    if !ReportTemplate::delete(&state.db, id).await? {
        return Err(not_found());
    }

    Ok(ApiResponse::message(StatusCode::OK, "Report template deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(schema_type: i64) -> ReportRequest {
        ReportRequest {
            code: " STOCK ".to_string(),
            name: "Stock".to_string(),
            display_name: "Stock on hand".to_string(),
            icon: String::new(),
            report_json_schema_type_id: schema_type,
        }
    }

    #[test]
    fn test_known_schema_type_is_accepted() {
        let input = request(ReportSchemaType::Chart.id()).into_input().unwrap();
        assert_eq!(input.code, "STOCK");
    }

    #[test]
    fn test_unknown_schema_type_is_rejected() {
        let err = request(99).into_input().unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
