/// Products, scoped to `/teams/:team_id/products`
///
/// Create and update carry the full category set; an update replaces it.
/// A create without a code gets the next `product` sequence value
/// (`P000001`, ...) allocated in the same transaction as the insert.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    response::ApiResponse,
    routes::ImageRequest,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use stockroom_shared::{
    auth::{guard::TeamAccess, identity::Identity},
    models::{
        pagination::{contains_pattern, PageRequest},
        product::{Product, ProductDetail, ProductFields, ProductFilter, ProductImageDetail},
    },
    writes::product,
};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct ProductRequest {
    /// Empty or absent on create means "allocate one"
    #[serde(default)]
    #[validate(length(max = 50, message = "Code must be at most 50 characters"))]
    pub code: String,

    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[validate(length(min = 1, max = 20, message = "Unit of measure is required"))]
    pub uom: String,

    /// Minor currency units
    #[validate(range(min = 0, message = "Price must not be negative"))]
    pub price: i64,

    #[serde(default)]
    pub category_ids: Vec<i64>,
}

impl ProductRequest {
    fn into_parts(self) -> (ProductFields, Vec<i64>) {
        let fields = ProductFields {
            code: self.code.trim().to_string(),
            name: self.name.trim().to_string(),
            description: self.description,
            uom: self.uom.trim().to_string(),
            price: self.price,
        };
        (fields, self.category_ids)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub name: Option<String>,
    pub code: Option<String>,
    pub uom: Option<String>,
}

impl From<ProductQuery> for ProductFilter {
    fn from(query: ProductQuery) -> Self {
        ProductFilter {
            name: contains_pattern(query.name.as_deref()),
            code: contains_pattern(query.code.as_deref()),
            uom: contains_pattern(query.uom.as_deref()),
        }
    }
}

pub async fn list(
    State(state): State<AppState>,
    Extension(access): Extension<TeamAccess>,
    Query(page): Query<PageRequest>,
    Query(query): Query<ProductQuery>,
) -> ApiResult<ApiResponse<Vec<Product>>> {
    let page = Product::list(&state.db, access.team_id, query.into(), page.normalized()).await?;
    Ok(ApiResponse::page(page))
}

/// The product with its categories and images
pub async fn get(
    State(state): State<AppState>,
    Extension(access): Extension<TeamAccess>,
    Path((_, id)): Path<(i64, i64)>,
) -> ApiResult<ApiResponse<ProductDetail>> {
    let detail = Product::find_detail(&state.db, access.team_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;

    Ok(ApiResponse::ok(detail))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(access): Extension<TeamAccess>,
    Json(req): Json<ProductRequest>,
) -> ApiResult<ApiResponse<Product>> {
    req.validate()?;
    let (fields, category_ids) = req.into_parts();

    let product = product::create_product(
        &state.runner,
        &state.sequences,
        access.team_id,
        fields,
        category_ids,
    )
    .await?;

    Ok(ApiResponse::created(product))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(access): Extension<TeamAccess>,
    Path((_, id)): Path<(i64, i64)>,
    Json(req): Json<ProductRequest>,
) -> ApiResult<ApiResponse<Product>> {
    req.validate()?;
    if req.code.trim().is_empty() {
        return Err(ApiError::invalid("code", "Code is required"));
    }
    let (fields, category_ids) = req.into_parts();

    let product = product::update_product(&state.runner, access.team_id, id, fields, category_ids).await?;
    Ok(ApiResponse::ok(product))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(access): Extension<TeamAccess>,
    Path((_, id)): Path<(i64, i64)>,
) -> ApiResult<ApiResponse<()>> {
    if !Product::delete(&state.db, access.team_id, id).await? {
        return Err(ApiError::NotFound("Product not found".to_string()));
    }

    Ok(ApiResponse::message(StatusCode::OK, "Product deleted"))
}

/// Records the image and links it to the product in one transaction
pub async fn upload_image(
    State(state): State<AppState>,
    identity: Identity,
    Extension(access): Extension<TeamAccess>,
    Path((_, product_id)): Path<(i64, i64)>,
    Json(req): Json<ImageRequest>,
) -> ApiResult<ApiResponse<ProductImageDetail>> {
    req.validate()?;

    let image = product::attach_image(
        &state.runner,
        access.team_id,
        product_id,
        identity.user_id,
        req.into(),
    )
    .await?;

    Ok(ApiResponse::created(image))
}

pub async fn delete_image(
    State(state): State<AppState>,
    Extension(access): Extension<TeamAccess>,
    Path((_, product_id, product_image_id)): Path<(i64, i64, i64)>,
) -> ApiResult<ApiResponse<()>> {
    product::detach_image(&state.db, access.team_id, product_id, product_image_id).await?;

    Ok(ApiResponse::message(StatusCode::OK, "Product image deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_become_contains_patterns() {
        let filter: ProductFilter = ProductQuery {
            name: Some(" rice ".to_string()),
            code: Some(String::new()),
            uom: None,
        }
        .into();

        assert_eq!(filter.name.as_deref(), Some("%rice%"));
        assert_eq!(filter.code, None);
        assert_eq!(filter.uom, None);
    }

    #[test]
    fn test_missing_code_and_categories_default_to_empty() {
        let req: ProductRequest =
            serde_json::from_str(r#"{"name":" Rice ","uom":"kg","price":1250}"#).unwrap();
        assert!(req.validate().is_ok());

        let (fields, category_ids) = req.into_parts();
        assert_eq!(fields.code, "");
        assert_eq!(fields.name, "Rice");
        assert!(category_ids.is_empty());
    }

    #[test]
    fn test_negative_price_is_rejected() {
        let req: ProductRequest =
            serde_json::from_str(r#"{"name":"Rice","uom":"kg","price":-1}"#).unwrap();
        assert!(req.validate().is_err());
    }
}
