/// API route handlers
///
/// One module per resource:
///
/// - `health`: liveness and database check
/// - `auth`: registration, login, refresh, logout and email verification
/// - `users`: profiles and profile images
/// - `teams`: teams and the membership lifecycle
/// - `product_categories`, `products`: team-scoped catalog
/// - `reports`: global report templates
/// - `sequences`: numbering for collaborators
///
/// Handlers behind `team_permission` read the checked team from
/// `Extension<TeamAccess>`; the guard has already resolved membership.

pub mod auth;
pub mod health;
pub mod product_categories;
pub mod products;
pub mod reports;
pub mod sequences;
pub mod teams;
pub mod users;

use serde::{Deserialize, Serialize};
use stockroom_shared::models::image::CreateImage;
use validator::Validate;

/// `?name=` filter for list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct NameFilter {
    pub name: Option<String>,
}

/// Image metadata for an upload already stored by the client
#[derive(Debug, Deserialize, Validate)]
pub struct ImageRequest {
    #[validate(length(min = 1, max = 500, message = "Path is required"))]
    pub path: String,

    #[validate(url(message = "Invalid image URL"))]
    pub url: String,

    #[validate(range(min = 0.0, message = "Size must not be negative"))]
    pub size: f64,

    #[validate(range(min = 1, message = "Width must be positive"))]
    pub width: i32,

    #[validate(range(min = 1, message = "Height must be positive"))]
    pub height: i32,

    #[validate(length(min = 1, max = 100, message = "MIME type is required"))]
    pub mime_type: String,
}

impl From<ImageRequest> for CreateImage {
    fn from(req: ImageRequest) -> Self {
        CreateImage {
            path: req.path,
            url: req.url,
            size: req.size,
            width: req.width,
            height: req.height,
            mime_type: req.mime_type,
        }
    }
}

/// `{ "count": n }`
#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: i64,
}
