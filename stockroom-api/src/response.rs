/// Response envelope
///
/// Every response body, success or failure, has the same shape:
///
/// ```json
/// { "message": "OK", "status": 200, "data": { ... }, "meta": null }
/// ```
///
/// `meta` carries pagination for list endpoints and is null otherwise.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use stockroom_shared::models::pagination::{Page, PageMeta};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub message: String,
    pub status: u16,
    pub data: Option<T>,
    pub meta: Option<PageMeta>,
}

/// Successful response wrapped in the envelope
#[derive(Debug)]
pub struct ApiResponse<T> {
    status: StatusCode,
    message: String,
    data: Option<T>,
    meta: Option<PageMeta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self::with_status(StatusCode::OK, "OK", data)
    }

    pub fn created(data: T) -> Self {
        Self::with_status(StatusCode::CREATED, "Created", data)
    }

    pub fn with_status(status: StatusCode, message: &str, data: T) -> Self {
        Self {
            status,
            message: message.to_string(),
            data: Some(data),
            meta: None,
        }
    }
}

impl<T: Serialize> ApiResponse<Vec<T>> {
    /// List response: items in `data`, pagination in `meta`
    pub fn page(page: Page<T>) -> Self {
        Self {
            status: StatusCode::OK,
            message: "OK".to_string(),
            data: Some(page.items),
            meta: Some(page.meta),
        }
    }
}

impl ApiResponse<()> {
    /// Response with a message and no data
    pub fn message(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            message: message.to_string(),
            data: None,
            meta: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = Envelope {
            message: self.message,
            status: self.status.as_u16(),
            data: self.data,
            meta: self.meta,
        };

        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use stockroom_shared::models::pagination::PageRequest;

    async fn body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ok_envelope() {
        let response = ApiResponse::ok(serde_json::json!({"id": 1})).into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body(response).await;
        assert_eq!(json["message"], "OK");
        assert_eq!(json["status"], 200);
        assert_eq!(json["data"]["id"], 1);
        assert!(json["meta"].is_null());
    }

    #[tokio::test]
    async fn test_page_envelope() {
        let page = Page::new(vec![1, 2], PageRequest { page: 2, limit: 2 }, 5);
        let json = body(ApiResponse::page(page).into_response()).await;

        assert_eq!(json["data"], serde_json::json!([1, 2]));
        assert_eq!(json["meta"]["page"], 2);
        assert_eq!(json["meta"]["total_rows"], 5);
        assert_eq!(json["meta"]["total_pages"], 3);
    }

    #[tokio::test]
    async fn test_message_only() {
        let response = ApiResponse::message(StatusCode::OK, "Logged out").into_response();
        let json = body(response).await;

        assert_eq!(json["message"], "Logged out");
        assert!(json["data"].is_null());
    }
}
