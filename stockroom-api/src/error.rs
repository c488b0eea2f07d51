/// Error handling for the API server
///
/// Handlers return [`ApiResult`]; every error renders as the response
/// envelope with `data` null (or the field errors for validation failures).
/// Internal errors are logged with their detail and reach the client only as
/// a generic message. Every guard failure is the same bare 401.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use stockroom_shared::{
    auth::{guard::GuardError, jwt::JwtError, password::PasswordError},
    db::is_unique_violation,
    mailer::MailError,
    sequence::SequenceError,
    writes::WriteError,
};

use crate::response::Envelope;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

pub const UNAUTHORIZED: &str = "Unauthorized";

#[derive(Debug)]
pub enum ApiError {
    /// 400
    BadRequest(String),

    /// 401, always rendered as "Unauthorized"
    Unauthorized,

    /// 404
    NotFound(String),

    /// 409
    Conflict(String),

    /// 422
    ValidationError(Vec<ValidationErrorDetail>),

    /// 500
    InternalError(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

impl ApiError {
    /// Single-field validation failure
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: field.to_string(),
            message: message.into(),
        }])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized => f.write_str(UNAUTHORIZED),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (message, data) = match self {
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) | ApiError::Conflict(msg) => (msg, None),
            ApiError::Unauthorized => (UNAUTHORIZED.to_string(), None),
            ApiError::ValidationError(errors) => ("Request validation failed".to_string(), Some(errors)),
            ApiError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                ("An internal error occurred".to_string(), None)
            }
        };

        let body = Envelope {
            message,
            status: status.as_u16(),
            data,
            meta: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            ref db_err if is_unique_violation(db_err) => {
                ApiError::Conflict("Resource already exists".to_string())
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let errors = err
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();

        ApiError::ValidationError(errors)
    }
}

/// The guard already logged the reason
impl From<GuardError> for ApiError {
    fn from(_: GuardError) -> Self {
        ApiError::Unauthorized
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(msg) => ApiError::InternalError(format!("Token creation failed: {}", msg)),
            other => {
                tracing::debug!(reason = %other, "Token rejected");
                ApiError::Unauthorized
            }
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<SequenceError> for ApiError {
    fn from(err: SequenceError) -> Self {
        match err {
            SequenceError::NotFound => ApiError::NotFound("Sequence not found".to_string()),
            SequenceError::UnknownEntityType(kind) => {
                ApiError::BadRequest(format!("Unknown entity type: {}", kind))
            }
            SequenceError::Database(err) => err.into(),
        }
    }
}

impl From<WriteError> for ApiError {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::Conflict(msg) => ApiError::Conflict(msg),
            WriteError::NotFound(msg) => ApiError::NotFound(msg),
            WriteError::Validation(msg) => ApiError::BadRequest(msg),
            WriteError::Database(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");
        assert_eq!(ApiError::Unauthorized.to_string(), "Unauthorized");
    }

    #[tokio::test]
    async fn test_guard_errors_are_bare_unauthorized() {
        let (status, body) = render(GuardError::UnknownUser(9).into()).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Unauthorized");
        assert_eq!(body["status"], 401);
        assert!(body["data"].is_null());
    }

    #[tokio::test]
    async fn test_internal_error_is_masked() {
        let (status, body) = render(ApiError::InternalError("connection reset".into())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body["message"].as_str().unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_write_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(WriteError::Conflict("dup".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(WriteError::NotFound("gone".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(WriteError::Validation("bad".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(SequenceError::UnknownEntityType("XX".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_validation_details_in_data() {
        let (status, body) = render(ApiError::invalid("email", "Invalid email format")).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["data"][0]["field"], "email");
    }

    #[test]
    fn test_jwt_errors_are_unauthorized() {
        assert!(matches!(ApiError::from(JwtError::Expired), ApiError::Unauthorized));
        assert!(matches!(
            ApiError::from(JwtError::CreateError("x".into())),
            ApiError::InternalError(_)
        ));
    }
}
