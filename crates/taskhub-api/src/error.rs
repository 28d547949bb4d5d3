//! HTTP error mapping
//!
//! Failures leave the server as `{ "success": false, "code", "message" }`.
//! Every 401 carries the same message and 500s carry no internal detail; the
//! real cause goes to the log.

use crate::auth::AuthError;
use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use taskhub_core::TaskhubError;
use thiserror::Error;
use utoipa::ToSchema;

/// Message returned for every 401
pub const AUTHENTICATION_FAILED: &str = "Authentication failed";

/// Error body
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Always false
    pub success: bool,
    /// Machine-readable code such as `NOT_FOUND`
    pub code: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    /// Carries the resource name, e.g. "Project"
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Authentication failed")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal: {0}")]
    Internal(String),

    #[error("database: {0}")]
    Database(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// What the client is allowed to see
    fn public_message(&self) -> String {
        match self {
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::Database(_) => "Database operation failed".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            tracing::error!(error = %self, code = self.code(), "Request failed");
        }

        let body = ApiError {
            success: false,
            code: self.code().to_string(),
            message: self.public_message(),
        };

        (self.status(), Json(body)).into_response()
    }
}

/// `Json` whose rejections use the error envelope
///
/// Unparsable bodies and bodies missing required fields both become 400.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{err:#}"))
    }
}

impl From<TaskhubError> for AppError {
    fn from(err: TaskhubError) -> Self {
        match err {
            TaskhubError::NotFound(what) => AppError::NotFound(what),
            TaskhubError::AccessDenied { reason } => AppError::Forbidden(reason),
            TaskhubError::ValidationError(msg) => AppError::BadRequest(msg),
            TaskhubError::Conflict(msg) => AppError::Conflict(msg),
            TaskhubError::DatabaseError(msg) => AppError::Database(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        if err.is_authentication_failure() {
            tracing::debug!(reason = %err, "Authentication failed");
            return AppError::Unauthorized;
        }

        match err {
            AuthError::Validation(msg) => AppError::BadRequest(msg),
            AuthError::DuplicateEmail => AppError::Conflict("Email already registered".into()),
            AuthError::IncorrectPassword => AppError::BadRequest("Password change failed".into()),
            AuthError::Forbidden(msg) => AppError::Forbidden(msg),
            AuthError::NotFound(what) => AppError::NotFound(what),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_every_authentication_failure_looks_the_same() {
        let mut bodies = Vec::new();
        for err in [
            AuthError::InvalidCredentials,
            AuthError::TokenExpired,
            AuthError::TokenRevoked,
            AuthError::UserInactive,
            AuthError::InvalidRefreshToken,
            AuthError::MissingAuthHeader,
        ] {
            let response = err.into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            bodies.push(body_json(response).await);
        }

        assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(bodies[0]["success"], false);
        assert_eq!(bodies[0]["message"], AUTHENTICATION_FAILED);
    }

    #[tokio::test]
    async fn test_server_errors_hide_their_cause() {
        let response = AppError::Database("relation \"users\" does not exist".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["code"], "DATABASE_ERROR");
        assert!(!json.to_string().contains("relation"));
    }

    #[tokio::test]
    async fn test_not_found_names_the_resource() {
        let json = body_json(AppError::from(TaskhubError::NotFound("Project".into())).into_response()).await;

        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["message"], "Project not found");
    }

    #[tokio::test]
    async fn test_json_rejection_becomes_bad_request_envelope() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Body {
            name: String,
        }

        let request = axum::http::Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(r#"{"other":1}"#))
            .unwrap();

        let err = ApiJson::<Body>::from_request(request, &()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let json = body_json(err.into_response()).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "BAD_REQUEST");
        assert!(json["message"].as_str().unwrap().contains("name"));
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::from(AuthError::DuplicateEmail), StatusCode::CONFLICT),
            (AppError::from(AuthError::IncorrectPassword), StatusCode::BAD_REQUEST),
            (AppError::from(AuthError::Forbidden("x".into())), StatusCode::FORBIDDEN),
            (
                AppError::from(TaskhubError::AccessDenied { reason: "no".into() }),
                StatusCode::FORBIDDEN,
            ),
            (
                AppError::from(TaskhubError::ValidationError("bad".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.status(), expected, "{error:?}");
        }
    }
}
