//! # Error Responses
//!
//! Every handler failure ends up as an `ErrResponse`, a JSON envelope of the form
//! `{"status": "...", "error": "...", "errors": {...}}`. Authentication and
//! internal failures are logged with their real cause while the caller only sees
//! a generic message.

use std::fmt::Display;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::errors::AuthError;
use crate::auth::models::ValidationErrors;

#[derive(Debug, Serialize)]
pub struct ErrResponse {
    #[serde(skip)]
    status_code: StatusCode,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<ValidationErrors>,
}

impl ErrResponse {
    fn new(status_code: StatusCode, status: &str, error: Option<String>) -> Self {
        Self {
            status_code,
            status: status.to_string(),
            error,
            errors: None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    /// 400 for malformed input the caller should not retry as is
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Bad request.", Some(message.into()))
    }

    /// 400 for a request body that could not be decoded
    pub fn invalid_request(err: impl Display) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Invalid request.", Some(err.to_string()))
    }

    /// 422 carrying the offending fields
    pub fn validation(errors: ValidationErrors) -> Self {
        Self {
            errors: Some(errors),
            ..Self::new(StatusCode::UNPROCESSABLE_ENTITY, "Validation error.", None)
        }
    }

    /// 401 with a generic message, `reason` is only logged
    pub fn unauthorized(reason: impl Display) -> Self {
        tracing::warn!(%reason, "request unauthorized");
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized.", Some("unauthorized".to_string()))
    }

    /// 422 for a store failure while processing an otherwise valid request
    pub fn render(err: impl Display) -> Self {
        tracing::error!(error = %err, "failed to process request");
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Error rendering response.",
            Some("request could not be processed".to_string()),
        )
    }

    /// 500 for persistence and signing failures
    pub fn internal(err: impl Display) -> Self {
        tracing::error!(error = %err, "internal server error");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error.",
            Some("internal server error".to_string()),
        )
    }
}

impl From<AuthError> for ErrResponse {
    fn from(err: AuthError) -> Self {
        match err.status() {
            StatusCode::BAD_REQUEST => Self::bad_request(err.to_string()),
            StatusCode::UNAUTHORIZED => Self::unauthorized(err),
            _ => Self::internal(format!("{err:#}")),
        }
    }
}

impl IntoResponse for ErrResponse {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}
