//! Failures of the login, token, refresh and logout flow.

use axum::http::StatusCode;

/// Reasons a session cannot be started or renewed
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email address")]
    InvalidLogin,
    #[error("email not registered")]
    UnknownLogin,
    #[error("login for account disabled")]
    LoginDisabled,
    #[error("invalid or expired login token")]
    LoginToken,
    #[error("refresh token expired")]
    TokenExpired,
    #[error("missing or invalid bearer token")]
    InvalidBearer,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidLogin => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}
