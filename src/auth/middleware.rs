//! Authentication Middleware
//!
//! Axum middleware validating the access and refresh JWTs and injecting their
//! claims into the request extensions for downstream handlers.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::auth::{errors::AuthError, jwt::JwtService};
use crate::errors::ErrResponse;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// Authentication middleware that validates JWT tokens and injects their claims
pub struct AuthMiddleware;

impl AuthMiddleware {
    /// Requires a valid access token, inserts `AppClaims`
    pub async fn validate_token(
        State(jwt_service): State<Arc<JwtService>>,
        jar: CookieJar,
        mut req: Request,
        next: Next,
    ) -> Result<Response, ErrResponse> {
        let token = extract_token(&req, &jar, ACCESS_TOKEN_COOKIE).ok_or(AuthError::InvalidBearer)?;

        let claims = jwt_service.validate_access(&token).map_err(|e| {
            tracing::debug!(error = %e, "access token rejected");
            AuthError::InvalidBearer
        })?;
        tracing::debug!(account_id = claims.id, "access token validated");

        req.extensions_mut().insert(claims);
        Ok(next.run(req).await)
    }

    /// Requires a valid refresh token, inserts `RefreshClaims`
    pub async fn validate_refresh_token(
        State(jwt_service): State<Arc<JwtService>>,
        jar: CookieJar,
        mut req: Request,
        next: Next,
    ) -> Result<Response, ErrResponse> {
        let token = extract_token(&req, &jar, REFRESH_TOKEN_COOKIE).ok_or(AuthError::InvalidBearer)?;

        let claims = jwt_service.validate_refresh(&token).map_err(|e| {
            tracing::debug!(error = %e, "refresh token rejected");
            AuthError::TokenExpired
        })?;

        req.extensions_mut().insert(claims);
        Ok(next.run(req).await)
    }
}

/// Bearer token from the Authorization header, falling back to `cookie`
fn extract_token(req: &Request, jar: &CookieJar, cookie: &str) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .or_else(|| jar.get(cookie).map(|c| c.value().to_string()))
}
