//! Auth routes: passwordless login, token redemption, refresh and logout

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    middleware,
    routing::post,
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{
    device::Device,
    middleware::AuthMiddleware,
    models::is_valid_email,
    AuthError, RefreshClaims, Token,
};
use crate::database::StoreError;
use crate::email::{EmailJob, LoginTokenContent};
use crate::errors::ErrResponse;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// `NotFound` becomes `not_found`, anything else is an internal error
fn lookup_error(err: StoreError, not_found: AuthError) -> AuthError {
    match err {
        StoreError::NotFound => not_found,
        other => AuthError::Internal(other.into()),
    }
}

/// Request a login token by email. The email is sent in the background.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<StatusCode, ErrResponse> {
    let Json(body) = payload.map_err(|e| {
        tracing::warn!(error = %e, "login request rejected");
        AuthError::InvalidLogin
    })?;

    let email = body.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        tracing::warn!(email = %email, "login with malformed email");
        return Err(AuthError::InvalidLogin.into());
    }

    let account = state
        .auth_store
        .get_account_by_email(&email)
        .await
        .map_err(|e| {
            tracing::warn!(email = %email, error = %e, "login for unknown email");
            lookup_error(e, AuthError::UnknownLogin)
        })?;

    if !account.can_login() {
        return Err(AuthError::LoginDisabled.into());
    }

    let lt = state.login_tokens.create_token(account.id);
    state.mailer.dispatch(EmailJob::LoginToken(LoginTokenContent {
        url: state.login_tokens.login_url(&lt.token),
        email: account.email,
        name: account.name,
        token: lt.token,
        expiry: lt.expiry,
    }));

    tracing::info!(account_id = account.id, "login token issued");
    Ok(StatusCode::OK)
}

/// Redeem a login token for an access/refresh token pair
pub async fn token(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ErrResponse> {
    let Json(body) = payload.map_err(|e| {
        tracing::warn!(error = %e, "token request rejected");
        AuthError::LoginToken
    })?;

    let login_token = body.token.trim();
    if login_token.is_empty() || !login_token.chars().all(|c| c.is_ascii_alphanumeric()) {
        tracing::warn!("login token must be a non-empty alphanumeric string");
        return Err(AuthError::LoginToken.into());
    }

    let account_id = state
        .login_tokens
        .get_account_id(login_token)
        .map_err(|_| AuthError::LoginToken)?;

    // the account may have been deleted since the token was issued
    let mut account = state
        .auth_store
        .get_account(account_id)
        .await
        .map_err(|e| lookup_error(e, AuthError::UnknownLogin))?;

    if !account.can_login() {
        return Err(AuthError::LoginDisabled.into());
    }

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let device = Device::from_user_agent(user_agent);

    let now = Utc::now();
    let mut record = Token {
        id: 0,
        token: Uuid::new_v4().to_string(),
        expiry: now + state.jwt_service.refresh_expiry(),
        updated_at: now,
        account_id: account.id,
        mobile: device.mobile,
        identifier: device.identifier(),
    };

    state
        .auth_store
        .save_refresh_token(&mut record)
        .await
        .map_err(ErrResponse::internal)?;

    let (access_token, refresh_token) = state
        .jwt_service
        .gen_token_pair(&account.claims(), &record.claims())
        .map_err(|e| ErrResponse::internal(format!("{e:#}")))?;

    account.last_login = Some(Utc::now());
    state
        .auth_store
        .update_account(&account)
        .await
        .map_err(ErrResponse::internal)?;

    tracing::info!(account_id = account.id, device = %record.identifier, "login token redeemed");
    Ok(Json(TokenResponse { access_token, refresh_token }))
}

/// Rotate the refresh token and mint a new pair
pub async fn refresh(
    State(state): State<AppState>,
    Extension(claims): Extension<RefreshClaims>,
) -> Result<Json<TokenResponse>, ErrResponse> {
    let (mut account, mut record) = state
        .auth_store
        .get_by_refresh_token(&claims.token)
        .await
        .map_err(|e| lookup_error(e, AuthError::TokenExpired))?;

    if record.is_expired(Utc::now()) {
        if let Err(e) = state.auth_store.delete_refresh_token(&record).await {
            tracing::error!(error = %e, token_id = record.id, "failed to delete expired refresh token");
        }
        return Err(AuthError::TokenExpired.into());
    }

    if !account.can_login() {
        return Err(AuthError::LoginDisabled.into());
    }

    let now = Utc::now();
    record.token = Uuid::new_v4().to_string();
    record.expiry = now + state.jwt_service.refresh_expiry();
    record.updated_at = now;

    let (access_token, refresh_token) = state
        .jwt_service
        .gen_token_pair(&account.claims(), &record.claims())
        .map_err(|e| ErrResponse::internal(format!("{e:#}")))?;

    state
        .auth_store
        .save_refresh_token(&mut record)
        .await
        .map_err(ErrResponse::internal)?;

    account.last_login = Some(now);
    state
        .auth_store
        .update_account(&account)
        .await
        .map_err(ErrResponse::internal)?;

    Ok(Json(TokenResponse { access_token, refresh_token }))
}

/// Delete the refresh token record the request was made with
pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<RefreshClaims>,
) -> Result<StatusCode, ErrResponse> {
    let (_, record) = state
        .auth_store
        .get_by_refresh_token(&claims.token)
        .await
        .map_err(|e| lookup_error(e, AuthError::TokenExpired))?;

    state
        .auth_store
        .delete_refresh_token(&record)
        .await
        .map_err(ErrResponse::internal)?;

    tracing::info!(account_id = record.account_id, token_id = record.id, "logged out");
    Ok(StatusCode::OK)
}

pub fn create_auth_routes(state: &AppState) -> Router<AppState> {
    let session_routes = Router::new()
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .layer(middleware::from_fn_with_state(
            state.jwt_service.clone(),
            AuthMiddleware::validate_refresh_token,
        ));

    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/token", post(token))
        .merge(session_routes)
}
