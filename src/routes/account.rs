//! Account self-service: read, update and delete the caller's own account and
//! manage its device tokens. Every route sits behind the access token
//! middleware and [`account_ctx`].

use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, put},
    Extension, Json, Router,
};
use serde::Deserialize;

use crate::auth::{middleware::AuthMiddleware, Account, AppClaims};
use crate::database::StoreError;
use crate::errors::ErrResponse;
use crate::server::AppState;

/// Loads the account named by the access token claims into the request
pub async fn account_ctx(
    State(state): State<AppState>,
    Extension(claims): Extension<AppClaims>,
    mut req: Request,
    next: Next,
) -> Result<Response, ErrResponse> {
    let account = match state.account_store.get(claims.id).await {
        Ok(account) => account,
        // access token outlived its account
        Err(StoreError::NotFound) => {
            return Err(ErrResponse::unauthorized(format!("account {} no longer exists", claims.id)));
        }
        Err(e) => return Err(ErrResponse::internal(e)),
    };

    req.extensions_mut().insert(account);
    Ok(next.run(req).await)
}

/// Editable account fields. Anything else in the body, including `id`,
/// `active` and `roles`, is ignored.
#[derive(Debug, Deserialize)]
pub struct AccountRequest {
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub identifier: String,
}

pub async fn get_account(Extension(account): Extension<Account>) -> Json<Account> {
    Json(account)
}

pub async fn update_account(
    State(state): State<AppState>,
    Extension(mut account): Extension<Account>,
    payload: Result<Json<AccountRequest>, JsonRejection>,
) -> Result<Json<Account>, ErrResponse> {
    let Json(body) = payload.map_err(ErrResponse::invalid_request)?;

    if let Some(email) = body.email {
        account.email = email;
    }
    if let Some(name) = body.name {
        account.name = name;
    }

    match state.account_store.update(&mut account).await {
        Ok(()) => Ok(Json(account)),
        Err(StoreError::Validation(errors)) => Err(ErrResponse::validation(errors)),
        Err(e) => Err(ErrResponse::render(e)),
    }
}

pub async fn delete_account(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
) -> Result<StatusCode, ErrResponse> {
    state
        .account_store
        .delete(&account)
        .await
        .map_err(ErrResponse::render)?;

    tracing::info!(account_id = account.id, "account deleted");
    Ok(StatusCode::OK)
}

fn parse_token_id(raw: &str) -> Result<i64, ErrResponse> {
    raw.parse()
        .map_err(|_| ErrResponse::bad_request(format!("invalid token id: {raw}")))
}

/// Rename one of the caller's device tokens. Ids owned by other accounts
/// match nothing and leave the store untouched.
pub async fn update_token(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(token_id): Path<String>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<StatusCode, ErrResponse> {
    let id = parse_token_id(&token_id)?;
    let Json(body) = payload.map_err(ErrResponse::invalid_request)?;
    let identifier = body.identifier.trim();

    for token in account.token.iter().filter(|t| t.id == id) {
        let mut renamed = token.clone();
        renamed.identifier = identifier.to_string();
        state
            .account_store
            .update_token(&renamed)
            .await
            .map_err(ErrResponse::invalid_request)?;
    }

    Ok(StatusCode::OK)
}

pub async fn delete_token(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(token_id): Path<String>,
) -> Result<StatusCode, ErrResponse> {
    let id = parse_token_id(&token_id)?;

    for token in account.token.iter().filter(|t| t.id == id) {
        state
            .account_store
            .delete_token(token)
            .await
            .map_err(ErrResponse::render)?;
    }

    Ok(StatusCode::OK)
}

pub fn create_account_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/account",
            get(get_account).put(update_account).delete(delete_account),
        )
        .route(
            "/api/account/token/{token_id}",
            put(update_token).delete(delete_token),
        )
        .layer(middleware::from_fn_with_state(state.clone(), account_ctx))
        .layer(middleware::from_fn_with_state(
            state.jwt_service.clone(),
            AuthMiddleware::validate_token,
        ))
}
