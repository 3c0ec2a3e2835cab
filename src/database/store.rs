//! Store traits used by the route handlers.

use async_trait::async_trait;

use crate::auth::models::{Account, Token, ValidationErrors};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
}

/// Persistence needed by the login/token/refresh/logout flow
#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn get_account(&self, id: i64) -> Result<Account, StoreError>;

    async fn get_account_by_email(&self, email: &str) -> Result<Account, StoreError>;

    async fn update_account(&self, account: &Account) -> Result<(), StoreError>;

    /// Account and token record owning the refresh token string `token`
    async fn get_by_refresh_token(&self, token: &str) -> Result<(Account, Token), StoreError>;

    /// Insert when `token.id` is 0 (assigning the new id), update otherwise
    async fn save_refresh_token(&self, token: &mut Token) -> Result<(), StoreError>;

    async fn delete_refresh_token(&self, token: &Token) -> Result<(), StoreError>;

    /// Delete every refresh token past its expiry, returning the number removed
    async fn purge_expired_tokens(&self) -> Result<u64, StoreError>;
}

/// Persistence needed by the account self-service handler
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Account with its device tokens
    async fn get(&self, id: i64) -> Result<Account, StoreError>;

    /// Validates, then writes email and name
    async fn update(&self, account: &mut Account) -> Result<(), StoreError>;

    /// Deletes the account together with its tokens
    async fn delete(&self, account: &Account) -> Result<(), StoreError>;

    /// Writes the identifier of token `token.id`
    async fn update_token(&self, token: &Token) -> Result<(), StoreError>;

    async fn delete_token(&self, token: &Token) -> Result<(), StoreError>;
}
