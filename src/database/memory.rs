//! In-process store used when no `DATABASE_URL` is configured.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::auth::models::{Account, Token, ValidationErrors};
use crate::database::store::{AccountStore, AuthStore, StoreError};

#[derive(Default)]
struct Inner {
    accounts: BTreeMap<i64, Account>,
    tokens: BTreeMap<i64, Token>,
    next_account_id: i64,
    next_token_id: i64,
}

impl Inner {
    fn email_taken(&self, email: &str, except: i64) -> bool {
        self.accounts.values().any(|a| a.email == email && a.id != except)
    }

    fn with_tokens(&self, account: &Account) -> Account {
        let mut account = account.clone();
        account.token = self
            .tokens
            .values()
            .filter(|t| t.account_id == account.id)
            .cloned()
            .collect();
        account
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding the same starter accounts the SQL migrations create
    pub fn seeded() -> Result<Self, StoreError> {
        let store = Self::new();
        let mut admin = Account::new("admin@example.com", "Admin");
        admin.roles = vec!["admin".to_string()];
        store.insert_account(admin)?;
        store.insert_account(Account::new("user@example.com", "User"))?;
        Ok(store)
    }

    /// Validate and insert a new account, returning it with its id
    pub fn insert_account(&self, mut account: Account) -> Result<Account, StoreError> {
        account.validate().map_err(StoreError::Validation)?;
        let mut inner = self.inner.lock();
        if inner.email_taken(&account.email, 0) {
            return Err(StoreError::Validation(ValidationErrors::single(
                "email",
                "email already registered",
            )));
        }
        inner.next_account_id += 1;
        account.id = inner.next_account_id;
        account.token.clear();
        inner.accounts.insert(account.id, account.clone());
        Ok(account)
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn get_account(&self, id: i64) -> Result<Account, StoreError> {
        let inner = self.inner.lock();
        inner.accounts.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn get_account_by_email(&self, email: &str) -> Result<Account, StoreError> {
        let inner = self.inner.lock();
        inner
            .accounts
            .values()
            .find(|a| a.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_account(&self, account: &Account) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let stored = inner.accounts.get_mut(&account.id).ok_or(StoreError::NotFound)?;
        stored.active = account.active;
        stored.roles = account.roles.clone();
        stored.last_login = account.last_login;
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn get_by_refresh_token(&self, token: &str) -> Result<(Account, Token), StoreError> {
        let inner = self.inner.lock();
        let record = inner
            .tokens
            .values()
            .find(|t| t.token == token)
            .cloned()
            .ok_or(StoreError::NotFound)?;
        let account = inner
            .accounts
            .get(&record.account_id)
            .cloned()
            .ok_or(StoreError::NotFound)?;
        Ok((account, record))
    }

    async fn save_refresh_token(&self, token: &mut Token) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.accounts.contains_key(&token.account_id) {
            return Err(StoreError::NotFound);
        }
        if token.id == 0 {
            inner.next_token_id += 1;
            token.id = inner.next_token_id;
        } else if !inner.tokens.contains_key(&token.id) {
            return Err(StoreError::NotFound);
        }
        inner.tokens.insert(token.id, token.clone());
        Ok(())
    }

    async fn delete_refresh_token(&self, token: &Token) -> Result<(), StoreError> {
        self.inner.lock().tokens.remove(&token.id);
        Ok(())
    }

    async fn purge_expired_tokens(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut inner = self.inner.lock();
        let before = inner.tokens.len();
        inner.tokens.retain(|_, t| !t.is_expired(now));
        Ok((before - inner.tokens.len()) as u64)
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn get(&self, id: i64) -> Result<Account, StoreError> {
        let inner = self.inner.lock();
        let account = inner.accounts.get(&id).ok_or(StoreError::NotFound)?;
        Ok(inner.with_tokens(account))
    }

    async fn update(&self, account: &mut Account) -> Result<(), StoreError> {
        account.validate().map_err(StoreError::Validation)?;
        let mut inner = self.inner.lock();
        if inner.email_taken(&account.email, account.id) {
            return Err(StoreError::Validation(ValidationErrors::single(
                "email",
                "email already registered",
            )));
        }
        let stored = inner.accounts.get_mut(&account.id).ok_or(StoreError::NotFound)?;
        stored.email = account.email.clone();
        stored.name = account.name.clone();
        stored.updated_at = Utc::now();
        account.updated_at = stored.updated_at;
        Ok(())
    }

    async fn delete(&self, account: &Account) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.tokens.retain(|_, t| t.account_id != account.id);
        inner.accounts.remove(&account.id).map(|_| ()).ok_or(StoreError::NotFound)
    }

    async fn update_token(&self, token: &Token) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let stored = inner.tokens.get_mut(&token.id).ok_or(StoreError::NotFound)?;
        stored.identifier = token.identifier.clone();
        Ok(())
    }

    async fn delete_token(&self, token: &Token) -> Result<(), StoreError> {
        self.inner.lock().tokens.remove(&token.id);
        Ok(())
    }
}
