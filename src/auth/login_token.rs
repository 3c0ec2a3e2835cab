//! Passwordless login tokens
//!
//! Short-lived random strings emailed to the account owner and exchanged for a
//! token pair. They live only in process memory and vanish on expiry.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::{distributions::Alphanumeric, Rng};
use tokio::task::JoinHandle;

use crate::config::AuthConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct LoginToken {
    pub token: String,
    pub account_id: i64,
    pub expiry: DateTime<Utc>,
}

impl LoginToken {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry
    }
}

#[derive(Debug, thiserror::Error)]
#[error("login token not found")]
pub struct LoginTokenNotFound;

/// Issues login tokens and resolves them back to account ids
pub struct LoginTokenIssuer {
    tokens: DashMap<String, LoginToken>,
    length: usize,
    ttl: chrono::Duration,
    login_url: String,
}

impl LoginTokenIssuer {
    pub fn new(length: usize, ttl: Duration, login_url: &str) -> Result<Self> {
        if length == 0 {
            bail!("login token length must be at least 1");
        }
        let ttl = chrono::Duration::from_std(ttl).context("login token expiry out of range")?;

        Ok(Self {
            tokens: DashMap::new(),
            length,
            ttl,
            login_url: login_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        Self::new(config.login_token_length, config.login_token_expiry, &config.login_url)
    }

    /// Issue a new token for `account_id`, resolvable until it expires
    pub fn create_token(&self, account_id: i64) -> LoginToken {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect();

        let login_token = LoginToken {
            token: token.clone(),
            account_id,
            expiry: Utc::now() + self.ttl,
        };
        self.tokens.insert(token, login_token.clone());
        login_token
    }

    /// Resolve a token to its account id. Tokens are not consumed here.
    pub fn get_account_id(&self, token: &str) -> Result<i64, LoginTokenNotFound> {
        let now = Utc::now();
        match self.tokens.get(token) {
            Some(entry) if !entry.is_expired(now) => return Ok(entry.account_id),
            Some(_) => {}
            None => return Err(LoginTokenNotFound),
        }
        // the read guard must be released before removing from the same shard
        self.tokens.remove_if(token, |_, t| t.is_expired(now));
        Err(LoginTokenNotFound)
    }

    /// Redemption URL sent by email
    pub fn login_url(&self, token: &str) -> String {
        format!("{}/{}", self.login_url, token)
    }

    /// Drop every expired token, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.tokens.len();
        self.tokens.retain(|_, t| !t.is_expired(now));
        before.saturating_sub(self.tokens.len())
    }

    pub fn spawn_janitor(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let issuer = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let purged = issuer.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "expired login tokens removed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer(ttl_secs: u64) -> LoginTokenIssuer {
        LoginTokenIssuer::new(8, Duration::from_secs(ttl_secs), "https://app.example.com/login/").unwrap()
    }

    #[test]
    fn created_token_resolves_to_account() {
        let issuer = issuer(60);
        let lt = issuer.create_token(42);

        assert_eq!(lt.token.len(), 8);
        assert!(lt.token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(issuer.get_account_id(&lt.token).unwrap(), 42);
        // redemption does not consume the token
        assert_eq!(issuer.get_account_id(&lt.token).unwrap(), 42);
    }

    #[test]
    fn unknown_token_is_not_found() {
        let issuer = issuer(60);
        issuer.create_token(1);
        assert!(issuer.get_account_id("doesnotexist").is_err());
    }

    #[test]
    fn expired_token_is_not_found_and_removed() {
        let issuer = issuer(0);
        let lt = issuer.create_token(5);

        assert!(issuer.get_account_id(&lt.token).is_err());
        assert!(issuer.tokens.is_empty());
    }

    #[test]
    fn purge_drops_only_expired() {
        let issuer = issuer(60);
        let live = issuer.create_token(1);
        issuer.tokens.insert(
            "stale".to_string(),
            LoginToken { token: "stale".to_string(), account_id: 2, expiry: Utc::now() },
        );

        assert_eq!(issuer.purge_expired(), 1);
        assert_eq!(issuer.get_account_id(&live.token).unwrap(), 1);
    }

    #[test]
    fn login_url_joins_token() {
        assert_eq!(issuer(60).login_url("abc123"), "https://app.example.com/login/abc123");
    }

    #[test]
    fn rejects_unusable_settings() {
        assert!(LoginTokenIssuer::new(0, Duration::from_secs(60), "x").is_err());
        assert!(LoginTokenIssuer::new(8, Duration::from_secs(u64::MAX), "x").is_err());
    }
}
