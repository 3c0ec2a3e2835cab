//! Authentication Models
//!
//! Accounts, their refresh tokens and the claims derived from them.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::auth::jwt::{AppClaims, RefreshClaims};

static EMAIL_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

/// Returns true if `email` looks like an address.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_FORMAT.is_match(email)
}

/// Field name to message map produced by model validation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.insert(field.to_string(), message.into());
    }

    #[cfg(test)]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Account record with its device tokens
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub active: bool,
    pub roles: Vec<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub token: Vec<Token>,
}

impl Account {
    /// Unsaved, active account with the `user` role
    pub fn new(email: &str, name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            email: email.to_string(),
            name: name.to_string(),
            active: true,
            roles: vec!["user".to_string()],
            last_login: None,
            created_at: now,
            updated_at: now,
            token: Vec::new(),
        }
    }

    /// Whether the account may start or renew a session
    pub fn can_login(&self) -> bool {
        self.active
    }

    pub fn claims(&self) -> AppClaims {
        AppClaims {
            id: self.id,
            sub: self.name.clone(),
            roles: self.roles.clone(),
        }
    }

    /// Normalizes email and name, then checks them.
    pub fn validate(&mut self) -> Result<(), ValidationErrors> {
        self.email = self.email.trim().to_lowercase();
        self.name = self.name.trim().to_string();

        let mut errors = ValidationErrors::default();
        if self.email.is_empty() {
            errors.add("email", "cannot be blank");
        } else if !is_valid_email(&self.email) {
            errors.add("email", "must be a valid email address");
        }
        if self.name.is_empty() {
            errors.add("name", "cannot be blank");
        } else if !self.name.is_ascii() {
            errors.add("name", "must contain ASCII characters only");
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Refresh token record bound to one device of an account
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub id: i64,
    #[serde(skip_serializing)]
    pub token: String,
    pub expiry: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub account_id: i64,
    pub mobile: bool,
    pub identifier: String,
}

impl Token {
    pub fn claims(&self) -> RefreshClaims {
        RefreshClaims {
            id: self.id,
            token: self.token.clone(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_normalizes_email_and_name() {
        let mut account = Account::new("  Alice@Example.COM ", " Alice ");
        account.validate().unwrap();
        assert_eq!(account.email, "alice@example.com");
        assert_eq!(account.name, "Alice");
    }

    #[test]
    fn validate_reports_each_field() {
        let mut account = Account::new("not-an-email", "");
        let errors = account.validate().unwrap_err();
        assert_eq!(errors.get("email"), Some("must be a valid email address"));
        assert_eq!(errors.get("name"), Some("cannot be blank"));

        let mut account = Account::new("bob@example.com", "Bøb");
        let errors = account.validate().unwrap_err();
        assert!(errors.get("email").is_none());
        assert!(errors.get("name").is_some());
    }

    #[test]
    fn inactive_accounts_cannot_login() {
        let mut account = Account::new("carol@example.com", "Carol");
        assert!(account.can_login());
        account.active = false;
        assert!(!account.can_login());
    }

    #[test]
    fn serialized_token_hides_secret() {
        let token = Token {
            id: 1,
            token: "secret-value".to_string(),
            expiry: Utc::now(),
            updated_at: Utc::now(),
            account_id: 9,
            mobile: false,
            identifier: "Firefox on Linux".to_string(),
        };
        let json = serde_json::to_value(&token).unwrap();
        assert!(json.get("token").is_none());
        assert!(json.get("account_id").is_none());
        assert_eq!(json["identifier"], "Firefox on Linux");
    }

    #[test]
    fn email_format() {
        assert!(is_valid_email("user+tag@sub.example.com"));
        assert!(!is_valid_email("user@localhost"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("a b@example.com"));
    }
}
