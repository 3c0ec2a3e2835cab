//! Configuration module for environment variables and application settings

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Result, anyhow, Context};

const DEV_JWT_SECRET: &str = "dev_secret";

/// Upper bound for every configured expiry, ten years
const MAX_EXPIRY_SECS: u64 = 10 * 365 * 24 * 60 * 60;
const MAX_LOGIN_TOKEN_LENGTH: usize = 64;

#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration, `None` runs against the in-memory store
    pub database: Option<DatabaseConfig>,

    /// Token lifetimes and signing secret
    pub auth: AuthConfig,

    /// Outbound email configuration
    pub email: EmailConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: usize,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiry: Duration,
    pub jwt_refresh_expiry: Duration,
    pub login_token_length: usize,
    pub login_token_expiry: Duration,
    pub login_url: String,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP relay, `None` logs emails to the console instead
    pub smtp: Option<SmtpConfig>,
    pub from_address: String,
    pub from_name: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let port = match env::var("PORT") {
            Ok(port) => port.parse().context("PORT must be a valid port number")?,
            Err(_) => parse_or("SERVER_PORT", 3000)?,
        };

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3001".to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect();

        let database = match env::var("DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => Some(DatabaseConfig {
                url,
                max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 16)?,
            }),
            _ => None,
        };

        let jwt_secret = match env::var("AUTH_JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if cfg!(debug_assertions) => {
                tracing::warn!("AUTH_JWT_SECRET not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
            _ => return Err(anyhow!("AUTH_JWT_SECRET environment variable is required")),
        };

        let login_token_length: usize = parse_or("AUTH_LOGIN_TOKEN_LENGTH", 8)?;
        if !(1..=MAX_LOGIN_TOKEN_LENGTH).contains(&login_token_length) {
            return Err(anyhow!(
                "AUTH_LOGIN_TOKEN_LENGTH must be between 1 and {MAX_LOGIN_TOKEN_LENGTH}, got {login_token_length}"
            ));
        }

        let smtp = match env::var("EMAIL_SMTP_HOST") {
            Ok(host) if !host.trim().is_empty() => Some(SmtpConfig {
                host,
                port: parse_or("EMAIL_SMTP_PORT", 587)?,
                user: env::var("EMAIL_SMTP_USER").unwrap_or_default(),
                password: env::var("EMAIL_SMTP_PASSWORD").unwrap_or_default(),
            }),
            _ => None,
        };

        Ok(Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                port,
                cors_origins,
            },

            database,

            auth: AuthConfig {
                jwt_secret,
                jwt_expiry: parse_expiry("AUTH_JWT_EXPIRY_SECS", 15 * 60)?,
                jwt_refresh_expiry: parse_expiry("AUTH_JWT_REFRESH_EXPIRY_SECS", 24 * 60 * 60)?,
                login_token_length,
                login_token_expiry: parse_expiry("AUTH_LOGIN_TOKEN_EXPIRY_SECS", 11 * 60)?,
                login_url: env::var("AUTH_LOGIN_URL")
                    .unwrap_or_else(|_| "http://localhost:3000/login".to_string()),
            },

            email: EmailConfig {
                smtp,
                from_address: env::var("EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| "noreply@localhost".to_string()),
                from_name: env::var("EMAIL_FROM_NAME")
                    .unwrap_or_else(|_| "Account Server".to_string()),
            },
        })
    }
}

/// Reads `key` and parses it, falling back to `default` when unset.
fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{key} has an invalid value {raw:?}: {e}")),
        Err(_) => Ok(default),
    }
}

/// Reads a lifetime in seconds, rejecting zero and anything past `MAX_EXPIRY_SECS`.
fn parse_expiry(key: &str, default: u64) -> Result<Duration> {
    let secs: u64 = parse_or(key, default)?;
    if secs == 0 || secs > MAX_EXPIRY_SECS {
        return Err(anyhow!("{key} must be between 1 and {MAX_EXPIRY_SECS} seconds, got {secs}"));
    }
    Ok(Duration::from_secs(secs))
}
