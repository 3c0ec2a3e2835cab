//! JWT Token Service
//!
//! Signs and validates the access/refresh token pair handed out on login.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::config::AuthConfig;

const ISSUER: &str = "account-server";

/// Account claims carried by the access token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppClaims {
    /// Account id
    pub id: i64,
    /// Account name
    pub sub: String,
    pub roles: Vec<String>,
}

/// Session claims carried by the refresh token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RefreshClaims {
    /// Refresh token record id
    pub id: i64,
    /// Refresh token string, the lookup key of the record
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum TokenKind {
    Access,
    Refresh,
}

/// Registered claims wrapped around the application claims
#[derive(Debug, Serialize, Deserialize)]
struct Signed<C> {
    #[serde(flatten)]
    claims: C,
    kind: TokenKind,
    iat: i64,
    exp: i64,
    iss: String,
}

/// JWT Service for token operations
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_expiry: chrono::Duration,
    refresh_expiry: chrono::Duration,
}

impl JwtService {
    /// Create a new JWT service with the provided secret and token lifetimes
    pub fn new(secret: &str, access_expiry: Duration, refresh_expiry: Duration) -> Result<Self> {
        let access_expiry =
            chrono::Duration::from_std(access_expiry).context("access token expiry out of range")?;
        let refresh_expiry =
            chrono::Duration::from_std(refresh_expiry).context("refresh token expiry out of range")?;

        let encoding_key = EncodingKey::from_secret(secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());

        let mut validation = Validation::default();
        validation.set_issuer(&[ISSUER]);

        Ok(Self {
            encoding_key,
            decoding_key,
            validation,
            access_expiry,
            refresh_expiry,
        })
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        Self::new(&config.jwt_secret, config.jwt_expiry, config.jwt_refresh_expiry)
    }

    /// Lifetime of refresh tokens, also used as the expiry of their records
    pub fn refresh_expiry(&self) -> chrono::Duration {
        self.refresh_expiry
    }

    /// Sign an access token from account claims and a refresh token from session claims
    pub fn gen_token_pair(
        &self,
        account: &AppClaims,
        session: &RefreshClaims,
    ) -> Result<(String, String)> {
        let access = self
            .sign(account, TokenKind::Access, self.access_expiry)
            .context("Failed to encode access token")?;
        let refresh = self
            .sign(session, TokenKind::Refresh, self.refresh_expiry)
            .context("Failed to encode refresh token")?;
        Ok((access, refresh))
    }

    /// Validate and decode an access token
    pub fn validate_access(&self, token: &str) -> Result<AppClaims> {
        self.verify(token, TokenKind::Access)
    }

    /// Validate and decode a refresh token
    pub fn validate_refresh(&self, token: &str) -> Result<RefreshClaims> {
        self.verify(token, TokenKind::Refresh)
    }

    fn sign<C: Serialize>(&self, claims: &C, kind: TokenKind, ttl: chrono::Duration) -> Result<String> {
        let now = Utc::now();
        let exp = now.checked_add_signed(ttl).context("token expiry out of range")?;
        let signed = Signed {
            claims,
            kind,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: ISSUER.to_string(),
        };
        Ok(encode(&Header::default(), &signed, &self.encoding_key)?)
    }

    fn verify<C: DeserializeOwned>(&self, token: &str, kind: TokenKind) -> Result<C> {
        let data = decode::<Signed<C>>(token, &self.decoding_key, &self.validation)
            .context("Failed to validate JWT token")?;
        if data.claims.kind != kind {
            bail!("expected {:?} token, got {:?}", kind, data.claims.kind);
        }
        Ok(data.claims.claims)
    }
}
