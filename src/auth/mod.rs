//! # Authentication Module
//!
//! Passwordless login tokens, the JWT access/refresh pair, and the middleware
//! securing the account endpoints.

pub mod device;
pub mod errors;
pub mod jwt;
pub mod login_token;
pub mod middleware;
pub mod models;

pub use errors::AuthError;
pub use jwt::{AppClaims, JwtService, RefreshClaims};
pub use login_token::LoginTokenIssuer;
pub use models::{Account, Token};
