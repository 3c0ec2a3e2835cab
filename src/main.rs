//! # Account Server
//!
//! Passwordless authentication and account self-service over HTTP, built with
//! Axum and Tokio.
//!
//! ## Features
//! - Login tokens delivered by email, redeemed for a JWT access/refresh pair
//! - Refresh token rotation, one record per device, logout per device
//! - Account self-service: read, update, delete, manage device tokens
//! - PostgreSQL persistence with embedded migrations, or an in-memory store
//!
//! ## Architecture
//! - `server`: application state, router assembly and startup
//! - `config`: environment variable configuration
//! - `auth`: JWTs, login tokens, device detection and middleware
//! - `database`: store traits with PostgreSQL and in-memory implementations
//! - `email`: background email delivery over SMTP or to the log
//! - `routes`: HTTP handlers (`health`, `auth`, `account`)
//!
//! ## Environment Setup
//! ```bash
//! cp .env.example .env
//! ```
//!
//! ## Running the Server
//! ```bash
//! cargo run
//! curl http://localhost:3000/ping
//! ```

mod auth;
mod config;
mod database;
mod email;
mod errors;
mod routes;
mod server;
#[cfg(test)]
mod testing;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    // .env is optional, real environment variables win
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .compact(),
        )
        .init();

    tracing::info!("🏁 Starting account server...");
    tracing::info!("📦 Package: {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    tracing::info!("🏗️  Build profile: {}", if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    });

    if let Err(e) = server::start().await {
        tracing::error!("❌ Server failed: {e:#}");
        std::process::exit(1);
    }
}
