//! # Server Module
//!
//! Application state, router assembly and server startup.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{JwtService, LoginTokenIssuer};
use crate::config::Config;
use crate::database::{
    migrations::run_migrations, AccountStore, AuthStore, DatabaseConfig, DatabaseConnection,
    MemoryStore,
};
use crate::email::{ConsoleMailer, EmailDispatcher, Mailer, SmtpMailer};
use crate::routes::{account, auth, health::ping};

const LOGIN_TOKEN_SWEEP: Duration = Duration::from_secs(60);
const REFRESH_TOKEN_SWEEP: Duration = Duration::from_secs(60 * 60);

/// Application state shared across all route handlers
#[derive(Clone)]
pub struct AppState {
    pub jwt_service: Arc<JwtService>,
    pub login_tokens: Arc<LoginTokenIssuer>,
    pub auth_store: Arc<dyn AuthStore>,
    pub account_store: Arc<dyn AccountStore>,
    pub mailer: EmailDispatcher,
}

/// Build the full router: `/ping`, `/auth/*` and `/api/account*`
pub fn create_router(state: AppState, cors_origins: &[String]) -> Result<Router> {
    let origins = cors_origins
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()
        .context("CORS_ORIGINS contains an invalid origin")?;

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
        .allow_credentials(true);

    let app = Router::new()
        .route("/ping", get(ping))
        .merge(auth::create_auth_routes(&state))
        .merge(account::create_account_routes(&state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state);

    Ok(app)
}

async fn open_stores(config: &Config) -> Result<(Arc<dyn AuthStore>, Arc<dyn AccountStore>)> {
    match &config.database {
        Some(database) => {
            let db = Arc::new(DatabaseConnection::new(DatabaseConfig::try_from(database)?).await?);
            run_migrations(&db).await?;
            let auth_store: Arc<dyn AuthStore> = db.clone();
            let account_store: Arc<dyn AccountStore> = db;
            Ok((auth_store, account_store))
        }
        None => {
            tracing::warn!("⚠️  DATABASE_URL not set, using in-memory store (data is lost on restart)");
            let store = Arc::new(MemoryStore::seeded()?);
            let auth_store: Arc<dyn AuthStore> = store.clone();
            let account_store: Arc<dyn AccountStore> = store;
            Ok((auth_store, account_store))
        }
    }
}

fn open_mailer(config: &Config) -> Result<Arc<dyn Mailer>> {
    match &config.email.smtp {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "📧 Sending email through SMTP");
            Ok(Arc::new(SmtpMailer::new(smtp, &config.email)?))
        }
        None => {
            tracing::warn!("⚠️  EMAIL_SMTP_HOST not set, login emails are only logged");
            Ok(Arc::new(ConsoleMailer))
        }
    }
}

/// Periodically delete refresh tokens past their expiry
fn spawn_refresh_token_purge(store: Arc<dyn AuthStore>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match store.purge_expired_tokens().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "purged expired refresh tokens"),
                Err(e) => tracing::error!(error = %e, "failed to purge expired refresh tokens"),
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("🛑 Shutdown signal received");
}

/// Load configuration, connect the backends and serve until Ctrl+C.
pub async fn start() -> Result<()> {
    let config = Config::from_env()?;

    let (auth_store, account_store) = open_stores(&config).await?;
    let mailer = EmailDispatcher::spawn(open_mailer(&config)?);

    let state = AppState {
        jwt_service: Arc::new(JwtService::from_config(&config.auth)?),
        login_tokens: Arc::new(LoginTokenIssuer::from_config(&config.auth)?),
        auth_store,
        account_store,
        mailer,
    };

    state.login_tokens.spawn_janitor(LOGIN_TOKEN_SWEEP);
    spawn_refresh_token_purge(state.auth_store.clone(), REFRESH_TOKEN_SWEEP);

    let app = create_router(state, &config.server.cors_origins)?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}, port may already be in use"))?;

    tracing::info!("🚀 Account server starting...");
    tracing::info!("📡 Listening on http://{}", addr);
    tracing::info!("🏥 Health check available at http://{}/ping", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestApp;

    #[tokio::test]
    async fn ping_is_public() {
        let app = TestApp::new();
        let (status, body) = app.send(Method::GET, "/ping", None, None).await;
        assert_eq!(status, axum::http::StatusCode::OK);
        assert_eq!(body["status"], "pong");
    }

    #[tokio::test]
    async fn rejects_invalid_cors_origin() {
        let app = TestApp::new();
        assert!(create_router(app.state.clone(), &["bad\norigin".to_string()]).is_err());
    }

    #[tokio::test]
    async fn refresh_token_purge_runs_in_background() {
        use crate::auth::{Account, Token};
        use chrono::Utc;

        let store = Arc::new(MemoryStore::new());
        let alice = store.insert_account(Account::new("alice@example.com", "Alice")).unwrap();
        let mut stale = Token {
            id: 0,
            token: "stale".to_string(),
            expiry: Utc::now() - chrono::Duration::minutes(1),
            updated_at: Utc::now(),
            account_id: alice.id,
            mobile: false,
            identifier: "Chrome on Linux".to_string(),
        };
        store.save_refresh_token(&mut stale).await.unwrap();

        spawn_refresh_token_purge(store.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(store.get_by_refresh_token("stale").await.is_err());
    }
}
