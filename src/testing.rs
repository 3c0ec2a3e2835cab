//! Router harness for handler tests: the full app over a `MemoryStore` and a
//! recording mailer, driven with `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

use crate::auth::{Account, JwtService, LoginTokenIssuer};
use crate::email::{tests::RecordingMailer, EmailDispatcher, LoginTokenContent};
use crate::database::MemoryStore;
use crate::routes::auth::TokenResponse;
use crate::server::{create_router, AppState};

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    emails: mpsc::UnboundedReceiver<LoginTokenContent>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(false)
    }

    /// Every email send fails after being recorded
    pub fn with_failing_mailer() -> Self {
        Self::build(true)
    }

    fn build(fail: bool) -> Self {
        let store = Arc::new(MemoryStore::new());
        let (mailer, emails) = RecordingMailer::new(fail);
        let state = AppState {
            jwt_service: Arc::new(JwtService::new(
                "test_secret",
                Duration::from_secs(900),
                Duration::from_secs(3600),
            )
            .expect("jwt service")),
            login_tokens: Arc::new(LoginTokenIssuer::new(
                8,
                Duration::from_secs(600),
                "https://app.example.com/login/",
            )
            .expect("login token issuer")),
            auth_store: store.clone(),
            account_store: store.clone(),
            mailer: EmailDispatcher::spawn(Arc::new(mailer)),
        };
        let router = create_router(state.clone(), &["http://localhost:3001".to_string()])
            .expect("router builds");
        Self { router, state, store, emails }
    }

    pub fn add_account(&self, email: &str, name: &str, active: bool) -> Account {
        let mut account = Account::new(email, name);
        account.active = active;
        self.store.insert_account(account).expect("account inserted")
    }

    async fn call(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::USER_AGENT, USER_AGENT);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        };
        self.call(req.unwrap()).await
    }

    pub async fn send_with_cookie(&self, method: Method, uri: &str, cookie: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap();
        self.call(req).await
    }

    pub async fn next_email(&mut self) -> LoginTokenContent {
        tokio::time::timeout(Duration::from_secs(1), self.emails.recv())
            .await
            .expect("email sent in time")
            .expect("mailer alive")
    }

    pub async fn assert_no_more_emails(&mut self) {
        let next = tokio::time::timeout(Duration::from_millis(50), self.emails.recv()).await;
        assert!(next.is_err(), "unexpected email: {next:?}");
    }

    /// Login by email, then redeem the mailed token
    pub async fn sign_in(&mut self, email: &str) -> TokenResponse {
        let (status, _) = self
            .send(Method::POST, "/auth/login", None, Some(json!({ "email": email })))
            .await;
        assert_eq!(status, StatusCode::OK, "login for {email}");
        let token = self.next_email().await.token;

        let (status, body) = self
            .send(Method::POST, "/auth/token", None, Some(json!({ "token": token })))
            .await;
        assert_eq!(status, StatusCode::OK, "token for {email}");
        serde_json::from_value(body).expect("token pair")
    }
}
