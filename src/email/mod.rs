//! # Email Module
//!
//! Login token emails. Handlers never wait for delivery: they hand an
//! [`EmailJob`] to the [`EmailDispatcher`], whose worker task sends it through a
//! [`Mailer`] and logs failures.

pub mod console;
pub mod smtp;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

pub use console::ConsoleMailer;
pub use smtp::SmtpMailer;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Data rendered into the login token email
#[derive(Debug, Clone, PartialEq)]
pub struct LoginTokenContent {
    pub email: String,
    pub name: String,
    pub url: String,
    pub token: String,
    pub expiry: DateTime<Utc>,
}

impl LoginTokenContent {
    pub fn subject(&self) -> String {
        "Your login token".to_string()
    }

    pub fn text(&self) -> String {
        format!(
            "Hi {name},\n\n\
             open the link below to log in:\n{url}\n\n\
             or enter this token: {token}\n\n\
             The token expires at {expiry}.\n",
            name = self.name,
            url = self.url,
            token = self.token,
            expiry = self.expiry.format("%Y-%m-%d %H:%M UTC"),
        )
    }

    pub fn html(&self) -> String {
        format!(
            "<p>Hi {name},</p>\
             <p><a href=\"{url}\">Log in</a> or enter this token: <strong>{token}</strong></p>\
             <p>The token expires at {expiry}.</p>",
            name = self.name,
            url = self.url,
            token = self.token,
            expiry = self.expiry.format("%Y-%m-%d %H:%M UTC"),
        )
    }
}

/// Outbound email delivery
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn login_token(&self, content: &LoginTokenContent) -> Result<(), MailError>;
}

#[derive(Debug, Clone)]
pub enum EmailJob {
    LoginToken(LoginTokenContent),
}

/// Queue in front of a background mailer task
#[derive(Clone)]
pub struct EmailDispatcher {
    tx: mpsc::UnboundedSender<EmailJob>,
}

impl EmailDispatcher {
    /// Start the worker task. Must be called inside a tokio runtime.
    pub fn spawn(mailer: Arc<dyn Mailer>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<EmailJob>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let result = match &job {
                    EmailJob::LoginToken(content) => mailer.login_token(content).await,
                };
                if let Err(e) = result {
                    tracing::error!(module = "email", error = %e, "failed to send email");
                }
            }
            tracing::debug!(module = "email", "email worker stopped");
        });
        Self { tx }
    }

    /// Queue `job` without waiting for delivery
    pub fn dispatch(&self, job: EmailJob) {
        if self.tx.send(job).is_err() {
            tracing::error!(module = "email", "email worker is gone, message dropped");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Duration;

    /// Mailer forwarding every message to a channel, optionally failing the send
    pub(crate) struct RecordingMailer {
        sent: mpsc::UnboundedSender<LoginTokenContent>,
        fail: bool,
    }

    impl RecordingMailer {
        pub(crate) fn new(fail: bool) -> (Self, mpsc::UnboundedReceiver<LoginTokenContent>) {
            let (sent, rx) = mpsc::unbounded_channel();
            (Self { sent, fail }, rx)
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn login_token(&self, content: &LoginTokenContent) -> Result<(), MailError> {
            let _ = self.sent.send(content.clone());
            if self.fail {
                "not an address".parse::<lettre::Address>()?;
            }
            Ok(())
        }
    }

    fn content(token: &str) -> LoginTokenContent {
        LoginTokenContent {
            email: "alice@example.com".to_string(),
            name: "Alice".to_string(),
            url: format!("https://app.example.com/login/{token}"),
            token: token.to_string(),
            expiry: Utc::now(),
        }
    }

    #[tokio::test]
    async fn dispatcher_delivers_in_background() {
        let (mailer, mut rx) = RecordingMailer::new(false);
        let dispatcher = EmailDispatcher::spawn(Arc::new(mailer));

        dispatcher.dispatch(EmailJob::LoginToken(content("abc")));

        let sent = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(sent.token, "abc");
    }

    #[tokio::test]
    async fn failed_delivery_keeps_worker_running() {
        let (mailer, mut rx) = RecordingMailer::new(true);
        let dispatcher = EmailDispatcher::spawn(Arc::new(mailer));

        dispatcher.dispatch(EmailJob::LoginToken(content("one")));
        dispatcher.dispatch(EmailJob::LoginToken(content("two")));

        for expected in ["one", "two"] {
            let sent = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
            assert_eq!(sent.token, expected);
        }
    }

    #[test]
    fn rendered_bodies_carry_url_and_token() {
        let content = content("Xy12Ab34");
        assert!(content.text().contains("https://app.example.com/login/Xy12Ab34"));
        assert!(content.html().contains("<strong>Xy12Ab34</strong>"));
    }
}
