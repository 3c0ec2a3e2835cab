//! Console mailer for development: logs emails instead of sending them.

use async_trait::async_trait;
use chrono::Utc;

use crate::email::{LoginTokenContent, MailError, Mailer};

#[derive(Debug, Clone, Default)]
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn login_token(&self, content: &LoginTokenContent) -> Result<(), MailError> {
        let expires_in = (content.expiry - Utc::now()).num_minutes();
        tracing::info!(
            module = "email",
            to = %content.email,
            subject = %content.subject(),
            url = %content.url,
            token = %content.token,
            expires_in,
            "📧 login token email (not sent, no SMTP host configured)"
        );
        Ok(())
    }
}
