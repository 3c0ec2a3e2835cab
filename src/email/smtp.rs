//! SMTP mailer using lettre.

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::{EmailConfig, SmtpConfig};
use crate::email::{LoginTokenContent, MailError, Mailer};

const IMPLICIT_TLS_PORT: u16 = 465;

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(smtp: &SmtpConfig, email: &EmailConfig) -> Result<Self, MailError> {
        let builder = if smtp.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)?
        };
        let mut builder = builder.port(smtp.port);
        if !smtp.user.is_empty() {
            builder = builder.credentials(Credentials::new(smtp.user.clone(), smtp.password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from: Mailbox::new(Some(email.from_name.clone()), email.from_address.parse()?),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn login_token(&self, content: &LoginTokenContent) -> Result<(), MailError> {
        let to = Mailbox::new(Some(content.name.clone()), content.email.parse()?);
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(content.subject())
            .multipart(MultiPart::alternative_plain_html(content.text(), content.html()))?;

        self.transport.send(message).await?;
        tracing::info!(module = "email", to = %content.email, "login token email sent");
        Ok(())
    }
}
