//! Outbound e-mail: verification codes and password reset links.
//!
//! Handlers talk to a [`Mailer`]; the binary wires up [`SmtpMailer`] when
//! mail is enabled and [`LogMailer`] otherwise.

use crate::config::MailConfig;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;

/// A single HTML message to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

/// Sends over SMTP with implicit TLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let address: Address = config.sender_address().parse()?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self {
            transport,
            from: Mailbox::new(Some(config.from_name.clone()), address),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        let to: Address = email.to.parse()?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(Mailbox::new(None, to))
            .subject(email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html)?;
        self.transport.send(message).await?;
        tracing::info!(to = %email.to, "mail sent");
        Ok(())
    }
}

/// Writes mail to the log instead of sending it.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        tracing::info!(to = %email.to, subject = %email.subject, "mail disabled, not sending");
        tracing::debug!(body = %email.html, "unsent mail body");
        Ok(())
    }
}

const CODE_STYLE: &str = "font-size: 24px; font-weight: bold; color: #008f39; \
    letter-spacing: 5px; margin: 20px 0; padding: 10px; background-color: #f0f0f0; \
    border-radius: 5px;";

fn code_email(to: &str, subject: &str, heading: &str, intro: &str, code: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: subject.to_string(),
        html: format!(
            "<div style=\"font-family: Arial, sans-serif; text-align: center; padding: 20px;\">\
             <h1 style=\"color: #333;\">{heading}</h1>\
             <p style=\"font-size: 16px;\">{intro}</p>\
             <p style=\"{CODE_STYLE}\">{code}</p>\
             <p style=\"font-size: 12px; color: #777;\">If you did not request this, \
             you can ignore this message.</p></div>"
        ),
    }
}

/// Sent right after registration.
pub fn welcome_email(to: &str, code: &str) -> Email {
    code_email(
        to,
        "Confirm your intranet account",
        "Welcome to the intranet!",
        "Use this verification code to activate your account:",
        code,
    )
}

/// Sent when an unverified account tries to log in.
pub fn reverification_email(to: &str, code: &str) -> Email {
    code_email(
        to,
        "New verification code",
        "Verification required",
        "Your account has not been verified yet. Use this new code to activate it:",
        code,
    )
}

pub fn password_reset_email(to: &str, link: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: "Password reset".to_string(),
        html: format!(
            "<p>To reset your password, open this link: <a href=\"{link}\">{link}</a></p>\
             <p>The link can be used once. If you did not request this, \
             you can ignore this message.</p>"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_carry_code_and_link() {
        let mail = welcome_email("ana@example.com", "123456");
        assert_eq!(mail.to, "ana@example.com");
        assert!(mail.html.contains("123456"));

        let mail = reverification_email("ana@example.com", "654321");
        assert!(mail.html.contains("654321"));
        assert_ne!(mail.subject, welcome_email("a@b.co", "1").subject);

        let mail = password_reset_email("ana@example.com", "http://x/reset-password/tok");
        assert!(mail.html.contains("http://x/reset-password/tok"));
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        LogMailer
            .send(welcome_email("ana@example.com", "123456"))
            .await
            .unwrap();
    }

    #[test]
    fn smtp_mailer_rejects_bad_sender() {
        let config = MailConfig {
            enabled: true,
            username: "not an address".into(),
            ..MailConfig::default()
        };
        assert!(matches!(
            SmtpMailer::new(&config),
            Err(MailError::Address(_))
        ));
    }

    #[test]
    fn smtp_mailer_builds_an_implicit_tls_transport() {
        let config = MailConfig {
            enabled: true,
            host: "smtp.example.com".into(),
            username: "noreply@example.com".into(),
            password: "secret".into(),
            ..MailConfig::default()
        };
        let mailer = SmtpMailer::new(&config).unwrap();
        assert_eq!(mailer.from.email.to_string(), "noreply@example.com");
    }
}
