//! SMTP relay delivery (STARTTLS on the submission port).

use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::time::Duration;

use super::{DeliveryError, DeliveryReceipt, MailSender};
use crate::config::MailConfig;

/// Sends through an authenticated SMTP relay
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    timeout: Duration,
}

impl SmtpMailer {
    /// Build the transport; no connection is made until the first send
    pub fn new(config: &MailConfig) -> Result<Self> {
        let username = config
            .smtp
            .username
            .clone()
            .context("mail.smtp.username is required for the smtp provider")?;
        let password = config
            .smtp
            .password
            .as_ref()
            .map(|p| p.expose_secret().to_string())
            .context("mail.smtp.password is required for the smtp provider")?;

        let from = sender_mailbox(config)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp.host)
            .with_context(|| format!("Failed to configure SMTP relay {}", config.smtp.host))?
            .port(config.smtp.port)
            .credentials(Credentials::new(username, password))
            .timeout(Some(config.timeout()))
            .build();

        tracing::debug!(
            host = %config.smtp.host,
            port = config.smtp.port,
            from = %from,
            "SMTP transport configured"
        );

        Ok(Self {
            transport,
            from,
            timeout: config.timeout(),
        })
    }
}

/// `"<from_name>" <address>` for the From header
fn sender_mailbox(config: &MailConfig) -> Result<Mailbox> {
    let address = config
        .sender_address()
        .context("mail.from_address or mail.smtp.username must be set")?;

    let address = address
        .parse()
        .with_context(|| format!("Invalid sender address {}", address))?;

    Ok(Mailbox::new(Some(config.from_name.clone()), address))
}

/// Assemble an HTML message
fn build_message(
    from: &Mailbox,
    to: &str,
    subject: &str,
    html_body: &str,
) -> Result<Message, DeliveryError> {
    let recipient: Mailbox = to.parse().map_err(|e: lettre::address::AddressError| {
        DeliveryError::InvalidAddress {
            address: to.to_string(),
            reason: e.to_string(),
        }
    })?;

    Message::builder()
        .from(from.clone())
        .to(recipient)
        .subject(subject)
        .header(ContentType::TEXT_HTML)
        .body(html_body.to_string())
        .map_err(|e| DeliveryError::Message(e.to_string()))
}

#[async_trait]
impl MailSender for SmtpMailer {
    #[tracing::instrument(name = "Sending email via SMTP", skip_all, fields(to = %to))]
    async fn send(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let message = build_message(&self.from, to, subject, html_body)?;

        let response = tokio::time::timeout(self.timeout, self.transport.send(message))
            .await
            .map_err(|_| DeliveryError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| {
                tracing::error!(error = %e, "SMTP delivery failed");
                DeliveryError::Transport(e.to_string())
            })?;

        let message_id = response.first_line().map(str::to_string);
        tracing::info!(response = ?message_id, "Email sent");

        Ok(DeliveryReceipt {
            provider: "smtp",
            message_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MailProvider;

    fn smtp_config() -> MailConfig {
        let mut config = MailConfig {
            provider: MailProvider::Smtp,
            from_name: "Attendance System".to_string(),
            ..Default::default()
        };
        config.smtp.username = Some("noreply@example.org".to_string());
        config.smtp.password = Some(secrecy::SecretString::from("app-password"));
        config
    }

    #[test]
    fn test_sender_falls_back_to_username() {
        let from = sender_mailbox(&smtp_config()).unwrap();
        assert_eq!(from.email.to_string(), "noreply@example.org");
        assert_eq!(from.name.as_deref(), Some("Attendance System"));
    }

    #[test]
    fn test_explicit_from_address_wins() {
        let mut config = smtp_config();
        config.from_address = Some("otp@example.org".to_string());
        let from = sender_mailbox(&config).unwrap();
        assert_eq!(from.email.to_string(), "otp@example.org");
    }

    #[test]
    fn test_invalid_sender_rejected() {
        let mut config = smtp_config();
        config.from_address = Some("not an address".to_string());
        assert!(sender_mailbox(&config).is_err());
    }

    #[test]
    fn test_build_message_rejects_bad_recipient() {
        let from = sender_mailbox(&smtp_config()).unwrap();
        let err = build_message(&from, "nope", "Subject", "<p>hi</p>").unwrap_err();
        assert!(matches!(err, DeliveryError::InvalidAddress { .. }));
    }

    #[test]
    fn test_build_message_is_html() {
        let from = sender_mailbox(&smtp_config()).unwrap();
        let message = build_message(&from, "a@x.org", "Your code", "<p>482913</p>").unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Content-Type: text/html"));
        assert!(raw.contains("Subject: Your code"));
        assert!(raw.contains("<p>482913</p>"));
    }

    #[tokio::test]
    async fn test_mailer_builds_without_connecting() {
        assert!(SmtpMailer::new(&smtp_config()).is_ok());
    }

    #[test]
    fn test_missing_password() {
        let mut config = smtp_config();
        config.smtp.password = None;
        assert!(SmtpMailer::new(&config).is_err());
    }
}
