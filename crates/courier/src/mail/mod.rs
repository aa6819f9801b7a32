//! Outbound mail delivery.
//!
//! The endpoint layer only sees [`MailSender`]; which provider sits behind
//! it is a configuration choice:
//! - `smtp` - SMTP relay with STARTTLS (lettre)
//! - `http_api` - HTTP mail API with a bearer token (reqwest)
//! - `log` - no delivery, the message is written to the log

mod console;
mod http_api;
mod smtp;
mod template;

pub use console::LogMailer;
pub use http_api::HttpApiMailer;
pub use smtp::SmtpMailer;
pub use template::OtpEmail;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{MailConfig, MailProvider};

/// Proof that a provider accepted a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Provider that accepted the message
    pub provider: &'static str,
    /// Provider-assigned identifier or response line, if any
    pub message_id: Option<String>,
}

/// Why a message was not delivered
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Sender or recipient address could not be parsed
    #[error("invalid address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// The message itself could not be built
    #[error("could not build message: {0}")]
    Message(String),

    /// Network or protocol failure talking to the provider
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider answered but refused the message
    #[error("provider rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// No answer within the configured delivery timeout
    #[error("delivery timed out after {0} seconds")]
    Timeout(u64),
}

/// Capability to deliver one HTML email
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<DeliveryReceipt, DeliveryError>;
}

/// Build the mail sender selected by configuration
pub fn build_mailer(config: &MailConfig) -> Result<Arc<dyn MailSender>> {
    let mailer: Arc<dyn MailSender> = match config.provider {
        MailProvider::Log => Arc::new(LogMailer),
        MailProvider::Smtp => Arc::new(SmtpMailer::new(config)?),
        MailProvider::HttpApi => Arc::new(HttpApiMailer::new(config)?),
    };

    tracing::info!(provider = ?config.provider, "📮 Mail sender ready");

    Ok(mailer)
}
