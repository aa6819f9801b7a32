//! Mail sender that only logs.

use async_trait::async_trait;

use super::{DeliveryError, DeliveryReceipt, MailSender};

/// Writes each message to the log and reports success
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl MailSender for LogMailer {
    #[tracing::instrument(name = "Logging email", skip_all, fields(to = %to))]
    async fn send(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        tracing::info!(subject = %subject, "Email not sent (log provider)");
        tracing::debug!(body = %html_body, "Email body");

        Ok(DeliveryReceipt {
            provider: "log",
            message_id: None,
        })
    }
}
