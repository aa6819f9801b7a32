//! HTTP mail API delivery (Graph `sendMail` request shape).
//!
//! The bearer token is taken from configuration as-is. Obtaining and
//! rotating it belongs to whatever provisions the secret.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use super::{DeliveryError, DeliveryReceipt, MailSender};
use crate::config::MailConfig;

/// Response header carrying the provider's request identifier
const REQUEST_ID_HEADER: &str = "request-id";

/// Sends by POSTing JSON to a mail API
pub struct HttpApiMailer {
    client: reqwest::Client,
    send_url: Url,
    access_token: SecretString,
    timeout_secs: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMailRequest<'a> {
    message: OutgoingMessage<'a>,
    save_to_sent_items: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutgoingMessage<'a> {
    subject: &'a str,
    body: MessageBody<'a>,
    to_recipients: Vec<Recipient<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageBody<'a> {
    content_type: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Recipient<'a> {
    email_address: EmailAddress<'a>,
}

#[derive(Serialize)]
struct EmailAddress<'a> {
    address: &'a str,
}

impl HttpApiMailer {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let access_token = config
            .http_api
            .access_token
            .clone()
            .context("mail.http_api.access_token is required for the http_api provider")?;
        let sender = config
            .from_address
            .as_deref()
            .context("mail.from_address is required for the http_api provider")?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to build HTTP client")?;

        let send_url = send_mail_url(&config.http_api.endpoint, sender)?;

        Ok(Self {
            client,
            send_url,
            access_token,
            timeout_secs: config.timeout_secs,
        })
    }
}

/// `{endpoint}/v1.0/users/{sender}/sendMail`, with `sender` as one encoded segment
fn send_mail_url(endpoint: &str, sender: &str) -> Result<Url> {
    let mut url =
        Url::parse(endpoint).with_context(|| format!("Invalid mail API endpoint {}", endpoint))?;

    url.path_segments_mut()
        .ok()
        .with_context(|| format!("Mail API endpoint {} cannot carry a path", endpoint))?
        .pop_if_empty()
        .extend(["v1.0", "users", sender, "sendMail"]);

    Ok(url)
}

#[async_trait]
impl MailSender for HttpApiMailer {
    #[tracing::instrument(name = "Sending email via HTTP API", skip_all, fields(to = %to))]
    async fn send(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let payload = SendMailRequest {
            message: OutgoingMessage {
                subject,
                body: MessageBody {
                    content_type: "HTML",
                    content: html_body,
                },
                to_recipients: vec![Recipient {
                    email_address: EmailAddress { address: to },
                }],
            },
            save_to_sent_items: false,
        };

        let response = self
            .client
            .post(self.send_url.clone())
            .bearer_auth(self.access_token.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout(self.timeout_secs)
                } else {
                    DeliveryError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %body, "Mail API rejected message");
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let message_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        tracing::info!(status = status.as_u16(), request_id = ?message_id, "Email sent");

        Ok(DeliveryReceipt {
            provider: "http_api",
            message_id,
        })
    }
}
