//! Configuration management for Courier.
//!
//! Sources, lowest precedence first: built-in defaults, the TOML file,
//! `KEYSTAMP__*` environment variables, then CLI flags.

use anyhow::{Context, Result, bail};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use keystamp_common::constants::{
    DEFAULT_LISTEN_ADDR, DEFAULT_MAIL_API_ENDPOINT, DEFAULT_MAIL_TIMEOUT_SECS,
    DEFAULT_OTP_TTL_MINUTES, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SMTP_HOST, DEFAULT_SMTP_PORT,
    DEFAULT_SWEEP_INTERVAL_SECS, MAX_OTP_TTL_MINUTES,
};

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "KEYSTAMP";

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Upper bound on handling a single HTTP request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Passcode lifecycle configuration
    #[serde(default)]
    pub otp: OtpConfig,

    /// Outbound mail configuration
    #[serde(default)]
    pub mail: MailConfig,
}

/// Passcode lifecycle configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    /// How long an issued code stays valid
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u64,

    /// Only addresses ending in `@<domain>` may request a code
    #[serde(default)]
    pub allowed_domain: Option<String>,

    /// Discard the freshly issued code when its email could not be sent
    #[serde(default = "default_true")]
    pub rollback_on_delivery_failure: bool,

    /// Seconds between expired-challenge sweeps; 0 disables the sweeper
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
            allowed_domain: None,
            rollback_on_delivery_failure: true,
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl OtpConfig {
    /// Code lifetime, or `None` if `ttl_minutes` does not fit a duration
    pub fn ttl(&self) -> Option<chrono::Duration> {
        i64::try_from(self.ttl_minutes)
            .ok()
            .and_then(chrono::Duration::try_minutes)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }

    /// Allowed domain without a leading `@`, lowercased
    pub fn normalized_domain(&self) -> Option<String> {
        self.allowed_domain
            .as_deref()
            .map(|d| d.trim().trim_start_matches('@').to_ascii_lowercase())
            .filter(|d| !d.is_empty())
    }
}

/// Which mail sender delivers passcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum MailProvider {
    /// Write messages to the log instead of sending them
    Log,
    /// SMTP relay with STARTTLS
    Smtp,
    /// HTTP mail API authenticated with a bearer token
    HttpApi,
}

/// Outbound mail configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_provider")]
    pub provider: MailProvider,

    /// Display name in the From header
    #[serde(default = "default_from_name")]
    pub from_name: String,

    /// Sender address; SMTP falls back to the login username
    #[serde(default)]
    pub from_address: Option<String>,

    /// Product name shown in the email body
    #[serde(default = "default_brand")]
    pub brand: String,

    #[serde(default = "default_subject")]
    pub subject: String,

    /// Upper bound on a single delivery attempt
    #[serde(default = "default_mail_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub smtp: SmtpConfig,

    #[serde(default)]
    pub http_api: HttpApiConfig,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            from_name: default_from_name(),
            from_address: None,
            brand: default_brand(),
            subject: default_subject(),
            timeout_secs: default_mail_timeout(),
            smtp: SmtpConfig::default(),
            http_api: HttpApiConfig::default(),
        }
    }
}

impl MailConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Address used in the From header, if one can be determined
    pub fn sender_address(&self) -> Option<&str> {
        self.from_address
            .as_deref()
            .or(self.smtp.username.as_deref())
            .filter(|a| !a.is_empty())
    }
}

/// SMTP relay settings
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<SecretString>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: None,
            password: None,
        }
    }
}

/// HTTP mail API settings
#[derive(Debug, Clone, Deserialize)]
pub struct HttpApiConfig {
    /// Base URL; messages are posted to `{endpoint}/v1.0/users/{from}/sendMail`
    #[serde(default = "default_api_endpoint")]
    pub endpoint: String,

    /// Bearer token issued out of band
    #[serde(default)]
    pub access_token: Option<SecretString>,
}

impl Default for HttpApiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_api_endpoint(),
            access_token: None,
        }
    }
}

// Default value functions
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_request_timeout() -> u64 { DEFAULT_REQUEST_TIMEOUT_SECS }
fn default_ttl_minutes() -> u64 { DEFAULT_OTP_TTL_MINUTES }
fn default_sweep_interval() -> u64 { DEFAULT_SWEEP_INTERVAL_SECS }
fn default_true() -> bool { true }
fn default_provider() -> MailProvider { MailProvider::Log }
fn default_from_name() -> String { "Keystamp".to_string() }
fn default_brand() -> String { "Keystamp".to_string() }
fn default_subject() -> String { "Your one-time passcode".to_string() }
fn default_mail_timeout() -> u64 { DEFAULT_MAIL_TIMEOUT_SECS }
fn default_smtp_host() -> String { DEFAULT_SMTP_HOST.to_string() }
fn default_smtp_port() -> u16 { DEFAULT_SMTP_PORT }
fn default_api_endpoint() -> String { DEFAULT_MAIL_API_ENDPOINT.to_string() }

impl AppConfig {
    /// Load configuration from file and environment, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        if !Path::new(config_path).exists() {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(Path::new(config_path)).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .context("Failed to load config sources")?;

        let mut config: Self = settings
            .try_deserialize()
            .context("Failed to parse config")?;

        // Apply CLI overrides
        if let Some(ref listen) = args.listen {
            config.listen_addr = listen.clone();
        }
        if let Some(provider) = args.mail_provider {
            config.mail.provider = provider;
        }
        if let Some(ref domain) = args.allowed_domain {
            config.otp.allowed_domain = Some(domain.clone());
        }

        config.validate()?;

        Ok(config)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_OTP_TTL_MINUTES).contains(&self.otp.ttl_minutes) {
            bail!("otp.ttl_minutes must be between 1 and {}", MAX_OTP_TTL_MINUTES);
        }
        if self.mail.timeout_secs == 0 {
            bail!("mail.timeout_secs must be at least 1");
        }

        match self.mail.provider {
            MailProvider::Log => {}
            MailProvider::Smtp => {
                if self.mail.smtp.username.is_none() || self.mail.smtp.password.is_none() {
                    bail!("mail.smtp.username and mail.smtp.password are required for the smtp provider");
                }
            }
            MailProvider::HttpApi => {
                if self.mail.http_api.access_token.is_none() {
                    bail!("mail.http_api.access_token is required for the http_api provider");
                }
                if self.mail.from_address.is_none() {
                    bail!("mail.from_address is required for the http_api provider");
                }
            }
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            request_timeout_secs: default_request_timeout(),
            otp: OtpConfig::default(),
            mail: MailConfig::default(),
        }
    }
}
