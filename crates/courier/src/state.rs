//! Application state and shared resources.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::ledger::OtpLedger;
use crate::mail::{MailSender, build_mailer};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,

    /// Outstanding passcodes
    pub ledger: Arc<OtpLedger>,

    /// Passcode delivery
    pub mailer: Arc<dyn MailSender>,

    /// Process start, for uptime reporting
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create application state with the configured mail provider
    pub fn new(config: AppConfig) -> Result<Self> {
        let ttl = config
            .otp
            .ttl()
            .context("otp.ttl_minutes is out of range")?;
        let ledger = Arc::new(OtpLedger::new(ttl));
        let mailer = build_mailer(&config.mail)?;
        Ok(Self::from_parts(config, ledger, mailer))
    }

    pub fn from_parts(
        config: AppConfig,
        ledger: Arc<OtpLedger>,
        mailer: Arc<dyn MailSender>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            ledger,
            mailer,
            started_at: Utc::now(),
        }
    }

    /// Seconds since the state was created
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds().max(0)
    }
}
