//! Background removal of expired challenges.
//!
//! `verify` only discards the entry it touches; identities that never come
//! back would otherwise stay in memory for the life of the process.

use std::sync::Arc;
use std::time::Duration;

use super::OtpLedger;

/// Periodically purge expired challenges until shutdown is signalled
pub async fn sweeper_worker(
    ledger: Arc<OtpLedger>,
    interval: Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    tracing::info!(interval_secs = interval.as_secs(), "🧹 OTP sweeper started");

    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let purged = ledger.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, remaining = ledger.len(), "Purged expired OTPs");
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("🧹 OTP sweeper shutting down...");
                break;
            }
        }
    }
}
