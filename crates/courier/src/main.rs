//! # Courier - Keystamp email OTP service
//!
//! Issues six-digit one-time passcodes, emails them, and checks the codes
//! users send back.
//!
//! ## Architecture
//! ```text
//! Client → Courier (axum) → OtpLedger (in memory)
//!                ↓
//!          MailSender (SMTP relay | HTTP mail API | log)
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;
mod error;
mod ledger;
mod mail;
mod routes;
mod state;

use config::{AppConfig, MailProvider};
use ledger::sweeper_worker;
use state::AppState;

/// Keystamp Courier - email OTP service
#[derive(Parser, Debug)]
#[command(name = "courier")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/courier.toml", env = "COURIER_CONFIG")]
    config: String,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Mail provider (overrides config)
    #[arg(long, value_enum, env = "MAIL_PROVIDER")]
    mail_provider: Option<MailProvider>,

    /// Only issue codes to addresses in this domain (overrides config)
    #[arg(long, env = "ALLOWED_DOMAIN")]
    allowed_domain: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up a local .env before clap reads the environment
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level, args.json_logs)?;

    info!("📬 Starting Keystamp Courier v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::load(&args.config, &args)?;
    info!(
        provider = ?config.mail.provider,
        ttl_minutes = config.otp.ttl_minutes,
        allowed_domain = ?config.otp.normalized_domain(),
        "📋 Configuration loaded"
    );

    // Create shutdown broadcast channel
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    // Initialize application state
    let state = AppState::new(config.clone())?;

    // Spawn expired-challenge sweeper
    match config.otp.sweep_interval() {
        Some(interval) => {
            let ledger = state.ledger.clone();
            let sweeper_shutdown = shutdown_tx.subscribe();
            tokio::spawn(async move {
                sweeper_worker(ledger, interval, sweeper_shutdown).await;
            });
        }
        None => tracing::warn!("OTP sweeper disabled, expired codes are only dropped on verify"),
    }

    // Build router
    let app = routes::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("🚀 Courier listening on {}", config.listen_addr);

    // Handle graceful shutdown
    let graceful = async move {
        shutdown_signal().await;
        info!("🛑 Shutdown signal received");
        let _ = shutdown_tx.send(());
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(graceful)
        .await
        .context("Server error")?;

    info!("👋 Courier shutdown complete");
    Ok(())
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Invalid log level")?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
