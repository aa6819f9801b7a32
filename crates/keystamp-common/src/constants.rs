//! Shared constants for Keystamp components.

/// Default Courier HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

/// Default challenge validity (10 minutes)
pub const DEFAULT_OTP_TTL_MINUTES: u64 = 10;

/// Longest challenge validity accepted from configuration (one day)
pub const MAX_OTP_TTL_MINUTES: u64 = 24 * 60;

/// Default interval between expired-challenge sweeps (seconds)
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Default timeout for a single mail delivery (seconds)
pub const DEFAULT_MAIL_TIMEOUT_SECS: u64 = 30;

/// Default timeout for a whole HTTP request (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Number of digits in a passcode
pub const OTP_CODE_LENGTH: usize = 6;

/// Smallest passcode value (inclusive)
pub const OTP_CODE_MIN: u32 = 100_000;

/// Largest passcode value (inclusive)
pub const OTP_CODE_MAX: u32 = 999_999;

/// Default SMTP relay (STARTTLS)
pub const DEFAULT_SMTP_HOST: &str = "smtp.office365.com";

/// Default SMTP submission port
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Default HTTP mail API base URL
pub const DEFAULT_MAIL_API_ENDPOINT: &str = "https://graph.microsoft.com";

/// HTTP route paths
pub mod routes {
    /// Liveness probe
    pub const HEALTH: &str = "/api/health";

    /// Issue and deliver a passcode
    pub const SEND_OTP: &str = "/api/auth/send-otp";

    /// Check a submitted passcode
    pub const VERIFY_OTP: &str = "/api/auth/verify-otp";
}

/// Caller-visible response messages
pub mod messages {
    pub const EMAIL_REQUIRED: &str = "Email is required.";
    pub const EMAIL_INVALID: &str = "A valid email address is required.";
    pub const EMAIL_AND_OTP_REQUIRED: &str = "Email and OTP are required.";
    pub const MALFORMED_BODY: &str = "Request body must be a JSON object.";

    pub const OTP_SENT: &str = "OTP sent. Check your mailbox.";
    pub const OTP_VERIFIED: &str = "OTP verified successfully.";
    pub const SEND_FAILED: &str = "Failed to send email.";

    pub const OTP_NOT_FOUND: &str = "No OTP generated for this email.";
    pub const OTP_EXPIRED: &str = "OTP expired.";
    pub const OTP_INCORRECT: &str = "Incorrect OTP.";

    /// Rejection for an address outside the allowed domain
    pub fn domain_not_allowed(domain: &str) -> String {
        format!("Only {} emails are allowed.", domain)
    }
}
