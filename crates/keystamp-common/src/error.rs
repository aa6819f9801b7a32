//! Common error types for Keystamp components.

use thiserror::Error;

use crate::constants::messages;

/// A verification attempt that did not succeed.
///
/// The `Display` text is the reason shown to the caller, unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChallengeError {
    /// No challenge is pending for the identity
    #[error("{}", messages::OTP_NOT_FOUND)]
    NotFound,

    /// The pending challenge outlived its TTL and has been discarded
    #[error("{}", messages::OTP_EXPIRED)]
    Expired,

    /// The submitted code differs from the pending one; the challenge remains
    #[error("{}", messages::OTP_INCORRECT)]
    Mismatch,
}

/// Common errors across Keystamp components
#[derive(Debug, Error)]
pub enum KeystampError {
    /// Missing or malformed input, detected before touching the ledger
    #[error("{0}")]
    Validation(String),

    /// The mail sender failed to deliver a passcode
    #[error("{message}")]
    Delivery {
        /// Caller-visible summary
        message: String,
        /// Underlying provider failure
        cause: String,
    },

    /// Verification failed
    #[error(transparent)]
    Challenge(#[from] ChallengeError),
}

impl KeystampError {
    /// Shorthand for a validation failure
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Shorthand for a delivery failure with the standard summary
    pub fn delivery(cause: impl std::fmt::Display) -> Self {
        Self::Delivery {
            message: messages::SEND_FAILED.to_string(),
            cause: cause.to_string(),
        }
    }

    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Challenge(_) => 400,
            Self::Delivery { .. } => 500,
        }
    }
}
