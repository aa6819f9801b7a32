//! Core types shared across Keystamp components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ChallengeError;

/// A pending one-time passcode bound to an identity.
///
/// At most one exists per identity; issuing again replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Challenge {
    /// Recipient address the code was issued for
    pub identity: String,

    /// Six ASCII digits in [100000, 999999]
    #[serde(skip_serializing)]
    pub code: String,

    /// When the challenge was issued
    pub issued_at: DateTime<Utc>,

    /// After this instant the challenge is expired
    pub expires_at: DateTime<Utc>,
}

impl Challenge {
    /// Expiry is strict: a challenge is still live at exactly `expires_at`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Result of checking a submitted code against the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Codes match and the challenge was live; it has been consumed
    Valid,
    /// No challenge exists for the identity
    NotFound,
    /// The challenge had expired; it has been discarded
    Expired,
    /// Wrong code; the challenge is kept for another attempt
    Mismatch,
}

impl VerifyOutcome {
    /// Converts a failed outcome into its typed error
    pub fn into_result(self) -> Result<(), ChallengeError> {
        match self {
            Self::Valid => Ok(()),
            Self::NotFound => Err(ChallengeError::NotFound),
            Self::Expired => Err(ChallengeError::Expired),
            Self::Mismatch => Err(ChallengeError::Mismatch),
        }
    }
}

/// Body of a send-otp request
///
/// Fields are optional so absence can be reported with a readable reason
/// instead of a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendOtpRequest {
    #[serde(default)]
    pub email: Option<String>,
}

/// Body of a verify-otp request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyOtpRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub otp: Option<String>,
}

/// Response body for every OTP endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMessage {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_expiry_is_strict() {
        let issued_at = Utc::now();
        let challenge = Challenge {
            identity: "a@x.org".to_string(),
            code: "482913".to_string(),
            issued_at,
            expires_at: issued_at + Duration::minutes(10),
        };

        assert!(!challenge.is_expired_at(challenge.expires_at));
        assert!(challenge.is_expired_at(challenge.expires_at + Duration::milliseconds(1)));
    }

    #[test]
    fn test_code_is_never_serialized() {
        let now = Utc::now();
        let challenge = Challenge {
            identity: "a@x.org".to_string(),
            code: "482913".to_string(),
            issued_at: now,
            expires_at: now,
        };

        let json = serde_json::to_string(&challenge).unwrap();
        assert!(!json.contains("482913"));
        assert!(json.contains("a@x.org"));
    }

    #[test]
    fn test_outcome_into_result() {
        assert!(VerifyOutcome::Valid.into_result().is_ok());
        assert_eq!(VerifyOutcome::Mismatch.into_result(), Err(ChallengeError::Mismatch));
        assert_eq!(VerifyOutcome::Expired.into_result(), Err(ChallengeError::Expired));
        assert_eq!(VerifyOutcome::NotFound.into_result(), Err(ChallengeError::NotFound));
    }

    #[test]
    fn test_requests_tolerate_missing_fields() {
        let req: VerifyOtpRequest = serde_json::from_str(r#"{"email":"a@x.org"}"#).unwrap();
        assert_eq!(req.email.as_deref(), Some("a@x.org"));
        assert!(req.otp.is_none());

        let req: SendOtpRequest = serde_json::from_str("{}").unwrap();
        assert!(req.email.is_none());
    }

    #[test]
    fn test_api_message_omits_empty_error() {
        let json = serde_json::to_value(ApiMessage::new("ok")).unwrap();
        assert_eq!(json, serde_json::json!({ "message": "ok" }));

        let json = serde_json::to_value(ApiMessage::new("Failed").with_error("timeout")).unwrap();
        assert_eq!(json["error"], "timeout");
    }
}
