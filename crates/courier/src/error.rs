//! HTTP mapping of Keystamp errors.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use keystamp_common::{ApiMessage, ChallengeError, KeystampError, constants::messages};

/// Error returned by route handlers
#[derive(Debug)]
pub struct ApiError(pub KeystampError);

impl From<KeystampError> for ApiError {
    fn from(err: KeystampError) -> Self {
        Self(err)
    }
}

impl From<ChallengeError> for ApiError {
    fn from(err: ChallengeError) -> Self {
        Self(KeystampError::Challenge(err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(rejection = %rejection.body_text(), "Rejected request body");
        Self(KeystampError::validation(messages::MALFORMED_BODY))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = match &self.0 {
            KeystampError::Delivery { message, cause } => {
                tracing::error!(cause = %cause, "Passcode delivery failed");
                ApiMessage::new(message.clone()).with_error(cause.clone())
            }
            other => ApiMessage::new(other.to_string()),
        };

        (status, Json(body)).into_response()
    }
}
