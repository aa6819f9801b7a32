//! Passcode issue and verification endpoints.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use keystamp_common::{
    ApiMessage, KeystampError, SendOtpRequest, VerifyOtpRequest, constants::messages,
};
use validator::ValidateEmail;

use crate::error::ApiError;
use crate::mail::OtpEmail;
use crate::state::AppState;

/// Issue a passcode and email it
///
/// The code is saved before delivery is attempted. If delivery fails the
/// code is revoked again unless rollback is disabled in configuration.
#[tracing::instrument(name = "Send OTP", skip_all, fields(email = tracing::field::Empty))]
pub async fn send_otp(
    State(state): State<AppState>,
    payload: Result<Json<SendOtpRequest>, JsonRejection>,
) -> Result<Json<ApiMessage>, ApiError> {
    let Json(req) = payload?;
    let domain = state.config.otp.normalized_domain();
    let email = validate_send_request(&req, domain.as_deref())?;

    tracing::Span::current().record("email", tracing::field::display(&email));

    let code = state.ledger.issue(&email);

    let mail = &state.config.mail;
    let html = OtpEmail::new(&mail.brand, &code, state.ledger.default_ttl().num_minutes()).html();

    match state.mailer.send(&email, &mail.subject, &html).await {
        Ok(receipt) => {
            tracing::info!(
                email = %email,
                provider = receipt.provider,
                message_id = ?receipt.message_id,
                "OTP delivered"
            );
            Ok(Json(ApiMessage::new(messages::OTP_SENT)))
        }
        Err(e) => {
            let revoked = state.config.otp.rollback_on_delivery_failure
                && state.ledger.revoke(&email, &code);
            tracing::warn!(email = %email, error = %e, revoked, "OTP delivery failed");
            Err(KeystampError::delivery(e).into())
        }
    }
}

/// Check a submitted passcode
#[tracing::instrument(name = "Verify OTP", skip_all)]
pub async fn verify_otp(
    State(state): State<AppState>,
    payload: Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> Result<Json<ApiMessage>, ApiError> {
    let Json(req) = payload?;
    let (email, otp) = validate_verify_request(&req)?;

    let outcome = state.ledger.verify(email, otp);
    tracing::info!(email = %email, outcome = ?outcome, "OTP verification");

    outcome.into_result()?;

    Ok(Json(ApiMessage::new(messages::OTP_VERIFIED)))
}

/// Returns the trimmed address to issue for
fn validate_send_request(
    req: &SendOtpRequest,
    allowed_domain: Option<&str>,
) -> Result<String, KeystampError> {
    let email = non_empty(req.email.as_deref())
        .ok_or_else(|| KeystampError::validation(messages::EMAIL_REQUIRED))?;

    if !email.validate_email() {
        return Err(KeystampError::validation(messages::EMAIL_INVALID));
    }

    if let Some(domain) = allowed_domain {
        let suffix = format!("@{}", domain);
        if !email.to_ascii_lowercase().ends_with(&suffix) {
            return Err(KeystampError::validation(messages::domain_not_allowed(domain)));
        }
    }

    Ok(email.to_string())
}

fn validate_verify_request(req: &VerifyOtpRequest) -> Result<(&str, &str), KeystampError> {
    match (non_empty(req.email.as_deref()), non_empty(req.otp.as_deref())) {
        (Some(email), Some(otp)) => Ok((email, otp)),
        _ => Err(KeystampError::validation(messages::EMAIL_AND_OTP_REQUIRED)),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
