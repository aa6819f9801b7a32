//! HTTP route handlers for Courier.

use axum::{
    Router,
    extract::MatchedPath,
    http::Request,
    routing::{get, post},
};
use keystamp_common::constants::routes;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info_span;

use crate::state::AppState;

mod health;
mod otp;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let request_timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        // Health & Status
        .route(routes::HEALTH, get(health::health_check))

        // Passcode endpoints
        .route(routes::SEND_OTP, post(otp::send_otp))
        .route(routes::VERIFY_OTP, post(otp::verify_otp))

        // Add shared state
        .with_state(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request<_>| {
                let matched_path = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(MatchedPath::as_str);

                info_span!("http_request", method = ?req.method(), matched_path)
            }),
        )
        .layer(TimeoutLayer::new(request_timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::ledger::{ManualClock, OtpLedger};
    use crate::mail::{DeliveryError, DeliveryReceipt, MailSender};
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::StatusCode;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    /// Keeps every message instead of sending it
    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl MailSender for RecordingMailer {
        async fn send(
            &self,
            to: &str,
            subject: &str,
            html_body: &str,
        ) -> Result<DeliveryReceipt, DeliveryError> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string(), html_body.to_string()));
            Ok(DeliveryReceipt {
                provider: "recording",
                message_id: Some("msg-1".to_string()),
            })
        }
    }

    struct FailingMailer;

    #[async_trait]
    impl MailSender for FailingMailer {
        async fn send(&self, _: &str, _: &str, _: &str) -> Result<DeliveryReceipt, DeliveryError> {
            Err(DeliveryError::Transport("535 5.7.3 Authentication unsuccessful".to_string()))
        }
    }

    struct TestApp {
        router: Router,
        ledger: Arc<OtpLedger>,
        mailer: Arc<RecordingMailer>,
    }

    fn spawn_app(config: AppConfig) -> TestApp {
        let ledger = Arc::new(OtpLedger::new(config.otp.ttl().unwrap()));
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::from_parts(config, ledger.clone(), mailer.clone());

        TestApp {
            router: create_router(state),
            ledger,
            mailer,
        }
    }

    fn spawn_app_with_clock(config: AppConfig) -> (TestApp, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let ledger = Arc::new(OtpLedger::with_clock(config.otp.ttl().unwrap(), clock.clone()));
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::from_parts(config, ledger.clone(), mailer.clone());

        let app = TestApp {
            router: create_router(state),
            ledger,
            mailer,
        };
        (app, clock)
    }

    fn spawn_failing_app(config: AppConfig) -> (Router, Arc<OtpLedger>) {
        let ledger = Arc::new(OtpLedger::new(config.otp.ttl().unwrap()));
        let state = AppState::from_parts(config, ledger.clone(), Arc::new(FailingMailer));
        (create_router(state), ledger)
    }

    async fn post_json(router: &Router, path: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn send_otp(app: &TestApp, email: &str) -> (StatusCode, serde_json::Value) {
        let body = serde_json::json!({ "email": email }).to_string();
        post_json(&app.router, routes::SEND_OTP, &body).await
    }

    async fn verify_otp(router: &Router, email: &str, otp: &str) -> (StatusCode, serde_json::Value) {
        let body = serde_json::json!({ "email": email, "otp": otp }).to_string();
        post_json(router, routes::VERIFY_OTP, &body).await
    }

    #[tokio::test]
    async fn health_check_works() {
        let app = spawn_app(AppConfig::default());

        let request = Request::builder()
            .uri(routes::HEALTH)
            .body(Body::empty())
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["pending_challenges"], 0);
    }

    #[tokio::test]
    async fn send_then_verify_works() {
        let app = spawn_app(AppConfig::default());

        let (status, body) = send_otp(&app, "a@x.org").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "OTP sent. Check your mailbox.");

        let code = app.ledger.peek("a@x.org").unwrap().code;
        {
            let sent = app.mailer.sent.lock().unwrap();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].0, "a@x.org");
            assert_eq!(sent[0].1, "Your one-time passcode");
            assert!(sent[0].2.contains(&code));
            assert!(sent[0].2.contains("valid for 10 minutes"));
        }

        let (status, body) = verify_otp(&app.router, "a@x.org", &code).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "OTP verified successfully.");

        let (status, body) = verify_otp(&app.router, "a@x.org", &code).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "No OTP generated for this email.");
    }

    #[tokio::test]
    async fn wrong_code_can_be_retried() {
        let app = spawn_app(AppConfig::default());
        send_otp(&app, "a@x.org").await;

        let code = app.ledger.peek("a@x.org").unwrap().code;
        let wrong = if code == "123456" { "654321" } else { "123456" };

        let (status, body) = verify_otp(&app.router, "a@x.org", wrong).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Incorrect OTP.");

        let (status, _) = verify_otp(&app.router, "a@x.org", &code).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn expired_code_rejected_then_forgotten() {
        let (app, clock) = spawn_app_with_clock(AppConfig::default());

        let (status, _) = send_otp(&app, "a@x.org").await;
        assert_eq!(status, StatusCode::OK);
        let code = app.ledger.peek("a@x.org").unwrap().code;

        clock.advance(chrono::Duration::minutes(10) + chrono::Duration::seconds(1));

        let (status, body) = verify_otp(&app.router, "a@x.org", &code).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "OTP expired.");

        let (status, body) = verify_otp(&app.router, "a@x.org", &code).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "No OTP generated for this email.");
        assert!(app.ledger.is_empty());
    }

    #[tokio::test]
    async fn code_still_valid_at_expiry_instant() {
        let (app, clock) = spawn_app_with_clock(AppConfig::default());

        send_otp(&app, "a@x.org").await;
        let code = app.ledger.peek("a@x.org").unwrap().code;

        clock.advance(chrono::Duration::minutes(10));

        let (status, body) = verify_otp(&app.router, "a@x.org", &code).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "OTP verified successfully.");
    }

    #[tokio::test]
    async fn missing_fields_rejected() {
        let app = spawn_app(AppConfig::default());

        let (status, body) = post_json(&app.router, routes::SEND_OTP, "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Email is required.");

        let (status, body) =
            post_json(&app.router, routes::VERIFY_OTP, r#"{"email":"a@x.org"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Email and OTP are required.");

        assert!(app.ledger.is_empty());
        assert!(app.mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_body_rejected() {
        let app = spawn_app(AppConfig::default());

        let (status, body) = post_json(&app.router, routes::SEND_OTP, "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Request body must be a JSON object.");
    }

    #[tokio::test]
    async fn domain_restriction_enforced() {
        let mut config = AppConfig::default();
        config.otp.allowed_domain = Some("example.org".to_string());
        let app = spawn_app(config);

        let (status, body) = send_otp(&app, "a@other.org").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Only example.org emails are allowed.");
        assert!(app.ledger.is_empty());

        let (status, _) = send_otp(&app, "a@example.org").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn delivery_failure_rolls_back() {
        let (router, ledger) = spawn_failing_app(AppConfig::default());

        let body = serde_json::json!({ "email": "a@x.org" }).to_string();
        let (status, body) = post_json(&router, routes::SEND_OTP, &body).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Failed to send email.");
        assert_eq!(body["error"], "transport error: 535 5.7.3 Authentication unsuccessful");
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn delivery_failure_keeps_code_without_rollback() {
        let mut config = AppConfig::default();
        config.otp.rollback_on_delivery_failure = false;
        let (router, ledger) = spawn_failing_app(config);

        let body = serde_json::json!({ "email": "a@x.org" }).to_string();
        let (status, _) = post_json(&router, routes::SEND_OTP, &body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let code = ledger.peek("a@x.org").unwrap().code;
        let (status, _) = verify_otp(&router, "a@x.org", &code).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn resend_invalidates_previous_code() {
        let app = spawn_app(AppConfig::default());

        send_otp(&app, "a@x.org").await;
        let first = app.ledger.peek("a@x.org").unwrap().code;

        let mut second = first.clone();
        while second == first {
            send_otp(&app, "a@x.org").await;
            second = app.ledger.peek("a@x.org").unwrap().code;
        }

        let (_, body) = verify_otp(&app.router, "a@x.org", &first).await;
        assert_eq!(body["message"], "Incorrect OTP.");

        let (status, _) = verify_otp(&app.router, "a@x.org", &second).await;
        assert_eq!(status, StatusCode::OK);
    }
}
