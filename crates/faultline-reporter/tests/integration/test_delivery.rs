//! Delivery path: success, action plans, and transport retry

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use faultline_core::domain::outcome::ReportFailure;

use crate::common::{self, API_KEY};

#[tokio::test]
async fn test_successful_delivery_carries_action_plan() {
    let (server, reporter, _connectivity) = common::setup_reporter().await;

    Mock::given(method("POST"))
        .and(path("/api/report"))
        .and(header("X-API-Key", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "errorId": "ev-42",
            "actionPlan": {
                "retry": false,
                "message": "Recorded",
                "suggestions": ["nothing to do"]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = reporter.report(common::enriched("boom")).await;

    assert!(outcome.success);
    assert_eq!(outcome.server_error_id.as_deref(), Some("ev-42"));
    let plan = outcome.action_plan.unwrap();
    assert!(!plan.retry);
    assert_eq!(plan.suggestions, vec!["nothing to do"]);
}

#[tokio::test]
async fn test_server_errors_are_retried_then_reported() {
    let (server, reporter, _connectivity) = common::setup_reporter().await;

    // Initial attempt + 2 configured retries, all 503
    Mock::given(method("POST"))
        .and(path("/api/report"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let outcome = reporter.report(common::enriched("boom")).await;

    assert!(!outcome.success);
    assert_eq!(outcome.failure, Some(ReportFailure::HttpError(503)));
    // Exhausted sends leave the event queued for later delivery
    assert_eq!(reporter.queue_len(), 1);

    reporter.clear_queue();
}

#[tokio::test]
async fn test_recovery_mid_retry_sequence() {
    let (server, reporter, _connectivity) = common::setup_reporter().await;

    // First attempt fails, the retry succeeds
    Mock::given(method("POST"))
        .and(path("/api/report"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/report"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .with_priority(2)
        .mount(&server)
        .await;

    let outcome = reporter.report(common::enriched("boom")).await;
    assert!(outcome.success);
    assert_eq!(reporter.queue_len(), 0);
}

#[tokio::test]
async fn test_no_requests_without_credential() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let transmitter = std::sync::Arc::new(faultline_reporter::HttpTransmitter::new(
        format!("{}/api/report", server.uri()),
        "",
        std::time::Duration::from_secs(1),
    ));
    let reporter = faultline_reporter::Reporter::new(
        transmitter,
        std::sync::Arc::new(faultline_core::ports::connectivity::StaticConnectivity::new(true)),
        faultline_reporter::ReporterConfig {
            has_credential: false,
            ..Default::default()
        },
    );

    let outcome = reporter.report(common::enriched("boom")).await;
    assert_eq!(outcome.failure, Some(ReportFailure::NoCredential));
}
