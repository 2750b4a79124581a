//! Offline queueing and reconnect drain

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use faultline_core::domain::outcome::ReportFailure;

use crate::common;

#[tokio::test]
async fn test_offline_queue_round_trip() {
    let (server, reporter, connectivity) = common::setup_reporter().await;
    let listener = reporter.watch_connectivity();

    Mock::given(method("POST"))
        .and(path("/api/report"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(2)
        .mount(&server)
        .await;

    // Offline: events are queued, nothing is sent
    connectivity.set_online(false);
    let first = reporter.report(common::enriched("first")).await;
    let second = reporter.report(common::enriched("second")).await;
    assert_eq!(first.failure, Some(ReportFailure::Offline));
    assert_eq!(second.failure, Some(ReportFailure::Offline));
    assert_eq!(reporter.queue_len(), 2);

    // Back online: the queue drains FIFO and empties
    connectivity.set_online(true);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(reporter.queue_len(), 0);

    reporter.shutdown();
    let _ = listener.await;
}

#[tokio::test]
async fn test_drain_keeps_undeliverable_events() {
    let (server, reporter, connectivity) = common::setup_reporter().await;
    let listener = reporter.watch_connectivity();

    Mock::given(method("POST"))
        .and(path("/api/report"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    connectivity.set_online(false);
    let _ = reporter.report(common::enriched("stuck")).await;
    assert_eq!(reporter.queue_len(), 1);

    connectivity.set_online(true);
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Re-send failed; the event was re-appended, not dropped
    assert_eq!(reporter.queue_len(), 1);

    reporter.shutdown();
    let _ = listener.await;
    reporter.clear_queue();
}
