//! Event pipeline: capture through delivery, recovery, and callback

use std::sync::{Arc, Mutex};

use serde_json::{json, Map, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use faultline_sdk::domain::event::{EnrichedEvent, ErrorKind, ErrorSource};
use faultline_sdk::domain::outcome::ReportOutcome;
use faultline_sdk::{ExecutionReport, IRecoveryHandler, Strategy};

use crate::common;

/// What the on_error callback observed for one event
#[derive(Clone)]
struct Observed {
    kind: ErrorKind,
    message: String,
    delivered: bool,
    /// `None` when delivery failed and recovery was skipped
    strategy: Option<Strategy>,
    recovered: bool,
}

fn observe(sdk: &faultline_sdk::Faultline) -> Arc<Mutex<Vec<Observed>>> {
    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = observed.clone();
    sdk.on_error(Arc::new(
        move |enriched: &EnrichedEvent,
              outcome: &ReportOutcome,
              execution: Option<&ExecutionReport>| {
            sink.lock().unwrap().push(Observed {
                kind: enriched.event.kind,
                message: enriched.event.message.clone(),
                delivered: outcome.success,
                strategy: execution.map(|e| e.strategy),
                recovered: execution.map(|e| e.success).unwrap_or(false),
            });
        },
    ));
    observed
}

fn find(observed: &Arc<Mutex<Vec<Observed>>>, message: &str) -> Option<Observed> {
    observed
        .lock()
        .unwrap()
        .iter()
        .find(|o| o.message == message)
        .cloned()
}

#[tokio::test]
async fn test_tracked_error_flows_through_pipeline() {
    let (server, sdk) = common::setup_sdk().await;

    Mock::given(method("POST"))
        .and(path("/api/report"))
        .and(header("X-API-Key", common::API_KEY))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "errorId": "srv-1"})),
        )
        .mount(&server)
        .await;

    let observed = observe(&sdk);
    sdk.init().unwrap();

    let mut metadata = Map::new();
    metadata.insert("component".to_string(), json!("checkout"));
    sdk.track_error("boom", ErrorSource::Manual, metadata).unwrap();

    assert!(common::wait_until(|| find(&observed, "boom").is_some()).await);
    let entry = find(&observed, "boom").unwrap();
    assert!(entry.delivered);
    // Manual errors default to the log strategy
    assert_eq!(entry.strategy, Some(Strategy::Log));
    assert!(entry.recovered);

    let status = sdk.get_status();
    assert_eq!(status.error_count, 1);
    assert_eq!(status.queue_len, 0);

    sdk.destroy().await;
}

struct ReplayHandler {
    calls: Arc<Mutex<u32>>,
}

#[async_trait::async_trait]
impl IRecoveryHandler for ReplayHandler {
    async fn handle(
        &self,
        _event: &faultline_sdk::domain::event::ErrorEvent,
    ) -> anyhow::Result<Value> {
        *self.calls.lock().unwrap() += 1;
        Ok(json!({"replayed": true}))
    }
}

#[tokio::test]
async fn test_collector_retry_recommendation_runs_task_handler() {
    let (server, sdk) = common::setup_sdk().await;

    Mock::given(method("POST"))
        .and(path("/api/report"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "actionPlan": {"retry": true, "message": "transient", "suggestions": []}
        })))
        .mount(&server)
        .await;

    let calls = Arc::new(Mutex::new(0u32));
    sdk.set_handler(
        ErrorSource::Task,
        Arc::new(ReplayHandler {
            calls: calls.clone(),
        }),
    );
    let observed = observe(&sdk);
    sdk.init().unwrap();

    let result: Result<(), String> = sdk
        .watch_task("sync_profile", async { Err("backend hiccup".to_string()) })
        .await;
    assert!(result.is_err());

    assert!(
        common::wait_until(|| {
            observed
                .lock()
                .unwrap()
                .iter()
                .any(|o| o.kind == ErrorKind::TaskFailure && o.recovered)
        })
        .await
    );

    let entry = observed
        .lock()
        .unwrap()
        .iter()
        .find(|o| o.kind == ErrorKind::TaskFailure)
        .cloned()
        .unwrap();
    assert_eq!(entry.strategy, Some(Strategy::Retry));
    assert_eq!(*calls.lock().unwrap(), 1);

    sdk.destroy().await;
}

#[tokio::test]
async fn test_failed_delivery_skips_recovery() {
    let (_server, sdk) = common::setup_sdk().await;

    // A fallback handler that would run if the engine were consulted
    let calls = Arc::new(Mutex::new(0u32));
    sdk.set_strategy(ErrorSource::Manual, Strategy::Fallback);
    sdk.set_handler(
        ErrorSource::Manual,
        Arc::new(ReplayHandler {
            calls: calls.clone(),
        }),
    );
    let observed = observe(&sdk);

    sdk.set_online(false);
    sdk.init().unwrap();
    sdk.track_error("no uplink", ErrorSource::Manual, Map::new()).unwrap();

    assert!(common::wait_until(|| find(&observed, "no uplink").is_some()).await);
    let entry = find(&observed, "no uplink").unwrap();
    // The callback still observes the failure, but no strategy ran
    assert!(!entry.delivered);
    assert!(entry.strategy.is_none());
    assert!(!entry.recovered);
    assert_eq!(*calls.lock().unwrap(), 0);
    assert_eq!(sdk.get_status().active_retries, 0);

    sdk.destroy().await;
}

#[tokio::test]
async fn test_offline_events_drain_on_reconnect() {
    let (server, sdk) = common::setup_sdk().await;

    Mock::given(method("POST"))
        .and(path("/api/report"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(2)
        .mount(&server)
        .await;

    sdk.set_online(false);
    sdk.init().unwrap();
    sdk.track_error("lost in transit", ErrorSource::Manual, Map::new()).unwrap();

    // Both the init event and the tracked error are queued, nothing is sent
    let queued = {
        let sdk = sdk.clone();
        common::wait_until(move || sdk.get_status().queue_len == 2).await
    };
    assert!(queued);
    assert!(server.received_requests().await.unwrap().is_empty());

    sdk.set_online(true);
    let drained = {
        let sdk = sdk.clone();
        common::wait_until(move || sdk.get_status().queue_len == 0).await
    };
    assert!(drained);

    sdk.destroy().await;
}

#[tokio::test]
async fn test_panicking_callback_does_not_stall_pipeline() {
    let (server, sdk) = common::setup_sdk().await;

    Mock::given(method("POST"))
        .and(path("/api/report"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&server)
        .await;

    let seen = Arc::new(Mutex::new(0u32));
    let sink = seen.clone();
    sdk.on_error(Arc::new(move |enriched, _, _| {
        *sink.lock().unwrap() += 1;
        if enriched.event.message == "first" {
            panic!("host callback bug");
        }
    }));

    sdk.init().unwrap();
    sdk.track_error("first", ErrorSource::Manual, Map::new()).unwrap();
    sdk.track_error("second", ErrorSource::Manual, Map::new()).unwrap();

    // Both errors and the init event reach the callback despite the panic
    assert!(common::wait_until(|| *seen.lock().unwrap() >= 3).await);

    sdk.destroy().await;
}
