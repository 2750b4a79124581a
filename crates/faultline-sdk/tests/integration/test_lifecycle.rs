//! Lifecycle: init, destroy, re-initialization, and shutdown flushing

use std::time::Duration;

use serde_json::{json, Map};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use faultline_sdk::domain::event::ErrorSource;

use crate::common;

async fn bodies_containing(server: &MockServer, needle: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| String::from_utf8_lossy(&r.body).contains(needle))
        .count()
}

async fn wait_for_body(server: &MockServer, needle: &str) -> bool {
    for _ in 0..200 {
        if bodies_containing(server, needle).await > 0 {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_init_announces_session_to_collector() {
    let (server, sdk) = common::setup_sdk().await;

    Mock::given(method("POST"))
        .and(path("/api/report"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&server)
        .await;

    sdk.init().unwrap();
    let session_id = sdk.get_status().session_id.unwrap();

    assert!(wait_for_body(&server, "sdk_initialized").await);
    assert!(wait_for_body(&server, &session_id.to_string()).await);

    sdk.destroy().await;
}

#[tokio::test]
async fn test_reinit_starts_fresh_session() {
    let (server, sdk) = common::setup_sdk().await;

    Mock::given(method("POST"))
        .and(path("/api/report"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&server)
        .await;

    sdk.init().unwrap();
    let first_session = sdk.get_status().session_id.unwrap();
    sdk.track_error("boom", ErrorSource::Manual, Map::new()).unwrap();
    sdk.destroy().await;

    // A destroyed instance cannot come back; a new one starts clean
    let (_server2, fresh) = common::setup_sdk().await;
    fresh.init().unwrap();
    let status = fresh.get_status();
    assert_ne!(status.session_id.unwrap(), first_session);
    assert_eq!(status.error_count, 0);

    fresh.destroy().await;
}

#[tokio::test]
async fn test_destroy_flushes_dirty_forms() {
    let (server, sdk) = common::setup_sdk().await;

    Mock::given(method("POST"))
        .and(path("/api/report"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&server)
        .await;

    sdk.init().unwrap();

    let forms = sdk.forms();
    forms.field_changed("signup", "email", json!("ada@example.com"));
    forms.field_changed("signup", "plan", json!("team"));

    sdk.destroy().await;

    // The abandonment event leaves through the fire-and-forget beacon
    assert!(wait_for_body(&server, "form_abandonment").await);
    assert_eq!(bodies_containing(&server, "\"signup\"").await, 1);
}

#[tokio::test]
async fn test_submitted_forms_are_not_flushed() {
    let (server, sdk) = common::setup_sdk().await;

    Mock::given(method("POST"))
        .and(path("/api/report"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&server)
        .await;

    sdk.init().unwrap();
    assert!(wait_for_body(&server, "sdk_initialized").await);

    let forms = sdk.forms();
    forms.field_changed("signup", "email", json!("ada@example.com"));
    forms.form_submitted("signup");

    sdk.destroy().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(bodies_containing(&server, "form_abandonment").await, 0);
}
