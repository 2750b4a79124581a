//! Shared mock collector and SDK setup

use std::time::Duration;

use wiremock::MockServer;

use faultline_sdk::config::Config;
use faultline_sdk::Faultline;

pub const API_KEY: &str = "fl-test-key";

/// Starts a mock collector and builds an uninitialized SDK pointed at it
///
/// Delays are kept short so retry-path tests stay fast.
pub async fn setup_sdk() -> (MockServer, Faultline) {
    let server = MockServer::start().await;

    let mut config = Config::with_api_key(API_KEY);
    config.reporting.api_endpoint = format!("{}/api/report", server.uri());
    config.reporting.request_timeout_ms = 2000;
    config.reporting.drain_delay_ms = 5;
    config.retry.retry_delay_ms = 10;

    (server, Faultline::new(config))
}

/// Polls `predicate` until it holds or two seconds elapse
pub async fn wait_until(predicate: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}
