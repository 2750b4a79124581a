//! Shared mock collector setup

use std::sync::Arc;
use std::time::Duration;

use serde_json::Map;
use wiremock::MockServer;

use faultline_core::domain::event::{EnrichedEvent, ErrorEvent, ErrorSource};
use faultline_core::domain::newtypes::SessionId;
use faultline_core::ports::connectivity::StaticConnectivity;
use faultline_reporter::{HttpTransmitter, Reporter, ReporterConfig};

pub const API_KEY: &str = "fl-test-key";

/// Starts a mock collector and a reporter pointed at it
///
/// Retry delays are kept short so retry-path tests stay fast.
pub async fn setup_reporter() -> (MockServer, Reporter, Arc<StaticConnectivity>) {
    let server = MockServer::start().await;

    let transmitter = Arc::new(HttpTransmitter::new(
        format!("{}/api/report", server.uri()),
        API_KEY,
        Duration::from_secs(2),
    ));
    let connectivity = Arc::new(StaticConnectivity::new(true));

    let config = ReporterConfig {
        has_credential: true,
        retry_attempts: 2,
        retry_delay: Duration::from_millis(20),
        drain_delay: Duration::from_millis(5),
    };

    let reporter = Reporter::new(transmitter, connectivity.clone(), config);
    (server, reporter, connectivity)
}

pub fn enriched(message: &str) -> EnrichedEvent {
    let event = ErrorEvent::manual(message, ErrorSource::Manual, Map::new());
    EnrichedEvent::enrich(event, SessionId::new(), Map::new(), 1)
}
