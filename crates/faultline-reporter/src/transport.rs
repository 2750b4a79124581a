//! HTTP transmitters
//!
//! [`HttpTransmitter`] is the awaited normal path: `POST <endpoint>` with
//! the `X-API-Key` header and the enriched event as JSON body, bounded by
//! a cancellation-token timeout.
//!
//! [`HttpBeacon`] is the unload-safe path: the send is handed to a
//! detached task with a short hard deadline and the caller returns
//! immediately.
//!
//! Both map failures into the [`ReportFailure`] taxonomy via the anyhow
//! error chain so the reporter can classify without parsing text.

use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use faultline_core::domain::event::EnrichedEvent;
use faultline_core::domain::outcome::{CollectorResponse, ReportFailure};
use faultline_core::ports::transmitter::{IBeacon, ITransmitter};

/// Header carrying the collector credential
const API_KEY_HEADER: &str = "X-API-Key";

/// Hard deadline for beacon sends; an unloading host will not wait longer
const BEACON_DEADLINE: Duration = Duration::from_secs(2);

// ============================================================================
// HttpTransmitter
// ============================================================================

/// Awaited collector client
pub struct HttpTransmitter {
    client: Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl HttpTransmitter {
    /// Creates a transmitter for the given endpoint and credential
    ///
    /// # Arguments
    /// * `endpoint` - Absolute collector URL
    /// * `api_key` - Credential for the `X-API-Key` header
    /// * `timeout` - Per-request deadline
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            timeout,
        }
    }

    /// Returns the configured endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, body: &serde_json::Value) -> anyhow::Result<CollectorResponse> {
        let request = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send();

        // Timeout-bound cancellation: once the deadline fires, the in-flight
        // attempt is dropped and reported as Timeout; it does not continue
        // in the background.
        let token = CancellationToken::new();
        let deadline = token.clone();
        let timeout = self.timeout;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            deadline.cancel();
        });

        let result = token.run_until_cancelled(request).await;
        timer.abort();

        let response = match result {
            None => return Err(ReportFailure::Timeout.into()),
            Some(Err(err)) => {
                return Err(anyhow::Error::new(ReportFailure::TransportError(
                    err.to_string(),
                )));
            }
            Some(Ok(response)) => response,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ReportFailure::HttpError(status.as_u16()).into());
        }

        let parsed: CollectorResponse = response
            .json()
            .await
            .map_err(|err| ReportFailure::TransportError(format!("invalid response: {err}")))?;

        debug!(error_id = ?parsed.error_id, "Collector accepted event");
        Ok(parsed)
    }
}

#[async_trait::async_trait]
impl ITransmitter for HttpTransmitter {
    async fn send(&self, event: &EnrichedEvent) -> anyhow::Result<CollectorResponse> {
        let body = serde_json::to_value(event)?;
        self.post(&body).await
    }
}

// ============================================================================
// HttpBeacon
// ============================================================================

/// Fire-and-forget collector client for unload paths
///
/// `send_nowait` detaches the POST onto the runtime and returns once the
/// hand-off succeeded. Delivery is best-effort; the response is never
/// observed and failures are only logged.
pub struct HttpBeacon {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl HttpBeacon {
    /// Creates a beacon for the given endpoint and credential
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

impl IBeacon for HttpBeacon {
    fn send_nowait(&self, payload: serde_json::Value) -> anyhow::Result<()> {
        // Hand-off requires a running runtime; an unloading host without
        // one gets an error and falls back to the normal path.
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| anyhow::anyhow!("no async runtime available for beacon send"))?;

        let request = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&payload)
            .timeout(BEACON_DEADLINE)
            .send();

        handle.spawn(async move {
            if let Err(err) = request.await {
                warn!(error = %err, "Beacon delivery failed");
            }
        });

        Ok(())
    }
}
