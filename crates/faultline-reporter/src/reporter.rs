//! Reporter - delivery orchestration
//!
//! Wraps a transmitter with the delivery policy: credential fast-fail,
//! offline queueing, bounded linear-backoff transport retries, a deferred
//! retry after exhaustion, and FIFO queue draining on reconnect.
//!
//! ## Retry policy
//!
//! Transport retries are linear (`retry_delay * (attempt + 1)`), a
//! deliberately separate policy from the strategy engine's exponential
//! logical retries: transport reliability and application-level recovery
//! are distinct concerns with independent tuning.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use faultline_core::config::Config;
use faultline_core::domain::event::EnrichedEvent;
use faultline_core::domain::outcome::{ReportFailure, ReportOutcome};
use faultline_core::ports::connectivity::IConnectivityMonitor;
use faultline_core::ports::transmitter::ITransmitter;

use crate::queue::OfflineQueue;

// ============================================================================
// ReporterConfig
// ============================================================================

/// Delivery policy tuning
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    /// Whether an API key is configured; without one, reporting fails fast
    pub has_credential: bool,
    /// Transport retries after the initial attempt
    pub retry_attempts: u32,
    /// Base delay for linear transport backoff
    pub retry_delay: Duration,
    /// Delay between items when draining the offline queue
    pub drain_delay: Duration,
}

impl ReporterConfig {
    /// Derives the delivery policy from the SDK configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            has_credential: !config.reporting.api_key.trim().is_empty(),
            retry_attempts: config.retry.max_retries,
            retry_delay: Duration::from_millis(config.retry.retry_delay_ms),
            drain_delay: Duration::from_millis(config.reporting.drain_delay_ms),
        }
    }
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            has_credential: true,
            retry_attempts: 3,
            retry_delay: Duration::from_millis(1000),
            drain_delay: Duration::from_millis(100),
        }
    }
}

// ============================================================================
// Reporter
// ============================================================================

struct ReporterInner {
    transmitter: Arc<dyn ITransmitter>,
    connectivity: Arc<dyn IConnectivityMonitor>,
    config: ReporterConfig,
    queue: OfflineQueue,
    /// Cancels pending deferred retries; replaced on `clear_queue`
    retry_cancel: Mutex<CancellationToken>,
    /// Stops the connectivity drain task on shutdown
    shutdown: CancellationToken,
}

/// Delivers enriched events to the collector
///
/// Cheap to clone; all clones share the same queue and retry state.
#[derive(Clone)]
pub struct Reporter {
    inner: Arc<ReporterInner>,
}

impl Reporter {
    /// Creates a reporter over the given transmitter and connectivity source
    pub fn new(
        transmitter: Arc<dyn ITransmitter>,
        connectivity: Arc<dyn IConnectivityMonitor>,
        config: ReporterConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ReporterInner {
                transmitter,
                connectivity,
                config,
                queue: OfflineQueue::new(),
                retry_cancel: Mutex::new(CancellationToken::new()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Reports an event, applying the full delivery policy
    ///
    /// Never raises: every path resolves to a [`ReportOutcome`], and queued
    /// events surface as an `Offline` or transport failure the caller can
    /// branch on.
    pub async fn report(&self, event: EnrichedEvent) -> ReportOutcome {
        if !self.inner.config.has_credential {
            return ReportOutcome::rejected(ReportFailure::NoCredential);
        }

        if !self.inner.connectivity.is_online() {
            debug!(event_id = %event.id(), "Offline, queueing event");
            self.inner.queue.push(event);
            return ReportOutcome::rejected(ReportFailure::Offline);
        }

        match self.send_with_retry(&event).await {
            Ok(response) => ReportOutcome::accepted(response),
            Err(failure) => {
                warn!(
                    event_id = %event.id(),
                    failure = %failure,
                    "Delivery failed after transport retries, queueing with deferred retry"
                );
                self.inner.queue.push(event.clone());
                self.schedule_deferred_retry(event);
                ReportOutcome::rejected(failure)
            }
        }
    }

    /// One logical send: initial attempt plus bounded linear-backoff retries
    async fn send_with_retry(
        &self,
        event: &EnrichedEvent,
    ) -> Result<faultline_core::domain::outcome::CollectorResponse, ReportFailure> {
        let attempts = self.inner.config.retry_attempts;
        let mut last_failure = ReportFailure::TransportError("no attempt made".to_string());

        for attempt in 0..=attempts {
            match self.inner.transmitter.send(event).await {
                Ok(response) => {
                    if attempt > 0 {
                        info!(event_id = %event.id(), attempt, "Send succeeded after retry");
                    }
                    return Ok(response);
                }
                Err(err) => {
                    let failure = classify(err);
                    if attempt < attempts {
                        let delay = self.inner.config.retry_delay * (attempt + 1);
                        debug!(
                            event_id = %event.id(),
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            failure = %failure,
                            "Transport failure, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_failure = failure;
                }
            }
        }

        Err(last_failure)
    }

    /// Schedules one deferred retry at `retry_delay * 2`
    ///
    /// Success removes the event from the queue by identity; failure leaves
    /// it queued for the next online-transition drain.
    fn schedule_deferred_retry(&self, event: EnrichedEvent) {
        let inner = self.inner.clone();
        let token = self
            .inner
            .retry_cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        let delay = self.inner.config.retry_delay * 2;

        tokio::spawn(async move {
            let attempt = async {
                tokio::time::sleep(delay).await;
                match inner.transmitter.send(&event).await {
                    Ok(_) => {
                        info!(event_id = %event.id(), "Deferred retry delivered event");
                        inner.queue.remove(event.id());
                    }
                    Err(err) => {
                        debug!(
                            event_id = %event.id(),
                            failure = %classify(err),
                            "Deferred retry failed, event stays queued"
                        );
                    }
                }
            };
            token.run_until_cancelled(attempt).await;
        });
    }

    /// Spawns the connectivity listener draining the queue on reconnect
    ///
    /// Runs until [`shutdown`](Reporter::shutdown); call once after
    /// construction.
    pub fn watch_connectivity(&self) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        let mut rx = self.inner.connectivity.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = this.inner.shutdown.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let online = *rx.borrow_and_update();
                        if online {
                            info!(queued = this.inner.queue.len(), "Back online, draining queue");
                            this.drain_queue().await;
                        }
                    }
                }
            }
            debug!("Connectivity listener stopped");
        })
    }

    /// Drains the offline queue FIFO with an inter-item delay
    ///
    /// Each item gets one re-send attempt; failures are re-appended rather
    /// than dropped (at-least-once intent, duplicates acceptable). Only the
    /// snapshot length is processed so re-appended failures cannot loop.
    pub async fn drain_queue(&self) {
        let count = self.inner.queue.len();

        for _ in 0..count {
            let Some(event) = self.inner.queue.pop() else {
                break;
            };

            match self.inner.transmitter.send(&event).await {
                Ok(_) => debug!(event_id = %event.id(), "Drained queued event"),
                Err(err) => {
                    warn!(
                        event_id = %event.id(),
                        failure = %classify(err),
                        "Re-send failed, re-queueing"
                    );
                    self.inner.queue.push(event);
                }
            }

            tokio::time::sleep(self.inner.config.drain_delay).await;
        }
    }

    /// Discards queued events and cancels pending deferred retries
    pub fn clear_queue(&self) {
        self.inner.queue.clear();
        let mut guard = self
            .inner
            .retry_cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.cancel();
        *guard = CancellationToken::new();
    }

    /// Stops the connectivity listener
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    /// Number of events currently queued
    pub fn queue_len(&self) -> usize {
        self.inner.queue.len()
    }
}

/// Maps a transmitter error into the failure taxonomy
///
/// Transmitters attach a [`ReportFailure`] to their error chain; anything
/// else (serialization, unexpected adapter errors) degrades to
/// `TransportError`.
fn classify(err: anyhow::Error) -> ReportFailure {
    match err.downcast_ref::<ReportFailure>() {
        Some(failure) => failure.clone(),
        None => ReportFailure::TransportError(format!("{err:#}")),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use faultline_core::domain::event::{ErrorEvent, ErrorSource};
    use faultline_core::domain::newtypes::SessionId;
    use faultline_core::domain::outcome::CollectorResponse;
    use faultline_core::ports::connectivity::StaticConnectivity;
    use serde_json::Map;

    use super::*;

    fn enriched(message: &str) -> EnrichedEvent {
        let event = ErrorEvent::manual(message, ErrorSource::Manual, Map::new());
        EnrichedEvent::enrich(event, SessionId::new(), Map::new(), 1)
    }

    /// Transmitter failing a fixed number of times before succeeding
    struct FlakyTransmitter {
        calls: AtomicU32,
        failures_before_success: u32,
    }

    impl FlakyTransmitter {
        fn new(failures_before_success: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures_before_success,
            }
        }
    }

    #[async_trait::async_trait]
    impl ITransmitter for FlakyTransmitter {
        async fn send(&self, _event: &EnrichedEvent) -> anyhow::Result<CollectorResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                Err(ReportFailure::HttpError(503).into())
            } else {
                Ok(CollectorResponse {
                    success: true,
                    error_id: Some("ev-ok".to_string()),
                    action_plan: None,
                })
            }
        }
    }

    fn fast_config() -> ReporterConfig {
        ReporterConfig {
            has_credential: true,
            retry_attempts: 3,
            retry_delay: Duration::from_millis(10),
            drain_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_no_credential_fails_fast() {
        let transmitter = Arc::new(FlakyTransmitter::new(0));
        let reporter = Reporter::new(
            transmitter.clone(),
            Arc::new(StaticConnectivity::new(true)),
            ReporterConfig {
                has_credential: false,
                ..fast_config()
            },
        );

        let outcome = reporter.report(enriched("boom")).await;
        assert_eq!(outcome.failure, Some(ReportFailure::NoCredential));
        // No network attempt was made
        assert_eq!(transmitter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_offline_queues_without_sending() {
        let transmitter = Arc::new(FlakyTransmitter::new(0));
        let reporter = Reporter::new(
            transmitter.clone(),
            Arc::new(StaticConnectivity::new(false)),
            fast_config(),
        );

        let outcome = reporter.report(enriched("boom")).await;
        assert_eq!(outcome.failure, Some(ReportFailure::Offline));
        assert_eq!(reporter.queue_len(), 1);
        assert_eq!(transmitter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_transport_retry_until_success() {
        let transmitter = Arc::new(FlakyTransmitter::new(2));
        let reporter = Reporter::new(
            transmitter.clone(),
            Arc::new(StaticConnectivity::new(true)),
            fast_config(),
        );

        let outcome = reporter.report(enriched("boom")).await;
        assert!(outcome.success);
        assert_eq!(outcome.server_error_id.as_deref(), Some("ev-ok"));
        // Initial attempt + 2 retries
        assert_eq!(transmitter.calls.load(Ordering::SeqCst), 3);
        assert_eq!(reporter.queue_len(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_queue_event() {
        // Fails the initial + 3 retries, then would succeed; the deferred
        // retry (cancelled below) never runs.
        let transmitter = Arc::new(FlakyTransmitter::new(10));
        let reporter = Reporter::new(
            transmitter.clone(),
            Arc::new(StaticConnectivity::new(true)),
            fast_config(),
        );

        let outcome = reporter.report(enriched("boom")).await;
        assert_eq!(outcome.failure, Some(ReportFailure::HttpError(503)));
        assert_eq!(transmitter.calls.load(Ordering::SeqCst), 4);
        assert_eq!(reporter.queue_len(), 1);

        reporter.clear_queue();
        assert_eq!(reporter.queue_len(), 0);
    }

    #[tokio::test]
    async fn test_deferred_retry_removes_from_queue() {
        // Initial + 3 transport retries fail; the deferred retry succeeds
        // and removes the event by identity.
        let transmitter = Arc::new(FlakyTransmitter::new(4));
        let reporter = Reporter::new(
            transmitter.clone(),
            Arc::new(StaticConnectivity::new(true)),
            fast_config(),
        );

        let outcome = reporter.report(enriched("boom")).await;
        assert!(!outcome.success);
        assert_eq!(reporter.queue_len(), 1);

        // Deferred retry fires at retry_delay * 2 = 20ms
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(reporter.queue_len(), 0);
        assert_eq!(transmitter.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_online_transition_drains_fifo() {
        let transmitter = Arc::new(FlakyTransmitter::new(0));
        let connectivity = Arc::new(StaticConnectivity::new(false));
        let reporter = Reporter::new(transmitter.clone(), connectivity.clone(), fast_config());
        let listener = reporter.watch_connectivity();

        assert_eq!(
            reporter.report(enriched("first")).await.failure,
            Some(ReportFailure::Offline)
        );
        assert_eq!(
            reporter.report(enriched("second")).await.failure,
            Some(ReportFailure::Offline)
        );
        assert_eq!(reporter.queue_len(), 2);

        connectivity.set_online(true);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(reporter.queue_len(), 0);
        assert_eq!(transmitter.calls.load(Ordering::SeqCst), 2);

        reporter.shutdown();
        let _ = listener.await;
    }

    #[tokio::test]
    async fn test_failed_drain_requeues() {
        let transmitter = Arc::new(FlakyTransmitter::new(10));
        let reporter = Reporter::new(
            transmitter.clone(),
            Arc::new(StaticConnectivity::new(true)),
            fast_config(),
        );

        // Seed the queue directly
        reporter.inner.queue.push(enriched("stuck"));
        reporter.drain_queue().await;

        // Still queued, not dropped
        assert_eq!(reporter.queue_len(), 1);
    }
}
