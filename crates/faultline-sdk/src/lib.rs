//! Faultline SDK - the public facade
//!
//! [`Faultline`] wires the capture hub, the reporter, and the strategy
//! engine into one pipeline:
//!
//! ```text
//! capture -> enrich -> report -> recover -> on_error callback
//! ```
//!
//! Lifecycle is `Uninitialized -> Initialized -> Destroyed`; a destroyed
//! instance stays dead, re-initialization means constructing a new one
//! (which starts a fresh session).

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use faultline_capture::{CaptureHub, FormTracker, InterceptedClient};
use faultline_core::config::Config;
use faultline_core::domain::errors::SdkError;
use faultline_core::domain::event::{EnrichedEvent, ErrorEvent, ErrorKind, ErrorSource};
use faultline_core::domain::newtypes::SessionId;
use faultline_core::domain::outcome::ReportOutcome;
use faultline_core::ports::connectivity::StaticConnectivity;
use faultline_core::ports::transmitter::IBeacon;
use faultline_reporter::{HttpBeacon, HttpTransmitter, Reporter, ReporterConfig};
use faultline_strategy::{FileSnapshotStore, StrategyConfig, StrategyEngine};

pub mod logging;

pub use faultline_core::config;
pub use faultline_core::domain;
pub use faultline_core::ports::recovery::IRecoveryHandler;
pub use faultline_strategy::{ExecutionReport, Strategy};

// ============================================================================
// Lifecycle
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Initialized,
    Destroyed,
}

/// Snapshot of the SDK's observable state
#[derive(Debug, Clone)]
pub struct Status {
    /// Whether `init` has completed and `destroy` has not been called
    pub initialized: bool,
    /// Session identifier, once initialized
    pub session_id: Option<SessionId>,
    /// Errors enriched so far (custom events excluded)
    pub error_count: u64,
    /// Events waiting in the offline queue
    pub queue_len: usize,
    /// Retry keys with recorded recovery attempts
    pub active_retries: usize,
}

/// Host callback invoked after each event completes the pipeline
///
/// The execution report is `None` when delivery failed, since recovery
/// only runs on successfully reported events.
pub type ErrorCallback =
    Arc<dyn Fn(&EnrichedEvent, &ReportOutcome, Option<&ExecutionReport>) + Send + Sync>;

// ============================================================================
// Faultline
// ============================================================================

struct FaultlineInner {
    state: Mutex<Lifecycle>,
    config: Mutex<Config>,
    session_id: Mutex<Option<SessionId>>,
    context: Mutex<Map<String, Value>>,
    error_count: AtomicU64,
    hub: CaptureHub,
    reporter: Reporter,
    engine: StrategyEngine,
    connectivity: Arc<StaticConnectivity>,
    beacon: Option<HttpBeacon>,
    on_error: Mutex<Option<ErrorCallback>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// The Faultline error-telemetry SDK
///
/// Cheap to clone; all clones share one pipeline and one lifecycle.
#[derive(Clone)]
pub struct Faultline {
    inner: Arc<FaultlineInner>,
}

impl Faultline {
    /// Builds an uninitialized SDK instance
    ///
    /// Nothing is hooked or spawned until [`init`](Faultline::init).
    pub fn new(config: Config) -> Self {
        let hub = CaptureHub::new(config.capture.clone());
        let connectivity = Arc::new(StaticConnectivity::new(true));

        let transmitter = Arc::new(HttpTransmitter::new(
            &config.reporting.api_endpoint,
            &config.reporting.api_key,
            std::time::Duration::from_millis(config.reporting.request_timeout_ms),
        ));
        let reporter = Reporter::new(
            transmitter,
            connectivity.clone(),
            ReporterConfig::from_config(&config),
        );

        let engine = StrategyEngine::new(
            StrategyConfig::from_config(&config),
            Arc::new(FileSnapshotStore::new(FileSnapshotStore::default_dir())),
            hub.forms(),
        );

        let beacon = if config.reporting.api_key.trim().is_empty() {
            None
        } else {
            Some(HttpBeacon::new(
                &config.reporting.api_endpoint,
                &config.reporting.api_key,
            ))
        };

        let context = config.context.clone();

        Self {
            inner: Arc::new(FaultlineInner {
                state: Mutex::new(Lifecycle::Uninitialized),
                config: Mutex::new(config),
                session_id: Mutex::new(None),
                context: Mutex::new(context),
                error_count: AtomicU64::new(0),
                hub,
                reporter,
                engine,
                connectivity,
                beacon,
                on_error: Mutex::new(None),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Validates configuration, installs hooks, and starts the pipeline
    ///
    /// Fails fast with [`SdkError::Configuration`] when required settings
    /// (notably the API key) are missing. Calling `init` twice is a warned
    /// no-op; calling it after `destroy` is an error.
    ///
    /// Must be called from within a tokio runtime: the pipeline worker and
    /// the connectivity watcher are spawned onto it.
    pub fn init(&self) -> Result<(), SdkError> {
        {
            let mut state = lock(&self.inner.state);
            match *state {
                Lifecycle::Initialized => {
                    warn!("Already initialized, ignoring");
                    return Ok(());
                }
                Lifecycle::Destroyed => return Err(SdkError::Destroyed),
                Lifecycle::Uninitialized => {}
            }

            let config = lock(&self.inner.config);
            let errors = config.validate();
            if !errors.is_empty() {
                let joined = errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(SdkError::Configuration(joined));
            }
            logging::init_console_logging(&config.logging);

            *state = Lifecycle::Initialized;
        }

        let session_id = SessionId::new();
        *lock(&self.inner.session_id) = Some(session_id);

        // Event pipeline: hub subscribers are sync, processing is async, so
        // events cross over a channel into one ordered worker.
        let (tx, mut rx) = mpsc::unbounded_channel::<ErrorEvent>();
        self.inner.hub.subscribe(move |event| {
            let _ = tx.send(event.clone());
        });

        // Weak reference so an instance dropped without destroy() does not
        // stay alive through its own worker.
        let weak = Arc::downgrade(&self.inner);
        let pipeline = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match weak.upgrade() {
                    Some(inner) => process_event(inner, event).await,
                    None => break,
                }
            }
        });

        let connectivity_watch = self.inner.reporter.watch_connectivity();
        {
            let mut tasks = lock(&self.inner.tasks);
            tasks.push(pipeline);
            tasks.push(connectivity_watch);
        }

        self.inner.hub.start();
        info!(session_id = %session_id, "Faultline initialized");

        let mut data = Map::new();
        data.insert("session_id".to_string(), json!(session_id.to_string()));
        self.inner.hub.emit(ErrorEvent::custom("sdk_initialized", data));

        Ok(())
    }

    /// Flushes dirty forms, removes hooks, and stops the pipeline
    ///
    /// Idempotent. A destroyed instance rejects further operations;
    /// construct a new instance to start a fresh session.
    pub async fn destroy(&self) {
        {
            let mut state = lock(&self.inner.state);
            if *state == Lifecycle::Destroyed {
                return;
            }
            let was_initialized = *state == Lifecycle::Initialized;
            *state = Lifecycle::Destroyed;
            if !was_initialized {
                return;
            }
        }

        // Last-chance delivery of dirty form state. Events the beacon does
        // not take go through the normal reporter synchronously, since the
        // pipeline worker is about to stop.
        if self.inner.hub.form_tracking_enabled() {
            let beacon = self.inner.beacon.as_ref().map(|b| b as &dyn IBeacon);
            let fallback = self.inner.hub.forms().flush_on_unload(beacon);
            for event in fallback {
                let enriched = self.enrich(event);
                let _ = self.inner.reporter.report(enriched).await;
            }
        }

        self.inner.hub.stop();
        self.inner.reporter.shutdown();
        self.inner.reporter.clear_queue();
        self.inner.engine.clear_retries();

        for task in lock(&self.inner.tasks).drain(..) {
            task.abort();
        }

        info!("Faultline destroyed");
    }

    // ------------------------------------------------------------------
    // Tracking
    // ------------------------------------------------------------------

    /// Reports an application error explicitly
    ///
    /// `source` lets callers attribute the error to a specific origin;
    /// plain application-level reports pass [`ErrorSource::Manual`].
    pub fn track_error(
        &self,
        message: impl Into<String>,
        source: ErrorSource,
        metadata: Map<String, Value>,
    ) -> Result<(), SdkError> {
        self.ensure_initialized()?;
        self.inner
            .hub
            .emit(ErrorEvent::manual(message, source, metadata));
        Ok(())
    }

    /// Reports a named non-error event through the same pipeline
    pub fn track_event(
        &self,
        name: impl Into<String>,
        data: Map<String, Value>,
    ) -> Result<(), SdkError> {
        self.ensure_initialized()?;
        self.inner.hub.emit(ErrorEvent::custom(name, data));
        Ok(())
    }

    /// Runs a fallible future, capturing a task-failure event on `Err`
    ///
    /// The caller observes the original result either way.
    pub async fn watch_task<T, E, F>(&self, name: &str, future: F) -> Result<T, E>
    where
        F: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.inner.hub.watch_task(name, future).await
    }

    /// Wraps an HTTP client so its failures are captured transparently
    pub fn intercepted_client(&self, client: reqwest::Client) -> InterceptedClient {
        self.inner.hub.intercepted_client(client)
    }

    /// Returns the form tracker for dirty-state reporting
    pub fn forms(&self) -> Arc<FormTracker> {
        self.inner.hub.forms()
    }

    // ------------------------------------------------------------------
    // Context and callbacks
    // ------------------------------------------------------------------

    /// Attaches user identity under the `user` context key
    pub fn set_user(&self, user: Value) {
        lock(&self.inner.context).insert("user".to_string(), user);
    }

    /// Sets one global context entry, merged into every enriched event
    pub fn set_context(&self, key: impl Into<String>, value: Value) {
        lock(&self.inner.context).insert(key.into(), value);
    }

    /// Overrides the recovery strategy for one error source
    pub fn set_strategy(&self, source: ErrorSource, strategy: Strategy) {
        self.inner.engine.set_override(source, strategy);
    }

    /// Registers a custom recovery handler for one error source
    pub fn set_handler(&self, source: ErrorSource, handler: Arc<dyn IRecoveryHandler>) {
        self.inner.engine.set_handler(source, handler);
    }

    /// Registers the callback invoked after each event completes the
    /// pipeline; a panicking callback is contained and logged
    pub fn on_error(&self, callback: ErrorCallback) {
        *lock(&self.inner.on_error) = Some(callback);
    }

    /// Signals a connectivity change from the host application
    ///
    /// Going online triggers a drain of the offline queue.
    pub fn set_online(&self, online: bool) {
        self.inner.connectivity.set_online(online);
    }

    /// Applies in-place configuration changes
    ///
    /// Context entries from the updated configuration are merged into the
    /// live context immediately. Capture hooks and transport settings are
    /// bound at `init`; changing them takes effect on the next instance.
    pub fn update_config(&self, apply: impl FnOnce(&mut Config)) {
        let mut config = lock(&self.inner.config);
        apply(&mut config);

        let mut context = lock(&self.inner.context);
        for (key, value) in config.context.iter() {
            context.insert(key.clone(), value.clone());
        }
        debug!("Configuration updated");
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Returns a snapshot of the SDK's observable state
    pub fn get_status(&self) -> Status {
        Status {
            initialized: *lock(&self.inner.state) == Lifecycle::Initialized,
            session_id: *lock(&self.inner.session_id),
            error_count: self.inner.error_count.load(Ordering::SeqCst),
            queue_len: self.inner.reporter.queue_len(),
            active_retries: self.inner.engine.active_retries(),
        }
    }

    fn ensure_initialized(&self) -> Result<(), SdkError> {
        match *lock(&self.inner.state) {
            Lifecycle::Initialized => Ok(()),
            Lifecycle::Uninitialized => Err(SdkError::NotInitialized),
            Lifecycle::Destroyed => Err(SdkError::Destroyed),
        }
    }

    fn enrich(&self, event: ErrorEvent) -> EnrichedEvent {
        let session_id = lock(&self.inner.session_id).unwrap_or_else(SessionId::new);
        let count = if event.kind == ErrorKind::CustomEvent {
            self.inner.error_count.load(Ordering::SeqCst)
        } else {
            self.inner.error_count.fetch_add(1, Ordering::SeqCst) + 1
        };
        let context = lock(&self.inner.context).clone();
        EnrichedEvent::enrich(event, session_id, context, count)
    }
}

// ============================================================================
// Pipeline worker
// ============================================================================

/// Runs one event through enrich -> report -> recover -> callback
///
/// Recovery only runs when the report was delivered; a failed report is
/// queued for later and the strategy engine stays out of it. Each stage
/// is isolated: reporting and recovery never raise by construction, and
/// the host callback runs under `catch_unwind`.
async fn process_event(inner: Arc<FaultlineInner>, event: ErrorEvent) {
    let facade = Faultline { inner };
    let enriched = facade.enrich(event.clone());

    let outcome = facade.inner.reporter.report(enriched.clone()).await;
    let execution = if outcome.success {
        Some(facade.inner.engine.execute(&event, &outcome).await)
    } else {
        None
    };

    debug!(
        event_id = %enriched.id(),
        delivered = outcome.success,
        strategy = ?execution.as_ref().map(|e| e.strategy),
        recovered = execution.as_ref().map(|e| e.success),
        "Pipeline completed"
    );

    let callback = lock(&facade.inner.on_error).clone();
    if let Some(callback) = callback {
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            callback(&enriched, &outcome, execution.as_ref())
        }));
        if result.is_err() {
            warn!(event_id = %enriched.id(), "on_error callback panicked");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uninitialized_rejects_tracking() {
        let sdk = Faultline::new(Config::with_api_key("fl-test-key"));
        let err = sdk.track_error("boom", ErrorSource::Manual, Map::new()).unwrap_err();
        assert!(matches!(err, SdkError::NotInitialized));
        assert!(!sdk.get_status().initialized);
    }

    #[tokio::test]
    async fn test_init_requires_api_key() {
        let sdk = Faultline::new(Config::default());
        let err = sdk.init().unwrap_err();
        assert!(matches!(err, SdkError::Configuration(_)));
        assert!(err.to_string().contains("reporting.api_key"));
    }

    #[test]
    #[should_panic]
    fn test_init_outside_runtime_panics() {
        // init spawns the pipeline worker, so it needs a running runtime
        let sdk = Faultline::new(Config::with_api_key("fl-test-key"));
        let _ = sdk.init();
    }

    #[tokio::test]
    async fn test_destroyed_instance_stays_dead() {
        let sdk = Faultline::new(Config::with_api_key("fl-test-key"));
        sdk.init().unwrap();
        sdk.destroy().await;
        sdk.destroy().await;

        assert!(matches!(sdk.init(), Err(SdkError::Destroyed)));
        assert!(matches!(
            sdk.track_error("boom", ErrorSource::Manual, Map::new()),
            Err(SdkError::Destroyed)
        ));
        assert!(!sdk.get_status().initialized);
    }

    #[tokio::test]
    async fn test_double_init_is_noop() {
        let sdk = Faultline::new(Config::with_api_key("fl-test-key"));
        sdk.init().unwrap();
        let first_session = sdk.get_status().session_id;
        sdk.init().unwrap();
        assert_eq!(sdk.get_status().session_id, first_session);
        sdk.destroy().await;
    }

    #[tokio::test]
    async fn test_context_merging() {
        let sdk = Faultline::new(Config::with_api_key("fl-test-key"));
        sdk.set_user(json!({"id": 42}));
        sdk.set_context("release", json!("1.4.0"));

        let enriched = sdk.enrich(ErrorEvent::manual("x", ErrorSource::Manual, Map::new()));
        assert_eq!(enriched.context.get("user"), Some(&json!({"id": 42})));
        assert_eq!(enriched.context.get("release"), Some(&json!("1.4.0")));
    }

    #[tokio::test]
    async fn test_custom_events_do_not_count_as_errors() {
        let sdk = Faultline::new(Config::with_api_key("fl-test-key"));
        sdk.enrich(ErrorEvent::custom("deploy", Map::new()));
        assert_eq!(sdk.get_status().error_count, 0);

        let enriched = sdk.enrich(ErrorEvent::manual("x", ErrorSource::Manual, Map::new()));
        assert_eq!(enriched.error_count, 1);
        assert_eq!(sdk.get_status().error_count, 1);
    }

    #[tokio::test]
    async fn test_update_config_merges_context() {
        let sdk = Faultline::new(Config::with_api_key("fl-test-key"));
        sdk.update_config(|config| {
            config
                .context
                .insert("environment".to_string(), json!("staging"));
        });

        let enriched = sdk.enrich(ErrorEvent::manual("x", ErrorSource::Manual, Map::new()));
        assert_eq!(enriched.context.get("environment"), Some(&json!("staging")));
    }
}
