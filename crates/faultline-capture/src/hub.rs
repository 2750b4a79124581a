//! Capture hub - subscriber fan-out and hook lifecycle
//!
//! The [`CaptureHub`] owns the set of subscribers and the lifecycle of the
//! installed hooks. `start`/`stop` are idempotent; subscribers are invoked
//! exactly once per detected event, and a panicking subscriber is isolated
//! so it can neither break capture for the others nor crash the host.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tracing::{debug, error, warn};

use faultline_core::config::CaptureConfig;
use faultline_core::domain::event::ErrorEvent;

use crate::forms::FormTracker;
use crate::hooks;
use crate::net::InterceptedClient;

/// Callback receiving captured events
///
/// Shared with the panic hook and the intercepted HTTP client, both of
/// which outlive any single borrow of the hub.
pub type EventSink = Arc<dyn Fn(ErrorEvent) + Send + Sync>;

type Subscriber = Arc<dyn Fn(&ErrorEvent) + Send + Sync>;

/// Invokes every subscriber once, isolating panicking handlers
fn fan_out(subscribers: &RwLock<Vec<Subscriber>>, event: &ErrorEvent) {
    let subscribers = subscribers
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone();

    for subscriber in subscribers {
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| subscriber(event)));
        if result.is_err() {
            error!(
                kind = %event.kind,
                source = %event.source,
                "Capture subscriber panicked; continuing with remaining subscribers"
            );
        }
    }
}

/// Detects error conditions and forwards them to subscribers
///
/// One hub exists per SDK instance. The hub installs process-wide hooks on
/// [`start`](CaptureHub::start) according to its [`CaptureConfig`] and
/// removes them on [`stop`](CaptureHub::stop).
pub struct CaptureHub {
    config: CaptureConfig,
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
    /// Whether this hub's hooks are currently installed
    active: Arc<AtomicBool>,
    forms: Arc<FormTracker>,
}

impl CaptureHub {
    /// Creates a hub with the given capture configuration
    ///
    /// No hooks are installed until [`start`](CaptureHub::start).
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            subscribers: Arc::new(RwLock::new(Vec::new())),
            active: Arc::new(AtomicBool::new(false)),
            forms: Arc::new(FormTracker::new()),
        }
    }

    /// Installs capture hooks; no-op if already started
    pub fn start(&self) {
        if self.active.swap(true, Ordering::SeqCst) {
            warn!("Capture already started, ignoring");
            return;
        }

        if self.config.capture_panics {
            hooks::install_panic_hook(self.sink());
        }

        debug!(
            panics = self.config.capture_panics,
            tasks = self.config.capture_task_failures,
            http = self.config.capture_http_errors,
            forms = self.config.capture_form_abandonment,
            "Capture started"
        );
    }

    /// Removes all installed hooks; no-op if not started
    ///
    /// Safe to call without a prior `start()`.
    pub fn stop(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }

        if self.config.capture_panics {
            hooks::uninstall_panic_hook();
        }

        debug!("Capture stopped");
    }

    /// Returns whether hooks are currently installed
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Registers a subscriber invoked once per detected event
    pub fn subscribe(&self, handler: impl Fn(&ErrorEvent) + Send + Sync + 'static) {
        self.subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Arc::new(handler));
    }

    /// Forwards an event to every subscriber
    ///
    /// Each subscriber runs under `catch_unwind`: a panicking handler is
    /// logged and the remaining handlers still run. This is what makes the
    /// panic hook and HTTP interception sites safe.
    pub fn emit(&self, event: ErrorEvent) {
        fan_out(&self.subscribers, &event);
    }

    /// Returns a shareable sink feeding [`emit`](CaptureHub::emit)
    ///
    /// The sink consults the hub's lifecycle on every call: a sink held by
    /// a wrapper handed out earlier goes quiet once the hub is stopped.
    pub fn sink(&self) -> EventSink {
        let subscribers = self.subscribers.clone();
        let active = self.active.clone();
        Arc::new(move |event: ErrorEvent| {
            if !active.load(Ordering::SeqCst) {
                return;
            }
            fan_out(&subscribers, &event);
        })
    }

    /// Runs a fallible future, emitting a task-failure event on `Err`
    ///
    /// The original error is returned unchanged; watching a task never
    /// alters what the caller observes.
    pub async fn watch_task<T, E, F>(&self, name: &str, future: F) -> Result<T, E>
    where
        F: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        match future.await {
            Ok(value) => Ok(value),
            Err(err) => {
                if self.is_active() && self.config.capture_task_failures {
                    self.emit(ErrorEvent::task_failure(name, &err.to_string()));
                }
                Err(err)
            }
        }
    }

    /// Wraps an HTTP client so its failures are captured transparently
    ///
    /// When HTTP capture is disabled the wrapper still works but emits
    /// nothing.
    pub fn intercepted_client(&self, client: reqwest::Client) -> InterceptedClient {
        let sink: EventSink = if self.config.capture_http_errors {
            self.sink()
        } else {
            Arc::new(|_| {})
        };
        InterceptedClient::new(client, sink)
    }

    /// Returns the form tracker owned by this hub
    pub fn forms(&self) -> Arc<FormTracker> {
        self.forms.clone()
    }

    /// Whether form abandonment tracking is enabled
    pub fn form_tracking_enabled(&self) -> bool {
        self.config.capture_form_abandonment
    }
}

impl Drop for CaptureHub {
    fn drop(&mut self) {
        // A dropped hub must not leave a dangling process-wide hook.
        self.stop();
    }
}
