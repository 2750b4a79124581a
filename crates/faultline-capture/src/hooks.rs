//! Process-wide panic hook installation
//!
//! The panic hook is process-wide shared mutable state, so it is modeled as
//! a single owned resource with acquire/release semantics: at most one
//! Faultline installation is active at a time, and releasing restores the
//! hook that was in place before acquisition.
//!
//! The installed hook chains to the previous one, preserving default
//! behavior (stderr output).

use std::panic::PanicHookInfo;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use faultline_core::domain::event::ErrorEvent;

use crate::hub::EventSink;

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Send + Sync + 'static>;

/// Whether a Faultline panic hook is currently installed
static HOOK_ACTIVE: AtomicBool = AtomicBool::new(false);

/// The hook that was in place before ours, kept for restoration
static PREVIOUS_HOOK: Mutex<Option<Arc<PanicHook>>> = Mutex::new(None);

/// Builds a panic event from hook data
fn panic_event(info: &PanicHookInfo<'_>) -> ErrorEvent {
    let message = if let Some(s) = info.payload().downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = info.payload().downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    };

    let location = info
        .location()
        .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
        .unwrap_or_default();

    let backtrace = std::backtrace::Backtrace::force_capture().to_string();

    ErrorEvent::panic(message, &location, &backtrace)
}

/// Installs the Faultline panic hook, chaining to the previous one.
///
/// Idempotent: a second install while active is a no-op with a warning.
/// Captured panics are forwarded to `sink`; the previous hook always runs
/// afterwards.
pub fn install_panic_hook(sink: EventSink) {
    if HOOK_ACTIVE.swap(true, Ordering::SeqCst) {
        warn!("Panic hook already installed, ignoring re-installation");
        return;
    }

    let previous: Arc<PanicHook> = Arc::new(std::panic::take_hook());
    *PREVIOUS_HOOK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(previous.clone());

    std::panic::set_hook(Box::new(move |info| {
        // The sink fans out to subscribers which each run under
        // catch_unwind, so this closure cannot itself panic through here.
        sink(panic_event(info));
        previous(info);
    }));

    debug!("Panic hook installed");
}

/// Removes the Faultline panic hook and restores the previous one.
///
/// Safe to call without a prior install; does nothing in that case.
pub fn uninstall_panic_hook() {
    if !HOOK_ACTIVE.swap(false, Ordering::SeqCst) {
        return;
    }

    let previous = PREVIOUS_HOOK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take();

    // Drop our hook, then reinstate whatever was there before.
    let _ = std::panic::take_hook();
    if let Some(previous) = previous {
        std::panic::set_hook(Box::new(move |info| previous(info)));
    }

    debug!("Panic hook removed");
}

/// Returns whether the Faultline panic hook is currently installed
pub fn panic_hook_active() -> bool {
    HOOK_ACTIVE.load(Ordering::SeqCst)
}
