//! Faultline Capture - error detection hooks
//!
//! Detects four error classes in the host application and forwards each as
//! a normalized [`ErrorEvent`](faultline_core::domain::event::ErrorEvent)
//! to all registered subscribers:
//!
//! 1. **Panics**: a chained process-wide panic hook
//! 2. **Task failures**: watched fallible futures ([`CaptureHub::watch_task`])
//! 3. **HTTP errors**: a transparent [`InterceptedClient`] wrapper
//! 4. **Form abandonment**: dirty-form tracking flushed at shutdown
//!
//! Detection never throws from inside a hook site, and the HTTP wrapper
//! re-raises original errors unchanged so capture stays invisible to
//! application logic.

pub mod forms;
pub mod hooks;
pub mod hub;
pub mod net;

pub use forms::FormTracker;
pub use hub::{CaptureHub, EventSink};
pub use net::InterceptedClient;
