//! Faultline Reporter - event delivery
//!
//! Delivers enriched events to the remote collector with:
//!
//! - A configurable per-request timeout enforced by cancellation
//! - Bounded transport retries with linear backoff
//! - An offline queue drained FIFO when connectivity returns
//! - A deferred retry for events that exhausted their transport retries
//!
//! Failures are classified into the
//! [`ReportFailure`](faultline_core::domain::outcome::ReportFailure)
//! taxonomy; callers branch on kinds, never on message text.

pub mod queue;
pub mod reporter;
pub mod transport;

pub use queue::OfflineQueue;
pub use reporter::{Reporter, ReporterConfig};
pub use transport::{HttpBeacon, HttpTransmitter};
