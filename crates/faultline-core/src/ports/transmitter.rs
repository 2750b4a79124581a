//! Transmission ports (driven/secondary ports)
//!
//! Two implementations of one transmission concern, selected by call site:
//!
//! - [`ITransmitter`]: the awaited normal path. The reporter sends every
//!   enriched event through it and inspects the collector's response.
//! - [`IBeacon`]: the unload-safe fire-and-forget path. Used only for form
//!   abandonment at shutdown, where the caller cannot await.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because transport errors at this boundary are
//!   adapter-specific; the reporter maps them into the `ReportFailure`
//!   taxonomy.
//! - `send` must enforce its own timeout; a hung transmitter would stall
//!   the whole pipeline.

use crate::domain::event::EnrichedEvent;
use crate::domain::outcome::CollectorResponse;

/// Port trait for the awaited event transmission path
///
/// ## Implementation Notes
///
/// - A non-2xx collector status is an `Err`; implementations should surface
///   the status code in the error chain so the reporter can classify it.
/// - Implementations must not retry internally; retry policy belongs to
///   the reporter.
#[async_trait::async_trait]
pub trait ITransmitter: Send + Sync {
    /// Sends an enriched event to the collector and awaits the response
    ///
    /// # Arguments
    /// * `event` - The enriched event to deliver
    ///
    /// # Returns
    /// The parsed collector response on a 2xx status
    async fn send(&self, event: &EnrichedEvent) -> anyhow::Result<CollectorResponse>;
}

/// Port trait for unload-safe one-way transmission
///
/// Fire-and-forget: the call returns as soon as the send has been handed
/// off. Delivery is best-effort and the response is never observed.
pub trait IBeacon: Send + Sync {
    /// Hands off a payload for one-way delivery
    ///
    /// # Arguments
    /// * `payload` - JSON payload to POST to the collector
    fn send_nowait(&self, payload: serde_json::Value) -> anyhow::Result<()>;
}
