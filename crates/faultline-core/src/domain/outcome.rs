//! Report outcomes and the transport failure taxonomy
//!
//! A send attempt yields a [`ReportOutcome`]: either a success carrying the
//! collector's response, or a failure carrying a [`ReportFailure`]. Callers
//! branch on the failure kind, never on message text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Collector wire types
// ============================================================================

/// Recovery recommendation returned by the collector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPlan {
    /// Whether the collector recommends retrying the failed operation
    pub retry: bool,
    /// Operator-facing explanation
    #[serde(default)]
    pub message: String,
    /// Ordered remediation suggestions
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Success body of `POST <endpoint>`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorResponse {
    /// Always true on a 2xx response
    pub success: bool,
    /// Server-assigned identifier for the stored event
    #[serde(default, rename = "errorId")]
    pub error_id: Option<String>,
    /// Optional recovery recommendation
    #[serde(default, rename = "actionPlan")]
    pub action_plan: Option<ActionPlan>,
}

// ============================================================================
// ReportFailure
// ============================================================================

/// Why a send attempt failed
///
/// Closed taxonomy: the strategy engine and coordinator branch on these
/// variants. `NoCredential` and `Offline` are decided before any network
/// attempt; the rest describe transport-level failures after retries were
/// exhausted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReportFailure {
    /// No API key configured; reporting is disabled
    #[error("No API key configured")]
    NoCredential,

    /// Currently offline; the event was queued for later delivery
    #[error("Offline - queued")]
    Offline,

    /// The request did not complete within the configured timeout
    #[error("Request timed out")]
    Timeout,

    /// The collector answered with a non-2xx status
    #[error("Collector returned HTTP {0}")]
    HttpError(u16),

    /// The request failed below the HTTP layer (DNS, connect, TLS)
    #[error("Transport error: {0}")]
    TransportError(String),
}

impl ReportFailure {
    /// Returns true if the failure is transport-level and worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            ReportFailure::NoCredential => false,
            ReportFailure::Offline => false,
            ReportFailure::Timeout => true,
            ReportFailure::HttpError(status) => *status >= 500 || *status == 408 || *status == 429,
            ReportFailure::TransportError(_) => true,
        }
    }
}

// ============================================================================
// ReportOutcome
// ============================================================================

/// Result of a send attempt, passed to the strategy engine and user callback
#[derive(Debug, Clone, PartialEq)]
pub struct ReportOutcome {
    /// Whether the event was accepted by the collector
    pub success: bool,
    /// Server-assigned identifier, on success
    pub server_error_id: Option<String>,
    /// Collector's recovery recommendation, on success
    pub action_plan: Option<ActionPlan>,
    /// Failure reason, on failure
    pub failure: Option<ReportFailure>,
}

impl ReportOutcome {
    /// Builds a success outcome from the collector's response
    pub fn accepted(response: CollectorResponse) -> Self {
        Self {
            success: true,
            server_error_id: response.error_id,
            action_plan: response.action_plan,
            failure: None,
        }
    }

    /// Builds a failure outcome
    pub fn rejected(failure: ReportFailure) -> Self {
        Self {
            success: false,
            server_error_id: None,
            action_plan: None,
            failure: Some(failure),
        }
    }

    /// Returns true if the collector recommended a retry
    pub fn recommends_retry(&self) -> bool {
        self.action_plan.as_ref().is_some_and(|p| p.retry)
    }
}
