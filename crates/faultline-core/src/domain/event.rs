//! Error event entities
//!
//! [`ErrorEvent`] is the immutable record created by the capture layer at
//! detection time. [`EnrichedEvent`] is the same record augmented with
//! session identity, timestamp, merged context, and the running error count;
//! it is the JSON body posted to the collector.
//!
//! Events are created once and passed by value through the pipeline.
//! Enrichment produces a new record; nothing mutates an event in place.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::DomainError;
use super::newtypes::{EventId, SessionId};

// ============================================================================
// ErrorKind
// ============================================================================

/// Classification of a detected error condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// An uncaught panic in the host application
    Panic,
    /// A spawned/watched async operation that resolved to an error
    TaskFailure,
    /// A failed outbound HTTP call (non-2xx status or transport error)
    NetworkError,
    /// A form left dirty at shutdown without being submitted
    FormAbandonment,
    /// An error reported explicitly via `track_error`
    Manual,
    /// A named application event reported via `track_event`
    CustomEvent,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Panic => "panic",
            ErrorKind::TaskFailure => "task_failure",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::FormAbandonment => "form_abandonment",
            ErrorKind::Manual => "manual",
            ErrorKind::CustomEvent => "custom_event",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// ErrorSource
// ============================================================================

/// Semantic origin tag of an event
///
/// A closed enum rather than a free-form string: the strategy engine keys
/// its per-source override table and its default decisions on this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSource {
    /// Uncaught panics in application code
    Application,
    /// Watched async task failures
    Task,
    /// Intercepted outbound HTTP calls
    Http,
    /// Form abandonment tracking
    Form,
    /// Explicit `track_error` calls
    Manual,
    /// Explicit `track_event` calls
    Event,
}

impl ErrorSource {
    /// Returns the canonical string tag for this source
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSource::Application => "application",
            ErrorSource::Task => "task",
            ErrorSource::Http => "http",
            ErrorSource::Form => "form",
            ErrorSource::Manual => "manual",
            ErrorSource::Event => "event",
        }
    }

    /// All source values, in declaration order
    pub const ALL: [ErrorSource; 6] = [
        ErrorSource::Application,
        ErrorSource::Task,
        ErrorSource::Http,
        ErrorSource::Form,
        ErrorSource::Manual,
        ErrorSource::Event,
    ];
}

impl Display for ErrorSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ErrorSource {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "application" => Ok(ErrorSource::Application),
            "task" => Ok(ErrorSource::Task),
            "http" => Ok(ErrorSource::Http),
            "form" => Ok(ErrorSource::Form),
            "manual" => Ok(ErrorSource::Manual),
            "event" => Ok(ErrorSource::Event),
            other => Err(DomainError::InvalidSource(other.to_string())),
        }
    }
}

// ============================================================================
// ErrorEvent
// ============================================================================

/// An immutable record of a single detected error condition
///
/// Created by the capture layer (or by `track_error`/`track_event`) and
/// passed by value through the pipeline. Origin-specific details live in
/// `metadata` (request URL/method/status for HTTP events, panic location
/// for panics, field count for form events, arbitrary fields for manual
/// events).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    /// Unique identifier assigned at capture time
    pub id: EventId,
    /// Classification of the error condition
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Semantic origin tag
    pub source: ErrorSource,
    /// Host application's current view/route identifier
    pub page_url: String,
    /// Host application name/version and platform triple
    pub user_agent: String,
    /// Captured backtrace or error chain, if available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    /// Origin-specific details
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// Default user-agent string: crate name/version plus the compile target OS
fn default_user_agent() -> String {
    format!(
        "faultline/{} ({})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}

impl ErrorEvent {
    /// Creates an event with the given kind, message, and source
    ///
    /// The page URL defaults to empty and the user agent to the SDK's own
    /// identification; callers set both via [`with_page_url`](Self::with_page_url)
    /// and the SDK facade fills the page URL from its context.
    pub fn new(kind: ErrorKind, message: impl Into<String>, source: ErrorSource) -> Self {
        Self {
            id: EventId::new(),
            kind,
            message: message.into(),
            source,
            page_url: String::new(),
            user_agent: default_user_agent(),
            stack_trace: None,
            metadata: Map::new(),
        }
    }

    /// Creates a panic event from panic-hook data
    pub fn panic(message: impl Into<String>, location: &str, backtrace: &str) -> Self {
        let mut event = Self::new(ErrorKind::Panic, message, ErrorSource::Application);
        event.stack_trace = Some(backtrace.to_string());
        event
            .metadata
            .insert("location".to_string(), Value::String(location.to_string()));
        event
    }

    /// Creates a task-failure event from a watched task's error
    pub fn task_failure(task_name: &str, error_chain: &str) -> Self {
        let mut event = Self::new(
            ErrorKind::TaskFailure,
            format!("Task '{task_name}' failed"),
            ErrorSource::Task,
        );
        event.stack_trace = Some(error_chain.to_string());
        event
            .metadata
            .insert("task".to_string(), Value::String(task_name.to_string()));
        event
    }

    /// Creates a network-error event for a non-2xx HTTP response
    pub fn http_status(method: &str, url: &str, status: u16) -> Self {
        let mut event = Self::new(
            ErrorKind::NetworkError,
            format!("HTTP {status}: {method} {url}"),
            ErrorSource::Http,
        );
        event
            .metadata
            .insert("method".to_string(), Value::String(method.to_string()));
        event
            .metadata
            .insert("url".to_string(), Value::String(url.to_string()));
        event
            .metadata
            .insert("status".to_string(), Value::Number(status.into()));
        event
    }

    /// Creates a network-error event for a thrown transport error
    ///
    /// No `status` metadata is set; the strategy engine treats a missing
    /// status as retryable.
    pub fn http_transport(method: &str, url: &str, error: &str) -> Self {
        let mut event = Self::new(
            ErrorKind::NetworkError,
            format!("Request failed: {method} {url}: {error}"),
            ErrorSource::Http,
        );
        event.stack_trace = Some(error.to_string());
        event
            .metadata
            .insert("method".to_string(), Value::String(method.to_string()));
        event
            .metadata
            .insert("url".to_string(), Value::String(url.to_string()));
        event
    }

    /// Creates a form-abandonment event
    pub fn form_abandonment(form_id: &str, field_count: u64) -> Self {
        let mut event = Self::new(
            ErrorKind::FormAbandonment,
            format!("Form '{form_id}' abandoned with unsaved changes"),
            ErrorSource::Form,
        );
        event
            .metadata
            .insert("form".to_string(), Value::String(form_id.to_string()));
        event
            .metadata
            .insert("field_count".to_string(), Value::Number(field_count.into()));
        event
    }

    /// Creates a manual error event (`track_error`)
    pub fn manual(
        message: impl Into<String>,
        source: ErrorSource,
        metadata: Map<String, Value>,
    ) -> Self {
        let mut event = Self::new(ErrorKind::Manual, message, source);
        event.metadata = metadata;
        event
    }

    /// Creates a custom named event (`track_event`)
    pub fn custom(name: impl Into<String>, data: Map<String, Value>) -> Self {
        let mut event = Self::new(ErrorKind::CustomEvent, name, ErrorSource::Event);
        event.metadata = data;
        event
    }

    /// Returns a copy with the given page URL
    #[must_use]
    pub fn with_page_url(mut self, page_url: impl Into<String>) -> Self {
        self.page_url = page_url.into();
        self
    }

    /// Returns a copy with the given user agent
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Returns the request URL for HTTP events, if present in metadata
    pub fn request_url(&self) -> Option<&str> {
        self.metadata.get("url").and_then(Value::as_str)
    }

    /// Returns the HTTP status for network events, if present in metadata
    pub fn http_status_code(&self) -> Option<u16> {
        self.metadata
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok())
    }

    /// Returns the operation identity used for retry keying
    ///
    /// Request URL for HTTP events, the task/form name where tracked,
    /// otherwise the message.
    pub fn operation_identity(&self) -> &str {
        self.request_url()
            .or_else(|| self.metadata.get("task").and_then(Value::as_str))
            .or_else(|| self.metadata.get("form").and_then(Value::as_str))
            .unwrap_or(&self.message)
    }
}

// ============================================================================
// EnrichedEvent
// ============================================================================

/// An [`ErrorEvent`] augmented with session identity and context
///
/// Constructed once by the coordinator, read-only downstream. This is the
/// JSON body of the collector POST.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedEvent {
    /// The captured event, flattened into the payload
    #[serde(flatten)]
    pub event: ErrorEvent,
    /// Session this event belongs to
    pub session_id: SessionId,
    /// RFC-3339 enrichment timestamp
    pub timestamp: String,
    /// Global context merged with per-call overrides
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
    /// Cumulative error count at emission time
    pub error_count: u64,
}

impl EnrichedEvent {
    /// Enriches a captured event
    ///
    /// # Arguments
    /// * `event` - The captured event
    /// * `session_id` - Current SDK session
    /// * `context` - Already-merged context map
    /// * `error_count` - Running error count including this event
    pub fn enrich(
        event: ErrorEvent,
        session_id: SessionId,
        context: Map<String, Value>,
        error_count: u64,
    ) -> Self {
        Self {
            event,
            session_id,
            timestamp: Utc::now().to_rfc3339(),
            context,
            error_count,
        }
    }

    /// Returns the event's unique identifier
    pub fn id(&self) -> EventId {
        self.event.id
    }
}
