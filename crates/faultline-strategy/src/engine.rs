//! Strategy selection and execution
//!
//! Selection ([`decide`]) is a pure function over the event, the report
//! outcome, and configuration; execution is a set of async executors that
//! never raise. Every execution resolves to an [`ExecutionReport`] so a
//! misbehaving executor can never abort the pipeline.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use dashmap::DashMap;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use faultline_capture::FormTracker;
use faultline_core::config::Config;
use faultline_core::domain::errors::DomainError;
use faultline_core::domain::event::{ErrorEvent, ErrorSource};
use faultline_core::domain::newtypes::RetryKey;
use faultline_core::domain::outcome::ReportOutcome;
use faultline_core::ports::recovery::{IRecoveryHandler, ISnapshotStore};

use crate::cache::ResponseCache;
use crate::retry::{backoff_delay, RetryLedger};
use crate::save::snapshot_key;

// ============================================================================
// Strategy
// ============================================================================

/// A named recovery action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Re-issue the failed operation with exponential backoff
    Retry,
    /// Invoke a custom handler or serve a cached response
    Fallback,
    /// Persist current form data for later restoration
    Save,
    /// Suggest (never perform) a reload of the host view
    Reload,
    /// Log and continue
    Log,
}

impl Display for Strategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Strategy::Retry => "retry",
            Strategy::Fallback => "fallback",
            Strategy::Save => "save",
            Strategy::Reload => "reload",
            Strategy::Log => "log",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Strategy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "retry" => Ok(Strategy::Retry),
            "fallback" => Ok(Strategy::Fallback),
            "save" => Ok(Strategy::Save),
            "reload" => Ok(Strategy::Reload),
            "log" => Ok(Strategy::Log),
            other => Err(DomainError::ValidationFailed(format!(
                "unknown strategy: {other}"
            ))),
        }
    }
}

// ============================================================================
// Decision function
// ============================================================================

/// Message fragments indicating an unrecoverable application state
const CRITICAL_KEYWORDS: &[&str] = &["script error", "out of memory", "maximum call stack"];

/// Selects the recovery strategy for an event, first match wins:
///
/// 1. The collector explicitly recommends retry and auto-retry is enabled
/// 2. A configured per-source override
/// 3. Source-specific defaults
pub fn decide(
    event: &ErrorEvent,
    outcome: &ReportOutcome,
    auto_retry: bool,
    override_strategy: Option<Strategy>,
) -> Strategy {
    if outcome.recommends_retry() && auto_retry {
        return Strategy::Retry;
    }

    if let Some(strategy) = override_strategy {
        return strategy;
    }

    match event.source {
        ErrorSource::Http => match event.http_status_code() {
            // Absent status means a transport failure: worth retrying
            None => Strategy::Retry,
            Some(status) if status >= 500 || status == 408 || status == 429 => Strategy::Retry,
            Some(_) => Strategy::Fallback,
        },
        ErrorSource::Application => {
            let message = event.message.to_lowercase();
            if CRITICAL_KEYWORDS.iter().any(|kw| message.contains(kw)) {
                Strategy::Reload
            } else {
                Strategy::Log
            }
        }
        ErrorSource::Task => Strategy::Retry,
        ErrorSource::Form => Strategy::Save,
        ErrorSource::Manual | ErrorSource::Event => Strategy::Log,
    }
}

// ============================================================================
// ExecutionReport
// ============================================================================

/// Uniform result of one executed strategy
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    /// The strategy that actually ran (retry may escalate to fallback)
    pub strategy: Strategy,
    /// Whether the action succeeded
    pub success: bool,
    /// Executor-specific result payload, on success
    pub result: Option<Value>,
    /// Failure description, on failure
    pub error: Option<String>,
}

impl ExecutionReport {
    fn ok(strategy: Strategy, result: Value) -> Self {
        Self {
            strategy,
            success: true,
            result: Some(result),
            error: None,
        }
    }

    fn failed(strategy: Strategy, error: impl Into<String>) -> Self {
        Self {
            strategy,
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

// ============================================================================
// StrategyConfig
// ============================================================================

/// Tuning for the strategy engine's logical retries
#[derive(Debug, Clone)]
pub struct StrategyConfig {
    /// Whether collector retry recommendations are honored
    pub auto_retry: bool,
    /// Attempts per retry key before escalating to fallback
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub retry_delay: std::time::Duration,
}

impl StrategyConfig {
    /// Derives strategy tuning from the SDK configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            auto_retry: config.retry.auto_retry,
            max_retries: config.retry.max_retries,
            retry_delay: std::time::Duration::from_millis(config.retry.retry_delay_ms),
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            auto_retry: true,
            max_retries: 3,
            retry_delay: std::time::Duration::from_millis(1000),
        }
    }
}

// ============================================================================
// StrategyEngine
// ============================================================================

/// Selects and executes exactly one recovery action per reported event
pub struct StrategyEngine {
    config: StrategyConfig,
    overrides: DashMap<ErrorSource, Strategy>,
    handlers: DashMap<ErrorSource, Arc<dyn IRecoveryHandler>>,
    ledger: RetryLedger,
    cache: ResponseCache,
    snapshots: Arc<dyn ISnapshotStore>,
    forms: Arc<FormTracker>,
    http: reqwest::Client,
}

impl StrategyEngine {
    /// Creates an engine with the given tuning and collaborators
    pub fn new(
        config: StrategyConfig,
        snapshots: Arc<dyn ISnapshotStore>,
        forms: Arc<FormTracker>,
    ) -> Self {
        Self {
            config,
            overrides: DashMap::new(),
            handlers: DashMap::new(),
            ledger: RetryLedger::new(),
            cache: ResponseCache::new(),
            snapshots,
            forms,
            http: reqwest::Client::new(),
        }
    }

    /// Sets a per-source strategy override (decision step 2)
    pub fn set_override(&self, source: ErrorSource, strategy: Strategy) {
        self.overrides.insert(source, strategy);
    }

    /// Registers a custom recovery handler for a source
    pub fn set_handler(&self, source: ErrorSource, handler: Arc<dyn IRecoveryHandler>) {
        self.handlers.insert(source, handler);
    }

    /// Number of retry keys with recorded attempts
    pub fn active_retries(&self) -> usize {
        self.ledger.active()
    }

    /// Clears all retry records (teardown)
    pub fn clear_retries(&self) {
        self.ledger.clear_all();
    }

    /// Returns the response cache (exposed so delivery paths can seed it)
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Selects and executes one recovery action; never raises
    pub async fn execute(&self, event: &ErrorEvent, outcome: &ReportOutcome) -> ExecutionReport {
        let override_strategy = self.overrides.get(&event.source).map(|s| *s);
        let strategy = decide(event, outcome, self.config.auto_retry, override_strategy);
        debug!(source = %event.source, %strategy, "Strategy selected");
        self.run(strategy, event).await
    }

    async fn run(&self, strategy: Strategy, event: &ErrorEvent) -> ExecutionReport {
        match strategy {
            Strategy::Retry => self.execute_retry(event).await,
            Strategy::Fallback => self.execute_fallback(event).await,
            Strategy::Save => self.execute_save(event).await,
            Strategy::Reload => Self::execute_reload(event),
            Strategy::Log => Self::execute_log(event),
        }
    }

    /// Bounded exponential-backoff re-issue of the failed operation
    ///
    /// At the attempt limit the record is cleared and the event escalates
    /// to the fallback strategy instead of retrying again.
    async fn execute_retry(&self, event: &ErrorEvent) -> ExecutionReport {
        let key = RetryKey::new(event.source, event.operation_identity(), event.kind);

        if self.ledger.attempts(&key) >= self.config.max_retries {
            warn!(key = %key, "Retry limit reached, escalating to fallback");
            self.ledger.clear(&key);
            return self.execute_fallback(event).await;
        }

        let attempt = self.ledger.record_attempt(&key);
        tokio::time::sleep(backoff_delay(self.config.retry_delay, attempt)).await;

        let result = match event.source {
            ErrorSource::Http => self.reissue_http(event).await,
            // No generic mechanism exists to replay an arbitrary failed
            // task; a registered handler is the only replay path.
            ErrorSource::Task => {
                let handler = self.handler_for(event.source);
                match handler {
                    Some(handler) => handler.handle(event).await,
                    None => Err(anyhow::anyhow!("no retry handler registered for task source")),
                }
            }
            other => Err(anyhow::anyhow!("retry not supported for source {other}")),
        };

        match result {
            Ok(value) => {
                self.ledger.clear(&key);
                info!(key = %key, attempt, "Retry succeeded");
                ExecutionReport::ok(Strategy::Retry, value)
            }
            Err(err) => {
                debug!(key = %key, attempt, error = %err, "Retry attempt failed");
                ExecutionReport::failed(Strategy::Retry, format!("{err:#}"))
            }
        }
    }

    /// Re-issues the original HTTP call and caches a successful body
    async fn reissue_http(&self, event: &ErrorEvent) -> anyhow::Result<Value> {
        let url = event
            .request_url()
            .ok_or_else(|| anyhow::anyhow!("event carries no request url"))?;
        let method = event
            .metadata
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET");
        let method = Method::from_bytes(method.as_bytes())?;

        let response = self.http.request(method, url).send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("retry request returned HTTP {}", status.as_u16());
        }

        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        self.cache.store(url, body.clone());

        Ok(json!({ "status": status.as_u16(), "body": body }))
    }

    /// Returns a cloned handler so no map guard is held across awaits
    fn handler_for(&self, source: ErrorSource) -> Option<Arc<dyn IRecoveryHandler>> {
        self.handlers.get(&source).map(|h| h.clone())
    }

    /// Custom handler if registered, else the built-in per-source default
    async fn execute_fallback(&self, event: &ErrorEvent) -> ExecutionReport {
        if let Some(handler) = self.handler_for(event.source) {
            return match handler.handle(event).await {
                Ok(value) => ExecutionReport::ok(Strategy::Fallback, value),
                Err(err) => ExecutionReport::failed(Strategy::Fallback, format!("{err:#}")),
            };
        }

        match event.source {
            ErrorSource::Http => {
                let cached = event.request_url().and_then(|url| self.cache.lookup(url));
                match cached {
                    Some(body) => {
                        ExecutionReport::ok(Strategy::Fallback, json!({ "cached": body }))
                    }
                    None => ExecutionReport::failed(
                        Strategy::Fallback,
                        "no cached response available",
                    ),
                }
            }
            _ => {
                info!(source = %event.source, message = %event.message, "Fallback: logged and continuing");
                ExecutionReport::ok(Strategy::Fallback, json!({ "logged": true }))
            }
        }
    }

    /// Persists current non-password form fields under a derived key
    async fn execute_save(&self, event: &ErrorEvent) -> ExecutionReport {
        let snapshot = self.forms.snapshot(&event.page_url);
        let field_count = snapshot.fields.len();
        let key = snapshot_key(&event.page_url);

        match self.snapshots.save(&key, &snapshot).await {
            Ok(()) => {
                info!(key = %key, field_count, "Form data saved");
                ExecutionReport::ok(Strategy::Save, json!({ "key": key, "fields": field_count }))
            }
            Err(err) => ExecutionReport::failed(Strategy::Save, format!("{err:#}")),
        }
    }

    /// Suggestion only; the engine never reloads the host view itself
    fn execute_reload(event: &ErrorEvent) -> ExecutionReport {
        warn!(message = %event.message, "Critical error; suggesting reload");
        ExecutionReport::ok(
            Strategy::Reload,
            json!({
                "suggestion": "reload",
                "message": "A critical error occurred; reloading the view may recover"
            }),
        )
    }

    fn execute_log(event: &ErrorEvent) -> ExecutionReport {
        info!(
            kind = %event.kind,
            source = %event.source,
            message = %event.message,
            "Error recorded"
        );
        ExecutionReport::ok(Strategy::Log, json!({ "logged": true }))
    }
}
