//! Recovery handler and snapshot store ports
//!
//! [`IRecoveryHandler`] is the caller-registered custom handler capability:
//! the strategy engine looks handlers up by [`ErrorSource`] rather than
//! dispatching on open-ended runtime injection.
//!
//! [`ISnapshotStore`] persists form snapshots produced by the `save`
//! strategy so abandoned form data can be restored later.
//!
//! [`ErrorSource`]: crate::domain::event::ErrorSource

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::event::ErrorEvent;

/// Port trait for caller-registered per-source recovery handlers
///
/// ## Implementation Notes
///
/// - Handlers run inside strategy execution; a returned `Err` becomes a
///   failed execution report, never a panic out of the pipeline.
/// - For `Task`-source retry, a registered handler is the only replay
///   mechanism; the engine does not re-execute arbitrary failed tasks.
#[async_trait::async_trait]
pub trait IRecoveryHandler: Send + Sync {
    /// Attempts recovery for the given event
    ///
    /// # Returns
    /// A JSON value describing the recovery result (handler-defined shape)
    async fn handle(&self, event: &ErrorEvent) -> anyhow::Result<Value>;
}

/// A persisted snapshot of form field values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSnapshot {
    /// RFC-3339 time the snapshot was taken
    pub timestamp: String,
    /// View/route the form lived on
    pub url: String,
    /// Field name to value, passwords excluded
    pub fields: serde_json::Map<String, Value>,
}

/// Port trait for form snapshot persistence
#[async_trait::async_trait]
pub trait ISnapshotStore: Send + Sync {
    /// Persists a snapshot under `key`
    async fn save(&self, key: &str, snapshot: &FormSnapshot) -> anyhow::Result<()>;

    /// Loads a snapshot by key, `None` if absent
    async fn load(&self, key: &str) -> anyhow::Result<Option<FormSnapshot>>;

    /// Lists all stored snapshot keys, newest first
    async fn list(&self) -> anyhow::Result<Vec<String>>;

    /// Deletes a snapshot; returns whether it existed
    async fn delete(&self, key: &str) -> anyhow::Result<bool>;
}
