//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for identifiers used throughout the pipeline.
//! Each newtype ensures validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;
use super::event::{ErrorKind, ErrorSource};

// ============================================================================
// UUID-based ID types
// ============================================================================

/// Identifier for a single captured event
///
/// Assigned once at capture time and carried through enrichment, reporting,
/// and offline queueing. The offline queue removes delivered events by
/// matching this ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Create a new random EventId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an EventId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for EventId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid EventId: {e}")))
    }
}

/// Identifier for an SDK session
///
/// A fresh SessionId is minted on every successful `init`, so a
/// destroy-then-reinit cycle produces distinguishable telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random SessionId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a SessionId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid SessionId: {e}")))
    }
}

// ============================================================================
// RetryKey
// ============================================================================

/// Composite key bounding logical retries
///
/// Identifies "the same failing operation" across repeated events so the
/// strategy engine can count attempts: the event source, the operation
/// identity (request URL for HTTP events, operation name otherwise), and
/// the event kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RetryKey {
    source: ErrorSource,
    operation: String,
    kind: ErrorKind,
}

impl RetryKey {
    /// Creates a retry key from its components
    pub fn new(source: ErrorSource, operation: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            source,
            operation: operation.into(),
            kind,
        }
    }

    /// Returns the event source component
    pub fn source(&self) -> ErrorSource {
        self.source
    }

    /// Returns the operation identity component
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Returns the event kind component
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl Display for RetryKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source, self.operation, self.kind)
    }
}
