//! Domain error types
//!
//! Defines error types for domain operations: validation failures,
//! invalid lifecycle transitions, and SDK-level configuration errors.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid error source tag
    #[error("Invalid error source: {0}")]
    InvalidSource(String),

    /// Invalid lifecycle transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}

/// Errors surfaced by the public SDK facade
#[derive(Debug, Error)]
pub enum SdkError {
    /// Required configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An operation was attempted on a destroyed SDK instance
    #[error("SDK has been destroyed; construct a new instance")]
    Destroyed,

    /// An operation was attempted before `init`
    #[error("SDK is not initialized")]
    NotInitialized,
}
