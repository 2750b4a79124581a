//! Domain layer - entities, value objects, and domain errors

pub mod errors;
pub mod event;
pub mod newtypes;
pub mod outcome;

pub use errors::{DomainError, SdkError};
pub use event::{EnrichedEvent, ErrorEvent, ErrorKind, ErrorSource};
pub use newtypes::{EventId, RetryKey, SessionId};
pub use outcome::{ActionPlan, CollectorResponse, ReportFailure, ReportOutcome};
