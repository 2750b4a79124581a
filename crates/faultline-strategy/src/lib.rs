//! Faultline Strategy - recovery after reporting
//!
//! Given an error event and its report outcome, selects and executes
//! exactly one recovery action: a pure decision function
//! ([`engine::decide`]) plus side-effecting executors that never raise.
//!
//! Logical retries here use exponential backoff, independent of the
//! reporter's linear transport backoff; the two are distinct concerns with
//! separate tuning.

pub mod cache;
pub mod engine;
pub mod retry;
pub mod save;

pub use cache::ResponseCache;
pub use engine::{ExecutionReport, Strategy, StrategyConfig, StrategyEngine};
pub use retry::RetryLedger;
pub use save::FileSnapshotStore;
