//! Retry ledger - per-key attempt counters bounding logical retries
//!
//! Keys identify "the same failing operation" across repeated events
//! ([`RetryKey`]). A record is cleared on success; when attempts reach the
//! maximum, the engine escalates to the fallback strategy instead of
//! retrying again.

use std::time::Duration;

use dashmap::DashMap;

use faultline_core::domain::newtypes::RetryKey;

/// Caps the exponent so a misconfigured max cannot overflow the delay
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Exponential backoff delay for a 0-based attempt number
///
/// `base, base*2, base*4, ...`
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * 2u32.pow(attempt.min(MAX_BACKOFF_EXPONENT))
}

/// Attempt counters for logical retries
#[derive(Default)]
pub struct RetryLedger {
    records: DashMap<RetryKey, u32>,
}

impl RetryLedger {
    /// Creates an empty ledger
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Attempts recorded so far for `key`
    pub fn attempts(&self, key: &RetryKey) -> u32 {
        self.records.get(key).map(|entry| *entry).unwrap_or(0)
    }

    /// Records one more attempt; returns the attempt number just consumed
    /// (0-based)
    pub fn record_attempt(&self, key: &RetryKey) -> u32 {
        let mut entry = self.records.entry(key.clone()).or_insert(0);
        let attempt = *entry;
        *entry += 1;
        attempt
    }

    /// Clears the record for `key` (called on success or escalation)
    pub fn clear(&self, key: &RetryKey) {
        self.records.remove(key);
    }

    /// Clears all records (teardown)
    pub fn clear_all(&self) {
        self.records.clear();
    }

    /// Number of keys with recorded attempts
    pub fn active(&self) -> usize {
        self.records.len()
    }
}
