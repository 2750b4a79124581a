//! End-to-end tests for the SDK facade against a mock collector

mod common;
mod test_lifecycle;
mod test_pipeline;
