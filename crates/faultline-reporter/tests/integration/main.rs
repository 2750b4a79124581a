//! Integration tests for the reporter against a mock collector

mod common;
mod test_delivery;
mod test_offline;
