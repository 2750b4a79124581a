//! Faultline Core - domain model and ports
//!
//! This crate contains the pure domain layer of the Faultline SDK:
//!
//! - Domain entities ([`ErrorEvent`], [`EnrichedEvent`], [`ReportOutcome`])
//! - Validated newtypes ([`SessionId`](domain::newtypes::SessionId), [`RetryKey`](domain::newtypes::RetryKey))
//! - Configuration loading and validation ([`config::Config`])
//! - Port traits for the adapters that touch the outside world
//!
//! No I/O happens here except for configuration file loading; everything
//! network- or hook-shaped lives behind the traits in [`ports`].
//!
//! [`ErrorEvent`]: domain::event::ErrorEvent
//! [`EnrichedEvent`]: domain::event::EnrichedEvent
//! [`ReportOutcome`]: domain::outcome::ReportOutcome

pub mod config;
pub mod domain;
pub mod ports;
