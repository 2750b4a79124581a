//! Console logging setup
//!
//! The SDK only installs a subscriber when the host opts in via
//! `logging.console_logging`; embedding applications usually own the global
//! subscriber themselves.

use tracing_subscriber::EnvFilter;

use faultline_core::config::LoggingConfig;

/// Installs a console subscriber honoring `RUST_LOG` over the configured level
///
/// No-op if console logging is disabled or a global subscriber is already
/// installed.
pub fn init_console_logging(config: &LoggingConfig) {
    if !config.console_logging {
        return;
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init();
}
