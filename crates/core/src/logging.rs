//! Structured logging for the keystore.
//!
//! Log level comes from `RUST_LOG`, defaulting to `info`. Key material and
//! tokens are never logged; `Blob` and `Value::Bytes` print only lengths.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Human-readable output.
///
/// # Example
/// ```no_run
/// use keystore_core::logging;
///
/// logging::init();
/// tracing::info!("keystore started");
/// ```
pub fn init() {
    tracing_subscriber::registry()
        .with(filter())
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

/// JSON output for log aggregation.
pub fn init_json() {
    tracing_subscriber::registry()
        .with(filter())
        .with(fmt::layer().json().with_target(true).with_thread_ids(true))
        .init();
}

/// Pick the output format from configuration.
pub fn init_from_config(config: &crate::config::LoggingConfig) {
    if config.json {
        init_json();
    } else {
        init();
    }
}

/// Like [`init_from_config`], but leaves an already installed subscriber
/// in place. Returns whether this call installed one.
pub fn try_init_from_config(config: &crate::config::LoggingConfig) -> bool {
    let registry = tracing_subscriber::registry().with(filter());
    if config.json {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .try_init()
            .is_ok()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_builds() {
        // The global subscriber can only be installed once per process.
        let _ = filter();
    }

    #[test]
    fn test_try_init_is_idempotent() {
        let config = crate::config::LoggingConfig::default();
        try_init_from_config(&config);
        assert!(!try_init_from_config(&config));
    }
}
