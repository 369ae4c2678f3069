//! Global `tracing` subscriber setup.
//!
//! `log::*` records from the store and config code are bridged through
//! `tracing_log::LogTracer`, so one subscriber sees everything.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::ConfigError;

/// Crates that are too chatty at `info`.
const QUIET_TARGETS: &[(&str, &str)] = &[
    ("hyper", "warn"),
    ("hyper_util", "warn"),
    ("reqwest", "warn"),
    ("rustls", "warn"),
    ("html5ever", "warn"),
    ("selectors", "warn"),
];

/// Builds the filter for `level`. `RUST_LOG`, when set, replaces it.
pub fn build_env_filter(level: &str) -> Result<EnvFilter, ConfigError> {
    if let Ok(directives) = std::env::var(EnvFilter::DEFAULT_ENV) {
        if !directives.trim().is_empty() {
            return EnvFilter::try_new(&directives).map_err(|e| {
                ConfigError::Logging(format!("invalid RUST_LOG '{}': {}", directives, e))
            });
        }
    }

    let mut directives = vec![level.to_string()];
    directives.extend(
        QUIET_TARGETS
            .iter()
            .map(|(target, lvl)| format!("{}={}", target, lvl)),
    );
    let filter = directives.join(",");
    EnvFilter::try_new(&filter)
        .map_err(|e| ConfigError::Logging(format!("invalid log filter '{}': {}", filter, e)))
}

fn fmt_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer().pretty().boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
    }
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = build_env_filter(&config.level)?;

    // A LogTracer may already be set by an embedding application.
    tracing_log::LogTracer::init().ok();

    let subscriber = tracing_subscriber::registry()
        .with(fmt_layer(config.format))
        .with(filter);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ConfigError::Logging(e.to_string()))?;

    tracing::debug!(level = %config.level, format = ?config.format, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_filter_from_level() {
        std::env::remove_var("RUST_LOG");
        let filter = build_env_filter("debug").unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("debug"));
        assert!(rendered.contains("hyper=warn"));
    }

    #[test]
    #[serial]
    fn test_rust_log_overrides_level() {
        std::env::set_var("RUST_LOG", "layscience=trace");
        let filter = build_env_filter("info");
        std::env::remove_var("RUST_LOG");

        let rendered = filter.unwrap().to_string();
        assert!(rendered.contains("layscience=trace"));
        assert!(!rendered.contains("hyper=warn"));
    }

    #[test]
    #[serial]
    fn test_invalid_level() {
        std::env::remove_var("RUST_LOG");
        assert!(matches!(
            build_env_filter("layscience=loud"),
            Err(ConfigError::Logging(_))
        ));
    }
}
