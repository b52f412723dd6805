//! Log subscriber setup
//!
//! Libraries only emit `tracing` events; the embedding binary calls
//! [`init_logging`] once at startup.

use tracing_subscriber::{
    Registry, filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::config::LoggingConfig;
use crate::error::{AuthError, AuthResult};

/// Install the global subscriber described by `config`
///
/// `RUST_LOG` takes precedence over `config.level`.
///
/// # Errors
///
/// Returns [`AuthError::Telemetry`] if the filter directive is invalid or a
/// global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> AuthResult<()> {
    let env_filter = build_filter(config)?;

    // Each combination is its own subscriber type
    if config.json && config.stderr {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .json();
        Registry::default()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| AuthError::Telemetry(e.to_string()))
    } else if config.json {
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .json();
        Registry::default()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| AuthError::Telemetry(e.to_string()))
    } else if config.stderr {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .pretty();
        Registry::default()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| AuthError::Telemetry(e.to_string()))
    } else {
        let fmt_layer = fmt::layer().with_target(true).pretty();
        Registry::default()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| AuthError::Telemetry(e.to_string()))
    }
}

fn build_filter(config: &LoggingConfig) -> AuthResult<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| AuthError::Telemetry(format!("invalid log level: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_from_config_level() {
        let config = LoggingConfig {
            level: "warden_auth=debug,audit::auth=info".to_string(),
            ..Default::default()
        };
        assert!(build_filter(&config).is_ok());
    }

    #[test]
    fn test_second_init_fails() {
        let config = LoggingConfig::default();
        // Another test may have installed a subscriber first; at most one wins.
        let first = init_logging(&config);
        let second = init_logging(&config);
        assert!(second.is_err());
        if let Err(e) = first {
            assert_eq!(e.code(), "TelemetryError");
        }
    }
}
