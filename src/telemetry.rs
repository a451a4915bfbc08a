//! Tracing subscriber setup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::{HeddleError, Result};

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins over `config.level` when set. With `config.json` the
/// output is one JSON object per line, including the current span and the
/// span list, for log shippers.
///
/// # Errors
///
/// Returns [`HeddleError::Config`] if the filter directive is invalid or a
/// global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| HeddleError::Config(format!("invalid log level {:?}: {}", config.level, e)))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json {
        registry
            .with(fmt::layer().json().with_current_span(true).with_span_list(true))
            .try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };

    result.map_err(|e| HeddleError::Config(format!("failed to install tracing subscriber: {}", e)))?;
    tracing::debug!(json = config.json, "tracing initialized");
    Ok(())
}
