//! Tracing subscriber setup.

use reverie_core::config::GeneralConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::error::{AgentError, Result};

/// Install the global subscriber: `RUST_LOG` if set, otherwise the
/// configured level; `json` or human-readable text output.
///
/// # Errors
/// Returns [`AgentError::Config`] for an unknown format or if a global
/// subscriber is already installed.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let installed = match config.log_format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        "text" | "pretty" => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init(),
        other => return Err(AgentError::Config(format!("unknown log format '{other}'"))),
    };
    installed
        .map_err(|e| AgentError::Config(format!("failed to initialize tracing subscriber: {e}")))?;

    tracing::info!(level = %config.log_level, format = %config.log_format, "Tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_format_is_rejected() {
        let config = GeneralConfig {
            log_level: "info".into(),
            log_format: "xml".into(),
        };
        assert!(matches!(init_tracing(&config), Err(AgentError::Config(_))));
    }
}
