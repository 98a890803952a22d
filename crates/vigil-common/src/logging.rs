//! Logging configuration for the agent.
//!
//! An injected agent has no terminal of its own, so the defaults are quiet:
//! level `warn`, no ANSI, no timestamps. `RUST_LOG` overrides the level.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level as string
    #[serde(default = "default_level")]
    pub level: String,

    /// Use ANSI colors
    #[serde(default)]
    pub ansi: bool,

    /// Include module target
    #[serde(default = "default_true")]
    pub show_target: bool,

    /// Include timestamps
    #[serde(default)]
    pub timestamps: bool,
}

fn default_true() -> bool {
    true
}

fn default_level() -> String {
    "warn".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            ansi: false,
            show_target: true,
            timestamps: false,
        }
    }
}

impl LogConfig {
    /// Verbose configuration for interactive debugging of the agent itself
    pub fn debug() -> Self {
        Self {
            level: "debug".to_string(),
            timestamps: true,
            ..Default::default()
        }
    }

    pub fn with_level(mut self, level: &str) -> Self {
        self.level = level.to_string();
        self
    }
}

/// Initialize logging with the given configuration.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_logging(config: &LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(config.show_target);

    let installed = if config.timestamps {
        builder.try_init()
    } else {
        builder.without_time().try_init()
    };

    if installed.is_err() {
        tracing::debug!(target: "vigil_common::logging", "Subscriber already installed");
    }
}

/// Initialize logging with agent defaults.
pub fn init_agent_logging() {
    init_logging(&LogConfig::default());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_quiet() {
        let config = LogConfig::default();
        assert_eq!(config.level, "warn");
        assert!(!config.ansi);
        assert!(!config.timestamps);
    }

    #[test]
    fn test_config_from_json_fills_defaults() {
        let config: LogConfig = serde_json::from_str(r#"{"level": "trace"}"#).unwrap();
        assert_eq!(config.level, "trace");
        assert!(config.show_target);
        assert!(!config.ansi);
    }

    #[test]
    fn test_with_level() {
        let config = LogConfig::default().with_level("info");
        assert_eq!(config.level, "info");
    }
}
