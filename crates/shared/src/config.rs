//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Analytics engine configuration.
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Analytics engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    /// IANA timezone used for local day, week and month boundaries.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Combined event count at which per-bucket aggregation goes parallel.
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_parallel_threshold() -> usize {
    10_000
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            parallel_threshold: default_parallel_threshold(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_filter() -> String {
    "haven=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Sources, later ones winning: `config/default`, `config/{RUN_MODE}`,
    /// then `HAVEN__SECTION__KEY` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("HAVEN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Loads `.env` (if present) and then the layered configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load_with_dotenv() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        Self::load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.analytics.timezone, "UTC");
        assert_eq!(config.analytics.parallel_threshold, 10_000);
        assert_eq!(config.logging.filter, "haven=info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_load_without_sources_uses_defaults() {
        temp_env::with_vars_unset(
            [
                "HAVEN__ANALYTICS__TIMEZONE",
                "HAVEN__ANALYTICS__PARALLEL_THRESHOLD",
                "HAVEN__LOGGING__FILTER",
                "HAVEN__LOGGING__JSON",
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.analytics.timezone, "UTC");
                assert_eq!(config.analytics.parallel_threshold, 10_000);
            },
        );
    }

    #[test]
    fn test_load_from_environment() {
        temp_env::with_vars(
            [
                ("HAVEN__ANALYTICS__TIMEZONE", Some("America/New_York")),
                ("HAVEN__ANALYTICS__PARALLEL_THRESHOLD", Some("64")),
                ("HAVEN__LOGGING__JSON", Some("true")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.analytics.timezone, "America/New_York");
                assert_eq!(config.analytics.parallel_threshold, 64);
                assert!(config.logging.json);
                assert_eq!(config.logging.filter, "haven=info");
            },
        );
    }

    #[test]
    fn test_load_with_dotenv_keeps_process_environment() {
        temp_env::with_vars(
            [
                ("HAVEN__ANALYTICS__TIMEZONE", Some("Europe/London")),
                ("HAVEN__ANALYTICS__PARALLEL_THRESHOLD", None),
            ],
            || {
                let config = AppConfig::load_with_dotenv().unwrap();
                assert_eq!(config.analytics.timezone, "Europe/London");
                assert_eq!(config.analytics.parallel_threshold, 10_000);
            },
        );
    }
}
