//! Configuration management
//!
//! All settings come from the environment (optionally seeded from a `.env`
//! file). Every value has a default so a bare `tdk-server` starts against a
//! local database and its own endpoints.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::db::DbConfig;

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
pub const DEFAULT_SERVER_PORT: u16 = 5000;
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_INPUT_DIR: &str = "./data/input";
pub const DEFAULT_DSV_FILENAME: &str = "RAW DATA.dsv";
pub const DEFAULT_OUTPUT_DIR: &str = "./data/output";
pub const DEFAULT_TARGET_TABLE: &str = "C_DUNS_V";

pub const DEFAULT_HEALTH_MAX_RETRIES: u32 = 30;
pub const DEFAULT_HEALTH_RETRY_DELAY_SECS: u64 = 2;
/// Downstream stage calls may legitimately take minutes on large files.
pub const DEFAULT_TRIGGER_TIMEOUT_SECS: u64 = 300;

/// Complete process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DbConfig,
    pub pipeline: PipelineSettings,
    pub scheduler: SchedulerSettings,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// File locations and the Target Table name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    pub input_dir: PathBuf,
    pub dsv_filename: String,
    pub output_dir: PathBuf,
    pub table_name: String,
}

impl PipelineSettings {
    /// Full path of the DSV file consumed by ingestion
    pub fn input_path(&self) -> PathBuf {
        self.input_dir.join(&self.dsv_filename)
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            dsv_filename: DEFAULT_DSV_FILENAME.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            table_name: DEFAULT_TARGET_TABLE.to_string(),
        }
    }
}

/// Orchestrator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    pub ingestion_url: String,
    pub export_url: String,
    pub run_on_startup: bool,
    pub hour: u32,
    pub minute: u32,
    pub health_max_retries: u32,
    pub health_retry_delay_secs: u64,
    pub trigger_timeout_secs: u64,
}

impl SchedulerSettings {
    pub fn health_retry_delay(&self) -> Duration {
        Duration::from_secs(self.health_retry_delay_secs)
    }

    pub fn trigger_timeout(&self) -> Duration {
        Duration::from_secs(self.trigger_timeout_secs)
    }
}

/// Stage endpoint on this process's own listener
pub fn local_stage_url(port: u16, route: &str) -> String {
    format!("http://127.0.0.1:{}/{}", port, route)
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            ingestion_url: local_stage_url(DEFAULT_SERVER_PORT, "ingest"),
            export_url: local_stage_url(DEFAULT_SERVER_PORT, "export"),
            run_on_startup: true,
            hour: 0,
            minute: 0,
            health_max_retries: DEFAULT_HEALTH_MAX_RETRIES,
            health_retry_delay_secs: DEFAULT_HEALTH_RETRY_DELAY_SECS,
            trigger_timeout_secs: DEFAULT_TRIGGER_TIMEOUT_SECS,
        }
    }
}

/// Read an environment variable, treating unset and empty the same way
pub(crate) fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Read and parse an environment variable, falling back on absence or parse failure
pub(crate) fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_string(key)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// `true`, `1` and `yes` (any case) enable a flag; anything else disables it
pub(crate) fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

impl Config {
    /// Load configuration from `.env`, the environment, and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_env();
        config.validate()?;

        Ok(config)
    }

    /// Build configuration from the current environment without validation
    pub fn from_env() -> Self {
        let port = env_parse("TDK_PORT", DEFAULT_SERVER_PORT);

        Config {
            server: ServerConfig {
                host: env_string("TDK_HOST").unwrap_or_else(|| DEFAULT_SERVER_HOST.to_string()),
                port,
                shutdown_timeout_secs: env_parse(
                    "TDK_SHUTDOWN_TIMEOUT",
                    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                ),
            },
            database: DbConfig::from_env(),
            pipeline: PipelineSettings {
                input_dir: env_string("INPUT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT_DIR)),
                dsv_filename: env_string("DSV_FILENAME")
                    .unwrap_or_else(|| DEFAULT_DSV_FILENAME.to_string()),
                output_dir: env_string("OUTPUT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
                table_name: env_string("TARGET_TABLE")
                    .unwrap_or_else(|| DEFAULT_TARGET_TABLE.to_string()),
            },
            scheduler: SchedulerSettings {
                // Unset URLs point at this process's own stage routes
                ingestion_url: env_string("INGESTION_URL")
                    .unwrap_or_else(|| local_stage_url(port, "ingest")),
                export_url: env_string("EXPORT_URL")
                    .unwrap_or_else(|| local_stage_url(port, "export")),
                run_on_startup: env_string("RUN_ON_STARTUP")
                    .map(|v| parse_flag(&v))
                    .unwrap_or(true),
                hour: env_parse("SCHEDULER_HOUR", 0),
                minute: env_parse("SCHEDULER_MINUTE", 0),
                health_max_retries: env_parse("HEALTH_MAX_RETRIES", DEFAULT_HEALTH_MAX_RETRIES),
                health_retry_delay_secs: env_parse(
                    "HEALTH_RETRY_DELAY_SECS",
                    DEFAULT_HEALTH_RETRY_DELAY_SECS,
                ),
                trigger_timeout_secs: env_parse(
                    "TRIGGER_TIMEOUT_SECS",
                    DEFAULT_TRIGGER_TIMEOUT_SECS,
                ),
            },
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.pipeline.dsv_filename.trim().is_empty() {
            anyhow::bail!("DSV filename cannot be empty");
        }

        if self.pipeline.table_name.trim().is_empty() {
            anyhow::bail!("Target table name cannot be empty");
        }

        if self.scheduler.hour > 23 {
            anyhow::bail!("SCHEDULER_HOUR must be between 0 and 23, got {}", self.scheduler.hour);
        }

        if self.scheduler.minute > 59 {
            anyhow::bail!(
                "SCHEDULER_MINUTE must be between 0 and 59, got {}",
                self.scheduler.minute
            );
        }

        if self.scheduler.health_max_retries == 0 {
            anyhow::bail!("HEALTH_MAX_RETRIES must be at least 1");
        }

        self.database.validate()?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            database: DbConfig::default(),
            pipeline: PipelineSettings::default(),
            scheduler: SchedulerSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "TDK_PORT",
        "INPUT_DIR",
        "DSV_FILENAME",
        "RUN_ON_STARTUP",
        "SCHEDULER_HOUR",
        "SCHEDULER_MINUTE",
        "INGESTION_URL",
        "EXPORT_URL",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag("YES"));
        assert!(parse_flag(" 1 "));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("on"));
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.pipeline.input_path(),
            PathBuf::from("./data/input").join("RAW DATA.dsv")
        );
        assert!(config.scheduler.run_on_startup);
        assert_eq!(config.scheduler.trigger_timeout(), Duration::from_secs(300));
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        clear_env();
        std::env::set_var("TDK_PORT", "5001");
        std::env::set_var("INPUT_DIR", "/data/in");
        std::env::set_var("RUN_ON_STARTUP", "no");
        std::env::set_var("SCHEDULER_HOUR", "2");
        std::env::set_var("SCHEDULER_MINUTE", "30");
        std::env::set_var("INGESTION_URL", "http://data-ingestion:5001/ingest");

        let config = Config::from_env();
        assert_eq!(config.server.port, 5001);
        assert_eq!(config.pipeline.input_path(), PathBuf::from("/data/in/RAW DATA.dsv"));
        assert!(!config.scheduler.run_on_startup);
        assert_eq!(config.scheduler.hour, 2);
        assert_eq!(config.scheduler.minute, 30);
        assert_eq!(config.scheduler.ingestion_url, "http://data-ingestion:5001/ingest");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_stage_urls_follow_listener_port() {
        clear_env();
        std::env::set_var("TDK_PORT", "8080");

        let config = Config::from_env();
        assert_eq!(config.scheduler.ingestion_url, "http://127.0.0.1:8080/ingest");
        assert_eq!(config.scheduler.export_url, "http://127.0.0.1:8080/export");

        std::env::set_var("EXPORT_URL", "http://data-export:5002/export");
        let config = Config::from_env();
        assert_eq!(config.scheduler.ingestion_url, "http://127.0.0.1:8080/ingest");
        assert_eq!(config.scheduler.export_url, "http://data-export:5002/export");

        clear_env();
    }

    #[test]
    fn test_default_stage_urls_use_default_port() {
        let settings = SchedulerSettings::default();
        assert_eq!(settings.ingestion_url, "http://127.0.0.1:5000/ingest");
        assert_eq!(settings.export_url, "http://127.0.0.1:5000/export");
    }

    #[test]
    #[serial]
    fn test_malformed_numbers_fall_back_to_defaults() {
        clear_env();
        std::env::set_var("TDK_PORT", "not-a-port");
        std::env::set_var("SCHEDULER_HOUR", "midnight");

        let config = Config::from_env();
        assert_eq!(config.server.port, DEFAULT_SERVER_PORT);
        assert_eq!(config.scheduler.hour, 0);

        clear_env();
    }

    #[test]
    fn test_validate_rejects_out_of_range_schedule() {
        let mut config = Config::default();
        config.scheduler.hour = 24;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.scheduler.minute = 60;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.scheduler.health_max_retries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_names() {
        let mut config = Config::default();
        config.pipeline.dsv_filename = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.pipeline.table_name = String::new();
        assert!(config.validate().is_err());
    }
}
