//! Host configuration loaded from a TOML file.

use crate::cli::CliArgs;
use owl_core::EventBusConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

fn default_drain_timeout_ms() -> u64 {
    5000
}

fn default_worker_threads() -> usize {
    2
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Data folder and server identity
    #[serde(default)]
    pub host: HostSettings,
    /// Event bus dispatch settings
    #[serde(default)]
    pub events: EventSettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostSettings {
    /// Folder holding `config.yml` and plugin configs
    pub data_folder: String,
    /// Version reported to plugins for compatibility checks
    pub server_version: String,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            data_folder: "plugins/OwlLib".to_string(),
            server_version: "1.20.4".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSettings {
    /// Number of dispatch worker threads
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// How long shutdown waits for queued dispatches, in milliseconds
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Load from `path`, writing a default file first when none exists.
    pub async fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Fold command-line overrides into the file settings.
    pub fn apply_cli(&mut self, args: &CliArgs) {
        if let Some(data_dir) = &args.data_dir {
            self.host.data_folder = data_dir.to_string_lossy().to_string();
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if args.json_logs {
            self.logging.json_format = true;
        }
        if let Some(workers) = args.workers {
            self.events.worker_threads = workers;
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.host.data_folder.trim().is_empty() {
            return Err("Data folder cannot be empty".to_string());
        }

        if self.host.server_version.trim().is_empty() {
            return Err("Server version cannot be empty".to_string());
        }

        if self.events.worker_threads == 0 {
            return Err("events.worker_threads must be greater than 0".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }

    pub fn data_folder(&self) -> PathBuf {
        PathBuf::from(&self.host.data_folder)
    }

    pub fn to_event_bus_config(&self) -> EventBusConfig {
        EventBusConfig {
            worker_threads: self.events.worker_threads,
            drain_timeout: Duration::from_millis(self.events.drain_timeout_ms),
            ..EventBusConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.host.data_folder, "plugins/OwlLib");
        assert_eq!(config.host.server_version, "1.20.4");
        assert_eq!(config.events.worker_threads, 2);
        assert_eq!(config.events.drain_timeout_ms, 5000);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.events.worker_threads = 0;
        assert!(config.validate().is_err());

        config.events.worker_threads = 4;
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "warn".to_string();
        config.host.data_folder = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [events]
            worker_threads = 6
            "#,
        )
        .unwrap();
        assert_eq!(config.events.worker_threads, 6);
        assert_eq!(config.events.drain_timeout_ms, 5000);
        assert_eq!(config.host, HostSettings::default());
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = AppConfig::default();
        let args = CliArgs {
            config_path: PathBuf::from("owl.toml"),
            data_dir: Some(PathBuf::from("data")),
            log_level: Some("debug".to_string()),
            json_logs: true,
            workers: Some(3),
        };
        config.apply_cli(&args);
        assert_eq!(config.host.data_folder, "data");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
        assert_eq!(config.events.worker_threads, 3);

        let bus = config.to_event_bus_config();
        assert_eq!(bus.worker_threads, 3);
        assert_eq!(bus.drain_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_load_creates_default_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("owl.toml");

        let created = AppConfig::load_from_file(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(created, AppConfig::default());

        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded, created);
    }

    #[tokio::test]
    async fn test_load_rejects_malformed_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("owl.toml");
        tokio::fs::write(&path, "[events\nworker_threads = ").await.unwrap();
        assert!(AppConfig::load_from_file(&path).await.is_err());
    }
}
