//! Application lifecycle: build the context, enable plugins, wait for a
//! shutdown signal, tear everything down.

use crate::cli::CliArgs;
use crate::config::AppConfig;
use crate::console::spawn_console;
use crate::logging::display_banner;
use crate::signals::{wait_for_shutdown_signal, wait_for_shutdown_signal_silent};
use owl_core::OwlContext;
use plugin_greeter::GreeterPlugin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Default contents of the core's `config.yml`
const DEFAULT_MAIN_CONFIG: &str = "\
# Owl core settings
# Enables [DEBUG] lines and error cause chains in plugin logs
debug: false
";

/// The running host: validated configuration plus the core context
pub struct Application {
    /// Host configuration with CLI overrides applied
    config: AppConfig,
    /// Core context shared with plugins, the console and the monitor task
    ctx: OwlContext,
}

impl Application {
    /// Build the application from an already loaded configuration with the
    /// command-line overrides applied.
    pub fn new(mut config: AppConfig, args: &CliArgs) -> anyhow::Result<Self> {
        config.apply_cli(args);
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Configuration validation failed: {e}"))?;
        info!("✅ Configuration loaded and validated successfully");

        let ctx = OwlContext::builder(config.data_folder())
            .server_version(config.host.server_version.clone())
            .event_bus(config.to_event_bus_config())
            .default_config(DEFAULT_MAIN_CONFIG)
            .build();

        Ok(Self { config, ctx })
    }

    /// The core context this application drives.
    pub fn context(&self) -> &OwlContext {
        &self.ctx
    }

    /// Enable the core, then add and enable the bundled plugins.
    pub fn start(&self) -> anyhow::Result<()> {
        self.ctx.enable()?;
        self.ctx.plugins().add(Arc::new(GreeterPlugin::new()))?;

        let total = self.ctx.plugins().plugin_count();
        let enabled = self.ctx.plugins().enable_all(&self.ctx);
        info!("🎉 Plugin loading complete: {}/{} plugins enabled", enabled, total);
        Ok(())
    }

    /// Disable plugins in reverse order, then the core.
    pub fn stop(&self) {
        info!("🔌 Disabling plugins...");
        self.ctx.plugins().disable_all(&self.ctx);
        info!("🦉 Disabling core...");
        self.ctx.disable();
    }

    /// Start, serve until a shutdown signal, then stop and log final
    /// statistics. Plugins and the core are stopped on every path after
    /// `start` succeeds.
    pub async fn run(self) -> anyhow::Result<()> {
        display_banner();
        self.log_configuration_summary();
        self.start()?;

        let monitoring_handle = {
            let ctx = self.ctx.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));
                interval.tick().await;
                let mut last_published = 0u64;
                loop {
                    interval.tick().await;
                    let stats = ctx.events().stats();
                    info!(
                        "📊 System Health - {} events/min | {} listeners | {} plugins active",
                        stats.events_published - last_published,
                        stats.total_listeners,
                        ctx.plugins().enabled_plugins().len()
                    );
                    last_published = stats.events_published;
                }
            })
        };
        if let Err(e) = self.start_console(spawn_console) {
            monitoring_handle.abort();
            return Err(e);
        }

        info!("✅ Owl Host is now running! Type 'help' for console commands");
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        if let Err(e) = wait_for_shutdown_signal().await {
            monitoring_handle.abort();
            self.stop();
            return Err(e.into());
        }

        // A second signal skips the graceful path.
        tokio::spawn(async move {
            if let Err(e) = wait_for_shutdown_signal_silent().await {
                error!("Failed to set up forced shutdown signal handler: {e}");
                return;
            }
            warn!("Shutdown signal received again! Exiting immediately.");
            std::process::exit(1);
        });

        monitoring_handle.abort();

        // Shutdown waits on dispatch workers; keep it off the async threads.
        let app = Arc::new(self);
        let stopping = app.clone();
        tokio::task::spawn_blocking(move || stopping.stop()).await?;

        log_final_statistics(&app.ctx);
        info!("✅ Owl Host shutdown complete");
        Ok(())
    }

    /// Start the operator console; if it cannot start, stop what `start`
    /// brought up before reporting the error.
    fn start_console<F, T>(&self, spawn: F) -> anyhow::Result<T>
    where
        F: FnOnce(OwlContext) -> std::io::Result<T>,
    {
        spawn(self.ctx.clone()).map_err(|e| {
            self.stop();
            anyhow::anyhow!("Failed to start console: {e}")
        })
    }

    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("  📂 Data folder: {}", self.config.host.data_folder);
        info!("  🏷️ Server version: {}", self.config.host.server_version);
        info!(
            "  📡 Event workers: {} (drain timeout {}ms)",
            self.config.events.worker_threads, self.config.events.drain_timeout_ms
        );
    }
}

fn log_final_statistics(ctx: &OwlContext) {
    let stats = ctx.events().stats();
    info!("📊 Final Statistics:");
    info!("  - Events published: {}", stats.events_published);
    info!(
        "  - Dispatches: {} completed, {} failed",
        stats.dispatches_completed, stats.dispatches_failed
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn args(data_dir: &std::path::Path) -> CliArgs {
        CliArgs {
            config_path: PathBuf::from("owl.toml"),
            data_dir: Some(data_dir.to_path_buf()),
            log_level: None,
            json_logs: false,
            workers: Some(1),
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(Application::new(config, &args(dir.path())).is_err());
    }

    #[test]
    fn test_start_and_stop() {
        let dir = TempDir::new().unwrap();
        let app = Application::new(AppConfig::default(), &args(dir.path())).unwrap();
        assert_eq!(app.context().events().config().worker_threads, 1);

        app.start().unwrap();
        let ctx = app.context();
        assert!(ctx.is_enabled());
        assert!(dir.path().join("config.yml").exists());
        assert!(!ctx.config().is_debug());
        assert!(ctx.plugins().is_plugin_enabled("greeter"));
        assert!(ctx.is_server_version_at_least("1.20"));

        app.stop();
        assert!(!ctx.is_enabled());
        assert!(!ctx.plugins().is_plugin_enabled("greeter"));
        assert!(!ctx.registry().is_initialized());
    }

    #[test]
    fn test_console_failure_stops_everything() {
        let dir = TempDir::new().unwrap();
        let app = Application::new(AppConfig::default(), &args(dir.path())).unwrap();
        app.start().unwrap();

        let result = app.start_console(|_ctx| -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "no threads left"))
        });
        let err = result.unwrap_err();
        assert!(err.to_string().contains("no threads left"));
        assert!(!app.context().is_enabled());
        assert!(!app.context().plugins().is_plugin_enabled("greeter"));
    }
}
