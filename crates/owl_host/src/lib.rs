//! # Owl Host
//!
//! Standalone process that hosts Owl plugins: CLI parsing, TOML host
//! configuration, logging setup and the application lifecycle.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration (owl.toml, created if missing)
//! owl_host
//!
//! # Override specific settings
//! owl_host --data-dir /srv/owl --workers 4 --log-level debug
//!
//! # JSON logging for production
//! owl_host --json-logs
//! ```
//!
//! ## Signal Handling
//!
//! The host shuts down gracefully on SIGINT (Ctrl+C) and SIGTERM. A second
//! signal exits immediately.

pub mod app;
pub mod cli;
pub mod config;
pub mod console;
pub mod logging;
pub mod signals;

use app::Application;
use cli::CliArgs;
use config::AppConfig;

pub use config::{EventSettings, HostSettings, LoggingSettings};

/// Parse arguments, load configuration, set up logging and run until a
/// shutdown signal arrives.
pub async fn init() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let mut config = AppConfig::load_from_file(&args.config_path).await?;
    let mut logging_settings = config.logging.clone();
    if let Some(level) = &args.log_level {
        logging_settings.level = level.clone();
    }
    logging_settings.json_format |= args.json_logs;

    if let Err(e) = logging::setup_logging(&logging_settings) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    config.logging = logging_settings;
    let app = Application::new(config, &args)?;
    app.run().await
}
