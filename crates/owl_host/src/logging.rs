//! Logging system setup.

use crate::config::LoggingSettings;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn setup_logging(config: &LoggingSettings) -> anyhow::Result<()> {
    let log_level = config.level.as_str();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if config.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_names(true),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_names(true),
            )
            .try_init()?;
    }

    info!("🔧 Logging initialized with level: {}", log_level);
    Ok(())
}

/// Displays the startup banner.
pub fn display_banner() {
    info!("╔══════════════════════════════════════════╗");
    info!("║               🦉 OWL HOST 🦉             ║");
    info!("║  host v{:<10} core v{:<10}     ║", env!("CARGO_PKG_VERSION"), owl_core::OWL_VERSION);
    info!("║                                          ║");
    info!("║  🧩 Component Registry                   ║");
    info!("║  🔎 Service Locator                      ║");
    info!("║  📡 Asynchronous Event Bus               ║");
    info!("╚══════════════════════════════════════════╝");
}
