//! The shared handle a host builds once and passes to every plugin.

use crate::command::CommandMap;
use crate::component::ComponentRegistry;
use crate::config::ConfigManager;
use crate::event::{EventBus, EventBusConfig};
use crate::logging::{LoggerFactory, OwlLogger};
use crate::plugin::PluginManager;
use crate::service::ServiceLocator;
use crate::version::is_version_at_least;
use crate::{Result, OWL_VERSION};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Builder for [`OwlContext`].
pub struct OwlContextBuilder {
    data_folder: PathBuf,
    server_version: String,
    event_bus: EventBusConfig,
    default_config: Option<String>,
}

impl OwlContextBuilder {
    /// Version of the hosting server, used by version checks.
    pub fn server_version(mut self, version: impl Into<String>) -> Self {
        self.server_version = version.into();
        self
    }

    pub fn event_bus(mut self, config: EventBusConfig) -> Self {
        self.event_bus = config;
        self
    }

    /// Contents written to `config.yml` when the data folder has none.
    pub fn default_config(mut self, contents: impl Into<String>) -> Self {
        self.default_config = Some(contents.into());
        self
    }

    pub fn build(self) -> OwlContext {
        let config = Arc::new(ConfigManager::new(self.data_folder));
        if let Some(contents) = self.default_config {
            config.register_default_resource(crate::config::MAIN_CONFIG, contents);
        }
        OwlContext {
            loggers: Arc::new(LoggerFactory::new(config.clone())),
            config,
            registry: Arc::new(ComponentRegistry::new()),
            events: Arc::new(EventBus::with_config(self.event_bus)),
            services: Arc::new(ServiceLocator::new()),
            plugins: Arc::new(PluginManager::new()),
            commands: Arc::new(CommandMap::new()),
            server_version: Arc::from(self.server_version),
            enabled: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Owns the config, registry, event bus and service locator. Cloning is
/// cheap and every clone shares the same instances.
#[derive(Clone)]
pub struct OwlContext {
    config: Arc<ConfigManager>,
    loggers: Arc<LoggerFactory>,
    registry: Arc<ComponentRegistry>,
    events: Arc<EventBus>,
    services: Arc<ServiceLocator>,
    plugins: Arc<PluginManager>,
    commands: Arc<CommandMap>,
    server_version: Arc<str>,
    enabled: Arc<AtomicBool>,
}

impl OwlContext {
    pub fn builder(data_folder: impl Into<PathBuf>) -> OwlContextBuilder {
        OwlContextBuilder {
            data_folder: data_folder.into(),
            server_version: "0.0.0".to_string(),
            event_bus: EventBusConfig::default(),
            default_config: None,
        }
    }

    /// Bring the core up: write the default `config.yml` if missing, load
    /// it, then initialize the registry, the event bus and the service
    /// locator in that order.
    pub fn enable(&self) -> Result<()> {
        self.config.save_default_config()?;
        self.config.reload_main_config()?;

        self.registry.initialize();
        if let Err(e) = self.events.initialize() {
            self.registry.shutdown();
            return Err(e);
        }
        self.services.initialize();

        self.enabled.store(true, Ordering::Release);
        info!("🦉 OwlLib has been enabled! Version: {}", OWL_VERSION);
        Ok(())
    }

    /// Tear the core down in reverse: service locator, event bus, component
    /// registry. Commands are dropped too. Does nothing unless enabled.
    pub fn disable(&self) {
        if !self.enabled.swap(false, Ordering::AcqRel) {
            return;
        }
        self.services.shutdown();
        if let Some(report) = self.events.shutdown() {
            if !report.is_complete() {
                info!("{} event worker(s) were detached", report.detached);
            }
        }
        self.registry.shutdown();
        self.commands.clear();
        info!("🦉 OwlLib has been disabled!");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &ConfigManager {
        &self.config
    }

    pub fn config_arc(&self) -> Arc<ConfigManager> {
        self.config.clone()
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn services(&self) -> &ServiceLocator {
        &self.services
    }

    pub fn plugins(&self) -> &PluginManager {
        &self.plugins
    }

    pub fn commands(&self) -> &CommandMap {
        &self.commands
    }

    /// Cached logger for `component`.
    pub fn logger(&self, component: &str) -> Arc<OwlLogger> {
        self.loggers.get_logger(component)
    }

    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    /// Whether the host server is at `required` or newer.
    pub fn is_server_version_at_least(&self, required: &str) -> bool {
        is_version_at_least(&self.server_version, required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAIN_CONFIG;
    use tempfile::TempDir;

    #[test]
    fn test_enable_writes_default_config_and_initializes_in_order() {
        let dir = TempDir::new().unwrap();
        let ctx = OwlContext::builder(dir.path())
            .default_config("debug: true\n")
            .build();
        assert!(!ctx.registry().is_initialized());

        ctx.enable().unwrap();
        assert!(dir.path().join(MAIN_CONFIG).exists());
        assert!(ctx.config().is_debug());
        assert!(ctx.is_enabled());
        assert!(ctx.registry().is_initialized());
        assert!(ctx.events().is_initialized());
        assert!(ctx.services().is_initialized());

        ctx.disable();
        assert!(!ctx.is_enabled());
        assert!(!ctx.registry().is_initialized());
        assert!(!ctx.events().is_initialized());
        assert!(!ctx.services().is_initialized());
    }

    #[test]
    fn test_disable_without_enable_is_noop() {
        let dir = TempDir::new().unwrap();
        let ctx = OwlContext::builder(dir.path()).build();
        ctx.disable();
        assert!(!ctx.is_enabled());
        assert!(!dir.path().join(MAIN_CONFIG).exists());
    }

    #[test]
    fn test_clones_share_state() {
        let dir = TempDir::new().unwrap();
        let ctx = OwlContext::builder(dir.path()).build();
        let other = ctx.clone();
        ctx.enable().unwrap();
        assert!(other.is_enabled());
        assert!(other.events().is_initialized());
        other.disable();
        assert!(!ctx.registry().is_initialized());
    }

    #[test]
    fn test_server_version_checks() {
        let dir = TempDir::new().unwrap();
        let ctx = OwlContext::builder(dir.path())
            .server_version("1.20.4-R0.1-SNAPSHOT")
            .build();
        assert_eq!(ctx.server_version(), "1.20.4-R0.1-SNAPSHOT");
        assert!(ctx.is_server_version_at_least("1.20"));
        assert!(ctx.is_server_version_at_least("1.20.4"));
        assert!(!ctx.is_server_version_at_least("1.21"));
    }

    #[test]
    fn test_loggers_come_from_one_factory() {
        let dir = TempDir::new().unwrap();
        let ctx = OwlContext::builder(dir.path()).build();
        assert!(Arc::ptr_eq(&ctx.logger("A"), &ctx.clone().logger("A")));
    }
}
