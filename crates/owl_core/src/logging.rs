//! Per-component loggers over `tracing`.
//!
//! Every record carries a `component` field so a host subscriber can filter
//! or format by origin. Debug output and error cause chains are only emitted
//! while the main config's `debug` flag is set.

use crate::config::ConfigManager;
use dashmap::DashMap;
use std::error::Error;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Hands out one cached [`OwlLogger`] per component name.
pub struct LoggerFactory {
    config: Arc<ConfigManager>,
    loggers: DashMap<String, Arc<OwlLogger>>,
}

impl LoggerFactory {
    /// Create a factory whose loggers read the debug flag from `config`.
    pub fn new(config: Arc<ConfigManager>) -> Self {
        Self {
            config,
            loggers: DashMap::new(),
        }
    }

    pub fn get_logger(&self, component: &str) -> Arc<OwlLogger> {
        self.loggers
            .entry(component.to_string())
            .or_insert_with(|| {
                Arc::new(OwlLogger {
                    component: component.to_string(),
                    config: self.config.clone(),
                })
            })
            .clone()
    }

    pub fn logger_count(&self) -> usize {
        self.loggers.len()
    }
}

/// Logger for one component. Records carry a `component` field; debug
/// output follows the `debug` flag in `config.yml`.
pub struct OwlLogger {
    component: String,
    config: Arc<ConfigManager>,
}

impl OwlLogger {
    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn is_debug_enabled(&self) -> bool {
        self.config.is_debug()
    }

    pub fn info(&self, message: &str) {
        info!(component = %self.component, "{}", message);
    }

    pub fn warning(&self, message: &str) {
        warn!(component = %self.component, "{}", message);
    }

    pub fn severe(&self, message: &str) {
        error!(component = %self.component, "{}", message);
    }

    /// Emitted at info level, tagged, and only in debug mode.
    pub fn debug(&self, message: &str) {
        if self.is_debug_enabled() {
            info!(component = %self.component, "[DEBUG] {}", message);
        }
    }

    /// Log `message` as severe. In debug mode the cause chain of `err` is
    /// logged after it, one line per source.
    pub fn error(&self, message: &str, err: Option<&(dyn Error + 'static)>) {
        error!(component = %self.component, "{}", message);
        let Some(err) = err else {
            return;
        };
        if !self.is_debug_enabled() {
            return;
        }
        let mut cause = Some(err);
        while let Some(current) = cause {
            error!(component = %self.component, "  caused by: {}", current);
            cause = current.source();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OwlError;
    use tempfile::TempDir;

    #[test]
    fn test_loggers_are_cached_per_component() {
        let dir = TempDir::new().unwrap();
        let factory = LoggerFactory::new(Arc::new(ConfigManager::new(dir.path())));

        let a = factory.get_logger("Storage");
        let b = factory.get_logger("Storage");
        let c = factory.get_logger("Network");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(a.component(), "Storage");
        assert_eq!(factory.logger_count(), 2);
    }

    #[test]
    fn test_debug_follows_config_flag() {
        let dir = TempDir::new().unwrap();
        let config = Arc::new(ConfigManager::new(dir.path()));
        let logger = LoggerFactory::new(config.clone()).get_logger("Test");

        assert!(!logger.is_debug_enabled());
        config.set_value("debug", true).unwrap();
        assert!(logger.is_debug_enabled());

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = OwlError::from(io);
        logger.debug("visible now");
        logger.error("save failed", Some(&err as &(dyn Error + 'static)));
        logger.error("no cause", None);
    }
}
