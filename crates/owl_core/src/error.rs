//! Error types for the Owl core

/// Main error type for the Owl core
#[derive(Debug, thiserror::Error)]
pub enum OwlError {
    /// Operation invoked before `initialize` (or after `shutdown`)
    #[error("{0} not initialized")]
    NotInitialized(&'static str),

    /// No component registered under the requested id
    #[error("Component not found: {0}")]
    ComponentNotFound(String),

    /// No service registered under the requested type or id
    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    /// The stored value is not of the type the caller asked for
    #[error("Type mismatch for '{id}': expected {expected}")]
    TypeMismatch { id: String, expected: &'static str },

    /// A custom config was used before being loaded
    #[error("Config '{0}' is not loaded")]
    ConfigNotLoaded(String),

    /// Invalid configuration value or layout
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML (de)serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A component lifecycle hook failed
    #[error("Component '{id}' failed: {reason}")]
    ComponentFailed { id: String, reason: String },

    /// A plugin lifecycle hook failed
    #[error("Plugin '{id}' failed: {reason}")]
    PluginFailed { id: String, reason: String },

    /// No command registered under the requested name
    #[error("Unknown command: {0}")]
    CommandNotFound(String),

    /// The dispatch worker pool rejected work
    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

impl OwlError {
    /// Shorthand for a component hook failure.
    pub fn component(id: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        OwlError::ComponentFailed {
            id: id.into(),
            reason: reason.to_string(),
        }
    }

    /// True for the "nothing registered under that key" family.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            OwlError::ComponentNotFound(_)
                | OwlError::ServiceNotFound(_)
                | OwlError::CommandNotFound(_)
        )
    }
}

/// Error returned by an event listener. Contained by the bus, never
/// surfaced to the publisher.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Handler execution failed
    #[error("Listener failed: {0}")]
    Failed(String),

    /// Handler rejected the event
    #[error("Listener rejected event: {0}")]
    Rejected(String),
}

impl ListenerError {
    pub fn failed(reason: impl std::fmt::Display) -> Self {
        ListenerError::Failed(reason.to_string())
    }
}

/// Turns a caught panic payload into something printable.
pub(crate) fn panic_message(panic_info: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "panicked with unknown payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_family() {
        assert!(OwlError::ServiceNotFound("economy".into()).is_not_found());
        assert!(OwlError::ComponentNotFound("chat".into()).is_not_found());
        assert!(!OwlError::NotInitialized("Event Bus").is_not_found());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            OwlError::NotInitialized("Service Locator").to_string(),
            "Service Locator not initialized"
        );
        let mismatch = OwlError::TypeMismatch {
            id: "chat".into(),
            expected: "ChatComponent",
        };
        assert_eq!(mismatch.to_string(), "Type mismatch for 'chat': expected ChatComponent");
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*payload), "bang");
        let payload: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(&*payload), "panicked with unknown payload");
    }
}
