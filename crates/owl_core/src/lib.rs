//! # Owl Core
//!
//! Shared infrastructure for game-server plugins: one place to find
//! components and services, and one bus to talk over.
//!
//! ## Core Features
//!
//! - **Component Registry**: string-keyed, lifecycle-managed components with
//!   checked typed lookup
//! - **Service Locator**: services addressed by their concrete type or by id
//! - **Event Bus**: type-keyed publish/subscribe with asynchronous,
//!   failure-isolated dispatch on a worker pool
//! - **Plugins and Commands**: ordered plugin enable/disable and a text
//!   command map
//! - **Config and Logging**: YAML configs with dotted paths and per-component
//!   loggers over `tracing`
//!
//! Everything hangs off an [`OwlContext`], built once by the host and cloned
//! into every plugin.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use owl_core::{ListenerError, OwlContext};
//!
//! struct PlayerJoined {
//!     name: String,
//! }
//!
//! fn main() -> owl_core::Result<()> {
//!     let ctx = OwlContext::builder("plugins/Owl")
//!         .server_version("1.20.4")
//!         .build();
//!     ctx.enable()?;
//!
//!     ctx.events().subscribe("greeter", |event: &PlayerJoined| {
//!         println!("Welcome, {}!", event.name);
//!         Ok::<(), ListenerError>(())
//!     })?;
//!     ctx.events().publish(PlayerJoined { name: "Steve".into() })?;
//!
//!     ctx.disable();
//!     Ok(())
//! }
//! ```

pub mod command;
pub mod component;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod logging;
pub mod plugin;
pub mod service;
pub mod version;


pub use command::{Command, CommandMap, CommandResult};
pub use component::{Component, ComponentRegistry, InitFlag};
pub use config::{ConfigManager, YamlConfig};
pub use context::{OwlContext, OwlContextBuilder};
pub use error::{ListenerError, OwlError};
pub use event::{
    DrainReport, Event, EventBus, EventBusConfig, EventListener, EventStats, FnListener, ListenerId,
};
pub use logging::{LoggerFactory, OwlLogger};
pub use plugin::{Configurable, OwlPlugin, PluginManager, PluginState};
pub use service::{Service, ServiceLocator, ServiceStatus};
pub use version::compare_versions;

/// Result type used throughout the core
pub type Result<T> = std::result::Result<T, OwlError>;

/// Version of this library
pub const OWL_VERSION: &str = env!("CARGO_PKG_VERSION");
