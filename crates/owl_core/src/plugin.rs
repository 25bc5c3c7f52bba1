//! Plugins built on the core and the manager that drives their lifecycle.

use crate::component::{shutdown_isolated, Component};
use crate::config::ConfigManager;
use crate::context::OwlContext;
use crate::error::{panic_message, OwlError};
use crate::Result;
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Something with its own configuration. Every hook defaults to success.
pub trait Configurable {
    /// Load configuration, from `path` when given or the default location
    /// otherwise.
    fn load_config(&self, _config: &ConfigManager, _path: Option<&str>) -> Result<()> {
        Ok(())
    }

    /// Persist the current settings.
    fn save_config(&self, _config: &ConfigManager) -> Result<()> {
        Ok(())
    }

    /// Overwrite the stored configuration with the bundled defaults.
    fn reset_to_default_config(&self, _config: &ConfigManager) -> Result<()> {
        Ok(())
    }

    /// Whether the loaded settings are usable.
    fn validate_config(&self) -> bool {
        true
    }
}

/// A plugin: a named, versioned bundle of components that hooks into the
/// core when enabled.
pub trait OwlPlugin: Configurable + Send + Sync + 'static {
    /// Unique plugin identifier
    fn id(&self) -> &str;

    /// Plugin version, e.g. "1.2.0"
    fn version(&self) -> &str;

    /// The plugin's own components, in initialization order. Called once per
    /// enable.
    fn components(&self, ctx: &OwlContext) -> Vec<Arc<dyn Component>>;

    /// Runs after every component is up. Register services, listeners and
    /// commands here.
    fn on_enable(&self, _ctx: &OwlContext) -> Result<()> {
        Ok(())
    }

    /// Runs before the plugin's components are shut down. Also runs when
    /// `on_enable` fails, so it must cope with a partial setup.
    fn on_disable(&self, _ctx: &OwlContext) -> Result<()> {
        Ok(())
    }
}

/// Lifecycle state of a managed plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    /// Added but never enabled
    Loaded,
    /// Components up and `on_enable` succeeded
    Enabled,
    /// The last enable attempt failed and was rolled back
    Failed,
    /// Disabled by `disable_all`
    Disabled,
}

struct PluginEntry {
    plugin: Arc<dyn OwlPlugin>,
    state: PluginState,
    components: Vec<Arc<dyn Component>>,
}

/// Enables plugins in the order they were added and disables them in
/// reverse.
///
/// Plugin hooks run without the manager's lock held, so they may query the
/// manager (for example `is_plugin_enabled`) while being enabled.
#[derive(Default)]
pub struct PluginManager {
    entries: RwLock<Vec<PluginEntry>>,
}

impl PluginManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin. Ids must be unique.
    pub fn add(&self, plugin: Arc<dyn OwlPlugin>) -> Result<()> {
        let mut entries = self.entries.write();
        if entries.iter().any(|e| e.plugin.id() == plugin.id()) {
            return Err(OwlError::PluginFailed {
                id: plugin.id().to_string(),
                reason: "a plugin with this id is already loaded".to_string(),
            });
        }
        info!("🔌 Loaded plugin: {} v{}", plugin.id(), plugin.version());
        entries.push(PluginEntry {
            plugin,
            state: PluginState::Loaded,
            components: Vec::new(),
        });
        Ok(())
    }

    /// Enable every plugin not already enabled. A failing plugin is logged
    /// and marked failed; the others still enable. Returns how many were
    /// enabled by this call.
    pub fn enable_all(&self, ctx: &OwlContext) -> usize {
        let pending: Vec<Arc<dyn OwlPlugin>> = self
            .entries
            .read()
            .iter()
            .filter(|e| e.state != PluginState::Enabled)
            .map(|e| e.plugin.clone())
            .collect();

        info!("🔧 Enabling {} plugin(s)", pending.len());
        let mut enabled = 0;
        for plugin in pending {
            let (state, components) = match enable_plugin(plugin.as_ref(), ctx) {
                Ok(components) => {
                    info!("✅ Plugin '{}' enabled", plugin.id());
                    enabled += 1;
                    (PluginState::Enabled, components)
                }
                Err(e) => {
                    error!("❌ Failed to enable plugin '{}': {}", plugin.id(), e);
                    (PluginState::Failed, Vec::new())
                }
            };
            self.set_state(plugin.id(), state, components);
        }
        enabled
    }

    /// Disable enabled plugins in reverse add order: `on_disable` first,
    /// then the plugin's components in reverse initialization order.
    /// Failures are logged and never stop the sweep.
    pub fn disable_all(&self, ctx: &OwlContext) {
        let enabled: Vec<(Arc<dyn OwlPlugin>, Vec<Arc<dyn Component>>)> = self
            .entries
            .write()
            .iter_mut()
            .filter(|e| e.state == PluginState::Enabled)
            .map(|e| (e.plugin.clone(), std::mem::take(&mut e.components)))
            .collect();

        for (plugin, components) in enabled.into_iter().rev() {
            info!("🛑 Disabling plugin: {}", plugin.id());
            run_on_disable(plugin.as_ref(), ctx);
            release_components(&components, ctx);
            self.set_state(plugin.id(), PluginState::Disabled, Vec::new());
        }
    }

    /// Current state of a plugin, or `None` if it was never added.
    pub fn state(&self, id: &str) -> Option<PluginState> {
        self.entries
            .read()
            .iter()
            .find(|e| e.plugin.id() == id)
            .map(|e| e.state)
    }

    pub fn is_plugin_enabled(&self, id: &str) -> bool {
        self.state(id) == Some(PluginState::Enabled)
    }

    /// Version of an enabled plugin.
    pub fn plugin_version(&self, id: &str) -> Option<String> {
        self.entries
            .read()
            .iter()
            .find(|e| e.plugin.id() == id && e.state == PluginState::Enabled)
            .map(|e| e.plugin.version().to_string())
    }

    /// Ids of enabled plugins, in add order.
    pub fn enabled_plugins(&self) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.state == PluginState::Enabled)
            .map(|e| e.plugin.id().to_string())
            .collect()
    }

    /// Number of added plugins, whatever their state.
    pub fn plugin_count(&self) -> usize {
        self.entries.read().len()
    }

    fn set_state(&self, id: &str, state: PluginState, components: Vec<Arc<dyn Component>>) {
        if let Some(entry) = self.entries.write().iter_mut().find(|e| e.plugin.id() == id) {
            entry.state = state;
            entry.components = components;
        }
    }
}

/// Load config, bring up and register components, then run `on_enable`.
/// On failure everything this call brought up is torn down again.
fn enable_plugin(plugin: &dyn OwlPlugin, ctx: &OwlContext) -> Result<Vec<Arc<dyn Component>>> {
    let id = plugin.id().to_string();
    let failed = |reason: String| OwlError::PluginFailed {
        id: id.clone(),
        reason,
    };

    plugin
        .load_config(ctx.config(), None)
        .map_err(|e| failed(format!("could not load configuration: {e}")))?;
    if !plugin.validate_config() {
        return Err(failed("configuration is invalid".to_string()));
    }

    let mut started: Vec<Arc<dyn Component>> = Vec::new();
    for component in plugin.components(ctx) {
        let outcome = catch_unwind(AssertUnwindSafe(|| component.initialize()))
            .unwrap_or_else(|payload| Err(OwlError::component(component.id(), panic_message(&*payload))))
            .and_then(|()| ctx.registry().register(component.clone()));
        if let Err(e) = outcome {
            // The failed component may be half-initialized; give it a chance to clean up.
            started.push(component);
            release_components(&started, ctx);
            return Err(failed(e.to_string()));
        }
        started.push(component);
    }

    let hook = catch_unwind(AssertUnwindSafe(|| plugin.on_enable(ctx)))
        .unwrap_or_else(|payload| Err(failed(panic_message(&*payload))));
    if let Err(e) = hook {
        // Undo whatever on_enable registered before it failed.
        run_on_disable(plugin, ctx);
        release_components(&started, ctx);
        return Err(e);
    }
    Ok(started)
}

/// Run `on_disable`, logging an error or panic instead of propagating it.
fn run_on_disable(plugin: &dyn OwlPlugin, ctx: &OwlContext) {
    match catch_unwind(AssertUnwindSafe(|| plugin.on_disable(ctx))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Plugin '{}' failed in on_disable: {}", plugin.id(), e),
        Err(payload) => warn!(
            "Plugin '{}' panicked in on_disable: {}",
            plugin.id(),
            panic_message(&*payload)
        ),
    }
}

/// Shut down in reverse order and drop registry entries that still point at
/// these instances.
fn release_components(components: &[Arc<dyn Component>], ctx: &OwlContext) {
    for component in components.iter().rev() {
        shutdown_isolated("plugin component", component.as_ref());
        if let Ok(Some(current)) = ctx.registry().get(component.id()) {
            if Arc::ptr_eq(&current, component) {
                let _ = ctx.registry().unregister(component.id());
            }
        }
    }
}
