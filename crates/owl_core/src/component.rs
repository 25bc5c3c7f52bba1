//! Components and the component registry.
//!
//! A component is any identifiable, lifecycle-managed unit. The registry maps
//! a string id to a shared component instance and owns shutdown of whatever
//! is registered with it.

use crate::error::{panic_message, OwlError};
use crate::Result;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

const REGISTRY: &str = "Component Registry";

/// Upcast helper so registries can hand back concrete types from
/// `Arc<dyn Component>` storage.
pub trait AsAny: Any + Send + Sync {
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Base trait for everything registered with the core.
///
/// Components are shared as `Arc<dyn Component>`, so lifecycle hooks take
/// `&self`; keep mutable state behind atomics or locks.
pub trait Component: AsAny {
    /// Unique identifier of the component
    fn id(&self) -> &str;

    /// Bring the component up
    fn initialize(&self) -> Result<()>;

    /// Tear the component down and release its resources
    fn shutdown(&self) -> Result<()>;

    /// Whether `initialize` has completed
    fn is_initialized(&self) -> bool;
}

/// Initialized flag for component implementations.
#[derive(Debug, Default)]
pub struct InitFlag(AtomicBool);

impl InitFlag {
    pub fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Sets the flag, returning `true` if it was previously clear.
    pub fn raise(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    /// Clears the flag, returning `true` if it was previously set.
    pub fn lower(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Runs a component's `shutdown`, containing both errors and panics.
///
/// Returns the failure reason so callers can count it; the failure is
/// already logged.
pub(crate) fn shutdown_isolated<C: Component + ?Sized>(kind: &str, component: &C) -> Option<String> {
    let id = component.id().to_string();
    match catch_unwind(AssertUnwindSafe(|| component.shutdown())) {
        Ok(Ok(())) => None,
        Ok(Err(e)) => {
            warn!("⚠️ Error shutting down {} '{}': {}", kind, id, e);
            Some(e.to_string())
        }
        Err(panic_info) => {
            let reason = panic_message(&*panic_info);
            warn!("⚠️ {} '{}' panicked during shutdown: {}", kind, id, reason);
            Some(reason)
        }
    }
}

/// Registry mapping component ids to instances.
pub struct ComponentRegistry {
    components: RwLock<Option<HashMap<String, Arc<dyn Component>>>>,
}

impl ComponentRegistry {
    /// Create a registry in the torn-down state
    pub fn new() -> Self {
        Self {
            components: RwLock::new(None),
        }
    }

    /// Allocate the component map. Re-initializing drops the previous map
    /// without shutting its components down.
    pub fn initialize(&self) {
        *self.components.write() = Some(HashMap::new());
        info!("🗂️ Component Registry initialized");
    }

    /// Whether the registry is accepting registrations.
    pub fn is_initialized(&self) -> bool {
        self.components.read().is_some()
    }

    /// Register a component under its id. An existing entry with the same id
    /// is replaced.
    pub fn register(&self, component: Arc<dyn Component>) -> Result<()> {
        let mut guard = self.components.write();
        let components = guard.as_mut().ok_or(OwlError::NotInitialized(REGISTRY))?;

        let id = component.id().to_string();
        if components.insert(id.clone(), component).is_some() {
            warn!("⚠️ Component with id '{}' already registered. Overwriting.", id);
        }
        info!("📝 Component '{}' registered", id);
        Ok(())
    }

    /// Remove a component without shutting it down.
    pub fn unregister(&self, id: &str) -> Result<Option<Arc<dyn Component>>> {
        let mut guard = self.components.write();
        let components = guard.as_mut().ok_or(OwlError::NotInitialized(REGISTRY))?;
        let removed = components.remove(id);
        if removed.is_some() {
            debug!("Component '{}' unregistered", id);
        }
        Ok(removed)
    }

    /// Untyped lookup.
    pub fn get(&self, id: &str) -> Result<Option<Arc<dyn Component>>> {
        let guard = self.components.read();
        let components = guard.as_ref().ok_or(OwlError::NotInitialized(REGISTRY))?;
        Ok(components.get(id).cloned())
    }

    /// Typed lookup. `Ok(None)` when nothing is registered under `id`,
    /// `TypeMismatch` when something is but it is not a `C`.
    pub fn get_component<C: Component>(&self, id: &str) -> Result<Option<Arc<C>>> {
        match self.get(id)? {
            None => Ok(None),
            Some(component) => component
                .into_any_arc()
                .downcast::<C>()
                .map(Some)
                .map_err(|_| OwlError::TypeMismatch {
                    id: id.to_string(),
                    expected: std::any::type_name::<C>(),
                }),
        }
    }

    /// Typed lookup that treats absence as an error.
    pub fn require_component<C: Component>(&self, id: &str) -> Result<Arc<C>> {
        self.get_component::<C>(id)?
            .ok_or_else(|| OwlError::ComponentNotFound(id.to_string()))
    }

    /// `false` when the registry is not initialized.
    pub fn has_component(&self, id: &str) -> bool {
        self.components
            .read()
            .as_ref()
            .is_some_and(|components| components.contains_key(id))
    }

    /// `0` when the registry is not initialized.
    pub fn component_count(&self) -> usize {
        self.components.read().as_ref().map_or(0, HashMap::len)
    }

    /// Sorted ids of every registered component.
    pub fn component_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .components
            .read()
            .as_ref()
            .map(|components| components.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Shut down every registered component and return to the
    /// pre-initialize state. Failures are logged and do not stop the
    /// remaining components. No-op when not initialized.
    pub fn shutdown(&self) {
        // Take the map out first so component shutdown hooks can call back
        // into the registry without deadlocking.
        let Some(components) = self.components.write().take() else {
            return;
        };

        let total = components.len();
        let failures = components
            .values()
            .filter_map(|component| shutdown_isolated("component", component.as_ref()))
            .count();

        if failures > 0 {
            warn!("⚠️ {} of {} components failed to shut down cleanly", failures, total);
        }
        info!("🗂️ Component Registry shut down ({} components)", total);
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Counter {
        id: String,
        init: InitFlag,
        shutdowns: Arc<AtomicUsize>,
        fail_shutdown: bool,
    }

    impl Counter {
        fn new(id: &str, shutdowns: Arc<AtomicUsize>) -> Self {
            Self {
                id: id.to_string(),
                init: InitFlag::new(),
                shutdowns,
                fail_shutdown: false,
            }
        }

        fn failing(id: &str, shutdowns: Arc<AtomicUsize>) -> Self {
            Self {
                fail_shutdown: true,
                ..Self::new(id, shutdowns)
            }
        }
    }

    impl Component for Counter {
        fn id(&self) -> &str {
            &self.id
        }

        fn initialize(&self) -> Result<()> {
            self.init.raise();
            Ok(())
        }

        fn shutdown(&self) -> Result<()> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            if self.fail_shutdown {
                return Err(OwlError::component(&self.id, "disk on fire"));
            }
            self.init.lower();
            Ok(())
        }

        fn is_initialized(&self) -> bool {
            self.init.get()
        }
    }

    struct Other;

    impl Component for Other {
        fn id(&self) -> &str {
            "other"
        }
        fn initialize(&self) -> Result<()> {
            Ok(())
        }
        fn shutdown(&self) -> Result<()> {
            panic!("other refuses to stop");
        }
        fn is_initialized(&self) -> bool {
            true
        }
    }

    fn counter(id: &str) -> Arc<Counter> {
        Arc::new(Counter::new(id, Arc::new(AtomicUsize::new(0))))
    }

    #[test]
    fn test_operations_before_initialize_fail() {
        let registry = ComponentRegistry::new();
        assert!(matches!(
            registry.register(counter("a")),
            Err(OwlError::NotInitialized(_))
        ));
        assert!(matches!(registry.get("a"), Err(OwlError::NotInitialized(_))));
        assert!(!registry.has_component("a"));
        assert_eq!(registry.component_count(), 0);
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = ComponentRegistry::new();
        registry.initialize();

        let first = counter("chat");
        let second = counter("chat");
        registry.register(first.clone()).unwrap();
        registry.register(second.clone()).unwrap();

        assert_eq!(registry.component_count(), 1);
        let found = registry.get_component::<Counter>("chat").unwrap().unwrap();
        assert!(Arc::ptr_eq(&found, &second));
        assert!(!Arc::ptr_eq(&found, &first));
    }

    #[test]
    fn test_typed_lookup() {
        let registry = ComponentRegistry::new();
        registry.initialize();
        registry.register(counter("chat")).unwrap();
        registry.register(Arc::new(Other)).unwrap();

        assert!(registry.get_component::<Counter>("missing").unwrap().is_none());
        assert!(registry.get_component::<Other>("other").unwrap().is_some());
        assert!(matches!(
            registry.get_component::<Other>("chat"),
            Err(OwlError::TypeMismatch { .. })
        ));
        assert!(matches!(
            registry.require_component::<Counter>("missing"),
            Err(OwlError::ComponentNotFound(_))
        ));
        assert_eq!(registry.component_ids(), vec!["chat".to_string(), "other".to_string()]);
    }

    #[test]
    fn test_shutdown_reaches_every_component() {
        let registry = ComponentRegistry::new();
        registry.initialize();

        let shutdowns = Arc::new(AtomicUsize::new(0));
        registry
            .register(Arc::new(Counter::failing("a", shutdowns.clone())))
            .unwrap();
        registry
            .register(Arc::new(Counter::new("b", shutdowns.clone())))
            .unwrap();
        registry
            .register(Arc::new(Counter::failing("c", shutdowns.clone())))
            .unwrap();
        registry.register(Arc::new(Other)).unwrap();

        registry.shutdown();

        assert_eq!(shutdowns.load(Ordering::SeqCst), 3);
        assert!(!registry.is_initialized());
        assert_eq!(registry.component_count(), 0);
        assert!(matches!(
            registry.register(counter("late")),
            Err(OwlError::NotInitialized(_))
        ));
    }

    #[test]
    fn test_shutdown_without_initialize_is_noop() {
        let registry = ComponentRegistry::new();
        registry.shutdown();
        registry.shutdown();
        assert!(!registry.is_initialized());
    }

    #[test]
    fn test_unregister() {
        let registry = ComponentRegistry::new();
        registry.initialize();
        registry.register(counter("chat")).unwrap();
        assert!(registry.unregister("chat").unwrap().is_some());
        assert!(registry.unregister("chat").unwrap().is_none());
        assert!(!registry.has_component("chat"));
    }
}
