//! Services and the service locator.

use crate::component::{shutdown_isolated, Component};
use crate::error::OwlError;
use crate::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

const LOCATOR: &str = "Service Locator";

/// Runtime status of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// Not started, or shut down
    Stopped,
    /// Up and serving
    Running,
    /// Failed and not serving
    Error,
    /// Temporarily suspended
    Paused,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::Running => "running",
            ServiceStatus::Error => "error",
            ServiceStatus::Paused => "paused",
        };
        f.write_str(s)
    }
}

/// A component with a human-readable name and a runtime status.
pub trait Service: Component {
    /// Human-readable name for logs and status listings
    fn service_name(&self) -> &str;

    /// Current runtime status
    fn status(&self) -> ServiceStatus;
}

struct Binding {
    type_name: &'static str,
    service: Arc<dyn Service>,
}

/// Both lookup tables live under one lock so they cannot diverge.
#[derive(Default)]
struct ServiceTables {
    by_type: HashMap<TypeId, Binding>,
    by_id: HashMap<String, TypeId>,
}

/// Maps a service's declared type (and its id) to a singleton instance.
pub struct ServiceLocator {
    tables: RwLock<Option<ServiceTables>>,
}

impl ServiceLocator {
    /// Create a locator in the not-initialized state.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(None),
        }
    }

    pub fn initialize(&self) {
        *self.tables.write() = Some(ServiceTables::default());
        info!("🧭 Service Locator initialized");
    }

    /// Whether the locator is accepting registrations.
    pub fn is_initialized(&self) -> bool {
        self.tables.read().is_some()
    }

    /// Bind `service` to its type `S` and to its id. Last write wins on both
    /// keys: a previous binding for `S` is replaced, and a binding of
    /// another type under the same id is dropped.
    pub fn register_service<S: Service>(&self, service: Arc<S>) -> Result<()> {
        let mut guard = self.tables.write();
        let tables = guard.as_mut().ok_or(OwlError::NotInitialized(LOCATOR))?;

        let key = TypeId::of::<S>();
        let id = service.id().to_string();
        let name = service.service_name().to_string();

        if let Some(previous) = tables.by_type.remove(&key) {
            tables.by_id.remove(previous.service.id());
            warn!("⚠️ Service type {} already bound. Overwriting.", type_name::<S>());
        }
        if let Some(other) = tables.by_id.remove(&id) {
            if let Some(evicted) = tables.by_type.remove(&other) {
                warn!(
                    "⚠️ Service id '{}' was bound to {}. Overwriting.",
                    id, evicted.type_name
                );
            }
        }

        tables.by_type.insert(
            key,
            Binding {
                type_name: type_name::<S>(),
                service,
            },
        );
        tables.by_id.insert(id, key);

        info!("🧭 Service '{}' registered", name);
        Ok(())
    }

    /// Typed lookup by declared type.
    pub fn get_service<S: Service>(&self) -> Result<Arc<S>> {
        let guard = self.tables.read();
        let tables = guard.as_ref().ok_or(OwlError::NotInitialized(LOCATOR))?;

        let binding = tables
            .by_type
            .get(&TypeId::of::<S>())
            .ok_or_else(|| OwlError::ServiceNotFound(type_name::<S>().to_string()))?;

        binding
            .service
            .clone()
            .into_any_arc()
            .downcast::<S>()
            .map_err(|_| OwlError::TypeMismatch {
                id: binding.service.id().to_string(),
                expected: type_name::<S>(),
            })
    }

    /// Lookup by service id.
    pub fn get_service_by_id(&self, id: &str) -> Result<Arc<dyn Service>> {
        let guard = self.tables.read();
        let tables = guard.as_ref().ok_or(OwlError::NotInitialized(LOCATOR))?;
        tables
            .by_id
            .get(id)
            .and_then(|key| tables.by_type.get(key))
            .map(|binding| binding.service.clone())
            .ok_or_else(|| OwlError::ServiceNotFound(id.to_string()))
    }

    /// Lookup by service id, checked against the expected concrete type.
    pub fn get_service_by_id_as<S: Service>(&self, id: &str) -> Result<Arc<S>> {
        self.get_service_by_id(id)?
            .into_any_arc()
            .downcast::<S>()
            .map_err(|_| OwlError::TypeMismatch {
                id: id.to_string(),
                expected: type_name::<S>(),
            })
    }

    /// Remove the binding for `S` from both tables. Returns the removed
    /// service, if any.
    pub fn unregister_service<S: Service>(&self) -> Result<Option<Arc<dyn Service>>> {
        let mut guard = self.tables.write();
        let tables = guard.as_mut().ok_or(OwlError::NotInitialized(LOCATOR))?;

        let Some(binding) = tables.by_type.remove(&TypeId::of::<S>()) else {
            return Ok(None);
        };
        tables.by_id.remove(binding.service.id());
        info!("🧭 Service '{}' unregistered", binding.service.service_name());
        Ok(Some(binding.service))
    }

    pub fn service_count(&self) -> usize {
        self.tables.read().as_ref().map_or(0, |tables| tables.by_type.len())
    }

    /// Snapshot of `id -> status` for every registered service, sorted by id.
    pub fn service_statuses(&self) -> Vec<(String, ServiceStatus)> {
        let guard = self.tables.read();
        let mut statuses: Vec<(String, ServiceStatus)> = guard
            .as_ref()
            .map(|tables| {
                tables
                    .by_type
                    .values()
                    .map(|binding| (binding.service.id().to_string(), binding.service.status()))
                    .collect()
            })
            .unwrap_or_default();
        statuses.sort_by(|a, b| a.0.cmp(&b.0));
        statuses
    }

    /// Declared type names currently bound, sorted.
    pub fn bound_types(&self) -> Vec<&'static str> {
        let guard = self.tables.read();
        let mut names: Vec<&'static str> = guard
            .as_ref()
            .map(|tables| tables.by_type.values().map(|b| b.type_name).collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }

    /// Shut down every registered service, then clear both tables. Failures
    /// are logged and do not stop the remaining services. No-op when not
    /// initialized.
    pub fn shutdown(&self) {
        let Some(tables) = self.tables.write().take() else {
            return;
        };

        let total = tables.by_type.len();
        let failures = tables
            .by_type
            .values()
            .filter_map(|binding| shutdown_isolated("service", binding.service.as_ref()))
            .count();

        if failures > 0 {
            warn!("⚠️ {} of {} services failed to shut down cleanly", failures, total);
        }
        info!("🧭 Service Locator shut down ({} services)", total);
    }
}

impl Default for ServiceLocator {
    fn default() -> Self {
        Self::new()
    }
}
