//! Listener traits and the type-erased form the bus stores.

use super::Event;
use crate::error::ListenerError;
use std::any::{type_name, Any};
use std::marker::PhantomData;
use std::sync::Arc;

/// Handle returned by registration, usable with `EventBus::unregister_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// A subscriber bound to exactly one event type `E`.
pub trait EventListener<E: Event>: Send + Sync + 'static {
    /// Called on a worker thread for each published `E`.
    fn on_event(&self, event: &E) -> Result<(), ListenerError>;

    /// Name used in logs
    fn name(&self) -> &str {
        type_name::<Self>()
    }
}

/// Closure adapter used by `EventBus::subscribe`.
pub struct FnListener<E, F> {
    name: String,
    handler: F,
    _phantom: PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    E: Event,
    F: Fn(&E) -> Result<(), ListenerError> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: Event,
    F: Fn(&E) -> Result<(), ListenerError> + Send + Sync + 'static,
{
    fn on_event(&self, event: &E) -> Result<(), ListenerError> {
        (self.handler)(event)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Object-safe view of a listener so lists for every event type can share
/// one map.
pub(crate) trait ErasedListener: Send + Sync {
    fn dispatch(&self, event: &(dyn Any + Send + Sync)) -> Result<(), ListenerError>;

    fn name(&self) -> &str;

    /// Address of the user's listener allocation, for identity checks.
    fn identity(&self) -> *const ();
}

pub(crate) struct Typed<E: Event, L: EventListener<E>> {
    listener: Arc<L>,
    _phantom: PhantomData<fn(&E)>,
}

impl<E: Event, L: EventListener<E>> Typed<E, L> {
    pub(crate) fn new(listener: Arc<L>) -> Self {
        Self {
            listener,
            _phantom: PhantomData,
        }
    }
}

impl<E: Event, L: EventListener<E>> ErasedListener for Typed<E, L> {
    fn dispatch(&self, event: &(dyn Any + Send + Sync)) -> Result<(), ListenerError> {
        let event = event.downcast_ref::<E>().ok_or_else(|| {
            ListenerError::Rejected(format!("expected {}", type_name::<E>()))
        })?;
        self.listener.on_event(event)
    }

    fn name(&self) -> &str {
        self.listener.name()
    }

    fn identity(&self) -> *const () {
        Arc::as_ptr(&self.listener) as *const ()
    }
}

/// One slot in a per-type listener list.
#[derive(Clone)]
pub(crate) struct ListenerEntry {
    pub(crate) id: ListenerId,
    pub(crate) listener: Arc<dyn ErasedListener>,
}
