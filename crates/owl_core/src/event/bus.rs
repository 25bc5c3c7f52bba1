//! The event bus.

use super::listener::{ErasedListener, EventListener, FnListener, ListenerEntry, ListenerId, Typed};
use super::pool::{DrainReport, WorkerPool};
use super::Event;
use crate::error::{panic_message, ListenerError, OwlError};
use crate::Result;
use parking_lot::RwLock;
use serde::Serialize;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace};

const BUS: &str = "Event Bus";

/// Tuning for the dispatch pool.
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Number of dispatch workers
    pub worker_threads: usize,
    /// How long `shutdown` waits for queued dispatches
    pub drain_timeout: Duration,
    /// Worker thread name prefix
    pub thread_name: String,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            drain_timeout: Duration::from_secs(5),
            thread_name: "owl-event".to_string(),
        }
    }
}

/// Statistics for event bus monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventStats {
    /// Events accepted by `publish`
    pub events_published: u64,
    /// Listener invocations handed to the worker pool
    pub dispatches_submitted: u64,
    /// Invocations that returned `Ok`
    pub dispatches_completed: u64,
    /// Invocations that returned an error or panicked
    pub dispatches_failed: u64,
    /// Listeners currently registered across all event types
    pub total_listeners: usize,
}

impl EventStats {
    /// Dispatches that have run to completion, successfully or not.
    pub fn dispatches_finished(&self) -> u64 {
        self.dispatches_completed + self.dispatches_failed
    }
}

#[derive(Default)]
struct Counters {
    published: AtomicU64,
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

struct BusState {
    listeners: HashMap<TypeId, Vec<ListenerEntry>>,
    pool: WorkerPool,
}

impl BusState {
    fn listener_total(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }
}

/// Maps event types to insertion-ordered listener lists and dispatches
/// published events on a fixed worker pool.
pub struct EventBus {
    config: EventBusConfig,
    state: RwLock<Option<BusState>>,
    next_id: AtomicU64,
    counters: Arc<Counters>,
}

impl EventBus {
    /// Create a bus in the not-initialized state; call `initialize` before use.
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    pub fn with_config(config: EventBusConfig) -> Self {
        Self {
            config,
            state: RwLock::new(None),
            next_id: AtomicU64::new(1),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }

    /// Allocate the listener map and start the worker pool. Calling this on
    /// an initialized bus replaces its state; the old pool finishes its
    /// queue in the background.
    pub fn initialize(&self) -> Result<()> {
        let pool = WorkerPool::new(self.config.worker_threads, &self.config.thread_name)?;
        let previous = self.state.write().replace(BusState {
            listeners: HashMap::new(),
            pool,
        });
        if previous.is_some() {
            debug!("Event Bus re-initialized; previous listeners dropped");
        }
        info!(
            "📡 Event Bus initialized with {} dispatch workers",
            self.config.worker_threads.max(1)
        );
        Ok(())
    }

    /// Whether the bus is accepting registrations and events.
    pub fn is_initialized(&self) -> bool {
        self.state.read().is_some()
    }

    fn next_listener_id(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn insert(&self, key: TypeId, event_name: &str, listener: Arc<dyn ErasedListener>) -> Result<ListenerId> {
        let mut guard = self.state.write();
        let state = guard.as_mut().ok_or(OwlError::NotInitialized(BUS))?;

        let id = self.next_listener_id();
        let name = listener.name().to_string();
        state
            .listeners
            .entry(key)
            .or_default()
            .push(ListenerEntry { id, listener });

        info!("📝 Listener '{}' registered for event type: {}", name, event_name);
        Ok(id)
    }

    /// Append `listener` to the list for `E`.
    pub fn register<E, L>(&self, listener: Arc<L>) -> Result<ListenerId>
    where
        E: Event,
        L: EventListener<E>,
    {
        self.insert(
            TypeId::of::<E>(),
            type_name::<E>(),
            Arc::new(Typed::<E, L>::new(listener)),
        )
    }

    /// Register a closure as a listener for `E`.
    pub fn subscribe<E, F>(&self, name: &str, handler: F) -> Result<ListenerId>
    where
        E: Event,
        F: Fn(&E) -> std::result::Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.register::<E, _>(Arc::new(FnListener::new(name, handler)))
    }

    /// Remove the first entry for `E` that is this exact listener instance.
    /// Returns whether anything was removed.
    pub fn unregister<E, L>(&self, listener: &Arc<L>) -> Result<bool>
    where
        E: Event,
        L: EventListener<E>,
    {
        let mut guard = self.state.write();
        let state = guard.as_mut().ok_or(OwlError::NotInitialized(BUS))?;

        let target = Arc::as_ptr(listener) as *const ();
        let Some(list) = state.listeners.get_mut(&TypeId::of::<E>()) else {
            return Ok(false);
        };
        match list.iter().position(|entry| entry.listener.identity() == target) {
            Some(index) => {
                list.remove(index);
                info!("Listener unregistered for event type: {}", type_name::<E>());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove a listener by the handle `register`/`subscribe` returned.
    pub fn unregister_id(&self, id: ListenerId) -> Result<bool> {
        let mut guard = self.state.write();
        let state = guard.as_mut().ok_or(OwlError::NotInitialized(BUS))?;

        for list in state.listeners.values_mut() {
            if let Some(index) = list.iter().position(|entry| entry.id == id) {
                let entry = list.remove(index);
                info!("Listener '{}' ({}) unregistered", entry.listener.name(), id);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Schedule one asynchronous dispatch per listener registered for `E`, in
    /// registration order, and return without waiting. Returns the number of
    /// dispatches submitted.
    pub fn publish<E: Event>(&self, event: E) -> Result<usize> {
        let guard = self.state.read();
        let state = guard.as_ref().ok_or(OwlError::NotInitialized(BUS))?;
        self.counters.published.fetch_add(1, Ordering::Relaxed);

        let Some(listeners) = state
            .listeners
            .get(&TypeId::of::<E>())
            .filter(|list| !list.is_empty())
        else {
            trace!("No listeners for event type: {}", type_name::<E>());
            return Ok(0);
        };

        let event: Arc<dyn Any + Send + Sync> = Arc::new(event);
        for entry in listeners.iter().cloned() {
            let event = event.clone();
            let counters = self.counters.clone();
            state
                .pool
                .submit(move || dispatch(&entry, &*event, type_name::<E>(), &counters))?;
            self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        }

        debug!("📤 Published {} to {} listeners", type_name::<E>(), listeners.len());
        Ok(listeners.len())
    }

    pub fn listener_count<E: Event>(&self) -> usize {
        self.state
            .read()
            .as_ref()
            .and_then(|state| state.listeners.get(&TypeId::of::<E>()))
            .map_or(0, Vec::len)
    }

    pub fn stats(&self) -> EventStats {
        EventStats {
            events_published: self.counters.published.load(Ordering::Relaxed),
            dispatches_submitted: self.counters.submitted.load(Ordering::Relaxed),
            dispatches_completed: self.counters.completed.load(Ordering::Relaxed),
            dispatches_failed: self.counters.failed.load(Ordering::Relaxed),
            total_listeners: self.state.read().as_ref().map_or(0, BusState::listener_total),
        }
    }

    /// Stop accepting work, wait a bounded time for queued dispatches, and
    /// clear every listener list. Returns `None` when the bus was not
    /// initialized.
    pub fn shutdown(&self) -> Option<DrainReport> {
        let state = self.state.write().take()?;
        let listener_total = state.listener_total();

        let report = state.pool.shutdown(self.config.drain_timeout);
        drop(state.listeners);

        info!(
            "📡 Event Bus shut down ({} listeners released, {} workers joined)",
            listener_total, report.joined
        );
        Some(report)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs one listener against one event, containing errors and panics.
fn dispatch(entry: &ListenerEntry, event: &(dyn Any + Send + Sync), event_name: &str, counters: &Counters) {
    match catch_unwind(AssertUnwindSafe(|| entry.listener.dispatch(event))) {
        Ok(Ok(())) => {
            counters.completed.fetch_add(1, Ordering::Relaxed);
        }
        Ok(Err(e)) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            error!(
                "❌ Error in event listener '{}' for {}: {}",
                entry.listener.name(),
                event_name,
                e
            );
        }
        Err(panic_info) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            error!(
                "❌ Event listener '{}' panicked on {}: {}",
                entry.listener.name(),
                event_name,
                panic_message(&*panic_info)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel;
    use parking_lot::Mutex;

    const WAIT: Duration = Duration::from_secs(5);

    #[derive(Debug, Clone)]
    struct Ping(u32);

    #[derive(Debug)]
    struct Pong;

    struct Recorder {
        label: &'static str,
        seen: channel::Sender<(&'static str, u32)>,
    }

    impl EventListener<Ping> for Recorder {
        fn on_event(&self, event: &Ping) -> std::result::Result<(), ListenerError> {
            self.seen.send((self.label, event.0)).map_err(ListenerError::failed)
        }

        fn name(&self) -> &str {
            self.label
        }
    }

    fn bus() -> EventBus {
        let bus = EventBus::new();
        bus.initialize().unwrap();
        bus
    }

    #[test]
    fn test_publish_without_listeners_is_noop() {
        let bus = bus();
        assert_eq!(bus.publish(Ping(1)).unwrap(), 0);
        assert_eq!(bus.stats().events_published, 1);
        assert_eq!(bus.stats().dispatches_submitted, 0);
        bus.shutdown();
    }

    #[test]
    fn test_delivers_to_every_listener_of_the_type() {
        let bus = bus();
        let (tx, rx) = channel::unbounded();
        bus.register::<Ping, _>(Arc::new(Recorder { label: "a", seen: tx.clone() }))
            .unwrap();
        bus.register::<Ping, _>(Arc::new(Recorder { label: "b", seen: tx }))
            .unwrap();

        assert_eq!(bus.publish(Ping(7)).unwrap(), 2);
        assert_eq!(bus.publish(Pong).unwrap(), 0);

        let mut got = vec![rx.recv_timeout(WAIT).unwrap(), rx.recv_timeout(WAIT).unwrap()];
        got.sort();
        assert_eq!(got, vec![("a", 7), ("b", 7)]);
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        bus.shutdown();
    }

    #[test]
    fn test_failing_and_panicking_listeners_are_isolated() {
        let bus = bus();
        let (tx, rx) = channel::unbounded();

        bus.subscribe::<Ping, _>("fails", |_| Err(ListenerError::failed("nope")))
            .unwrap();
        bus.subscribe::<Ping, _>("panics", |_| panic!("listener exploded"))
            .unwrap();
        bus.register::<Ping, _>(Arc::new(Recorder { label: "ok", seen: tx }))
            .unwrap();

        bus.publish(Ping(1)).unwrap();
        bus.publish(Ping(2)).unwrap();

        let mut got = vec![rx.recv_timeout(WAIT).unwrap(), rx.recv_timeout(WAIT).unwrap()];
        got.sort();
        assert_eq!(got, vec![("ok", 1), ("ok", 2)]);

        let report = bus.shutdown().unwrap();
        assert!(report.is_complete());
        let stats = bus.stats();
        assert_eq!(stats.dispatches_submitted, 6);
        assert_eq!(stats.dispatches_failed, 4);
        assert_eq!(stats.dispatches_completed, 2);
    }

    #[test]
    fn test_unregister_by_instance_and_id() {
        let bus = bus();
        let (tx, rx) = channel::unbounded();
        let keep = Arc::new(Recorder { label: "keep", seen: tx.clone() });
        let drop_me = Arc::new(Recorder { label: "drop", seen: tx });

        bus.register::<Ping, _>(keep.clone()).unwrap();
        bus.register::<Ping, _>(drop_me.clone()).unwrap();
        let closure_id = bus.subscribe::<Ping, _>("closure", |_| Ok(())).unwrap();
        assert_eq!(bus.listener_count::<Ping>(), 3);

        assert!(bus.unregister::<Ping, _>(&drop_me).unwrap());
        assert!(!bus.unregister::<Ping, _>(&drop_me).unwrap());
        assert!(bus.unregister_id(closure_id).unwrap());
        assert!(!bus.unregister_id(closure_id).unwrap());
        assert_eq!(bus.listener_count::<Ping>(), 1);

        bus.publish(Ping(3)).unwrap();
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), ("keep", 3));
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        bus.shutdown();
    }

    #[test]
    fn test_unregister_unknown_type_is_noop() {
        let bus = bus();
        let (tx, _rx) = channel::unbounded();
        let never = Arc::new(Recorder { label: "never", seen: tx });
        assert!(!bus.unregister::<Ping, _>(&never).unwrap());
        bus.shutdown();
    }

    #[test]
    fn test_operations_after_shutdown_fail() {
        let bus = bus();
        bus.subscribe::<Ping, _>("x", |_| Ok(())).unwrap();
        assert!(bus.shutdown().is_some());

        assert!(matches!(bus.publish(Ping(1)), Err(OwlError::NotInitialized(_))));
        assert!(matches!(
            bus.subscribe::<Ping, _>("y", |_| Ok(())),
            Err(OwlError::NotInitialized(_))
        ));
        assert!(matches!(bus.unregister_id(ListenerId(1)), Err(OwlError::NotInitialized(_))));
        assert_eq!(bus.listener_count::<Ping>(), 0);
        assert!(bus.shutdown().is_none());
    }

    #[test]
    fn test_publish_does_not_wait_for_slow_listener() {
        let bus = bus();
        let (release_tx, release_rx) = channel::bounded::<()>(1);
        bus.subscribe::<Ping, _>("slow", move |_| {
            let _ = release_rx.recv_timeout(WAIT);
            Ok(())
        })
        .unwrap();

        let started = std::time::Instant::now();
        bus.publish(Ping(1)).unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));

        release_tx.send(()).unwrap();
        assert!(bus.shutdown().unwrap().is_complete());
    }

    #[test]
    fn test_shutdown_drains_queued_dispatches() {
        let bus = EventBus::with_config(EventBusConfig {
            worker_threads: 1,
            ..EventBusConfig::default()
        });
        bus.initialize().unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe::<Ping, _>("collect", move |ping| {
            sink.lock().push(ping.0);
            Ok(())
        })
        .unwrap();

        for i in 0..50 {
            bus.publish(Ping(i)).unwrap();
        }
        assert!(bus.shutdown().unwrap().is_complete());

        // One worker drains the queue in submission order.
        assert_eq!(*seen.lock(), (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_reinitialize_replaces_state() {
        let bus = bus();
        bus.subscribe::<Ping, _>("x", |_| Ok(())).unwrap();
        bus.initialize().unwrap();
        assert_eq!(bus.listener_count::<Ping>(), 0);
        bus.shutdown();
    }
}
