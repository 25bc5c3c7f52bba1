//! In-process publish/subscribe.
//!
//! Events are plain values classified by their runtime type. Listeners are
//! bound to one event type through their generic parameter and are invoked
//! asynchronously on a small worker pool; a failing listener never affects
//! the publisher or the other listeners.

mod bus;
mod listener;
mod pool;

pub use bus::{EventBus, EventBusConfig, EventStats};
pub use listener::{EventListener, FnListener, ListenerId};
pub use pool::{DrainReport, WorkerPool};

use std::any::Any;

/// Anything that can be published. Implemented for every
/// `Send + Sync + 'static` type.
pub trait Event: Any + Send + Sync {}

impl<T: Any + Send + Sync> Event for T {}
