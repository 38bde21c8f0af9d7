//! Event fan-out
//!
//! Events reach consumers two ways:
//! - **Observers** are invoked synchronously, in registration order, on the
//!   updater's own thread of control before the updater moves on. An observer
//!   for [`Event::ApplicationRestartRequested`] can therefore block (e.g. to
//!   ask the user) before the process is replaced.
//! - **Subscribers** receive a copy through a tokio broadcast channel, for
//!   consumers living in other tasks. Slow subscribers may lag; observers never do.

use crate::types::Event;
use std::sync::{Arc, RwLock};

/// Buffer size of the broadcast channel
const BROADCAST_CAPACITY: usize = 1000;

/// A synchronous event observer
pub type Observer = Arc<dyn Fn(&Event) + Send + Sync>;

/// Ordered observer registry plus broadcast channel
#[derive(Clone)]
pub(crate) struct EventBus {
    observers: Arc<RwLock<Vec<Observer>>>,
    tx: tokio::sync::broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        let (tx, _rx) = tokio::sync::broadcast::channel(BROADCAST_CAPACITY);
        Self {
            observers: Arc::new(RwLock::new(Vec::new())),
            tx,
        }
    }
}

impl EventBus {
    /// Register an observer; it runs after every previously registered one
    pub(crate) fn add_observer(&self, observer: Observer) {
        self.observers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(observer);
    }

    pub(crate) fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Deliver an event to every observer, then to every subscriber
    ///
    /// The registry lock is released before observers run, so an observer may
    /// register further observers without deadlocking.
    pub(crate) fn emit(&self, event: Event) {
        let observers: Vec<Observer> = self
            .observers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        for observer in &observers {
            observer(&event);
        }

        // send() only fails when nobody is subscribed
        self.tx.send(event).ok();
    }
}
