//! Telemetry change events
//!
//! An explicit observer list owned by the publisher. Subscribing returns a
//! [`Subscription`] handle; dropping the handle unsubscribes, so teardown
//! cannot forget to detach a listener on any exit path.

use crate::model::{LapInfo, RaceSessionType, SessionPhase, SimStatus};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::error;

/// Derived change notifications published by the telemetry poll loop
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    SessionTypeChanged(RaceSessionType),
    SessionPhaseChanged(SessionPhase),
    StatusChanged(SimStatus),
    /// The active simulator changed or stopped and the snapshot was cleared
    SessionRestarted,
    LapCompleted {
        car_index: i32,
        lap: LapInfo,
    },
}

type Callback = Box<dyn Fn(&TelemetryEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    callbacks: Mutex<HashMap<u64, Callback>>,
}

/// Cloneable publisher handle
#[derive(Clone, Default)]
pub struct TelemetryEvents {
    registry: Arc<Registry>,
}

/// Active subscription; dropping it unsubscribes
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl TelemetryEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. The callback runs synchronously on the
    /// publishing thread; keep it short.
    pub fn subscribe(
        &self,
        callback: impl Fn(&TelemetryEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .callbacks
            .lock()
            .expect("event registry lock poisoned")
            .insert(id, Box::new(callback));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver an event to every live subscriber.
    ///
    /// A panicking callback is logged and skipped; the remaining
    /// subscribers still receive the event.
    pub fn emit(&self, event: &TelemetryEvent) {
        let callbacks = self
            .registry
            .callbacks
            .lock()
            .expect("event registry lock poisoned");
        for (id, callback) in callbacks.iter() {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                error!(subscriber = id, ?event, "telemetry event callback panicked");
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry
            .callbacks
            .lock()
            .expect("event registry lock poisoned")
            .len()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .callbacks
                .lock()
                .expect("event registry lock poisoned")
                .remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_subscribe_receives_events() {
        let events = TelemetryEvents::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let _sub = {
            let seen = Arc::clone(&seen);
            events.subscribe(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
        };

        events.emit(&TelemetryEvent::SessionRestarted);
        events.emit(&TelemetryEvent::StatusChanged(SimStatus::Live));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let events = TelemetryEvents::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let sub = {
            let seen = Arc::clone(&seen);
            events.subscribe(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
        };
        events.emit(&TelemetryEvent::SessionRestarted);
        assert_eq!(events.subscriber_count(), 1);

        drop(sub);
        assert_eq!(events.subscriber_count(), 0);

        events.emit(&TelemetryEvent::SessionRestarted);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_callback_does_not_starve_others() {
        let events = TelemetryEvents::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let _bad = events.subscribe(|_| panic!("listener bug"));
        let _good = {
            let seen = Arc::clone(&seen);
            events.subscribe(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
        };

        events.emit(&TelemetryEvent::SessionRestarted);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
