//! Multi-observer change notification hub.
//!
//! # Responsibility
//! - Keep an ordered registry of observers interested in contact changes.
//! - Fan one changed contact out to every observer, synchronously.
//!
//! # Invariants
//! - A broadcast visits the observers registered when it started, in
//!   registration order. Later registrations wait for the next broadcast.
//! - The registry lock is never held while observer code runs, so observers
//!   may register or cancel from inside a callback.
//! - A panicking observer is logged and skipped; the rest still run.

use crate::model::contact::Contact;
use log::{debug, warn};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use uuid::Uuid;

/// Stable handle identity for one registration.
pub type SubscriptionId = Uuid;

/// Callback invoked with the contact that was saved or deleted.
pub type ContactObserver = Arc<dyn Fn(&Contact) + Send + Sync>;

type ObserverList = Mutex<Vec<(SubscriptionId, ContactObserver)>>;

/// Observer registry shared by every store that publishes through it.
///
/// Cheap to clone; clones share one registry.
#[derive(Clone, Default)]
pub struct ChangeBroadcaster {
    observers: Arc<ObserverList>,
}

impl ChangeBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `observer` at the end of the delivery order.
    ///
    /// The returned handle removes exactly this observer on `cancel()`.
    /// Dropping the handle without cancelling keeps the observer registered.
    pub fn register<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&Contact) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        let mut observers = lock_unpoisoned(&self.observers);
        observers.push((id, Arc::new(observer)));
        debug!(
            "event=observer_register module=broadcast status=ok observers={}",
            observers.len()
        );
        Subscription {
            id,
            observers: Arc::downgrade(&self.observers),
        }
    }

    /// Delivers `contact` to every observer registered right now.
    ///
    /// Returns how many observers completed without panicking.
    pub fn broadcast(&self, contact: &Contact) -> usize {
        let snapshot: Vec<(SubscriptionId, ContactObserver)> =
            lock_unpoisoned(&self.observers).clone();

        let mut delivered = 0;
        for (id, observer) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| observer(contact))) {
                Ok(()) => delivered += 1,
                Err(_) => warn!(
                    "event=observer_failed module=broadcast status=error subscription={} contact_id={}",
                    id,
                    display_id(contact)
                ),
            }
        }
        delivered
    }

    /// Number of currently registered observers.
    pub fn observer_count(&self) -> usize {
        lock_unpoisoned(&self.observers).len()
    }
}

/// Registration handle returned by [`ChangeBroadcaster::register`].
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    observers: Weak<ObserverList>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Removes this observer. No-op when it is already gone.
    pub fn cancel(self) {
        let Some(observers) = self.observers.upgrade() else {
            return;
        };
        let mut observers = lock_unpoisoned(&observers);
        observers.retain(|(id, _)| *id != self.id);
        debug!(
            "event=observer_cancel module=broadcast status=ok observers={}",
            observers.len()
        );
    }
}

// Guarded sections never leave their data half-written, so a poisoned lock
// still holds consistent state.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn display_id(contact: &Contact) -> String {
    contact
        .id
        .map_or_else(|| "none".to_string(), |id| id.to_string())
}
