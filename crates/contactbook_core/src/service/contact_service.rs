//! Contact use-case service.
//!
//! # Responsibility
//! - Serialise mutations against one repository.
//! - Publish every successful save or delete through the change broadcaster.
//!
//! # Invariants
//! - A write holds the write lock from validation through broadcast, so
//!   events reach observers in mutation order.
//! - The store lock is released before observers run; observers may read.
//! - A write issued by an observer on the broadcasting thread is rejected
//!   with `RepoError::ReentrantWrite`.

use crate::broadcast::{lock_unpoisoned, ChangeBroadcaster, Subscription};
use crate::model::contact::{Contact, ContactId, ContactValidationError};
use crate::query::filter::{ContactFilter, SortOrder};
use crate::repo::contact_repo::{ContactRepository, RepoError, RepoResult};
use log::{info, warn};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Instant;

/// Thread-safe contact store with change notification.
pub struct ContactService<R: ContactRepository> {
    store: Mutex<R>,
    write_lock: Mutex<()>,
    writer: Mutex<Option<ThreadId>>,
    broadcaster: ChangeBroadcaster,
}

struct WriteGuard<'a> {
    _serial: MutexGuard<'a, ()>,
    writer: &'a Mutex<Option<ThreadId>>,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        *lock_unpoisoned(self.writer) = None;
    }
}

impl<R: ContactRepository> ContactService<R> {
    /// Creates a service with its own broadcaster.
    pub fn new(repo: R) -> Self {
        Self::with_broadcaster(repo, ChangeBroadcaster::new())
    }

    /// Creates a service publishing through a shared broadcaster.
    pub fn with_broadcaster(repo: R, broadcaster: ChangeBroadcaster) -> Self {
        Self {
            store: Mutex::new(repo),
            write_lock: Mutex::new(()),
            writer: Mutex::new(None),
            broadcaster,
        }
    }

    /// Inserts (no id) or updates (id present) and broadcasts the stored
    /// contact before returning it.
    ///
    /// # Errors
    /// - `Validation` for malformed input or duplicate email/phone.
    /// - `Conflict` when `contact.last_modified` is stale.
    /// - `NotFound` when the id is not stored.
    /// - `ReentrantWrite` when called from an observer of this service.
    pub fn persist(&self, contact: &Contact) -> RepoResult<Contact> {
        let started_at = Instant::now();
        let _write = self.begin_write()?;
        self.persist_locked(contact, started_at)
    }

    // Caller holds the write guard.
    fn persist_locked(&self, contact: &Contact, started_at: Instant) -> RepoResult<Contact> {
        let result = lock_unpoisoned(&self.store).persist(contact);
        match result {
            Ok(stored) => {
                let delivered = self.broadcaster.broadcast(&stored);
                info!(
                    "event=contact_persist module=service status=ok id={} insert={} observers={} duration_ms={}",
                    stored.id.unwrap_or_default(),
                    contact.id.is_none(),
                    delivered,
                    started_at.elapsed().as_millis()
                );
                Ok(stored)
            }
            Err(err) => {
                log_write_failure("contact_persist", &err, started_at);
                Err(err)
            }
        }
    }

    /// Exact-key lookup.
    pub fn find(&self, id: ContactId) -> RepoResult<Option<Contact>> {
        lock_unpoisoned(&self.store).find(id)
    }

    /// Removes `contact` by id and broadcasts it.
    ///
    /// Deleting an id that is no longer stored succeeds and still notifies.
    pub fn delete(&self, contact: &Contact) -> RepoResult<()> {
        let started_at = Instant::now();
        let _write = self.begin_write()?;

        if let Err(err) = lock_unpoisoned(&self.store).delete(contact) {
            log_write_failure("contact_delete", &err, started_at);
            return Err(err);
        }

        let delivered = self.broadcaster.broadcast(contact);
        info!(
            "event=contact_delete module=service status=ok id={} observers={} duration_ms={}",
            contact.id.unwrap_or_default(),
            delivered,
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// Filter, sort and page in one consistent read.
    pub fn fetch(
        &self,
        filter: &ContactFilter,
        sort: &[SortOrder],
        offset: usize,
        limit: Option<usize>,
    ) -> RepoResult<Vec<Contact>> {
        lock_unpoisoned(&self.store).fetch(filter, sort, offset, limit)
    }

    /// Number of contacts accepted by `filter`.
    pub fn size(&self, filter: &ContactFilter) -> RepoResult<usize> {
        lock_unpoisoned(&self.store).size(filter)
    }

    /// Page items and the unpaged total, read under one store lock.
    pub fn fetch_with_total(
        &self,
        filter: &ContactFilter,
        sort: &[SortOrder],
        offset: usize,
        limit: Option<usize>,
    ) -> RepoResult<(Vec<Contact>, usize)> {
        let store = lock_unpoisoned(&self.store);
        let total = store.size(filter)?;
        let items = store.fetch(filter, sort, offset, limit)?;
        Ok((items, total))
    }

    pub fn list_all(&self) -> RepoResult<Vec<Contact>> {
        lock_unpoisoned(&self.store).list_all()
    }

    /// Registers a change observer. See [`ChangeBroadcaster::register`].
    pub fn register<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&Contact) + Send + Sync + 'static,
    {
        self.broadcaster.register(observer)
    }

    pub fn broadcaster(&self) -> &ChangeBroadcaster {
        &self.broadcaster
    }

    /// Persists `contacts` in order when the store is empty.
    ///
    /// The emptiness check and the inserts share one write guard. A contact
    /// whose email or phone is already stored is skipped, so a second
    /// process seeding the same SQLite file does not fail.
    ///
    /// Returns how many contacts were inserted; `0` for a non-empty store.
    pub fn seed_if_empty(&self, contacts: impl IntoIterator<Item = Contact>) -> RepoResult<usize> {
        let _write = self.begin_write()?;
        if lock_unpoisoned(&self.store).size(&ContactFilter::new())? > 0 {
            return Ok(0);
        }

        let mut inserted = 0;
        let mut skipped = 0;
        for contact in contacts {
            match self.persist_locked(&contact, Instant::now()) {
                Ok(_) => inserted += 1,
                Err(RepoError::Validation(
                    ContactValidationError::DuplicateEmail(_)
                    | ContactValidationError::DuplicatePhone(_),
                )) => skipped += 1,
                Err(err) => return Err(err),
            }
        }
        info!(
            "event=store_seed module=service status=ok inserted={} skipped={}",
            inserted, skipped
        );
        Ok(inserted)
    }

    /// Consumes the service and returns the repository.
    pub fn into_repository(self) -> R {
        self.store
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_write(&self) -> RepoResult<WriteGuard<'_>> {
        let current = thread::current().id();
        if *lock_unpoisoned(&self.writer) == Some(current) {
            warn!("event=contact_write module=service status=error error_code=reentrant_write");
            return Err(RepoError::ReentrantWrite);
        }

        let serial = lock_unpoisoned(&self.write_lock);
        *lock_unpoisoned(&self.writer) = Some(current);
        Ok(WriteGuard {
            _serial: serial,
            writer: &self.writer,
        })
    }
}

fn log_write_failure(event: &str, err: &RepoError, started_at: Instant) {
    warn!(
        "event={} module=service status=error error_code={} recoverable={} duration_ms={}",
        event,
        err.code(),
        err.is_recoverable(),
        started_at.elapsed().as_millis()
    );
}

#[cfg(test)]
mod tests {
    use super::ContactService;
    use crate::model::contact::{demo_contacts, Contact};
    use crate::query::filter::ContactFilter;
    use crate::repo::contact_repo::RepoError;
    use crate::repo::memory_repo::InMemoryContactRepository;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn service() -> ContactService<InMemoryContactRepository> {
        ContactService::new(InMemoryContactRepository::new())
    }

    #[test]
    fn failed_persist_does_not_broadcast() {
        let service = service();
        service.seed_if_empty(demo_contacts()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let _subscription = service.register(move |_: &Contact| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let duplicate = Contact::new(
            "Eve",
            "1 Elm",
            "Austin",
            "USA",
            "5125550000",
            "charlie.davis@example.com",
        );
        assert!(matches!(
            service.persist(&duplicate),
            Err(RepoError::Validation(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn seed_only_fills_an_empty_store() {
        let service = service();
        assert_eq!(service.seed_if_empty(demo_contacts()).unwrap(), 3);
        assert_eq!(service.seed_if_empty(demo_contacts()).unwrap(), 0);
        assert_eq!(service.size(&ContactFilter::new()).unwrap(), 3);
    }

    #[test]
    fn seed_skips_contacts_that_are_already_stored() {
        let service = service();
        let twice = demo_contacts().into_iter().chain(demo_contacts());
        assert_eq!(service.seed_if_empty(twice).unwrap(), 3);
        assert_eq!(service.size(&ContactFilter::new()).unwrap(), 3);
    }

    #[test]
    fn concurrent_seeding_inserts_the_demo_rows_once() {
        let service = Arc::new(service());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let service = Arc::clone(&service);
                std::thread::spawn(move || service.seed_if_empty(demo_contacts()).unwrap())
            })
            .collect();

        let inserted: usize = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .sum();
        assert_eq!(inserted, 3);
        assert_eq!(service.size(&ContactFilter::new()).unwrap(), 3);
    }

    #[test]
    fn observer_can_read_the_store_during_broadcast() {
        let service = Arc::new(service());
        let sizes = Arc::new(Mutex::new(Vec::new()));

        let reader = Arc::clone(&service);
        let seen = Arc::clone(&sizes);
        let _subscription = service.register(move |_: &Contact| {
            let size = reader.size(&ContactFilter::new()).unwrap();
            seen.lock().unwrap().push(size);
        });

        service.seed_if_empty(demo_contacts()).unwrap();
        assert_eq!(*sizes.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn write_from_observer_is_rejected() {
        let service = Arc::new(service());
        let outcome = Arc::new(Mutex::new(None));

        let writer = Arc::clone(&service);
        let slot = Arc::clone(&outcome);
        let _subscription = service.register(move |contact: &Contact| {
            let result = writer.delete(contact);
            *slot.lock().unwrap() = Some(matches!(result, Err(RepoError::ReentrantWrite)));
        });

        let stored = service
            .persist(&Contact::new("A", "s", "c", "x", "1", "a@example.com"))
            .unwrap();
        assert_eq!(*outcome.lock().unwrap(), Some(true));
        assert!(service.find(stored.id.unwrap()).unwrap().is_some());

        // The writer record is cleared once the outer write completes.
        service.delete(&stored).unwrap();
    }
}
