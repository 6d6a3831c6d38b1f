//! Paged query façade for grid-style callers.
//!
//! # Responsibility
//! - Bundle filter, sort and paging into one request model.
//! - Normalise page sizes and report the unpaged total with each page.
//! - Notify an optional listener whenever a size is computed.
//!
//! # Invariants
//! - `page.total` counts every contact the filter accepts, independent of
//!   `offset` and `applied_limit`.
//! - `page.items` and `page.total` come from the same read.

use crate::broadcast::lock_unpoisoned;
use crate::model::contact::Contact;
use crate::query::filter::{ContactFilter, SortOrder};
use crate::repo::contact_repo::{ContactRepository, RepoResult};
use crate::service::contact_service::ContactService;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

pub const PAGE_DEFAULT_LIMIT: usize = 50;
pub const PAGE_LIMIT_MAX: usize = 500;

/// Callback receiving each freshly computed size.
pub type SizeListener = Arc<dyn Fn(usize) + Send + Sync>;

/// Query request model: filter -> sort -> skip `offset` -> take `limit`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactQuery {
    pub filter: ContactFilter,
    pub sort: Vec<SortOrder>,
    pub offset: usize,
    /// `None` means unbounded for `fetch`; `page` normalises it.
    pub limit: Option<usize>,
}

impl ContactQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: ContactFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Appends a sort key after the existing ones.
    pub fn sort_by(mut self, order: SortOrder) -> Self {
        self.sort.push(order);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One page of results plus paging metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ContactPage {
    pub items: Vec<Contact>,
    /// Matches before paging.
    pub total: usize,
    pub offset: usize,
    pub applied_limit: usize,
}

impl ContactPage {
    /// Returns whether contacts remain after this page.
    pub fn has_more(&self) -> bool {
        self.offset.saturating_add(self.items.len()) < self.total
    }
}

/// Normalises a requested page size.
///
/// `None` and `Some(0)` map to [`PAGE_DEFAULT_LIMIT`]; larger values are
/// capped at [`PAGE_LIMIT_MAX`].
pub fn normalize_page_limit(limit: Option<usize>) -> usize {
    match limit {
        Some(0) | None => PAGE_DEFAULT_LIMIT,
        Some(value) if value > PAGE_LIMIT_MAX => PAGE_LIMIT_MAX,
        Some(value) => value,
    }
}

/// Read-side façade over a shared [`ContactService`].
pub struct ContactQueryService<R: ContactRepository> {
    service: Arc<ContactService<R>>,
    size_listener: Mutex<Option<SizeListener>>,
}

impl<R: ContactRepository> ContactQueryService<R> {
    pub fn new(service: Arc<ContactService<R>>) -> Self {
        Self {
            service,
            size_listener: Mutex::new(None),
        }
    }

    /// Runs `query` as given; `limit = None` returns every remaining match.
    pub fn fetch(&self, query: &ContactQuery) -> RepoResult<Vec<Contact>> {
        self.service
            .fetch(&query.filter, &query.sort, query.offset, query.limit)
    }

    /// Counts matches and notifies the size listener.
    pub fn size(&self, filter: &ContactFilter) -> RepoResult<usize> {
        let size = self.service.size(filter)?;
        self.notify_size(size);
        Ok(size)
    }

    /// Fetches one normalised page together with the unpaged total.
    pub fn page(&self, query: &ContactQuery) -> RepoResult<ContactPage> {
        let applied_limit = normalize_page_limit(query.limit);
        let (items, total) = self.service.fetch_with_total(
            &query.filter,
            &query.sort,
            query.offset,
            Some(applied_limit),
        )?;
        debug!(
            "event=contact_page module=service status=ok offset={} limit={} items={} total={}",
            query.offset,
            applied_limit,
            items.len(),
            total
        );
        self.notify_size(total);

        Ok(ContactPage {
            items,
            total,
            offset: query.offset,
            applied_limit,
        })
    }

    /// Unfiltered store size.
    pub fn total_count(&self) -> RepoResult<usize> {
        self.size(&ContactFilter::new())
    }

    /// Replaces the size listener. Pass `None` to clear it.
    pub fn set_size_listener(&self, listener: Option<SizeListener>) {
        *lock_unpoisoned(&self.size_listener) = listener;
    }

    pub fn service(&self) -> &Arc<ContactService<R>> {
        &self.service
    }

    // Called outside the listener lock so a listener may replace itself.
    fn notify_size(&self, size: usize) {
        let listener = lock_unpoisoned(&self.size_listener).clone();
        if let Some(listener) = listener {
            listener(size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        normalize_page_limit, ContactQuery, ContactQueryService, PAGE_DEFAULT_LIMIT,
        PAGE_LIMIT_MAX,
    };
    use crate::model::contact::demo_contacts;
    use crate::query::filter::{ContactFilter, SortOrder};
    use crate::repo::memory_repo::InMemoryContactRepository;
    use crate::service::contact_service::ContactService;
    use std::sync::{Arc, Mutex};

    fn seeded() -> ContactQueryService<InMemoryContactRepository> {
        let service = ContactService::new(InMemoryContactRepository::new());
        service.seed_if_empty(demo_contacts()).unwrap();
        ContactQueryService::new(Arc::new(service))
    }

    #[test]
    fn page_limit_is_defaulted_and_capped() {
        assert_eq!(normalize_page_limit(None), PAGE_DEFAULT_LIMIT);
        assert_eq!(normalize_page_limit(Some(0)), PAGE_DEFAULT_LIMIT);
        assert_eq!(normalize_page_limit(Some(7)), 7);
        assert_eq!(normalize_page_limit(Some(10_000)), PAGE_LIMIT_MAX);
    }

    #[test]
    fn page_reports_total_independent_of_paging() {
        let queries = seeded();
        let query = ContactQuery::new()
            .sort_by(SortOrder::desc("name"))
            .offset(1)
            .limit(1);

        let page = queries.page(&query).unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.applied_limit, 1);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "Bob Smith");
        assert!(page.has_more());
    }

    #[test]
    fn size_listener_sees_each_computed_size() {
        let queries = seeded();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        queries.set_size_listener(Some(Arc::new(move |size: usize| {
            sink.lock().unwrap().push(size);
        })));

        queries.total_count().unwrap();
        queries
            .size(&ContactFilter::new().with("city", "chicago"))
            .unwrap();
        queries.set_size_listener(None);
        queries.total_count().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![3, 1]);
    }

    #[test]
    fn fetch_without_limit_returns_every_match() {
        let queries = seeded();
        let all = queries.fetch(&ContactQuery::new()).unwrap();
        assert_eq!(all.len(), 3);
    }
}
