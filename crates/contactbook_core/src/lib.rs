//! Core domain logic for the contact store.
//! This crate is the single source of truth for contact invariants.

pub mod broadcast;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod service;

pub use broadcast::{ChangeBroadcaster, ContactObserver, Subscription, SubscriptionId};
pub use config::{
    open_contact_service, open_repository, BackendConfig, ConfigError, DynContactService,
    LogConfig, StoreConfig,
};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::contact::{
    demo_contacts, Contact, ContactId, ContactValidationError, Timestamp,
};
pub use query::field::ContactField;
pub use query::filter::{ContactFilter, SortDirection, SortOrder};
pub use repo::contact_repo::{ContactRepository, RepoError, RepoResult};
pub use repo::memory_repo::InMemoryContactRepository;
pub use repo::sqlite_repo::SqliteContactRepository;
pub use service::contact_service::ContactService;
pub use service::query_service::{ContactPage, ContactQuery, ContactQueryService};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
