//! Contact repository contract and shared write rules.
//!
//! # Responsibility
//! - Define the capability set every backend implements.
//! - Provide the version check both backends run before an update.
//!
//! # Invariants
//! - A failed `persist` or `delete` leaves the collection unchanged.
//! - `fetch` and `size` run the shared query engine over `list_all`.
//! - `list_all` returns contacts in ascending id order.

use crate::db::DbError;
use crate::model::contact::{Contact, ContactId, ContactValidationError, Timestamp};
use crate::query::filter::{apply_query, count_matching, ContactFilter, SortOrder};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for contact persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Malformed input or a uniqueness violation.
    Validation(ContactValidationError),
    /// The caller's version token is stale.
    Conflict {
        id: ContactId,
        expected: Option<Timestamp>,
        actual: Option<Timestamp>,
    },
    /// Update target does not exist (anymore).
    NotFound(ContactId),
    Db(DbError),
    /// Persisted data cannot be converted to a valid contact.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// A write was issued from inside an observer of the same store.
    ReentrantWrite,
}

impl RepoError {
    /// Returns whether the caller can fix the input and retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Conflict { .. } | Self::NotFound(_)
        )
    }

    /// Stable machine-readable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::Conflict { .. } => "version_conflict",
            Self::NotFound(_) => "not_found",
            Self::Db(_) => "db_error",
            Self::InvalidData(_) => "invalid_data",
            Self::UninitializedConnection { .. } => "uninitialized_connection",
            Self::MissingRequiredTable(_) => "missing_table",
            Self::MissingRequiredColumn { .. } => "missing_column",
            Self::ReentrantWrite => "reentrant_write",
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Conflict { id, .. } => {
                write!(f, "contact {id} was modified by another user")
            }
            Self::NotFound(id) => write!(f, "contact not found: {id}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted contact data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "contact repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "contact repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "contact repository requires column `{column}` in table `{table}`"
            ),
            Self::ReentrantWrite => {
                write!(f, "contact store cannot be modified from inside a change observer")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ContactValidationError> for RepoError {
    fn from(value: ContactValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage contract shared by the in-memory and SQLite backends.
///
/// Implementations are not internally synchronised for multi-step writes;
/// `ContactService` serialises callers.
pub trait ContactRepository: Send {
    /// Validates, assigns identity when absent, checks uniqueness and the
    /// version token, then stores. Returns the stored contact.
    fn persist(&mut self, contact: &Contact) -> RepoResult<Contact>;

    /// Exact-key lookup.
    fn find(&self, id: ContactId) -> RepoResult<Option<Contact>>;

    /// Removes by id. Deleting an absent id succeeds.
    fn delete(&mut self, contact: &Contact) -> RepoResult<()>;

    /// Every stored contact in ascending id order.
    fn list_all(&self) -> RepoResult<Vec<Contact>>;

    /// Filter -> sort -> skip `offset` -> take `limit`.
    fn fetch(
        &self,
        filter: &ContactFilter,
        sort: &[SortOrder],
        offset: usize,
        limit: Option<usize>,
    ) -> RepoResult<Vec<Contact>> {
        Ok(apply_query(self.list_all()?, filter, sort, offset, limit))
    }

    /// Number of contacts accepted by `filter`, before paging.
    fn size(&self, filter: &ContactFilter) -> RepoResult<usize> {
        Ok(count_matching(&self.list_all()?, filter))
    }
}

impl<R: ContactRepository + ?Sized> ContactRepository for Box<R> {
    fn persist(&mut self, contact: &Contact) -> RepoResult<Contact> {
        (**self).persist(contact)
    }

    fn find(&self, id: ContactId) -> RepoResult<Option<Contact>> {
        (**self).find(id)
    }

    fn delete(&mut self, contact: &Contact) -> RepoResult<()> {
        (**self).delete(contact)
    }

    fn list_all(&self) -> RepoResult<Vec<Contact>> {
        (**self).list_all()
    }

    fn fetch(
        &self,
        filter: &ContactFilter,
        sort: &[SortOrder],
        offset: usize,
        limit: Option<usize>,
    ) -> RepoResult<Vec<Contact>> {
        (**self).fetch(filter, sort, offset, limit)
    }

    fn size(&self, filter: &ContactFilter) -> RepoResult<usize> {
        (**self).size(filter)
    }
}

/// Rejects an update whose version token differs from the stored one.
pub(crate) fn ensure_version_matches(incoming: &Contact, stored: &Contact) -> RepoResult<()> {
    if stored.last_modified == incoming.last_modified {
        return Ok(());
    }
    Err(RepoError::Conflict {
        id: stored.id.or(incoming.id).unwrap_or_default(),
        expected: incoming.last_modified,
        actual: stored.last_modified,
    })
}

/// Returns the id a delete targets, or `MissingId`.
pub(crate) fn require_id(contact: &Contact) -> RepoResult<ContactId> {
    contact
        .id
        .ok_or(RepoError::Validation(ContactValidationError::MissingId))
}

#[cfg(test)]
mod tests {
    use super::{ensure_version_matches, require_id, RepoError};
    use crate::model::contact::{Contact, ContactValidationError};

    #[test]
    fn version_mismatch_reports_both_tokens() {
        let mut stored = Contact::new("a", "b", "c", "d", "1", "e@f.gh");
        stored.id = Some(3);
        stored.last_modified = Some(200);
        let mut incoming = stored.clone();
        incoming.last_modified = Some(100);

        match ensure_version_matches(&incoming, &stored) {
            Err(RepoError::Conflict {
                id,
                expected,
                actual,
            }) => {
                assert_eq!(id, 3);
                assert_eq!(expected, Some(100));
                assert_eq!(actual, Some(200));
            }
            other => panic!("unexpected result: {other:?}"),
        }

        incoming.last_modified = Some(200);
        assert!(ensure_version_matches(&incoming, &stored).is_ok());
    }

    #[test]
    fn require_id_rejects_unsaved_contacts() {
        let contact = Contact::new("a", "b", "c", "d", "1", "e@f.gh");
        assert!(matches!(
            require_id(&contact),
            Err(RepoError::Validation(ContactValidationError::MissingId))
        ));
    }

    #[test]
    fn recoverable_errors_are_caller_fixable() {
        assert!(RepoError::NotFound(1).is_recoverable());
        assert!(RepoError::Validation(ContactValidationError::MissingId).is_recoverable());
        assert!(!RepoError::InvalidData("x".to_string()).is_recoverable());
        assert!(!RepoError::ReentrantWrite.is_recoverable());
    }
}
