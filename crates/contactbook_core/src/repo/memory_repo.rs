//! In-memory contact repository.
//!
//! # Invariants
//! - New ids are `max(existing ids) + 1`, or `1` for an empty map.
//! - Email and phone uniqueness is checked against every other stored contact.

use crate::model::contact::{next_last_modified, Contact, ContactId, ContactValidationError};
use crate::query::filter::{count_matching, ContactFilter};
use crate::repo::contact_repo::{
    ensure_version_matches, require_id, ContactRepository, RepoError, RepoResult,
};
use log::debug;
use std::collections::BTreeMap;

/// Map-backed repository keyed by contact id.
#[derive(Debug, Default)]
pub struct InMemoryContactRepository {
    contacts: BTreeMap<ContactId, Contact>,
}

impl InMemoryContactRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a repository by persisting `contacts` in order.
    pub fn with_contacts(contacts: impl IntoIterator<Item = Contact>) -> RepoResult<Self> {
        let mut repo = Self::new();
        for contact in contacts {
            repo.persist(&contact)?;
        }
        Ok(repo)
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    fn next_id(&self) -> ContactId {
        self.contacts.keys().next_back().map_or(1, |max| max + 1)
    }

    fn ensure_unique(&self, candidate: &Contact, id: ContactId) -> RepoResult<()> {
        let others = || self.contacts.values().filter(|other| other.id != Some(id));

        if others().any(|other| other.email == candidate.email) {
            return Err(ContactValidationError::DuplicateEmail(candidate.email.clone()).into());
        }
        if others().any(|other| other.phone == candidate.phone) {
            return Err(ContactValidationError::DuplicatePhone(candidate.phone.clone()).into());
        }
        Ok(())
    }
}

impl ContactRepository for InMemoryContactRepository {
    fn persist(&mut self, contact: &Contact) -> RepoResult<Contact> {
        contact.validate()?;

        let id = contact.id.unwrap_or_else(|| self.next_id());
        self.ensure_unique(contact, id)?;

        let previous = match contact.id {
            Some(existing_id) => {
                let stored = self
                    .contacts
                    .get(&existing_id)
                    .ok_or(RepoError::NotFound(existing_id))?;
                ensure_version_matches(contact, stored)?;
                stored.last_modified
            }
            None => None,
        };

        let mut stored = contact.clone();
        stored.id = Some(id);
        stored.last_modified = Some(next_last_modified(previous));
        self.contacts.insert(id, stored.clone());
        debug!(
            "event=contact_store module=repo backend=memory status=ok id={} total={}",
            id,
            self.contacts.len()
        );
        Ok(stored)
    }

    fn find(&self, id: ContactId) -> RepoResult<Option<Contact>> {
        Ok(self.contacts.get(&id).cloned())
    }

    fn delete(&mut self, contact: &Contact) -> RepoResult<()> {
        let id = require_id(contact)?;
        let removed = self.contacts.remove(&id).is_some();
        debug!(
            "event=contact_remove module=repo backend=memory status=ok id={} removed={}",
            id, removed
        );
        Ok(())
    }

    fn list_all(&self) -> RepoResult<Vec<Contact>> {
        Ok(self.contacts.values().cloned().collect())
    }

    fn size(&self, filter: &ContactFilter) -> RepoResult<usize> {
        Ok(count_matching(self.contacts.values(), filter))
    }
}
