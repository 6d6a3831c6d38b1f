//! Contact domain model.
//!
//! # Responsibility
//! - Define the canonical contact record stored by every backend.
//! - Provide field validation and the optimistic-concurrency clock.
//!
//! # Invariants
//! - `id` is `None` until the first successful persist, then never changes.
//! - `last_modified` is written by the store only and strictly increases per id.
//! - Equality is identity equality: unsaved contacts are never equal.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// Store-assigned integer identity.
pub type ContactId = i64;

/// Unix epoch milliseconds.
pub type Timestamp = i64;

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").expect("valid phone regex"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex")
});

/// Validation failures for contact writes.
///
/// Uniqueness violations live here too: they are rejected input, not
/// storage failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactValidationError {
    /// A required text field is blank.
    EmptyField(&'static str),
    /// Phone contains something other than ASCII digits.
    InvalidPhone(String),
    /// Email is not shaped like `local@domain.tld`.
    InvalidEmail(String),
    /// Another contact already uses this email.
    DuplicateEmail(String),
    /// Another contact already uses this phone number.
    DuplicatePhone(String),
    /// Operation requires a persisted contact.
    MissingId,
}

impl Display for ContactValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyField(field) => write!(f, "{field} is required"),
            Self::InvalidPhone(_) => write!(f, "phone number must contain only digits"),
            Self::InvalidEmail(_) => write!(f, "email address is not valid"),
            Self::DuplicateEmail(_) => write!(f, "email already exists"),
            Self::DuplicatePhone(_) => write!(f, "phone number already exists"),
            Self::MissingId => write!(f, "contact has no id"),
        }
    }
}

impl Error for ContactValidationError {}

/// Canonical contact record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Option<ContactId>,
    pub name: String,
    pub street: String,
    pub city: String,
    pub country: String,
    pub phone: String,
    pub email: String,
    /// Concurrency token. Callers echo back the value they last read.
    pub last_modified: Option<Timestamp>,
}

impl Contact {
    /// Creates an unsaved contact.
    pub fn new(
        name: impl Into<String>,
        street: impl Into<String>,
        city: impl Into<String>,
        country: impl Into<String>,
        phone: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            street: street.into(),
            city: city.into(),
            country: country.into(),
            phone: phone.into(),
            email: email.into(),
            last_modified: None,
        }
    }

    /// Returns whether this contact has been persisted at least once.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Compares every field, including identity and version.
    ///
    /// `==` only compares identity; this is for read-back checks.
    pub fn same_contents(&self, other: &Contact) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.street == other.street
            && self.city == other.city
            && self.country == other.country
            && self.phone == other.phone
            && self.email == other.email
            && self.last_modified == other.last_modified
    }

    /// Validates field-level rules. Uniqueness is checked by the store.
    pub fn validate(&self) -> Result<(), ContactValidationError> {
        for (field, value) in [
            ("name", &self.name),
            ("street", &self.street),
            ("city", &self.city),
            ("country", &self.country),
            ("phone", &self.phone),
            ("email", &self.email),
        ] {
            if value.trim().is_empty() {
                return Err(ContactValidationError::EmptyField(field));
            }
        }

        if !PHONE_RE.is_match(&self.phone) {
            return Err(ContactValidationError::InvalidPhone(self.phone.clone()));
        }
        if !EMAIL_RE.is_match(&self.email) {
            return Err(ContactValidationError::InvalidEmail(self.email.clone()));
        }

        Ok(())
    }
}

impl PartialEq for Contact {
    fn eq(&self, other: &Self) -> bool {
        match (self.id, other.id) {
            (Some(left), Some(right)) => left == right,
            _ => false,
        }
    }
}

/// Returns current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as Timestamp)
        .unwrap_or(0)
}

/// Computes the version stamp for the next accepted write.
///
/// Two writes inside the same millisecond still get distinct stamps.
pub fn next_last_modified(previous: Option<Timestamp>) -> Timestamp {
    let now = now_epoch_ms();
    match previous {
        Some(prev) if now <= prev => prev + 1,
        _ => now,
    }
}

/// Seed rows for a fresh store. Ids are left unset.
pub fn demo_contacts() -> Vec<Contact> {
    vec![
        Contact::new(
            "Alice Johnson",
            "123 Maple St",
            "Los Angeles",
            "USA",
            "2134567890",
            "alice.johnson@example.com",
        ),
        Contact::new(
            "Bob Smith",
            "45 King Road",
            "Chicago",
            "USA",
            "3129876543",
            "bob.smith@example.com",
        ),
        Contact::new(
            "Charlie Davis",
            "78 Oak Avenue",
            "Houston",
            "USA",
            "7134563210",
            "charlie.davis@example.com",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::{demo_contacts, next_last_modified, Contact, ContactValidationError};

    fn sample() -> Contact {
        Contact::new("Ann", "1 Road", "Oslo", "Norway", "4712345678", "ann@example.com")
    }

    #[test]
    fn unsaved_contacts_are_never_equal() {
        let contact = sample();
        assert!(contact != contact.clone());
        #[allow(clippy::eq_op)]
        let self_equal = contact == contact;
        assert!(!self_equal);
    }

    #[test]
    fn persisted_contacts_compare_by_id_only() {
        let mut left = sample();
        left.id = Some(7);
        let mut right = Contact::new("Other", "x", "y", "z", "1", "o@example.com");
        right.id = Some(7);
        assert_eq!(left, right);
        assert!(!left.same_contents(&right));
    }

    #[test]
    fn validate_rejects_blank_and_malformed_fields() {
        let mut blank = sample();
        blank.city = "  ".to_string();
        assert_eq!(blank.validate(), Err(ContactValidationError::EmptyField("city")));

        let mut phone = sample();
        phone.phone = "+47 123".to_string();
        assert!(matches!(
            phone.validate(),
            Err(ContactValidationError::InvalidPhone(_))
        ));

        let mut arabic_indic = sample();
        arabic_indic.phone = "\u{0663}\u{0664}\u{0665}".to_string();
        assert!(matches!(
            arabic_indic.validate(),
            Err(ContactValidationError::InvalidPhone(_))
        ));

        let mut email = sample();
        email.email = "not-an-email".to_string();
        assert!(matches!(
            email.validate(),
            Err(ContactValidationError::InvalidEmail(_))
        ));

        assert!(sample().validate().is_ok());
    }

    #[test]
    fn next_last_modified_is_strictly_increasing() {
        let far_future = i64::MAX - 10;
        assert_eq!(next_last_modified(Some(far_future)), far_future + 1);
        let fresh = next_last_modified(None);
        assert!(next_last_modified(Some(fresh)) > fresh);
    }

    #[test]
    fn demo_contacts_are_valid_and_unsaved() {
        let contacts = demo_contacts();
        assert_eq!(contacts.len(), 3);
        for contact in contacts {
            assert!(contact.validate().is_ok());
            assert!(!contact.is_persisted());
        }
    }

    #[test]
    fn serializes_last_modified_in_camel_case() {
        let mut contact = sample();
        contact.last_modified = Some(5);
        let json = serde_json::to_string(&contact).unwrap();
        assert!(json.contains("\"lastModified\":5"));
    }
}
