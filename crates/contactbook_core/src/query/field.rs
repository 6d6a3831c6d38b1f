//! Named field accessors for contact records.

use crate::model::contact::{Contact, Timestamp};
use once_cell::sync::Lazy;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Borrowed view of one field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Timestamp(Option<Timestamp>),
}

impl FieldValue<'_> {
    /// Renders the value for substring matching. Absent values render to `None`.
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Text(value) => Some((*value).to_string()),
            Self::Timestamp(value) => value.map(|millis| millis.to_string()),
        }
    }

    /// Natural ordering. Values of one field always share a variant.
    pub fn natural_cmp(&self, other: &FieldValue<'_>) -> Ordering {
        match (self, other) {
            (FieldValue::Text(left), FieldValue::Text(right)) => left.cmp(right),
            (FieldValue::Timestamp(left), FieldValue::Timestamp(right)) => left.cmp(right),
            (FieldValue::Text(_), FieldValue::Timestamp(_)) => Ordering::Less,
            (FieldValue::Timestamp(_), FieldValue::Text(_)) => Ordering::Greater,
        }
    }
}

/// Pure getter for one field.
pub type FieldAccessor = for<'a> fn(&'a Contact) -> FieldValue<'a>;

/// Filterable and sortable contact fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ContactField {
    Name,
    Street,
    City,
    Country,
    Phone,
    Email,
    LastModified,
}

// Indexed by `ContactField` discriminant.
const FIELD_TABLE: &[(&str, ContactField, FieldAccessor)] = &[
    ("name", ContactField::Name, name_of),
    ("street", ContactField::Street, street_of),
    ("city", ContactField::City, city_of),
    ("country", ContactField::Country, country_of),
    ("phone", ContactField::Phone, phone_of),
    ("email", ContactField::Email, email_of),
    ("lastModified", ContactField::LastModified, last_modified_of),
];

static FIELDS_BY_NAME: Lazy<BTreeMap<&'static str, (ContactField, FieldAccessor)>> =
    Lazy::new(|| {
        FIELD_TABLE
            .iter()
            .map(|(name, field, accessor)| (*name, (*field, *accessor)))
            .collect()
    });

impl ContactField {
    /// Resolves an external field name. Names are case-sensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        FIELDS_BY_NAME.get(name).map(|(field, _)| *field)
    }

    /// External field name, as used in filters and sort orders.
    pub fn name(self) -> &'static str {
        FIELD_TABLE[self as usize].0
    }

    /// All known fields in table order.
    pub fn all() -> impl Iterator<Item = ContactField> {
        FIELD_TABLE.iter().map(|(_, field, _)| *field)
    }

    /// Returns the getter registered for this field.
    pub fn accessor(self) -> FieldAccessor {
        FIELD_TABLE[self as usize].2
    }

    /// Reads this field from `contact`.
    pub fn value_of(self, contact: &Contact) -> FieldValue<'_> {
        (self.accessor())(contact)
    }
}

impl Display for ContactField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn name_of(contact: &Contact) -> FieldValue<'_> {
    FieldValue::Text(&contact.name)
}

fn street_of(contact: &Contact) -> FieldValue<'_> {
    FieldValue::Text(&contact.street)
}

fn city_of(contact: &Contact) -> FieldValue<'_> {
    FieldValue::Text(&contact.city)
}

fn country_of(contact: &Contact) -> FieldValue<'_> {
    FieldValue::Text(&contact.country)
}

fn phone_of(contact: &Contact) -> FieldValue<'_> {
    FieldValue::Text(&contact.phone)
}

fn email_of(contact: &Contact) -> FieldValue<'_> {
    FieldValue::Text(&contact.email)
}

fn last_modified_of(contact: &Contact) -> FieldValue<'_> {
    FieldValue::Timestamp(contact.last_modified)
}

/// Resolves a field name straight to its accessor.
pub fn resolve_accessor(name: &str) -> Option<FieldAccessor> {
    FIELDS_BY_NAME.get(name).map(|(_, accessor)| *accessor)
}
