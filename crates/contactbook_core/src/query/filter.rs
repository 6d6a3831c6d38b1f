//! Predicate and comparator construction from field-keyed requests.
//!
//! # Responsibility
//! - Turn `ContactFilter` constraints into one AND-combined predicate.
//! - Turn an ordered `SortOrder` list into one lexicographic comparator.
//! - Run the shared filter -> sort -> skip -> take pipeline.
//!
//! # Invariants
//! - An unknown filter field makes that constraint false for every record.
//! - An unknown sort field compares every pair as equal.
//! - Sorting is stable, so callers control the tie order of the input.

use crate::model::contact::Contact;
use crate::query::field::{resolve_accessor, FieldAccessor};
use log::warn;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Sort direction for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub field: String,
    pub direction: SortDirection,
}

impl SortOrder {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Field name -> case-insensitive "contains" needle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactFilter {
    pub constraints: BTreeMap<String, String>,
}

impl ContactFilter {
    /// Filter that accepts every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one constraint, replacing any earlier needle for the same field.
    pub fn with(mut self, field: impl Into<String>, needle: impl Into<String>) -> Self {
        self.constraints.insert(field.into(), needle.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

/// Compiled predicate.
pub type ContactPredicate = Box<dyn Fn(&Contact) -> bool + Send + Sync>;

/// Compiled comparator.
pub type ContactComparator = Box<dyn Fn(&Contact, &Contact) -> Ordering + Send + Sync>;

/// Builds an AND-combined predicate from `filter`.
pub fn build_predicate(filter: &ContactFilter) -> ContactPredicate {
    let mut checks: Vec<(Option<FieldAccessor>, String)> = Vec::new();
    for (field, needle) in &filter.constraints {
        let accessor = resolve_accessor(field);
        if accessor.is_none() {
            warn!(
                "event=filter_build module=query status=error error_code=unknown_field field={}",
                field
            );
        }
        checks.push((accessor, needle.to_lowercase()));
    }

    Box::new(move |contact: &Contact| {
        checks.iter().all(|(accessor, needle)| match accessor {
            Some(accessor) => accessor(contact)
                .render()
                .is_some_and(|value| value.to_lowercase().contains(needle.as_str())),
            None => false,
        })
    })
}

/// Builds a lexicographic comparator from `sort`, first key primary.
pub fn build_comparator(sort: &[SortOrder]) -> ContactComparator {
    let mut keys: Vec<(Option<FieldAccessor>, SortDirection)> = Vec::new();
    for order in sort {
        let accessor = resolve_accessor(&order.field);
        if accessor.is_none() {
            warn!(
                "event=sort_build module=query status=error error_code=unknown_field field={}",
                order.field
            );
        }
        keys.push((accessor, order.direction));
    }

    Box::new(move |left: &Contact, right: &Contact| {
        for (accessor, direction) in &keys {
            let Some(accessor) = accessor else {
                continue;
            };
            let ordering = accessor(left).natural_cmp(&accessor(right));
            let ordering = match direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    })
}

/// Filters, stably sorts and pages `contacts`.
///
/// `limit = None` means no upper bound.
pub fn apply_query(
    contacts: Vec<Contact>,
    filter: &ContactFilter,
    sort: &[SortOrder],
    offset: usize,
    limit: Option<usize>,
) -> Vec<Contact> {
    let predicate = build_predicate(filter);
    let mut matched: Vec<Contact> = contacts
        .into_iter()
        .filter(|contact| predicate(contact))
        .collect();

    if !sort.is_empty() {
        let comparator = build_comparator(sort);
        matched.sort_by(|left, right| comparator(left, right));
    }

    matched
        .into_iter()
        .skip(offset)
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

/// Counts records accepted by `filter`.
pub fn count_matching<'a>(
    contacts: impl IntoIterator<Item = &'a Contact>,
    filter: &ContactFilter,
) -> usize {
    let predicate = build_predicate(filter);
    contacts
        .into_iter()
        .filter(|contact| predicate(contact))
        .count()
}
