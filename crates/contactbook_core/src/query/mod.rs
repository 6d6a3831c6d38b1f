//! Field-driven filter and sort engine shared by all backends.
//!
//! # Responsibility
//! - Resolve field names through one accessor table.
//! - Build predicates and comparators from a field-keyed filter and sort request.
//!
//! # Invariants
//! - Unknown fields never abort a query: filters fail closed, sorts fail soft.
//! - Evaluation order is filter, stable sort, skip `offset`, take `limit`.

pub mod field;
pub mod filter;
