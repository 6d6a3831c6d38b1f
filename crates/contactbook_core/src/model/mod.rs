//! Domain model for the contact store.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Own field-level validation rules shared by every storage backend.
//!
//! # Invariants
//! - A persisted contact is identified by a stable `ContactId`.
//! - Deletion is a hard delete; there is no tombstone state.

pub mod contact;
