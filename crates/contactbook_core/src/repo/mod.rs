//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the contact storage contract shared by all backends.
//! - Isolate map and SQLite details from service orchestration.
//!
//! # Invariants
//! - Repository writes must call `Contact::validate()` before mutating.
//! - Both backends return the same semantic errors for the same input.

pub mod contact_repo;
pub mod memory_repo;
pub mod sqlite_repo;
