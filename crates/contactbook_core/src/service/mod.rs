//! Core use-case services.
//!
//! # Responsibility
//! - Serialise writes and publish change events around a repository.
//! - Offer a paged read façade to list-style callers.

pub mod contact_service;
pub mod query_service;
