//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are interfaces that the domain core depends on, but whose
//! implementations live in adapter crates.
//!
//! - [`IAuditRepository`] - Persistent storage for audit sessions and the activity journal

pub mod audit_repository;

pub use audit_repository::{AuditFilter, IAuditRepository};
