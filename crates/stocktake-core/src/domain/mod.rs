//! Domain entities and business logic
//!
//! This module contains the core domain types for Stocktake:
//! - Newtypes for type-safe identifiers and validated values
//! - Reconciliation of an asset roster against scan results
//! - Audit sessions and their verification state machine
//! - Staff directory and supervisor roster
//! - Activity journal entries
//! - Domain-specific error types

pub mod activity;
pub mod audit;
pub mod errors;
pub mod newtypes;
pub mod reconciliation;
pub mod staff;

// Re-export commonly used types
pub use activity::{ActivityAction, ActivityEntry, ActivityResult};
pub use audit::{
    Approval, AuditSession, AuditStatus, RestoredAudit, TransitionOutcome, VerificationStatus,
};
pub use errors::DomainError;
pub use newtypes::*;
pub use reconciliation::{Reconciliation, ReconciliationWarning};
pub use staff::{StaffDirectory, SupervisorRoster};
