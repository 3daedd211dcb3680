//! Use cases (interactors) for Stocktake
//!
//! Use cases are thin coordinators that delegate business rules to domain
//! methods and I/O to ports.
//!
//! - [`AuditWorkflowUseCase`] - audit creation, supervisor sign-off, lookup

pub mod audit_workflow;

pub use audit_workflow::{AuditWorkflowUseCase, CreatedAudit, RecordedApproval, WorkflowError};
