//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures and verification guard violations.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Asset identifier is empty or malformed
    #[error("Invalid asset ID: {0}")]
    InvalidAssetId(String),

    /// Staff name is empty or malformed
    #[error("Invalid staff name: {0}")]
    InvalidStaffName(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// An audit was requested over an empty asset roster
    #[error("Cannot audit an empty asset roster")]
    EmptyRoster,

    /// The acting person is not a recognized supervisor
    #[error("Unknown supervisor: {0}")]
    UnknownActor(String),

    /// A verification event was applied in a state that does not accept it
    #[error("Invalid transition: cannot apply {event} while {from}")]
    InvalidTransition {
        /// The current verification status
        from: String,
        /// The event that was rejected
        event: String,
    },

    /// The final approver is the same person who gave the first approval
    #[error("{0} already gave the first approval; final approval requires a different supervisor")]
    SameApproverConflict(String),
}
