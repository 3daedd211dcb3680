//! Reason codes for journal entries
//!
//! Categorizes why a workflow attempt was rejected. Used by
//! `ActivityLogger` to fill the `code` of a failed entry.

use std::fmt;

use serde::{Deserialize, Serialize};
use stocktake_core::usecases::WorkflowError;

/// Structured reason codes for rejected workflow attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// The roster supplied at creation was empty
    EmptyRoster,
    /// The referenced audit does not exist
    NotFound,
    /// The approver is not a recognized supervisor
    UnknownActor,
    /// The verification state does not accept the event
    InvalidTransition,
    /// The final approver already gave the first approval
    SameApproverConflict,
    /// Input could not be parsed or a stored record is inconsistent
    InvalidInput,
    /// The record store failed
    StorageFailure,
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReasonCode::EmptyRoster => "empty_roster",
            ReasonCode::NotFound => "not_found",
            ReasonCode::UnknownActor => "unknown_actor",
            ReasonCode::InvalidTransition => "invalid_transition",
            ReasonCode::SameApproverConflict => "same_approver_conflict",
            ReasonCode::InvalidInput => "invalid_input",
            ReasonCode::StorageFailure => "storage_failure",
        };
        write!(f, "{s}")
    }
}

impl From<&WorkflowError> for ReasonCode {
    fn from(e: &WorkflowError) -> Self {
        match e {
            WorkflowError::EmptyRoster => ReasonCode::EmptyRoster,
            WorkflowError::NotFound(_) => ReasonCode::NotFound,
            WorkflowError::UnknownActor(_) => ReasonCode::UnknownActor,
            WorkflowError::InvalidTransition { .. } => ReasonCode::InvalidTransition,
            WorkflowError::SameApproverConflict(_) => ReasonCode::SameApproverConflict,
            WorkflowError::Invalid(_) => ReasonCode::InvalidInput,
            WorkflowError::Storage(_) => ReasonCode::StorageFailure,
        }
    }
}
