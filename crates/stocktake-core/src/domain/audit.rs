//! AuditSession domain entity
//!
//! An audit session is the record of one physical stock-take. Its
//! reconciliation result (scanned and missing assets) is fixed at creation;
//! afterwards only the verification annotation changes, and only through
//! the two approval transitions defined here:
//!
//! ```text
//! Pending --approve_supervisor1--> Supervisor1Verified --approve_final--> Verified
//! ```
//!
//! The final approval must come from a different supervisor than the first
//! (two-person rule). Repeating a transition that has already happened is a
//! no-op reported as [`TransitionOutcome::AlreadySatisfied`].

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{AssetId, AuditId, StaffName};
use super::reconciliation::{Reconciliation, ReconciliationWarning};
use super::staff::SupervisorRoster;

/// Event name of the first supervisor approval
pub const SUPERVISOR1_APPROVAL: &str = "supervisor1_approval";
/// Event name of the final approval
pub const FINAL_APPROVAL: &str = "final_approval";

/// Completeness of the physical scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// Some roster assets were not found
    InProgress,
    /// Every roster asset was scanned
    Completed,
}

impl AuditStatus {
    /// Returns the stable storage name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::InProgress => "in_progress",
            AuditStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "in_progress" => Ok(AuditStatus::InProgress),
            "completed" => Ok(AuditStatus::Completed),
            other => Err(DomainError::ValidationFailed(format!(
                "Unknown audit status: {other}"
            ))),
        }
    }
}

/// Progress of supervisor sign-off
///
/// Variants are declared in lifecycle order, so `Ord` matches progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// No approvals yet
    Pending,
    /// First supervisor has approved
    Supervisor1Verified,
    /// Both supervisors have approved (terminal)
    Verified,
}

impl VerificationStatus {
    /// Returns the stable storage name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Supervisor1Verified => "supervisor1_verified",
            VerificationStatus::Verified => "verified",
        }
    }

    /// Returns true for the terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, VerificationStatus::Verified)
    }
}

impl Default for VerificationStatus {
    fn default() -> Self {
        VerificationStatus::Pending
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(VerificationStatus::Pending),
            "supervisor1_verified" => Ok(VerificationStatus::Supervisor1Verified),
            "verified" => Ok(VerificationStatus::Verified),
            other => Err(DomainError::ValidationFailed(format!(
                "Unknown verification status: {other}"
            ))),
        }
    }
}

/// A supervisor's sign-off
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    by: StaffName,
    at: DateTime<Utc>,
}

impl Approval {
    pub fn new(by: StaffName, at: DateTime<Utc>) -> Self {
        Self { by, at }
    }

    /// Who approved
    pub fn by(&self) -> &StaffName {
        &self.by
    }

    /// When the approval was given
    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }
}

/// Result of applying a verification event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The session moved to a new verification status
    Applied,
    /// The transition had already happened; nothing changed
    AlreadySatisfied,
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied)
    }
}

/// Raw field set used to reconstitute a persisted session
///
/// [`AuditSession::restore`] checks every invariant before accepting it.
#[derive(Debug, Clone, Deserialize)]
pub struct RestoredAudit {
    pub id: AuditId,
    pub date: DateTime<Utc>,
    pub total_assets: usize,
    pub scanned_ids: BTreeSet<AssetId>,
    pub missing_ids: BTreeSet<AssetId>,
    pub scanned_count: usize,
    pub missing_count: usize,
    pub status: AuditStatus,
    pub audited_by: StaffName,
    pub verification_status: VerificationStatus,
    pub supervisor1: Option<Approval>,
    pub final_approval: Option<Approval>,
}

/// One physical stock-take and its verification progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RestoredAudit")]
pub struct AuditSession {
    id: AuditId,
    date: DateTime<Utc>,
    total_assets: usize,
    scanned_ids: BTreeSet<AssetId>,
    missing_ids: BTreeSet<AssetId>,
    scanned_count: usize,
    missing_count: usize,
    status: AuditStatus,
    audited_by: StaffName,
    verification_status: VerificationStatus,
    supervisor1: Option<Approval>,
    final_approval: Option<Approval>,
}

impl AuditSession {
    /// Creates a new session from a reconciliation result
    ///
    /// Returns the session in `Pending` verification together with the
    /// reconciliation warnings for the caller.
    pub fn new(
        id: AuditId,
        date: DateTime<Utc>,
        audited_by: StaffName,
        reconciliation: Reconciliation,
    ) -> (Self, Vec<ReconciliationWarning>) {
        let status = reconciliation.status();
        let (total_assets, scanned_ids, missing_ids, warnings) = reconciliation.into_parts();

        let session = Self {
            id,
            date,
            total_assets,
            scanned_count: scanned_ids.len(),
            missing_count: missing_ids.len(),
            scanned_ids,
            missing_ids,
            status,
            audited_by,
            verification_status: VerificationStatus::Pending,
            supervisor1: None,
            final_approval: None,
        };

        (session, warnings)
    }

    /// Reconstitutes a session from storage
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::ValidationFailed`] if the record breaks any
    /// session invariant (counts, partition, status, approval fields).
    pub fn restore(record: RestoredAudit) -> Result<Self, DomainError> {
        let id = record.id;
        let fail = |msg: String| -> Result<Self, DomainError> {
            Err(DomainError::ValidationFailed(format!("audit {id}: {msg}")))
        };

        if record.scanned_count != record.scanned_ids.len() {
            return fail(format!(
                "scanned_count {} does not match {} scanned ids",
                record.scanned_count,
                record.scanned_ids.len()
            ));
        }
        if record.missing_count != record.missing_ids.len() {
            return fail(format!(
                "missing_count {} does not match {} missing ids",
                record.missing_count,
                record.missing_ids.len()
            ));
        }
        if !record.scanned_ids.is_disjoint(&record.missing_ids) {
            return fail("scanned and missing ids overlap".to_string());
        }
        if record.scanned_count + record.missing_count != record.total_assets {
            return fail(format!(
                "scanned + missing ({}) does not equal total_assets ({})",
                record.scanned_count + record.missing_count,
                record.total_assets
            ));
        }
        if record.total_assets == 0 {
            return fail("audit covers no assets".to_string());
        }

        let expected_status = if record.missing_count == 0 {
            AuditStatus::Completed
        } else {
            AuditStatus::InProgress
        };
        if record.status != expected_status {
            return fail(format!(
                "status {} inconsistent with {} missing assets",
                record.status, record.missing_count
            ));
        }

        match (
            record.verification_status,
            &record.supervisor1,
            &record.final_approval,
        ) {
            (VerificationStatus::Pending, None, None) => {}
            (VerificationStatus::Supervisor1Verified, Some(_), None) => {}
            (VerificationStatus::Verified, Some(first), Some(last)) => {
                if first.by() == last.by() {
                    return fail("both approvals were given by the same supervisor".to_string());
                }
            }
            (status, _, _) => {
                return fail(format!("approval fields inconsistent with {status}"));
            }
        }

        Ok(Self {
            id: record.id,
            date: record.date,
            total_assets: record.total_assets,
            scanned_ids: record.scanned_ids,
            missing_ids: record.missing_ids,
            scanned_count: record.scanned_count,
            missing_count: record.missing_count,
            status: record.status,
            audited_by: record.audited_by,
            verification_status: record.verification_status,
            supervisor1: record.supervisor1,
            final_approval: record.final_approval,
        })
    }

    // --- Getters ---

    pub fn id(&self) -> &AuditId {
        &self.id
    }

    /// When the stock-take was performed
    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    /// Number of distinct assets expected
    pub fn total_assets(&self) -> usize {
        self.total_assets
    }

    pub fn scanned_ids(&self) -> &BTreeSet<AssetId> {
        &self.scanned_ids
    }

    pub fn missing_ids(&self) -> &BTreeSet<AssetId> {
        &self.missing_ids
    }

    pub fn scanned_count(&self) -> usize {
        self.scanned_count
    }

    pub fn missing_count(&self) -> usize {
        self.missing_count
    }

    pub fn status(&self) -> AuditStatus {
        self.status
    }

    /// Staff member who ran the scan
    pub fn audited_by(&self) -> &StaffName {
        &self.audited_by
    }

    pub fn verification_status(&self) -> VerificationStatus {
        self.verification_status
    }

    /// First supervisor sign-off, if given
    pub fn supervisor1(&self) -> Option<&Approval> {
        self.supervisor1.as_ref()
    }

    /// Final sign-off, if given
    pub fn final_approval(&self) -> Option<&Approval> {
        self.final_approval.as_ref()
    }

    /// Percentage of the roster that was scanned (0.0 to 100.0)
    pub fn coverage_percent(&self) -> f64 {
        if self.total_assets == 0 {
            return 0.0;
        }
        (self.scanned_count as f64 / self.total_assets as f64) * 100.0
    }

    // --- Transitions ---

    /// Records the first supervisor approval
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::UnknownActor`] if `actor` is not on the roster.
    pub fn approve_supervisor1(
        &mut self,
        actor: &StaffName,
        at: DateTime<Utc>,
        roster: &SupervisorRoster,
    ) -> Result<TransitionOutcome, DomainError> {
        if !roster.contains(actor) {
            return Err(DomainError::UnknownActor(actor.to_string()));
        }

        match self.verification_status {
            VerificationStatus::Pending => {
                self.supervisor1 = Some(Approval::new(actor.clone(), at));
                self.verification_status = VerificationStatus::Supervisor1Verified;
                Ok(TransitionOutcome::Applied)
            }
            VerificationStatus::Supervisor1Verified | VerificationStatus::Verified => {
                Ok(TransitionOutcome::AlreadySatisfied)
            }
        }
    }

    /// Records the final approval
    ///
    /// # Errors
    ///
    /// - [`DomainError::UnknownActor`] if `actor` is not on the roster
    /// - [`DomainError::InvalidTransition`] if the first approval is missing
    /// - [`DomainError::SameApproverConflict`] if `actor` gave the first approval
    pub fn approve_final(
        &mut self,
        actor: &StaffName,
        at: DateTime<Utc>,
        roster: &SupervisorRoster,
    ) -> Result<TransitionOutcome, DomainError> {
        if !roster.contains(actor) {
            return Err(DomainError::UnknownActor(actor.to_string()));
        }

        if self.verification_status == VerificationStatus::Pending {
            return Err(DomainError::InvalidTransition {
                from: self.verification_status.to_string(),
                event: FINAL_APPROVAL.to_string(),
            });
        }

        // Two-person rule: checked before idempotency so the first approver
        // is refused even after the audit is fully verified.
        if let Some(first) = &self.supervisor1 {
            if first.by() == actor {
                return Err(DomainError::SameApproverConflict(actor.to_string()));
            }
        }

        if self.verification_status.is_terminal() {
            return Ok(TransitionOutcome::AlreadySatisfied);
        }

        self.final_approval = Some(Approval::new(actor.clone(), at));
        self.verification_status = VerificationStatus::Verified;
        Ok(TransitionOutcome::Applied)
    }
}

impl TryFrom<RestoredAudit> for AuditSession {
    type Error = DomainError;

    fn try_from(record: RestoredAudit) -> Result<Self, Self::Error> {
        Self::restore(record)
    }
}
