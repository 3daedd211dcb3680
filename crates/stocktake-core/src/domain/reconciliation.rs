//! Roster reconciliation
//!
//! Compares the asset roster expected at audit time with the identifiers
//! actually scanned during the walk-through. The scanned set is reduced to
//! roster members; anything else is reported as a warning rather than
//! failing the audit.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::audit::AuditStatus;
use super::errors::DomainError;
use super::newtypes::AssetId;

/// Non-fatal data-quality finding produced while reconciling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "asset_id", rename_all = "snake_case")]
pub enum ReconciliationWarning {
    /// A scanned identifier is not part of the roster (stale or foreign asset)
    UnknownScannedAsset(AssetId),
    /// The roster listed the same asset more than once
    DuplicateRosterEntry(AssetId),
}

impl std::fmt::Display for ReconciliationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconciliationWarning::UnknownScannedAsset(id) => {
                write!(f, "scanned asset {id} is not in the roster")
            }
            ReconciliationWarning::DuplicateRosterEntry(id) => {
                write!(f, "asset {id} appears more than once in the roster")
            }
        }
    }
}

/// Outcome of comparing a roster with a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    roster: BTreeSet<AssetId>,
    scanned: BTreeSet<AssetId>,
    missing: BTreeSet<AssetId>,
    warnings: Vec<ReconciliationWarning>,
}

impl Reconciliation {
    /// Reconciles `roster` against `scanned`
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::EmptyRoster`] if the roster has no assets.
    pub fn compute(roster: &[AssetId], scanned: &[AssetId]) -> Result<Self, DomainError> {
        if roster.is_empty() {
            return Err(DomainError::EmptyRoster);
        }

        let mut warnings = Vec::new();

        let mut roster_set = BTreeSet::new();
        let mut reported_duplicates = BTreeSet::new();
        for id in roster {
            if !roster_set.insert(id.clone()) && reported_duplicates.insert(id.clone()) {
                warnings.push(ReconciliationWarning::DuplicateRosterEntry(id.clone()));
            }
        }

        let mut scanned_set = BTreeSet::new();
        let mut reported_unknown = BTreeSet::new();
        for id in scanned {
            if roster_set.contains(id) {
                scanned_set.insert(id.clone());
            } else if reported_unknown.insert(id.clone()) {
                warnings.push(ReconciliationWarning::UnknownScannedAsset(id.clone()));
            }
        }

        let missing = roster_set.difference(&scanned_set).cloned().collect();

        Ok(Self {
            roster: roster_set,
            scanned: scanned_set,
            missing,
            warnings,
        })
    }

    /// Number of distinct assets expected
    pub fn total_assets(&self) -> usize {
        self.roster.len()
    }

    /// Roster assets confirmed present
    pub fn scanned(&self) -> &BTreeSet<AssetId> {
        &self.scanned
    }

    /// Roster assets not found during the scan
    pub fn missing(&self) -> &BTreeSet<AssetId> {
        &self.missing
    }

    pub fn scanned_count(&self) -> usize {
        self.scanned.len()
    }

    pub fn missing_count(&self) -> usize {
        self.missing.len()
    }

    /// Data-quality warnings for the caller
    pub fn warnings(&self) -> &[ReconciliationWarning] {
        &self.warnings
    }

    /// `Completed` only when every roster asset was scanned
    pub fn status(&self) -> AuditStatus {
        if self.missing.is_empty() {
            AuditStatus::Completed
        } else {
            AuditStatus::InProgress
        }
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        usize,
        BTreeSet<AssetId>,
        BTreeSet<AssetId>,
        Vec<ReconciliationWarning>,
    ) {
        (self.roster.len(), self.scanned, self.missing, self.warnings)
    }
}
