//! Audit repository port (driven/secondary port)
//!
//! This module defines the interface for persisting audit sessions and
//! the activity journal.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   and don't need domain-level classification.
//! - Sessions are inserted once and afterwards only their verification
//!   fields change, through [`IAuditRepository::update_verification`].
//!   That update is conditional on the previously read status so that two
//!   racing approvals cannot both commit.

use chrono::{DateTime, Utc};

use crate::domain::{
    ActivityEntry, AuditId, AuditSession, AuditStatus, VerificationStatus,
};

/// Filter criteria for listing audit sessions
///
/// All fields are optional; when `None`, no filtering is applied for that field.
/// Multiple filters are combined with AND logic.
///
/// # Example
///
/// ```
/// use stocktake_core::domain::VerificationStatus;
/// use stocktake_core::ports::AuditFilter;
///
/// // Audits still waiting for their first approval
/// let filter = AuditFilter::new()
///     .with_verification_status(VerificationStatus::Pending)
///     .with_limit(20);
/// assert!(!filter.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// Filter by verification status
    pub verification_status: Option<VerificationStatus>,
    /// Filter by scan completeness
    pub status: Option<AuditStatus>,
    /// Only audits performed at or after this time
    pub since: Option<DateTime<Utc>>,
    /// Maximum number of sessions to return
    pub limit: Option<u32>,
}

impl AuditFilter {
    /// Creates a new empty filter (matches all sessions)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_verification_status(mut self, status: VerificationStatus) -> Self {
        self.verification_status = Some(status);
        self
    }

    pub fn with_status(mut self, status: AuditStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if no criteria are set
    pub fn is_empty(&self) -> bool {
        self.verification_status.is_none()
            && self.status.is_none()
            && self.since.is_none()
            && self.limit.is_none()
    }

    /// Returns true if `session` satisfies every criterion (limit excluded)
    pub fn matches(&self, session: &AuditSession) -> bool {
        self.verification_status
            .map_or(true, |s| session.verification_status() == s)
            && self.status.map_or(true, |s| session.status() == s)
            && self.since.map_or(true, |since| session.date() >= since)
    }
}

/// Port trait for audit persistence
#[async_trait::async_trait]
pub trait IAuditRepository: Send + Sync {
    // --- Audit session operations ---

    /// Inserts a newly created session
    ///
    /// Fails if a session with the same ID already exists.
    async fn insert_audit(&self, session: &AuditSession) -> anyhow::Result<()>;

    /// Retrieves a session by its ID
    async fn get_audit(&self, id: &AuditId) -> anyhow::Result<Option<AuditSession>>;

    /// Writes the verification fields of `session`, leaving every other
    /// column untouched
    ///
    /// The write only happens if the stored verification status still equals
    /// `expected`. Returns `false` when it did not (another writer committed
    /// first, or the session does not exist).
    async fn update_verification(
        &self,
        session: &AuditSession,
        expected: VerificationStatus,
    ) -> anyhow::Result<bool>;

    /// Lists sessions matching `filter`, most recent audit date first
    async fn list_audits(&self, filter: &AuditFilter) -> anyhow::Result<Vec<AuditSession>>;

    // --- Activity journal operations ---

    /// Appends a journal entry
    async fn save_activity(&self, entry: &ActivityEntry) -> anyhow::Result<()>;

    /// Retrieves every journal entry for an audit, oldest first
    async fn get_activity_for_audit(&self, audit_id: &AuditId)
        -> anyhow::Result<Vec<ActivityEntry>>;

    /// Retrieves journal entries at or after `since`, newest first, up to `limit`
    async fn get_activity_since(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> anyhow::Result<Vec<ActivityEntry>>;
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::domain::{AssetId, Reconciliation, StaffName};

    fn session(roster: &[&str], scanned: &[&str]) -> AuditSession {
        let roster: Vec<_> = roster.iter().map(|s| AssetId::new(*s).unwrap()).collect();
        let scanned: Vec<_> = scanned.iter().map(|s| AssetId::new(*s).unwrap()).collect();
        let rec = Reconciliation::compute(&roster, &scanned).unwrap();
        AuditSession::new(
            AuditId::new(),
            Utc::now(),
            StaffName::new("Auditor").unwrap(),
            rec,
        )
        .0
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = AuditFilter::new();
        assert!(filter.is_empty());
        assert!(filter.matches(&session(&["A"], &[])));
    }

    #[test]
    fn test_status_filters() {
        let complete = session(&["A"], &["A"]);
        let partial = session(&["A", "B"], &["A"]);

        let filter = AuditFilter::new().with_status(AuditStatus::Completed);
        assert!(filter.matches(&complete));
        assert!(!filter.matches(&partial));

        let filter = AuditFilter::new().with_verification_status(VerificationStatus::Verified);
        assert!(!filter.matches(&complete));
    }

    #[test]
    fn test_since_filter() {
        let s = session(&["A"], &["A"]);
        assert!(AuditFilter::new()
            .with_since(s.date() - Duration::seconds(1))
            .matches(&s));
        assert!(!AuditFilter::new()
            .with_since(s.date() + Duration::seconds(1))
            .matches(&s));
    }
}
