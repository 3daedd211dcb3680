//! ActivityLogger - journal of audit workflow outcomes
//!
//! Wraps `IAuditRepository::save_activity()` with one method per workflow
//! outcome. All methods are non-fatal: errors in journal persistence are
//! logged via `tracing::warn!` but never propagated.

use std::sync::Arc;

use serde_json::json;
use stocktake_core::{
    domain::{
        ActivityAction, ActivityEntry, ActivityResult, AuditId, AuditSession,
        ReconciliationWarning, StaffName,
    },
    ports::IAuditRepository,
    usecases::{RecordedApproval, WorkflowError},
};

use crate::ReasonCode;

/// Records creation and approval attempts in the activity journal.
///
/// A journal failure never fails the workflow step it describes.
pub struct ActivityLogger {
    repository: Arc<dyn IAuditRepository>,
}

impl ActivityLogger {
    /// Creates a new `ActivityLogger` backed by the given repository.
    pub fn new(repository: Arc<dyn IAuditRepository>) -> Self {
        Self { repository }
    }

    async fn save(&self, entry: &ActivityEntry) {
        if let Err(e) = self.repository.save_activity(entry).await {
            tracing::warn!(error = %e, action = %entry.action(), "Failed to save activity entry");
        }
    }

    /// Log a newly recorded stock-take.
    pub async fn log_audit_created(
        &self,
        session: &AuditSession,
        warnings: &[ReconciliationWarning],
    ) {
        let entry = ActivityEntry::new(ActivityAction::AuditCreated, ActivityResult::success())
            .with_audit_id(*session.id())
            .with_actor(session.audited_by().clone())
            .with_details(json!({
                "total_assets": session.total_assets(),
                "scanned_count": session.scanned_count(),
                "missing_count": session.missing_count(),
                "status": session.status().as_str(),
                "warnings": warnings,
            }));
        self.save(&entry).await;
    }

    /// Log an accepted first supervisor approval.
    pub async fn log_supervisor1_approval(&self, approval: &RecordedApproval, actor: &StaffName) {
        self.log_approval(ActivityAction::Supervisor1Approval, approval, actor)
            .await;
    }

    /// Log an accepted final approval.
    pub async fn log_final_approval(&self, approval: &RecordedApproval, actor: &StaffName) {
        self.log_approval(ActivityAction::FinalApproval, approval, actor)
            .await;
    }

    /// A call that changed nothing is journaled as `Unchanged`, naming the
    /// supervisor whose approval is on record rather than the caller.
    async fn log_approval(
        &self,
        action: ActivityAction,
        approval: &RecordedApproval,
        actor: &StaffName,
    ) {
        let session = &approval.session;
        let recorded_by = match action {
            ActivityAction::FinalApproval => session.final_approval(),
            _ => session.supervisor1(),
        }
        .map(|a| a.by().as_str());

        let result = match (approval.is_applied(), recorded_by) {
            (false, Some(by)) => ActivityResult::unchanged(by),
            _ => ActivityResult::success(),
        };

        let entry = ActivityEntry::new(action, result)
            .with_audit_id(*session.id())
            .with_actor(actor.clone())
            .with_details(json!({
                "verification_status": session.verification_status().as_str(),
                "recorded_by": recorded_by,
                "applied": approval.is_applied(),
            }));
        self.save(&entry).await;
    }

    /// Log a rejected attempt.
    ///
    /// `audit_id` is absent for a failed creation; `actor` is absent when
    /// the caller could not be identified.
    pub async fn log_rejected(
        &self,
        action: ActivityAction,
        audit_id: Option<AuditId>,
        actor: Option<&StaffName>,
        error: &WorkflowError,
    ) {
        let code = ReasonCode::from(error);
        let result = ActivityResult::failed(code.to_string(), error.to_string());
        let mut entry = ActivityEntry::new(action, result);
        if let Some(id) = audit_id {
            entry = entry.with_audit_id(id);
        }
        if let Some(actor) = actor {
            entry = entry.with_actor(actor.clone());
        }
        self.save(&entry).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use chrono::{DateTime, Utc};
    use stocktake_core::{
        domain::{AssetId, Reconciliation, SupervisorRoster, TransitionOutcome, VerificationStatus},
        ports::AuditFilter,
    };

    /// In-memory mock repository that records saved journal entries
    struct MockRepo {
        entries: Mutex<Vec<ActivityEntry>>,
        fail: bool,
    }

    impl MockRepo {
        fn new() -> Self {
            Self {
                entries: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                entries: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn entries(&self) -> Vec<ActivityEntry> {
            self.entries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl IAuditRepository for MockRepo {
        async fn insert_audit(&self, _s: &AuditSession) -> anyhow::Result<()> {
            Ok(())
        }
        async fn get_audit(&self, _id: &AuditId) -> anyhow::Result<Option<AuditSession>> {
            Ok(None)
        }
        async fn update_verification(
            &self,
            _s: &AuditSession,
            _expected: VerificationStatus,
        ) -> anyhow::Result<bool> {
            Ok(true)
        }
        async fn list_audits(&self, _f: &AuditFilter) -> anyhow::Result<Vec<AuditSession>> {
            Ok(vec![])
        }
        async fn save_activity(&self, entry: &ActivityEntry) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("journal unavailable");
            }
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }
        async fn get_activity_for_audit(
            &self,
            _id: &AuditId,
        ) -> anyhow::Result<Vec<ActivityEntry>> {
            Ok(vec![])
        }
        async fn get_activity_since(
            &self,
            _since: DateTime<Utc>,
            _limit: u32,
        ) -> anyhow::Result<Vec<ActivityEntry>> {
            Ok(vec![])
        }
    }

    fn name(s: &str) -> StaffName {
        StaffName::new(s).unwrap()
    }

    fn session() -> (AuditSession, Vec<ReconciliationWarning>) {
        let roster: Vec<_> = ["A1", "A2"].iter().map(|s| AssetId::new(*s).unwrap()).collect();
        let scanned: Vec<_> = ["A1", "ZZ"].iter().map(|s| AssetId::new(*s).unwrap()).collect();
        let rec = Reconciliation::compute(&roster, &scanned).unwrap();
        AuditSession::new(AuditId::new(), Utc::now(), name("Auditor"), rec)
    }

    #[tokio::test]
    async fn test_log_audit_created() {
        let repo = Arc::new(MockRepo::new());
        let logger = ActivityLogger::new(repo.clone());
        let (session, warnings) = session();

        logger.log_audit_created(&session, &warnings).await;

        let entries = repo.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action(), ActivityAction::AuditCreated);
        assert_eq!(entries[0].audit_id(), Some(session.id()));
        assert_eq!(entries[0].actor().unwrap().as_str(), "Auditor");
        assert_eq!(entries[0].details()["missing_count"], 1);
        assert_eq!(entries[0].details()["status"], "in_progress");
        assert_eq!(
            entries[0].details()["warnings"][0]["kind"],
            "unknown_scanned_asset"
        );
    }

    #[tokio::test]
    async fn test_log_supervisor1_approval() {
        let repo = Arc::new(MockRepo::new());
        let logger = ActivityLogger::new(repo.clone());
        let (mut session, _) = session();
        let roster = SupervisorRoster::new(vec![name("Masaki Shibata")]);
        let outcome = session
            .approve_supervisor1(&name("Masaki Shibata"), Utc::now(), &roster)
            .unwrap();

        logger
            .log_supervisor1_approval(
                &RecordedApproval { session, outcome },
                &name("Masaki Shibata"),
            )
            .await;

        let entries = repo.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action(), ActivityAction::Supervisor1Approval);
        assert!(entries[0].result().is_success());
        assert_eq!(entries[0].details()["applied"], true);
        assert_eq!(
            entries[0].details()["verification_status"],
            "supervisor1_verified"
        );
        assert_eq!(entries[0].details()["recorded_by"], "Masaki Shibata");
    }

    #[tokio::test]
    async fn test_log_final_approval() {
        let repo = Arc::new(MockRepo::new());
        let logger = ActivityLogger::new(repo.clone());
        let (mut session, _) = session();
        let roster = SupervisorRoster::new(vec![name("Masaki Shibata"), name("Suradet Sarnyos")]);
        session
            .approve_supervisor1(&name("Masaki Shibata"), Utc::now(), &roster)
            .unwrap();
        let outcome = session
            .approve_final(&name("Suradet Sarnyos"), Utc::now(), &roster)
            .unwrap();

        logger
            .log_final_approval(
                &RecordedApproval { session, outcome },
                &name("Suradet Sarnyos"),
            )
            .await;

        let entries = repo.entries();
        assert_eq!(entries[0].action(), ActivityAction::FinalApproval);
        assert_eq!(entries[0].details()["verification_status"], "verified");
        assert_eq!(entries[0].details()["recorded_by"], "Suradet Sarnyos");
    }

    #[tokio::test]
    async fn test_noop_approval_names_recorded_approver() {
        let repo = Arc::new(MockRepo::new());
        let logger = ActivityLogger::new(repo.clone());
        let (mut session, _) = session();
        let roster = SupervisorRoster::new(vec![name("Masaki Shibata"), name("Niran Boonmee")]);
        session
            .approve_supervisor1(&name("Masaki Shibata"), Utc::now(), &roster)
            .unwrap();
        let outcome = session
            .approve_supervisor1(&name("Niran Boonmee"), Utc::now(), &roster)
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::AlreadySatisfied);

        logger
            .log_supervisor1_approval(
                &RecordedApproval { session, outcome },
                &name("Niran Boonmee"),
            )
            .await;

        let entries = repo.entries();
        assert_eq!(entries[0].actor().unwrap().as_str(), "Niran Boonmee");
        assert_eq!(
            entries[0].result(),
            &ActivityResult::unchanged("Masaki Shibata")
        );
        assert_eq!(entries[0].details()["applied"], false);
    }

    #[tokio::test]
    async fn test_log_rejected() {
        let repo = Arc::new(MockRepo::new());
        let logger = ActivityLogger::new(repo.clone());
        let audit_id = AuditId::new();
        let error = WorkflowError::SameApproverConflict("Masaki Shibata".into());

        logger
            .log_rejected(
                ActivityAction::FinalApproval,
                Some(audit_id),
                Some(&name("Masaki Shibata")),
                &error,
            )
            .await;

        let entries = repo.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].audit_id(), Some(&audit_id));
        match entries[0].result() {
            ActivityResult::Failed { code, message } => {
                assert_eq!(code, "same_approver_conflict");
                assert!(message.contains("Masaki Shibata"));
            }
            other => panic!("Expected Failed result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_log_rejected_creation_without_ids() {
        let repo = Arc::new(MockRepo::new());
        let logger = ActivityLogger::new(repo.clone());

        logger
            .log_rejected(
                ActivityAction::AuditCreated,
                None,
                None,
                &WorkflowError::EmptyRoster,
            )
            .await;

        let entries = repo.entries();
        assert!(entries[0].audit_id().is_none());
        assert!(entries[0].actor().is_none());
        assert!(entries[0].result().is_failed());
    }

    #[tokio::test]
    async fn test_journal_failure_is_swallowed() {
        let repo = Arc::new(MockRepo::failing());
        let logger = ActivityLogger::new(repo.clone());
        let (session, warnings) = session();

        // Must not panic or propagate
        logger.log_audit_created(&session, &warnings).await;
        assert!(repo.entries().is_empty());
    }
}
