//! Audit workflow use case
//!
//! The only component that constructs or mutates an [`AuditSession`].
//! Creation reconciles the roster against the scan and inserts the new
//! session; each approval is a read-modify-write against the repository
//! whose write is conditional on the status that was read. When another
//! approval commits in between, the session is re-read and the transition
//! re-evaluated against the new state.

use std::sync::Arc;

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{
    AssetId, AuditId, AuditSession, DomainError, Reconciliation, ReconciliationWarning,
    StaffName, SupervisorRoster, TransitionOutcome,
};
use crate::domain::audit::{FINAL_APPROVAL, SUPERVISOR1_APPROVAL};
use crate::ports::{AuditFilter, IAuditRepository};

/// How many times an approval is re-evaluated after losing a commit race
const MAX_COMMIT_ATTEMPTS: usize = 3;

/// Errors reported by the audit workflow
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The roster supplied at creation was empty
    #[error("Cannot audit an empty asset roster")]
    EmptyRoster,

    /// No session exists with the given ID
    #[error("Audit not found: {0}")]
    NotFound(AuditId),

    /// The approver is not a recognized supervisor
    #[error("Unknown supervisor: {0}")]
    UnknownActor(String),

    /// The verification state does not accept the requested event
    #[error("Invalid transition: cannot apply {event} while {from}")]
    InvalidTransition { from: String, event: String },

    /// The final approver already gave the first approval
    #[error("{0} already gave the first approval; final approval requires a different supervisor")]
    SameApproverConflict(String),

    /// Malformed input or an inconsistent stored record
    #[error("Invalid input: {0}")]
    Invalid(String),

    /// The repository failed
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<DomainError> for WorkflowError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::EmptyRoster => WorkflowError::EmptyRoster,
            DomainError::UnknownActor(actor) => WorkflowError::UnknownActor(actor),
            DomainError::InvalidTransition { from, event } => {
                WorkflowError::InvalidTransition { from, event }
            }
            DomainError::SameApproverConflict(actor) => WorkflowError::SameApproverConflict(actor),
            other => WorkflowError::Invalid(other.to_string()),
        }
    }
}

/// A newly created session plus the non-fatal reconciliation findings
#[derive(Debug, Clone)]
pub struct CreatedAudit {
    pub session: AuditSession,
    pub warnings: Vec<ReconciliationWarning>,
}

/// A session after an approval call, and whether that call changed it
///
/// `outcome` is `AlreadySatisfied` when the step had been recorded before,
/// possibly by another supervisor whose commit won a race. The recorded
/// approver is then whoever is in the session, not the caller.
#[derive(Debug, Clone)]
pub struct RecordedApproval {
    pub session: AuditSession,
    pub outcome: TransitionOutcome,
}

impl RecordedApproval {
    /// Whether this call is the one that recorded the approval
    pub fn is_applied(&self) -> bool {
        self.outcome.is_applied()
    }
}

/// Use case for the audit verification workflow
pub struct AuditWorkflowUseCase {
    repository: Arc<dyn IAuditRepository + Send + Sync>,
    supervisors: SupervisorRoster,
}

impl AuditWorkflowUseCase {
    /// Creates a new AuditWorkflowUseCase
    ///
    /// # Arguments
    ///
    /// * `repository` - Persistent storage for audit sessions
    /// * `supervisors` - People allowed to verify audits
    pub fn new(
        repository: Arc<dyn IAuditRepository + Send + Sync>,
        supervisors: SupervisorRoster,
    ) -> Self {
        Self {
            repository,
            supervisors,
        }
    }

    /// Records a new stock-take
    ///
    /// Scanned identifiers outside the roster are dropped and returned as
    /// warnings alongside the session.
    ///
    /// # Errors
    ///
    /// - [`WorkflowError::EmptyRoster`] if `roster` is empty
    /// - [`WorkflowError::Storage`] if the session cannot be persisted
    pub async fn create_audit(
        &self,
        roster: &[AssetId],
        scanned: &[AssetId],
        audited_by: StaffName,
        date: DateTime<Utc>,
    ) -> Result<CreatedAudit, WorkflowError> {
        let reconciliation = Reconciliation::compute(roster, scanned)?;
        let (session, warnings) =
            AuditSession::new(AuditId::new(), date, audited_by, reconciliation);

        self.repository
            .insert_audit(&session)
            .await
            .context("Failed to persist new audit")?;

        for warning in &warnings {
            warn!(audit_id = %session.id(), %warning, "Reconciliation warning");
        }
        info!(
            audit_id = %session.id(),
            total = session.total_assets(),
            scanned = session.scanned_count(),
            missing = session.missing_count(),
            status = %session.status(),
            "Audit created"
        );

        Ok(CreatedAudit { session, warnings })
    }

    /// Records the first supervisor approval
    ///
    /// Re-approving a session that is already past this step returns it
    /// unchanged with `TransitionOutcome::AlreadySatisfied`.
    ///
    /// # Errors
    ///
    /// `NotFound`, `UnknownActor`, or `Storage`.
    pub async fn approve_supervisor1(
        &self,
        id: &AuditId,
        actor: &StaffName,
        at: DateTime<Utc>,
    ) -> Result<RecordedApproval, WorkflowError> {
        self.apply_verification(id, SUPERVISOR1_APPROVAL, |session| {
            session.approve_supervisor1(actor, at, &self.supervisors)
        })
        .await
    }

    /// Records the final approval
    ///
    /// # Errors
    ///
    /// `NotFound`, `UnknownActor`, `InvalidTransition` (no first approval
    /// yet), `SameApproverConflict`, or `Storage`.
    pub async fn approve_final(
        &self,
        id: &AuditId,
        actor: &StaffName,
        at: DateTime<Utc>,
    ) -> Result<RecordedApproval, WorkflowError> {
        self.apply_verification(id, FINAL_APPROVAL, |session| {
            session.approve_final(actor, at, &self.supervisors)
        })
        .await
    }

    /// Fetches a session
    pub async fn get_audit(&self, id: &AuditId) -> Result<AuditSession, WorkflowError> {
        self.repository
            .get_audit(id)
            .await
            .with_context(|| format!("Failed to load audit {id}"))?
            .ok_or(WorkflowError::NotFound(*id))
    }

    /// Lists sessions, most recent first
    pub async fn list_audits(
        &self,
        filter: &AuditFilter,
    ) -> Result<Vec<AuditSession>, WorkflowError> {
        let sessions = self
            .repository
            .list_audits(filter)
            .await
            .context("Failed to list audits")?;
        Ok(sessions)
    }

    async fn apply_verification<F>(
        &self,
        id: &AuditId,
        event: &str,
        transition: F,
    ) -> Result<RecordedApproval, WorkflowError>
    where
        F: Fn(&mut AuditSession) -> Result<TransitionOutcome, DomainError>,
    {
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let mut session = self.get_audit(id).await?;
            let expected = session.verification_status();

            let outcome = transition(&mut session).map_err(|e| {
                warn!(audit_id = %id, event, error = %e, "Verification rejected");
                WorkflowError::from(e)
            })?;

            if !outcome.is_applied() {
                debug!(audit_id = %id, event, status = %expected, "Already satisfied");
                return Ok(RecordedApproval { session, outcome });
            }

            let committed = self
                .repository
                .update_verification(&session, expected)
                .await
                .with_context(|| format!("Failed to save {event} for audit {id}"))?;

            if committed {
                info!(
                    audit_id = %id,
                    event,
                    status = %session.verification_status(),
                    "Verification recorded"
                );
                return Ok(RecordedApproval { session, outcome });
            }

            debug!(audit_id = %id, event, attempt, "Concurrent update detected, re-reading");
        }

        Err(WorkflowError::Storage(anyhow!(
            "audit {id} changed concurrently {MAX_COMMIT_ATTEMPTS} times during {event}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Duration;

    use super::*;
    use crate::domain::{ActivityEntry, AuditStatus, VerificationStatus};

    type Interloper = Box<dyn FnOnce(&mut AuditSession) + Send>;

    /// In-memory repository with an optional hook that simulates another
    /// writer committing just before the next conditional update
    #[derive(Default)]
    struct MockRepo {
        sessions: Mutex<HashMap<AuditId, AuditSession>>,
        interloper: Mutex<Option<Interloper>>,
        updates: Mutex<u32>,
    }

    impl MockRepo {
        fn with_interloper(hook: Interloper) -> Self {
            let repo = Self::default();
            *repo.interloper.lock().unwrap() = Some(hook);
            repo
        }

        fn stored(&self, id: &AuditId) -> AuditSession {
            self.sessions.lock().unwrap().get(id).cloned().unwrap()
        }

        fn update_calls(&self) -> u32 {
            *self.updates.lock().unwrap()
        }
    }

    #[async_trait]
    impl IAuditRepository for MockRepo {
        async fn insert_audit(&self, session: &AuditSession) -> anyhow::Result<()> {
            let mut sessions = self.sessions.lock().unwrap();
            if sessions.contains_key(session.id()) {
                anyhow::bail!("duplicate audit id");
            }
            sessions.insert(*session.id(), session.clone());
            Ok(())
        }

        async fn get_audit(&self, id: &AuditId) -> anyhow::Result<Option<AuditSession>> {
            Ok(self.sessions.lock().unwrap().get(id).cloned())
        }

        async fn update_verification(
            &self,
            session: &AuditSession,
            expected: VerificationStatus,
        ) -> anyhow::Result<bool> {
            *self.updates.lock().unwrap() += 1;
            let mut sessions = self.sessions.lock().unwrap();

            if let Some(hook) = self.interloper.lock().unwrap().take() {
                if let Some(stored) = sessions.get_mut(session.id()) {
                    hook(stored);
                }
            }

            match sessions.get_mut(session.id()) {
                Some(stored) if stored.verification_status() == expected => {
                    *stored = session.clone();
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn list_audits(&self, filter: &AuditFilter) -> anyhow::Result<Vec<AuditSession>> {
            let mut all: Vec<_> = self
                .sessions
                .lock()
                .unwrap()
                .values()
                .filter(|s| filter.matches(s))
                .cloned()
                .collect();
            all.sort_by(|a, b| b.date().cmp(&a.date()));
            Ok(all)
        }

        async fn save_activity(&self, _entry: &ActivityEntry) -> anyhow::Result<()> {
            Ok(())
        }

        async fn get_activity_for_audit(
            &self,
            _audit_id: &AuditId,
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

    /// Repository whose every call fails
    struct FailingRepo;

    #[async_trait]
    impl IAuditRepository for FailingRepo {
        async fn insert_audit(&self, _s: &AuditSession) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
        async fn get_audit(&self, _id: &AuditId) -> anyhow::Result<Option<AuditSession>> {
            anyhow::bail!("disk full")
        }
        async fn update_verification(
            &self,
            _s: &AuditSession,
            _e: VerificationStatus,
        ) -> anyhow::Result<bool> {
            anyhow::bail!("disk full")
        }
        async fn list_audits(&self, _f: &AuditFilter) -> anyhow::Result<Vec<AuditSession>> {
            anyhow::bail!("disk full")
        }
        async fn save_activity(&self, _e: &ActivityEntry) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
        async fn get_activity_for_audit(
            &self,
            _id: &AuditId,
        ) -> anyhow::Result<Vec<ActivityEntry>> {
            anyhow::bail!("disk full")
        }
        async fn get_activity_since(
            &self,
            _since: DateTime<Utc>,
            _limit: u32,
        ) -> anyhow::Result<Vec<ActivityEntry>> {
            anyhow::bail!("disk full")
        }
    }

    fn name(s: &str) -> StaffName {
        StaffName::new(s).unwrap()
    }

    fn ids(raw: &[&str]) -> Vec<AssetId> {
        raw.iter().map(|s| AssetId::new(*s).unwrap()).collect()
    }

    fn supervisors() -> SupervisorRoster {
        SupervisorRoster::new(vec![
            name("Masaki Shibata"),
            name("Suradet Sarnyos"),
            name("Niran Boonmee"),
        ])
    }

    fn use_case(repo: Arc<MockRepo>) -> AuditWorkflowUseCase {
        AuditWorkflowUseCase::new(repo, supervisors())
    }

    async fn created(uc: &AuditWorkflowUseCase) -> AuditSession {
        uc.create_audit(
            &ids(&["A1", "A2", "A3"]),
            &ids(&["A1", "A3"]),
            name("Auditor"),
            Utc::now(),
        )
        .await
        .unwrap()
        .session
    }

    #[tokio::test]
    async fn test_create_partial_audit() {
        let repo = Arc::new(MockRepo::default());
        let uc = use_case(repo.clone());

        let result = uc
            .create_audit(
                &ids(&["A1", "A2", "A3"]),
                &ids(&["A1", "A3"]),
                name("Auditor"),
                Utc::now(),
            )
            .await
            .unwrap();

        let session = result.session;
        assert_eq!(session.scanned_count(), 2);
        assert_eq!(session.missing_count(), 1);
        let expected_missing: std::collections::BTreeSet<AssetId> = ids(&["A2"]).into_iter().collect();
        assert_eq!(session.missing_ids(), &expected_missing);
        assert_eq!(session.status(), AuditStatus::InProgress);
        assert_eq!(session.verification_status(), VerificationStatus::Pending);
        assert!(result.warnings.is_empty());

        assert_eq!(repo.stored(session.id()), session);
    }

    #[tokio::test]
    async fn test_create_complete_audit() {
        let uc = use_case(Arc::new(MockRepo::default()));
        let session = uc
            .create_audit(&ids(&["A1", "A2"]), &ids(&["A1", "A2"]), name("Auditor"), Utc::now())
            .await
            .unwrap()
            .session;

        assert_eq!(session.status(), AuditStatus::Completed);
        assert!(session.missing_ids().is_empty());
    }

    #[tokio::test]
    async fn test_create_reports_unknown_scans() {
        let uc = use_case(Arc::new(MockRepo::default()));
        let result = uc
            .create_audit(&ids(&["A1"]), &ids(&["A1", "OLD-9"]), name("Auditor"), Utc::now())
            .await
            .unwrap();

        assert_eq!(result.session.scanned_count(), 1);
        assert_eq!(
            result.warnings,
            vec![ReconciliationWarning::UnknownScannedAsset(
                AssetId::new("OLD-9").unwrap()
            )]
        );
    }

    #[tokio::test]
    async fn test_create_empty_roster_fails() {
        let repo = Arc::new(MockRepo::default());
        let uc = use_case(repo.clone());

        let err = uc
            .create_audit(&[], &ids(&["A1"]), name("Auditor"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::EmptyRoster));
        assert!(repo.sessions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_two_person_scenario() {
        let repo = Arc::new(MockRepo::default());
        let uc = use_case(repo.clone());
        let id = *created(&uc).await.id();
        let t1 = Utc::now();

        let s = uc
            .approve_supervisor1(&id, &name("Masaki Shibata"), t1)
            .await
            .unwrap();
        assert!(s.is_applied());
        assert_eq!(
            s.session.verification_status(),
            VerificationStatus::Supervisor1Verified
        );

        let err = uc
            .approve_final(&id, &name("Masaki Shibata"), t1 + Duration::minutes(1))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::SameApproverConflict(ref a) if a == "Masaki Shibata"));

        let s = uc
            .approve_final(&id, &name("Suradet Sarnyos"), t1 + Duration::minutes(2))
            .await
            .unwrap()
            .session;
        assert_eq!(s.verification_status(), VerificationStatus::Verified);
        assert_eq!(repo.stored(&id), s);
    }

    #[tokio::test]
    async fn test_final_while_pending_is_invalid() {
        let uc = use_case(Arc::new(MockRepo::default()));
        let id = *created(&uc).await.id();

        let err = uc
            .approve_final(&id, &name("Suradet Sarnyos"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }));

        let s = uc.get_audit(&id).await.unwrap();
        assert_eq!(s.verification_status(), VerificationStatus::Pending);
    }

    #[tokio::test]
    async fn test_unknown_actor_rejected() {
        let uc = use_case(Arc::new(MockRepo::default()));
        let id = *created(&uc).await.id();

        let err = uc
            .approve_supervisor1(&id, &name("Auditor"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownActor(_)));
    }

    #[tokio::test]
    async fn test_unknown_audit_not_found() {
        let uc = use_case(Arc::new(MockRepo::default()));
        let missing = AuditId::new();

        let err = uc.get_audit(&missing).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(id) if id == missing));

        let err = uc
            .approve_supervisor1(&missing, &name("Masaki Shibata"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_repeat_first_approval_is_idempotent() {
        let repo = Arc::new(MockRepo::default());
        let uc = use_case(repo.clone());
        let id = *created(&uc).await.id();
        let t1 = Utc::now();

        let first = uc
            .approve_supervisor1(&id, &name("Masaki Shibata"), t1)
            .await
            .unwrap();
        let second = uc
            .approve_supervisor1(&id, &name("Masaki Shibata"), t1 + Duration::hours(2))
            .await
            .unwrap();

        assert_eq!(first.outcome, TransitionOutcome::Applied);
        assert_eq!(second.outcome, TransitionOutcome::AlreadySatisfied);
        assert_eq!(first.session, second.session);
        assert_eq!(second.session.supervisor1().unwrap().at(), t1);
        assert_eq!(repo.update_calls(), 1);
    }

    #[tokio::test]
    async fn test_lost_race_on_same_step_is_noop() {
        let winner_time = Utc::now() - Duration::seconds(1);
        let roster = supervisors();
        let hook: Interloper = Box::new(move |stored: &mut AuditSession| {
            stored
                .approve_supervisor1(&name("Niran Boonmee"), winner_time, &roster)
                .unwrap();
        });
        let repo = Arc::new(MockRepo::with_interloper(hook));
        let uc = use_case(repo.clone());
        let id = *created(&uc).await.id();

        let approval = uc
            .approve_supervisor1(&id, &name("Masaki Shibata"), Utc::now())
            .await
            .unwrap();
        assert_eq!(approval.outcome, TransitionOutcome::AlreadySatisfied);

        let s = approval.session;
        assert_eq!(s.supervisor1().unwrap().by().as_str(), "Niran Boonmee");
        assert_eq!(s.supervisor1().unwrap().at(), winner_time);
        assert_eq!(repo.stored(&id), s);
    }

    #[tokio::test]
    async fn test_lost_race_reapplies_guards() {
        // Suradet's final approval commits between Niran's read and write
        let roster = supervisors();
        let hook: Interloper = Box::new(move |stored: &mut AuditSession| {
            stored
                .approve_final(&name("Suradet Sarnyos"), Utc::now(), &roster)
                .unwrap();
        });
        let repo = Arc::new(MockRepo::with_interloper(hook));
        let uc = use_case(repo.clone());
        let id = *created(&uc).await.id();

        // Stage the first approval directly so the interloper is still armed
        repo.sessions
            .lock()
            .unwrap()
            .get_mut(&id)
            .unwrap()
            .approve_supervisor1(&name("Masaki Shibata"), Utc::now(), &supervisors())
            .unwrap();

        let approval = uc
            .approve_final(&id, &name("Niran Boonmee"), Utc::now())
            .await
            .unwrap();
        assert!(!approval.is_applied());
        let s = approval.session;
        assert_eq!(s.verification_status(), VerificationStatus::Verified);
        assert_eq!(s.final_approval().unwrap().by().as_str(), "Suradet Sarnyos");
        assert_eq!(repo.update_calls(), 1);

        let err = uc
            .approve_final(&id, &name("Masaki Shibata"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::SameApproverConflict(_)));
    }

    #[tokio::test]
    async fn test_list_audits_newest_first() {
        let uc = use_case(Arc::new(MockRepo::default()));
        let now = Utc::now();
        let older = uc
            .create_audit(&ids(&["A"]), &ids(&["A"]), name("Auditor"), now - Duration::days(3))
            .await
            .unwrap()
            .session;
        let newer = uc
            .create_audit(&ids(&["A"]), &[], name("Auditor"), now)
            .await
            .unwrap()
            .session;

        let all = uc.list_audits(&AuditFilter::new()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id(), newer.id());
        assert_eq!(all[1].id(), older.id());

        let complete = uc
            .list_audits(&AuditFilter::new().with_status(AuditStatus::Completed))
            .await
            .unwrap();
        assert_eq!(complete.len(), 1);
        assert_eq!(complete[0].id(), older.id());
    }

    #[tokio::test]
    async fn test_storage_failures_surface() {
        let uc = AuditWorkflowUseCase::new(Arc::new(FailingRepo), supervisors());

        let err = uc
            .create_audit(&ids(&["A"]), &[], name("Auditor"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Storage(_)));

        let err = uc
            .approve_supervisor1(&AuditId::new(), &name("Masaki Shibata"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Storage(_)));
    }

    #[test]
    fn test_domain_error_mapping() {
        let err: WorkflowError = DomainError::InvalidAssetId("bad".into()).into();
        assert!(matches!(err, WorkflowError::Invalid(_)));

        let err: WorkflowError = DomainError::SameApproverConflict("A".into()).into();
        assert!(matches!(err, WorkflowError::SameApproverConflict(_)));
    }
}
