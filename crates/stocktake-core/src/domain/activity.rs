//! Activity journal entities
//!
//! Every attempt to create or verify an audit is journaled so supervisors
//! can later see who did what, including rejected approvals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::audit::{FINAL_APPROVAL, SUPERVISOR1_APPROVAL};
use super::newtypes::{ActivityId, AuditId, StaffName};

/// Actions that can be recorded in the activity journal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    /// A stock-take was recorded
    AuditCreated,
    /// First supervisor sign-off was attempted
    Supervisor1Approval,
    /// Final sign-off was attempted
    FinalApproval,
}

impl ActivityAction {
    /// Returns the stable storage name of the action
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::AuditCreated => "audit_created",
            ActivityAction::Supervisor1Approval => SUPERVISOR1_APPROVAL,
            ActivityAction::FinalApproval => FINAL_APPROVAL,
        }
    }
}

impl std::fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a journaled action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityResult {
    /// The action completed successfully
    Success,
    /// The action was accepted but changed nothing; the step had already
    /// been recorded by `recorded_by`
    Unchanged {
        recorded_by: String,
    },
    /// The action was rejected or failed
    Failed {
        /// Reason code for categorization
        code: String,
        /// Human-readable error message
        message: String,
    },
}

impl ActivityResult {
    /// Creates a successful result
    pub fn success() -> Self {
        ActivityResult::Success
    }

    /// Creates a no-op result naming who holds the recorded approval
    pub fn unchanged(recorded_by: impl Into<String>) -> Self {
        ActivityResult::Unchanged {
            recorded_by: recorded_by.into(),
        }
    }

    /// Creates a failed result with the given code and message
    pub fn failed(code: impl Into<String>, message: impl Into<String>) -> Self {
        ActivityResult::Failed {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ActivityResult::Success)
    }

    pub fn is_unchanged(&self) -> bool {
        matches!(self, ActivityResult::Unchanged { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ActivityResult::Failed { .. })
    }
}

/// A journal entry recording one workflow action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Assigned by the database on insert
    id: Option<ActivityId>,
    timestamp: DateTime<Utc>,
    audit_id: Option<AuditId>,
    actor: Option<StaffName>,
    action: ActivityAction,
    result: ActivityResult,
    details: Value,
}

impl ActivityEntry {
    /// Creates a new entry stamped with the current time
    ///
    /// # Example
    ///
    /// ```
    /// use stocktake_core::domain::{ActivityAction, ActivityEntry, ActivityResult};
    ///
    /// let entry = ActivityEntry::new(ActivityAction::AuditCreated, ActivityResult::success());
    /// assert!(entry.result().is_success());
    /// assert!(entry.id().is_none());
    /// ```
    pub fn new(action: ActivityAction, result: ActivityResult) -> Self {
        Self {
            id: None,
            timestamp: Utc::now(),
            audit_id: None,
            actor: None,
            action,
            result,
            details: Value::Null,
        }
    }

    pub fn id(&self) -> Option<ActivityId> {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn audit_id(&self) -> Option<&AuditId> {
        self.audit_id.as_ref()
    }

    pub fn actor(&self) -> Option<&StaffName> {
        self.actor.as_ref()
    }

    pub fn action(&self) -> ActivityAction {
        self.action
    }

    pub fn result(&self) -> &ActivityResult {
        &self.result
    }

    pub fn details(&self) -> &Value {
        &self.details
    }

    /// Sets the ID (typically called after database insert)
    pub fn with_id(mut self, id: ActivityId) -> Self {
        self.id = Some(id);
        self
    }

    /// Overrides the timestamp (used when reading back from storage)
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_audit_id(mut self, audit_id: AuditId) -> Self {
        self.audit_id = Some(audit_id);
        self
    }

    pub fn with_actor(mut self, actor: StaffName) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_action_serialization() {
        let json = serde_json::to_string(&ActivityAction::Supervisor1Approval).unwrap();
        assert_eq!(json, "\"supervisor1_approval\"");

        let back: ActivityAction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ActivityAction::Supervisor1Approval);
    }

    #[test]
    fn test_action_display_matches_serialization() {
        for action in [
            ActivityAction::AuditCreated,
            ActivityAction::Supervisor1Approval,
            ActivityAction::FinalApproval,
        ] {
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{action}\""));
        }
    }

    #[test]
    fn test_result_failed() {
        let result = ActivityResult::failed("same_approver_conflict", "two-person rule");
        assert!(result.is_failed());
        assert!(!result.is_success());

        if let ActivityResult::Failed { code, message } = result {
            assert_eq!(code, "same_approver_conflict");
            assert_eq!(message, "two-person rule");
        } else {
            panic!("Expected Failed variant");
        }
    }

    #[test]
    fn test_result_unchanged() {
        let result = ActivityResult::unchanged("Masaki Shibata");
        assert!(result.is_unchanged());
        assert!(!result.is_success());
        assert!(!result.is_failed());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["unchanged"]["recorded_by"], "Masaki Shibata");
    }

    #[test]
    fn test_entry_builder() {
        let audit_id = AuditId::new();
        let actor = StaffName::new("Masaki Shibata").unwrap();

        let entry = ActivityEntry::new(ActivityAction::FinalApproval, ActivityResult::success())
            .with_audit_id(audit_id)
            .with_actor(actor.clone())
            .with_details(json!({"verification_status": "verified"}));

        assert_eq!(entry.audit_id(), Some(&audit_id));
        assert_eq!(entry.actor(), Some(&actor));
        assert_eq!(entry.details()["verification_status"], "verified");
        assert!(entry.id().is_none());
    }

    #[test]
    fn test_entry_serialization_roundtrip() {
        let entry = ActivityEntry::new(
            ActivityAction::AuditCreated,
            ActivityResult::failed("empty_roster", "nothing to audit"),
        )
        .with_id(ActivityId::new(3));

        let json = serde_json::to_string(&entry).unwrap();
        let back: ActivityEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
