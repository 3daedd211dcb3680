//! SQLite implementation of IAuditRepository
//!
//! This module provides the concrete SQLite-based implementation of the
//! audit repository port defined in stocktake-core. It handles all domain
//! type serialization/deserialization and SQL query construction.
//!
//! ## Type Mapping
//!
//! | Domain Type          | SQL Type | Strategy                                   |
//! |----------------------|----------|--------------------------------------------|
//! | AuditId              | TEXT     | UUID string via `.to_string()` / `FromStr` |
//! | StaffName            | TEXT     | String via `.as_str()` / `StaffName::new()` |
//! | BTreeSet<AssetId>    | TEXT     | serde_json array                           |
//! | DateTime<Utc>        | TEXT     | RFC 3339, fixed nanosecond width, `Z`      |
//! | AuditStatus          | TEXT     | `.as_str()` / `FromStr`                    |
//! | VerificationStatus   | TEXT     | `.as_str()` / `FromStr`                    |
//! | Approval             | 2 x TEXT | `*_verified_by` + `*_verified_at` columns  |
//! | ActivityResult       | TEXT     | serde_json serialization                   |
//!
//! Timestamps are written with a fixed width so that lexical ordering in
//! SQLite matches chronological ordering.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use stocktake_core::domain::{
    ActivityAction, ActivityEntry, ActivityId, ActivityResult, Approval, AssetId, AuditId,
    AuditSession, AuditStatus, RestoredAudit, StaffName, VerificationStatus,
};
use stocktake_core::ports::{AuditFilter, IAuditRepository};

use crate::CacheError;

/// SQLite-based implementation of the audit repository port
pub struct SqliteAuditRepository {
    pool: SqlitePool,
}

impl SqliteAuditRepository {
    /// Creates a new repository instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a DateTime<Utc> from an ISO 8601 string
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            CacheError::CorruptRecord(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

fn staff_name(s: &str) -> Result<StaffName, CacheError> {
    StaffName::new(s).map_err(|e| CacheError::CorruptRecord(e.to_string()))
}

fn asset_set_to_string(ids: &BTreeSet<AssetId>) -> Result<String, CacheError> {
    serde_json::to_string(ids)
        .map_err(|e| CacheError::CorruptRecord(format!("Failed to encode asset ids: {}", e)))
}

fn asset_set_from_string(s: &str) -> Result<BTreeSet<AssetId>, CacheError> {
    serde_json::from_str(s).map_err(|e| {
        CacheError::CorruptRecord(format!("Invalid asset id list '{}': {}", s, e))
    })
}

/// Splits an approval into its `(by, at)` columns
fn approval_columns(approval: Option<&Approval>) -> (Option<String>, Option<String>) {
    match approval {
        Some(a) => (
            Some(a.by().as_str().to_string()),
            Some(format_datetime(&a.at())),
        ),
        None => (None, None),
    }
}

/// Rebuilds an approval from its `(by, at)` columns
///
/// Both columns must be set or both null.
fn approval_from_columns(
    column: &str,
    by: Option<String>,
    at: Option<String>,
) -> Result<Option<Approval>, CacheError> {
    match (by, at) {
        (Some(by), Some(at)) => Ok(Some(Approval::new(staff_name(&by)?, parse_datetime(&at)?))),
        (None, None) => Ok(None),
        _ => Err(CacheError::CorruptRecord(format!(
            "{column}: approver and timestamp must both be set or both be null"
        ))),
    }
}

fn count_from_row(row: &SqliteRow, column: &str) -> Result<usize, CacheError> {
    let value: i64 = row.get(column);
    usize::try_from(value)
        .map_err(|_| CacheError::CorruptRecord(format!("{column} is negative: {value}")))
}

// ============================================================================
// Row mapping functions
// ============================================================================

/// Reconstruct an AuditSession from a database row
///
/// Goes through [`AuditSession::restore`] so a tampered row is rejected
/// rather than loaded in an inconsistent state.
fn audit_from_row(row: &SqliteRow) -> Result<AuditSession, CacheError> {
    let id_str: String = row.get("id");
    let date_str: String = row.get("date");
    let scanned_str: String = row.get("scanned_ids");
    let missing_str: String = row.get("missing_ids");
    let status_str: String = row.get("status");
    let audited_by_str: String = row.get("audited_by");
    let verification_str: String = row.get("verification_status");

    let id = AuditId::from_str(&id_str).map_err(|e| {
        CacheError::CorruptRecord(format!("Invalid AuditId '{}': {}", id_str, e))
    })?;
    let status = AuditStatus::from_str(&status_str)
        .map_err(|e| CacheError::CorruptRecord(e.to_string()))?;
    let verification_status = VerificationStatus::from_str(&verification_str)
        .map_err(|e| CacheError::CorruptRecord(e.to_string()))?;

    let record = RestoredAudit {
        id,
        date: parse_datetime(&date_str)?,
        total_assets: count_from_row(row, "total_assets")?,
        scanned_ids: asset_set_from_string(&scanned_str)?,
        missing_ids: asset_set_from_string(&missing_str)?,
        scanned_count: count_from_row(row, "scanned_count")?,
        missing_count: count_from_row(row, "missing_count")?,
        status,
        audited_by: staff_name(&audited_by_str)?,
        verification_status,
        supervisor1: approval_from_columns(
            "supervisor1",
            row.get("supervisor1_verified_by"),
            row.get("supervisor1_verified_at"),
        )?,
        final_approval: approval_from_columns(
            "final",
            row.get("final_verified_by"),
            row.get("final_verified_at"),
        )?,
    };

    AuditSession::restore(record).map_err(|e| CacheError::CorruptRecord(e.to_string()))
}

/// Reconstruct an ActivityEntry from a database row
fn activity_entry_from_row(row: &SqliteRow) -> Result<ActivityEntry, CacheError> {
    let id: i64 = row.get("id");
    let timestamp_str: String = row.get("timestamp");
    let audit_id_str: Option<String> = row.get("audit_id");
    let actor_str: Option<String> = row.get("actor");
    let action_str: String = row.get("action");
    let result_str: String = row.get("result");
    let details_str: String = row.get("details");

    let action: ActivityAction =
        serde_json::from_str(&format!("\"{}\"", action_str)).map_err(|e| {
            CacheError::CorruptRecord(format!(
                "Invalid ActivityAction '{}': {}",
                action_str, e
            ))
        })?;

    let result: ActivityResult = serde_json::from_str(&result_str).map_err(|e| {
        CacheError::CorruptRecord(format!("Invalid ActivityResult '{}': {}", result_str, e))
    })?;

    let details: serde_json::Value = serde_json::from_str(&details_str).map_err(|e| {
        CacheError::CorruptRecord(format!("Invalid activity details '{}': {}", details_str, e))
    })?;

    let mut entry = ActivityEntry::new(action, result)
        .with_id(ActivityId::new(id))
        .with_timestamp(parse_datetime(&timestamp_str)?)
        .with_details(details);

    if let Some(s) = audit_id_str.filter(|s| !s.is_empty()) {
        let audit_id = AuditId::from_str(&s).map_err(|e| {
            CacheError::CorruptRecord(format!("Invalid AuditId '{}': {}", s, e))
        })?;
        entry = entry.with_audit_id(audit_id);
    }
    if let Some(s) = actor_str.filter(|s| !s.is_empty()) {
        entry = entry.with_actor(staff_name(&s)?);
    }

    Ok(entry)
}

// ============================================================================
// IAuditRepository implementation
// ============================================================================

#[async_trait::async_trait]
impl IAuditRepository for SqliteAuditRepository {
    // --- Audit session operations ---

    async fn insert_audit(&self, session: &AuditSession) -> anyhow::Result<()> {
        let id = session.id().to_string();
        let scanned_ids = asset_set_to_string(session.scanned_ids())?;
        let missing_ids = asset_set_to_string(session.missing_ids())?;
        let (s1_by, s1_at) = approval_columns(session.supervisor1());
        let (final_by, final_at) = approval_columns(session.final_approval());

        sqlx::query(
            "INSERT INTO audit_sessions \
             (id, date, total_assets, scanned_ids, missing_ids, scanned_count, \
              missing_count, status, audited_by, verification_status, \
              supervisor1_verified_by, supervisor1_verified_at, \
              final_verified_by, final_verified_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(format_datetime(&session.date()))
        .bind(session.total_assets() as i64)
        .bind(&scanned_ids)
        .bind(&missing_ids)
        .bind(session.scanned_count() as i64)
        .bind(session.missing_count() as i64)
        .bind(session.status().as_str())
        .bind(session.audited_by().as_str())
        .bind(session.verification_status().as_str())
        .bind(&s1_by)
        .bind(&s1_at)
        .bind(&final_by)
        .bind(&final_at)
        .execute(&self.pool)
        .await
        .map_err(CacheError::Query)?;

        tracing::trace!(audit_id = %id, "Inserted audit session");
        Ok(())
    }

    async fn get_audit(&self, id: &AuditId) -> anyhow::Result<Option<AuditSession>> {
        let id_str = id.to_string();

        let row = sqlx::query("SELECT * FROM audit_sessions WHERE id = ?")
            .bind(&id_str)
            .fetch_optional(&self.pool)
            .await
            .map_err(CacheError::Query)?;

        match row {
            Some(ref r) => Ok(Some(audit_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn update_verification(
        &self,
        session: &AuditSession,
        expected: VerificationStatus,
    ) -> anyhow::Result<bool> {
        let id = session.id().to_string();
        let (s1_by, s1_at) = approval_columns(session.supervisor1());
        let (final_by, final_at) = approval_columns(session.final_approval());

        let result = sqlx::query(
            "UPDATE audit_sessions SET \
             verification_status = ?, \
             supervisor1_verified_by = ?, supervisor1_verified_at = ?, \
             final_verified_by = ?, final_verified_at = ? \
             WHERE id = ? AND verification_status = ?",
        )
        .bind(session.verification_status().as_str())
        .bind(&s1_by)
        .bind(&s1_at)
        .bind(&final_by)
        .bind(&final_at)
        .bind(&id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(CacheError::Query)?;

        let committed = result.rows_affected() == 1;
        tracing::trace!(
            audit_id = %id,
            expected = %expected,
            committed,
            "Conditional verification update"
        );
        Ok(committed)
    }

    async fn list_audits(&self, filter: &AuditFilter) -> anyhow::Result<Vec<AuditSession>> {
        let mut sql = String::from("SELECT * FROM audit_sessions WHERE 1=1");
        let mut binds: Vec<String> = Vec::new();

        if let Some(status) = filter.verification_status {
            sql.push_str(" AND verification_status = ?");
            binds.push(status.as_str().to_string());
        }

        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            binds.push(status.as_str().to_string());
        }

        if let Some(ref since) = filter.since {
            sql.push_str(" AND date >= ?");
            binds.push(format_datetime(since));
        }

        sql.push_str(" ORDER BY date DESC, created_at DESC");

        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(CacheError::Query)?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in &rows {
            sessions.push(audit_from_row(row)?);
        }

        Ok(sessions)
    }

    // --- Activity journal operations ---

    async fn save_activity(&self, entry: &ActivityEntry) -> anyhow::Result<()> {
        let timestamp = format_datetime(&entry.timestamp());
        let audit_id = entry.audit_id().map(|id| id.to_string());
        let actor = entry.actor().map(|a| a.as_str().to_string());
        let action = entry.action().to_string();
        let result = serde_json::to_string(entry.result())
            .map_err(|e| anyhow::anyhow!("Failed to serialize activity result: {}", e))?;
        let details = serde_json::to_string(entry.details())
            .map_err(|e| anyhow::anyhow!("Failed to serialize activity details: {}", e))?;

        sqlx::query(
            "INSERT INTO activity_log \
             (timestamp, audit_id, actor, action, result, details) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&timestamp)
        .bind(&audit_id)
        .bind(&actor)
        .bind(&action)
        .bind(&result)
        .bind(&details)
        .execute(&self.pool)
        .await
        .map_err(CacheError::Query)?;

        tracing::trace!(action = %action, "Saved activity entry");
        Ok(())
    }

    async fn get_activity_for_audit(
        &self,
        audit_id: &AuditId,
    ) -> anyhow::Result<Vec<ActivityEntry>> {
        let audit_id_str = audit_id.to_string();

        let rows = sqlx::query(
            "SELECT * FROM activity_log WHERE audit_id = ? ORDER BY timestamp ASC, id ASC",
        )
        .bind(&audit_id_str)
        .fetch_all(&self.pool)
        .await
        .map_err(CacheError::Query)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(activity_entry_from_row(row)?);
        }

        Ok(entries)
    }

    async fn get_activity_since(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> anyhow::Result<Vec<ActivityEntry>> {
        let since_str = format_datetime(&since);

        let rows = sqlx::query(
            "SELECT * FROM activity_log WHERE timestamp >= ? \
             ORDER BY timestamp DESC, id DESC LIMIT ?",
        )
        .bind(&since_str)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(CacheError::Query)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(activity_entry_from_row(row)?);
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_datetime_format_is_fixed_width() {
        let a = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let b = a + chrono::Duration::nanoseconds(1_500);

        let (sa, sb) = (format_datetime(&a), format_datetime(&b));
        assert_eq!(sa.len(), sb.len());
        assert!(sa < sb);
        assert!(sa.ends_with('Z'));
        assert_eq!(parse_datetime(&sb).unwrap(), b);
    }

    #[test]
    fn test_parse_datetime_rejects_garbage() {
        assert!(matches!(
            parse_datetime("yesterday"),
            Err(CacheError::CorruptRecord(_))
        ));
    }

    #[test]
    fn test_approval_columns_roundtrip() {
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap();
        let approval = Approval::new(StaffName::new("Masaki Shibata").unwrap(), at);

        let (by, at_str) = approval_columns(Some(&approval));
        let back = approval_from_columns("supervisor1", by, at_str).unwrap();
        assert_eq!(back, Some(approval));

        assert_eq!(approval_from_columns("final", None, None).unwrap(), None);
    }

    #[test]
    fn test_half_set_approval_is_rejected() {
        let result = approval_from_columns("final", Some("Masaki Shibata".into()), None);
        assert!(matches!(result, Err(CacheError::CorruptRecord(_))));
    }

    #[test]
    fn test_asset_set_encoding() {
        let ids: BTreeSet<AssetId> = ["B", "A"]
            .iter()
            .map(|s| AssetId::new(*s).unwrap())
            .collect();
        let encoded = asset_set_to_string(&ids).unwrap();
        assert_eq!(encoded, r#"["A","B"]"#);
        assert_eq!(asset_set_from_string(&encoded).unwrap(), ids);

        assert!(asset_set_from_string(r#"[""]"#).is_err());
    }
}
