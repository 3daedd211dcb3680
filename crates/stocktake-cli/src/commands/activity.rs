//! Activity command - View the activity journal
//!
//! Provides the `stocktake activity` CLI command which:
//! 1. Queries journal entries since a time, or for a single audit
//! 2. Formats entries in a table with timestamp, action, actor and outcome
//! 3. Supports relative and absolute time parsing for the --since flag

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::Args;
use stocktake_core::domain::{ActivityEntry, ActivityResult, AuditId};
use stocktake_core::ports::IAuditRepository;
use tracing::info;

use crate::context::AppContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct ActivityCommand {
    /// Show entries since this time (e.g., "1h", "2d", "2026-01-01")
    #[arg(long)]
    pub since: Option<String>,

    /// Maximum number of entries to show
    #[arg(long, default_value = "50")]
    pub limit: u32,

    /// Show the full trail of one audit instead
    #[arg(long)]
    pub audit: Option<String>,
}

impl ActivityCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let repo = ctx.open_repository().await?;

        let (entries, since) = match &self.audit {
            Some(raw) => {
                let id: AuditId = raw
                    .parse()
                    .with_context(|| format!("Invalid audit ID '{raw}'"))?;
                let trail = repo
                    .get_activity_for_audit(&id)
                    .await
                    .context("Failed to query activity for audit")?;
                (trail, None)
            }
            None => {
                let since = match &self.since {
                    Some(since_str) => parse_since(since_str).with_context(|| {
                        format!(
                            "Invalid --since value: '{since_str}'. Expected formats: '1h', '30m', '2d', '1w', '2026-01-01', '2026-01-01T12:00:00'"
                        )
                    })?,
                    // Default: show last 7 days
                    None => Utc::now() - chrono::Duration::days(7),
                };
                let recent = repo
                    .get_activity_since(since, self.limit)
                    .await
                    .context("Failed to query activity entries")?;
                (recent, Some(since))
            }
        };

        info!(count = entries.len(), "Retrieved activity entries");

        if format.is_json() {
            let entries_json: Vec<serde_json::Value> = entries.iter().map(entry_json).collect();
            let json = serde_json::json!({
                "since": since.map(|s| s.to_rfc3339()),
                "audit_id": self.audit,
                "count": entries.len(),
                "entries": entries_json,
            });
            formatter.print_json(&json);
            return Ok(());
        }

        if entries.is_empty() {
            formatter.info("No activity found for the specified criteria.");
            return Ok(());
        }

        formatter.success(&format!("Activity ({} entries)", entries.len()));
        formatter.info("");
        formatter.info("  Timestamp           Action               Actor                Result");
        formatter.info("  ------------------- -------------------- -------------------- ------");

        for entry in &entries {
            formatter.info(&format!(
                "  {} {:<20} {:<20} {}",
                entry.timestamp().format("%Y-%m-%d %H:%M:%S"),
                entry.action().to_string(),
                truncate_string(entry.actor().map_or("-", |a| a.as_str()), 20),
                format_result(entry.result()),
            ));
        }

        if self.audit.is_none() && entries.len() as u32 >= self.limit {
            formatter.info("");
            formatter.info(&format!(
                "Showing {} entries (limit). Use --limit to show more.",
                self.limit
            ));
        }

        Ok(())
    }
}

pub(crate) fn entry_json(entry: &ActivityEntry) -> serde_json::Value {
    serde_json::json!({
        "id": entry.id().map(|id| id.value()),
        "timestamp": entry.timestamp().to_rfc3339(),
        "audit_id": entry.audit_id().map(|id| id.to_string()),
        "actor": entry.actor().map(|a| a.as_str()),
        "action": entry.action().to_string(),
        "result": entry.result(),
        "details": entry.details(),
    })
}

/// One-word outcome, with the reason code for rejections
pub(crate) fn format_result(result: &ActivityResult) -> String {
    match result {
        ActivityResult::Success => "OK".to_string(),
        ActivityResult::Unchanged { recorded_by } => format!("NO CHANGE ({recorded_by})"),
        ActivityResult::Failed { code, .. } => format!("FAILED ({code})"),
    }
}

/// Parse a time argument into a DateTime<Utc>
///
/// Supports:
/// - Relative: "1h" (1 hour ago), "30m" (30 minutes), "2d" (2 days), "1w" (1 week)
/// - RFC 3339: "2026-01-01T12:00:00+07:00"
/// - Absolute date: "2026-01-01"
/// - Absolute datetime (UTC): "2026-01-01T12:00:00"
pub(crate) fn parse_since(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();

    if let Some(duration) = parse_relative_duration(input) {
        return Ok(Utc::now() - duration);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let datetime = date
            .and_hms_opt(0, 0, 0)
            .context("Failed to create datetime from date")?;
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(datetime, Utc));
    }

    if let Ok(datetime) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(datetime, Utc));
    }

    anyhow::bail!(
        "Could not parse '{}' as a time. Use relative (1h, 30m, 2d, 1w) or absolute (2026-01-01) format.",
        input
    )
}

/// Parse relative duration strings like "1h", "30m", "2d", "1w"
fn parse_relative_duration(input: &str) -> Option<chrono::Duration> {
    if input.len() < 2 {
        return None;
    }

    let (num_str, unit) = input.split_at(input.len() - 1);
    let num: i64 = num_str.parse().ok()?;

    match unit {
        "m" => Some(chrono::Duration::minutes(num)),
        "h" => Some(chrono::Duration::hours(num)),
        "d" => Some(chrono::Duration::days(num)),
        "w" => Some(chrono::Duration::weeks(num)),
        _ => None,
    }
}

/// Truncate a string to at most `max_len` characters
pub(crate) fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
