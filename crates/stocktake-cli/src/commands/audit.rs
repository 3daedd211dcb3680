//! Audit command - Record and verify stock-takes
//!
//! Provides the `stocktake audit` CLI commands which:
//! 1. Create an audit by reconciling a roster file against a scan file
//! 2. Record the first and the final supervisor approval
//! 3. Show a single audit with its journal trail
//! 4. List audits with status and time filters
//!
//! Every create/approve outcome, successful or not, is journaled.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Subcommand;
use stocktake_activity::ActivityLogger;
use stocktake_core::domain::{
    ActivityAction, AuditId, AuditSession, AuditStatus, StaffName, VerificationStatus,
};
use stocktake_core::ports::{AuditFilter, IAuditRepository};
use stocktake_core::usecases::{AuditWorkflowUseCase, RecordedApproval, WorkflowError};
use tracing::info;

use super::activity::{entry_json, format_result, parse_since, truncate_string};
use crate::context::AppContext;
use crate::input::read_asset_ids;
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Audit subcommands
#[derive(Debug, Subcommand)]
pub enum AuditCommand {
    /// Record a new stock-take
    Create {
        /// File listing every asset that should be present
        #[arg(long)]
        roster: PathBuf,
        /// File listing the assets that were scanned
        #[arg(long)]
        scanned: PathBuf,
        /// PIN of the person who performed the scan
        #[arg(long)]
        pin: String,
        /// When the stock-take was performed (defaults to now)
        #[arg(long)]
        date: Option<String>,
    },
    /// Record the first supervisor approval
    Approve {
        /// Audit ID
        id: String,
        /// Supervisor PIN
        #[arg(long)]
        pin: String,
    },
    /// Record the final approval (must be a different supervisor)
    Finalize {
        /// Audit ID
        id: String,
        /// Supervisor PIN
        #[arg(long)]
        pin: String,
    },
    /// Show one audit and its activity trail
    Show {
        /// Audit ID
        id: String,
    },
    /// List audits, most recent first
    List {
        /// Maximum number of audits to show
        #[arg(long, default_value = "20")]
        limit: u32,
        /// Filter by verification status: pending, supervisor1_verified, verified
        #[arg(long)]
        verification: Option<String>,
        /// Filter by completeness: in_progress, completed
        #[arg(long)]
        status: Option<String>,
        /// Only audits performed since this time (e.g., "7d", "2026-01-01")
        #[arg(long)]
        since: Option<String>,
    },
}

impl AuditCommand {
    /// Execute the audit command
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        match self {
            AuditCommand::Create {
                roster,
                scanned,
                pin,
                date,
            } => {
                self.execute_create(ctx, roster, scanned, pin, date.as_deref(), format)
                    .await
            }
            AuditCommand::Approve { id, pin } => {
                self.execute_approval(ctx, ActivityAction::Supervisor1Approval, id, pin, format)
                    .await
            }
            AuditCommand::Finalize { id, pin } => {
                self.execute_approval(ctx, ActivityAction::FinalApproval, id, pin, format)
                    .await
            }
            AuditCommand::Show { id } => self.execute_show(ctx, id, format).await,
            AuditCommand::List {
                limit,
                verification,
                status,
                since,
            } => {
                let filter = build_filter(
                    *limit,
                    verification.as_deref(),
                    status.as_deref(),
                    since.as_deref(),
                )?;
                self.execute_list(ctx, &filter, format).await
            }
        }
    }

    async fn execute_create(
        &self,
        ctx: &AppContext,
        roster_path: &Path,
        scanned_path: &Path,
        pin: &str,
        date: Option<&str>,
        format: OutputFormat,
    ) -> Result<()> {
        let formatter = get_formatter(format);

        let auditor = ctx.resolve_pin(pin)?;
        let date = match date {
            Some(raw) => parse_since(raw).with_context(|| format!("Invalid --date value: '{raw}'"))?,
            None => Utc::now(),
        };
        let roster = read_asset_ids(roster_path)?;
        let scanned = read_asset_ids(scanned_path)?;

        let repo = ctx.open_repository().await?;
        let logger = ActivityLogger::new(repo.clone());
        let workflow = ctx.workflow(repo)?;

        let created = match workflow.create_audit(&roster, &scanned, auditor.clone(), date).await {
            Ok(created) => created,
            Err(e) => {
                logger
                    .log_rejected(ActivityAction::AuditCreated, None, Some(&auditor), &e)
                    .await;
                return Err(e.into());
            }
        };
        logger
            .log_audit_created(&created.session, &created.warnings)
            .await;

        let session = &created.session;
        info!(audit_id = %session.id(), "Audit recorded");

        for warning in &created.warnings {
            formatter.warn(&warning.to_string());
        }

        if format.is_json() {
            let json = serde_json::json!({
                "success": true,
                "audit": session_json(session)?,
                "warnings": created.warnings,
            });
            formatter.print_json(&json);
            return Ok(());
        }

        formatter.success(&format!("Audit {} recorded", session.id()));
        print_summary(&*formatter, session);
        if !session.missing_ids().is_empty() {
            formatter.info("");
            formatter.info("Missing assets:");
            for id in session.missing_ids() {
                formatter.info(&format!("  {id}"));
            }
        }

        Ok(())
    }

    async fn execute_approval(
        &self,
        ctx: &AppContext,
        action: ActivityAction,
        raw_id: &str,
        pin: &str,
        format: OutputFormat,
    ) -> Result<()> {
        let formatter = get_formatter(format);

        let id = parse_audit_id(raw_id)?;
        let actor = ctx.resolve_pin(pin)?;

        let repo = ctx.open_repository().await?;
        let logger = ActivityLogger::new(repo.clone());
        let workflow = ctx.workflow(repo)?;

        let approval = match approve(&workflow, action, &id, &actor).await {
            Ok(approval) => approval,
            Err(e) => {
                logger.log_rejected(action, Some(id), Some(&actor), &e).await;
                return Err(e.into());
            }
        };

        match action {
            ActivityAction::FinalApproval => logger.log_final_approval(&approval, &actor).await,
            _ => logger.log_supervisor1_approval(&approval, &actor).await,
        }
        let session = &approval.session;

        let recorded = match action {
            ActivityAction::FinalApproval => session.final_approval(),
            _ => session.supervisor1(),
        };

        if format.is_json() {
            let json = serde_json::json!({
                "success": true,
                "applied": approval.is_applied(),
                "audit": session_json(session)?,
            });
            formatter.print_json(&json);
            return Ok(());
        }

        if approval.is_applied() {
            formatter.success(&format!(
                "{} recorded for audit {} by {}",
                approval_label(action),
                session.id(),
                actor
            ));
        } else if let Some(existing) = recorded {
            formatter.warn(&format!(
                "{} was already given by {} at {}",
                approval_label(action),
                existing.by(),
                existing.at().format("%Y-%m-%d %H:%M:%S")
            ));
        }
        formatter.field("Verification", &verification_label(session.verification_status()));

        Ok(())
    }

    async fn execute_show(&self, ctx: &AppContext, raw_id: &str, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let id = parse_audit_id(raw_id)?;

        let repo = ctx.open_repository().await?;
        let workflow = ctx.workflow(repo.clone())?;
        let session = workflow.get_audit(&id).await?;
        let trail = repo
            .get_activity_for_audit(&id)
            .await
            .context("Failed to query activity for audit")?;

        if format.is_json() {
            let json = serde_json::json!({
                "audit": session_json(&session)?,
                "activity": trail.iter().map(entry_json).collect::<Vec<_>>(),
            });
            formatter.print_json(&json);
            return Ok(());
        }

        formatter.success(&format!("Audit {}", session.id()));
        print_summary(&*formatter, &session);
        formatter.field(
            "First approval",
            &session.supervisor1().map_or("-".to_string(), |a| {
                format!("{} ({})", a.by(), a.at().format("%Y-%m-%d %H:%M:%S"))
            }),
        );
        formatter.field(
            "Final approval",
            &session.final_approval().map_or("-".to_string(), |a| {
                format!("{} ({})", a.by(), a.at().format("%Y-%m-%d %H:%M:%S"))
            }),
        );

        if !session.missing_ids().is_empty() {
            formatter.info("");
            formatter.info(&format!("Missing assets ({}):", session.missing_count()));
            for asset in session.missing_ids() {
                formatter.info(&format!("  {asset}"));
            }
        }

        if !trail.is_empty() {
            formatter.info("");
            formatter.info("Activity:");
            for entry in &trail {
                formatter.info(&format!(
                    "  {} {:<20} {:<20} {}",
                    entry.timestamp().format("%Y-%m-%d %H:%M:%S"),
                    entry.action().to_string(),
                    truncate_string(entry.actor().map_or("-", |a| a.as_str()), 20),
                    format_result(entry.result()),
                ));
            }
        }

        Ok(())
    }

    async fn execute_list(
        &self,
        ctx: &AppContext,
        filter: &AuditFilter,
        format: OutputFormat,
    ) -> Result<()> {
        let formatter = get_formatter(format);

        let repo = ctx.open_repository().await?;
        let workflow = ctx.workflow(repo)?;
        let sessions = workflow.list_audits(filter).await?;

        info!(count = sessions.len(), "Retrieved audits");

        if format.is_json() {
            let audits = sessions
                .iter()
                .map(session_json)
                .collect::<Result<Vec<_>>>()?;
            let json = serde_json::json!({
                "count": sessions.len(),
                "audits": audits,
            });
            formatter.print_json(&json);
            return Ok(());
        }

        if sessions.is_empty() {
            formatter.info("No audits found for the specified criteria.");
            return Ok(());
        }

        formatter.success(&format!(
            "{} audit{}",
            sessions.len(),
            if sessions.len() == 1 { "" } else { "s" }
        ));
        formatter.info("");
        formatter.info("  ID (short)  Date              Scanned     Status       Verification");
        formatter.info("  ---------- ----------------- ----------- ------------ --------------------");

        for session in &sessions {
            formatter.info(&format!(
                "  {:<10} {} {:>11} {:<12} {}",
                short_id(session.id()),
                session.date().format("%Y-%m-%d %H:%M"),
                format!("{}/{}", session.scanned_count(), session.total_assets()),
                session.status().as_str(),
                verification_label(session.verification_status()),
            ));
        }

        Ok(())
    }
}

async fn approve(
    workflow: &AuditWorkflowUseCase,
    action: ActivityAction,
    id: &AuditId,
    actor: &StaffName,
) -> std::result::Result<RecordedApproval, WorkflowError> {
    match action {
        ActivityAction::FinalApproval => workflow.approve_final(id, actor, Utc::now()).await,
        _ => workflow.approve_supervisor1(id, actor, Utc::now()).await,
    }
}

fn build_filter(
    limit: u32,
    verification: Option<&str>,
    status: Option<&str>,
    since: Option<&str>,
) -> Result<AuditFilter> {
    let mut filter = AuditFilter::new().with_limit(limit);
    if let Some(raw) = verification {
        let parsed: VerificationStatus = raw
            .parse()
            .with_context(|| format!("Invalid --verification value: '{raw}'"))?;
        filter = filter.with_verification_status(parsed);
    }
    if let Some(raw) = status {
        let parsed: AuditStatus = raw
            .parse()
            .with_context(|| format!("Invalid --status value: '{raw}'"))?;
        filter = filter.with_status(parsed);
    }
    if let Some(raw) = since {
        let parsed = parse_since(raw).with_context(|| format!("Invalid --since value: '{raw}'"))?;
        filter = filter.with_since(parsed);
    }
    Ok(filter)
}

fn parse_audit_id(raw: &str) -> Result<AuditId> {
    raw.parse()
        .with_context(|| format!("Invalid audit ID '{raw}'"))
}

fn session_json(session: &AuditSession) -> Result<serde_json::Value> {
    let mut value = serde_json::to_value(session).context("Failed to serialize audit")?;
    if let Some(obj) = value.as_object_mut() {
        obj.insert(
            "coverage_percent".to_string(),
            serde_json::json!(session.coverage_percent()),
        );
    }
    Ok(value)
}

fn print_summary(formatter: &dyn OutputFormatter, session: &AuditSession) {
    formatter.field("Date", &session.date().format("%Y-%m-%d %H:%M:%S").to_string());
    formatter.field("Audited by", session.audited_by().as_str());
    formatter.field(
        "Scanned",
        &format!(
            "{}/{} ({:.1}%)",
            session.scanned_count(),
            session.total_assets(),
            session.coverage_percent()
        ),
    );
    formatter.field("Missing", &session.missing_count().to_string());
    formatter.field("Status", session.status().as_str());
    formatter.field("Verification", &verification_label(session.verification_status()));
}

fn approval_label(action: ActivityAction) -> &'static str {
    match action {
        ActivityAction::FinalApproval => "Final approval",
        _ => "First approval",
    }
}

fn verification_label(status: VerificationStatus) -> String {
    match status {
        VerificationStatus::Pending => "pending".to_string(),
        VerificationStatus::Supervisor1Verified => "awaiting final approval".to_string(),
        VerificationStatus::Verified => "verified".to_string(),
    }
}

/// First 8 characters of the UUID, enough to recognise an audit in a table
fn short_id(id: &AuditId) -> String {
    id.to_string().chars().take(8).collect()
}
