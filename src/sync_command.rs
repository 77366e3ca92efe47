//! Sync command surface: option parsing, summary rendering and exit codes.
//!
//! The `sync_tenants` binary is a thin wrapper around [`SyncCommand::execute`]
//! so the exit-code contract can be tested without spawning a process.

use std::fmt::Write as _;
use std::io::Write;

use clap::{Args, ValueEnum};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::reconciler::{
    ReconcileError, SyncOptions, SyncReconciler, SyncReport, SyncTarget, TenantOutcome,
};

/// No tenant hard-failed
pub const EXIT_OK: u8 = 0;
/// At least one tenant hard-failed, or the requested tenant does not exist
pub const EXIT_HARD_FAILURE: u8 = 1;
/// Configuration or storage failure
pub const EXIT_SYSTEMIC: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Args)]
pub struct SyncCommand {
    /// Reconcile one tenant regardless of its status
    #[arg(long, value_name = "UUID")]
    pub tenant_id: Option<Uuid>,

    /// Compute and report changes without persisting them
    #[arg(long)]
    pub dry_run: bool,

    /// Summary format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl SyncCommand {
    pub fn options(&self) -> SyncOptions {
        SyncOptions {
            target: self
                .tenant_id
                .map(SyncTarget::Tenant)
                .unwrap_or(SyncTarget::AllActive),
            dry_run: self.dry_run,
        }
    }

    /// Run the reconciler, print the summary to `out` and return the exit code.
    pub async fn execute<W: Write>(&self, reconciler: &SyncReconciler, out: &mut W) -> u8 {
        match reconciler.run(&self.options()).await {
            Ok(report) => {
                let rendered = render(&report, self.format);
                if let Err(e) = out.write_all(rendered.as_bytes()) {
                    error!(error = %e, "Failed to write sync summary");
                    return EXIT_SYSTEMIC;
                }
                exit_code(&report)
            }
            Err(err) => {
                error!(error = %err, "Tenant sync aborted");
                let message = match self.format {
                    OutputFormat::Text => format!("error: {err}\n"),
                    OutputFormat::Json => format!("{}\n", json!({ "error": err.to_string() })),
                };
                // Best effort; the exit code carries the failure either way.
                let _ = out.write_all(message.as_bytes());
                error_exit_code(&err)
            }
        }
    }
}

pub fn exit_code(report: &SyncReport) -> u8 {
    if report.has_hard_failure() {
        EXIT_HARD_FAILURE
    } else {
        EXIT_OK
    }
}

pub fn error_exit_code(err: &ReconcileError) -> u8 {
    match err {
        ReconcileError::TenantNotFound(_) => EXIT_HARD_FAILURE,
        ReconcileError::Storage(_) | ReconcileError::Database(_) => EXIT_SYSTEMIC,
    }
}

pub fn render(report: &SyncReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => render_text(report),
        OutputFormat::Json => render_json(report),
    }
}

/// One line per tenant followed by a totals line.
pub fn render_text(report: &SyncReport) -> String {
    let mut out = String::new();
    let mode = if report.dry_run { " (dry run)" } else { "" };
    let _ = writeln!(out, "Tenant sync for period {}{mode}", report.period_start);

    for tenant in &report.tenants {
        let _ = write!(
            out,
            "{:<16} {} ({}) changes={}",
            tenant.outcome.as_str(),
            tenant.domain,
            tenant.tenant_id,
            tenant.changes
        );
        for change in &tenant.usage {
            if change.writes() || change.stored.is_some_and(|s| s != change.remote) {
                let stored = change
                    .stored
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let _ = write!(out, " {}:{}->{}", change.metric.as_str(), stored, change.remote);
            }
        }
        if let Some(error) = &tenant.error {
            let _ = write!(out, " error=\"{error}\"");
        }
        out.push('\n');
    }

    let totals = report.totals();
    let breakdown = [
        TenantOutcome::Updated,
        TenantOutcome::NoOp,
        TenantOutcome::AnomalyFlagged,
        TenantOutcome::Unreachable,
        TenantOutcome::RemoteError,
        TenantOutcome::Unauthorized,
        TenantOutcome::StorageError,
    ]
    .iter()
    .map(|o| format!("{}={}", o.as_str(), totals.count(*o)))
    .collect::<Vec<_>>()
    .join(" ");
    let _ = writeln!(
        out,
        "Totals: tenants={} changes={} {breakdown}",
        totals.tenants, totals.changes
    );
    out
}

pub fn render_json(report: &SyncReport) -> String {
    let value = json!({
        "dry_run": report.dry_run,
        "period_start": report.period_start,
        "tenants": report.tenants,
        "totals": report.totals(),
        "exit_code": exit_code(report),
    });
    format!("{value}\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::{ConnectionState, TenantReport};
    use crate::models::mfa_system_connection::ConnectionStatus;
    use chrono::{NaiveDate, Utc};

    fn tenant(outcome: TenantOutcome, changes: usize) -> TenantReport {
        TenantReport {
            tenant_id: Uuid::nil(),
            name: "Acme".into(),
            domain: "acme.test".into(),
            outcome,
            changes,
            usage: Vec::new(),
            connection_changed: false,
            connection: Some(ConnectionState {
                status: ConnectionStatus::Connected,
                is_connected: true,
                totals: Default::default(),
            }),
            notifications: Vec::new(),
            error: None,
            response_time_ms: 3,
        }
    }

    fn report(tenants: Vec<TenantReport>) -> SyncReport {
        SyncReport {
            dry_run: false,
            period_start: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            started_at: Utc::now(),
            tenants,
        }
    }

    #[test]
    fn soft_failures_exit_zero() {
        let report = report(vec![
            tenant(TenantOutcome::Unreachable, 0),
            tenant(TenantOutcome::RemoteError, 0),
            tenant(TenantOutcome::AnomalyFlagged, 1),
        ]);
        assert_eq!(exit_code(&report), EXIT_OK);
    }

    #[test]
    fn unauthorized_exits_one() {
        let report = report(vec![
            tenant(TenantOutcome::Updated, 2),
            tenant(TenantOutcome::Unauthorized, 1),
        ]);
        assert_eq!(exit_code(&report), EXIT_HARD_FAILURE);
    }

    #[test]
    fn tenant_storage_error_exits_one() {
        let report = report(vec![
            tenant(TenantOutcome::StorageError, 0),
            tenant(TenantOutcome::Updated, 4),
        ]);
        assert_eq!(exit_code(&report), EXIT_HARD_FAILURE);
        assert!(render_text(&report).contains("storage-error=1"));
    }

    #[test]
    fn missing_tenant_and_storage_errors_have_distinct_codes() {
        assert_eq!(
            error_exit_code(&ReconcileError::TenantNotFound(Uuid::nil())),
            EXIT_HARD_FAILURE
        );
        assert_eq!(
            error_exit_code(&ReconcileError::Database(sea_orm::DbErr::Custom("down".into()))),
            EXIT_SYSTEMIC
        );
    }

    #[test]
    fn text_summary_lists_each_tenant_and_totals() {
        let text = render_text(&report(vec![
            tenant(TenantOutcome::Updated, 2),
            tenant(TenantOutcome::NoOp, 0),
        ]));

        assert!(text.contains("updated"));
        assert!(text.contains("no-op"));
        assert!(text.contains("Totals: tenants=2 changes=2 updated=1 no-op=1"));
    }

    #[test]
    fn json_summary_is_machine_readable() {
        let rendered = render_json(&report(vec![tenant(TenantOutcome::Unauthorized, 1)]));
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(value["tenants"][0]["outcome"], "unauthorized");
        assert_eq!(value["totals"]["outcomes"]["unauthorized"], 1);
        assert_eq!(value["exit_code"], 1);
    }
}
