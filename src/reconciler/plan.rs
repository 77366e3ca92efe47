//! Change planning for one tenant.
//!
//! Everything here is pure: the reconciler gathers the stored state and the
//! remote response, builds a [`ChangePlan`], and either applies it (live run)
//! or only reports it (dry run). Both paths share this code so a dry run
//! reports exactly what a live run would write.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::mfa::{MfaClientError, TenantStats};
use crate::models::mfa_system_connection::{ConnectionStatus, Model as ConnectionModel};
use crate::models::tenant_notification::NotificationKind;
use crate::models::tenant_usage_stat::UsageMetric;
use crate::repositories::connection::{ContactOutcome, RemoteTotals};

/// What happens to one usage counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UsageAction {
    /// No stored row yet: write the remote value
    Insert,
    /// Remote moved forward: overwrite
    Update,
    /// Remote equals stored: nothing to write
    Unchanged,
    /// Remote went backwards: keep the stored value and flag it
    Anomaly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageChange {
    pub metric: UsageMetric,
    pub stored: Option<i64>,
    pub remote: i64,
    pub action: UsageAction,
}

impl UsageChange {
    pub fn writes(&self) -> bool {
        matches!(self.action, UsageAction::Insert | UsageAction::Update)
    }
}

/// Compare stored counters with remote ones. Remote is authoritative unless it
/// went backwards; any decrease is an anomaly.
pub fn plan_usage_changes(
    stored: &BTreeMap<UsageMetric, i64>,
    remote: &BTreeMap<UsageMetric, i64>,
) -> Vec<UsageChange> {
    remote
        .iter()
        .map(|(&metric, &remote)| {
            let stored = stored.get(&metric).copied();
            let action = match stored {
                None => UsageAction::Insert,
                Some(current) if remote > current => UsageAction::Update,
                Some(current) if remote == current => UsageAction::Unchanged,
                Some(_) => UsageAction::Anomaly,
            };
            UsageChange {
                metric,
                stored,
                remote,
                action,
            }
        })
        .collect()
}

/// Map the remote stats payload onto the local usage metrics.
pub fn remote_usage(stats: &TenantStats) -> BTreeMap<UsageMetric, i64> {
    UsageMetric::ALL
        .into_iter()
        .map(|metric| {
            let value = match metric {
                UsageMetric::Authentications => stats.monthly_authentications,
                UsageMetric::ActiveUsers => stats.active_users,
                UsageMetric::ApiCalls => stats.api_calls,
                UsageMetric::Errors => stats.error_count,
            };
            (metric, clamp_counter(value))
        })
        .collect()
}

pub fn remote_totals(stats: &TenantStats) -> RemoteTotals {
    RemoteTotals {
        total_users: clamp_counter(stats.total_users),
        active_users: clamp_counter(stats.active_users),
        total_authentications: clamp_counter(stats.total_authentications),
    }
}

fn clamp_counter(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// The part of a connection row that counts as state (not heartbeat).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub is_connected: bool,
    #[serde(skip)]
    pub totals: RemoteTotals,
}

impl From<&ConnectionModel> for ConnectionState {
    fn from(model: &ConnectionModel) -> Self {
        Self {
            status: model.status,
            is_connected: model.is_connected,
            totals: RemoteTotals {
                total_users: model.total_users,
                active_users: model.active_users,
                total_authentications: model.total_authentications,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionTransition {
    /// `None` when the tenant has no connection row yet
    pub from: Option<ConnectionState>,
    pub to: ConnectionState,
    #[serde(skip)]
    pub outcome: ContactOutcome,
}

impl ConnectionTransition {
    pub fn new(existing: Option<&ConnectionModel>, outcome: ContactOutcome) -> Self {
        let from = existing.map(ConnectionState::from);
        let previous_totals = from.map(|state| state.totals).unwrap_or_default();
        let to = ConnectionState {
            status: outcome.status,
            is_connected: outcome.succeeded(),
            totals: outcome.totals.unwrap_or(previous_totals),
        };
        Self { from, to, outcome }
    }

    /// Refreshing `last_sync` / `last_attempt_at` alone is not a change.
    pub fn is_change(&self) -> bool {
        self.from != Some(self.to)
    }
}

/// Connection outcome for a stats call result.
pub fn contact_outcome(result: &Result<TenantStats, MfaClientError>) -> ContactOutcome {
    match result {
        Ok(stats) => ContactOutcome {
            status: ConnectionStatus::Connected,
            last_error: None,
            totals: Some(remote_totals(stats)),
        },
        Err(err) => ContactOutcome {
            status: match err {
                MfaClientError::Unreachable { .. } => ConnectionStatus::Unreachable,
                MfaClientError::Unauthorized { .. } => ConnectionStatus::Unauthorized,
                MfaClientError::RemoteError { .. } => ConnectionStatus::Error,
            },
            last_error: Some(err.to_string()),
            totals: None,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedNotification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub dedupe_key: String,
}

/// Dedupe key for one anomaly occurrence.
///
/// An occurrence is identified by the values involved, not by when it was
/// seen. With stored at 140, a remote that reports 100, then 90, then 100
/// again produces only two notifications: the second report of 100 matches
/// the first key. The stored value only moves forward, so the key changes as
/// soon as the tenant's usage catches up with a new high.
pub fn anomaly_dedupe_key(period_start: NaiveDate, change: &UsageChange) -> String {
    format!(
        "usage-anomaly:{}:{}:{}:{}",
        period_start,
        change.metric.as_str(),
        change.stored.unwrap_or_default(),
        change.remote
    )
}

pub fn anomaly_notification(period_start: NaiveDate, change: &UsageChange) -> PlannedNotification {
    PlannedNotification {
        kind: NotificationKind::Warning,
        title: format!("Usage anomaly: {} decreased", change.metric.as_str()),
        message: format!(
            "The MFA system reported {} {} for the period starting {}, below the stored value {}. \
             The stored value was kept pending review.",
            change.remote,
            change.metric.as_str(),
            period_start,
            change.stored.unwrap_or_default()
        ),
        dedupe_key: anomaly_dedupe_key(period_start, change),
    }
}

pub fn unauthorized_dedupe_key(day: NaiveDate) -> String {
    format!("mfa-unauthorized:{day}")
}

pub fn unauthorized_notification(day: NaiveDate, error: &MfaClientError) -> PlannedNotification {
    PlannedNotification {
        kind: NotificationKind::Security,
        title: "MFA system rejected tenant credentials".to_string(),
        message: format!(
            "Synchronization could not authenticate with the MFA system: {error}. \
             Check the tenant API key and the control panel credential."
        ),
        dedupe_key: unauthorized_dedupe_key(day),
    }
}

/// Per-tenant result category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TenantOutcome {
    Updated,
    NoOp,
    AnomalyFlagged,
    Unreachable,
    RemoteError,
    Unauthorized,
    /// Local writes for the tenant failed and were rolled back
    StorageError,
}

impl TenantOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantOutcome::Updated => "updated",
            TenantOutcome::NoOp => "no-op",
            TenantOutcome::AnomalyFlagged => "anomaly-flagged",
            TenantOutcome::Unreachable => "unreachable",
            TenantOutcome::RemoteError => "remote-error",
            TenantOutcome::Unauthorized => "unauthorized",
            TenantOutcome::StorageError => "storage-error",
        }
    }

    /// Hard failures make the sync command exit non-zero.
    pub fn is_hard_failure(&self) -> bool {
        matches!(
            self,
            TenantOutcome::Unauthorized | TenantOutcome::StorageError
        )
    }
}

/// Everything a live run would write for one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangePlan {
    pub period_start: NaiveDate,
    pub usage: Vec<UsageChange>,
    pub connection: ConnectionTransition,
    pub notifications: Vec<PlannedNotification>,
    #[serde(skip)]
    pub outcome: TenantOutcome,
}

impl ChangePlan {
    /// Usage writes, new notifications and connection state transitions.
    pub fn change_count(&self) -> usize {
        self.usage.iter().filter(|c| c.writes()).count()
            + self.notifications.len()
            + usize::from(self.connection.is_change())
    }

    pub fn anomalies(&self) -> impl Iterator<Item = &UsageChange> {
        self.usage
            .iter()
            .filter(|c| c.action == UsageAction::Anomaly)
    }
}

/// Which notification kinds a run may raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertPolicy {
    pub usage_alerts: bool,
    pub security_alerts: bool,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            usage_alerts: true,
            security_alerts: true,
        }
    }
}

/// Inputs needed to build a plan, gathered by the reconciler.
pub struct PlanInputs<'a> {
    pub period_start: NaiveDate,
    pub today: NaiveDate,
    pub stats: &'a Result<TenantStats, MfaClientError>,
    pub stored_usage: BTreeMap<UsageMetric, i64>,
    pub connection: Option<&'a ConnectionModel>,
    /// Dedupe keys that already exist for this tenant
    pub existing_keys: &'a [String],
    pub alerts: AlertPolicy,
}

/// Dedupe keys the plan may want to write, so callers can look them up first.
pub fn candidate_keys(
    period_start: NaiveDate,
    today: NaiveDate,
    stats: &Result<TenantStats, MfaClientError>,
    stored_usage: &BTreeMap<UsageMetric, i64>,
) -> Vec<String> {
    match stats {
        Ok(stats) => plan_usage_changes(stored_usage, &remote_usage(stats))
            .iter()
            .filter(|c| c.action == UsageAction::Anomaly)
            .map(|c| anomaly_dedupe_key(period_start, c))
            .collect(),
        Err(MfaClientError::Unauthorized { .. }) => vec![unauthorized_dedupe_key(today)],
        Err(_) => Vec::new(),
    }
}

pub fn build_plan(inputs: PlanInputs<'_>) -> ChangePlan {
    let is_new = |key: &str| !inputs.existing_keys.iter().any(|k| k == key);
    let connection =
        ConnectionTransition::new(inputs.connection, contact_outcome(inputs.stats));

    match inputs.stats {
        Ok(stats) => {
            let usage = plan_usage_changes(&inputs.stored_usage, &remote_usage(stats));
            let notifications: Vec<_> = usage
                .iter()
                .filter(|c| inputs.alerts.usage_alerts && c.action == UsageAction::Anomaly)
                .map(|c| anomaly_notification(inputs.period_start, c))
                .filter(|n| is_new(&n.dedupe_key))
                .collect();

            let mut plan = ChangePlan {
                period_start: inputs.period_start,
                usage,
                connection,
                notifications,
                outcome: TenantOutcome::NoOp,
            };
            plan.outcome = if plan.anomalies().next().is_some() {
                TenantOutcome::AnomalyFlagged
            } else if plan.change_count() > 0 {
                TenantOutcome::Updated
            } else {
                TenantOutcome::NoOp
            };
            plan
        }
        Err(err) => {
            let (outcome, notifications) = match err {
                MfaClientError::Unauthorized { .. } => {
                    let notification = unauthorized_notification(inputs.today, err);
                    let notifications = if inputs.alerts.security_alerts
                        && is_new(&notification.dedupe_key)
                    {
                        vec![notification]
                    } else {
                        Vec::new()
                    };
                    (TenantOutcome::Unauthorized, notifications)
                }
                MfaClientError::Unreachable { .. } => (TenantOutcome::Unreachable, Vec::new()),
                MfaClientError::RemoteError { .. } => (TenantOutcome::RemoteError, Vec::new()),
            };
            ChangePlan {
                period_start: inputs.period_start,
                usage: Vec::new(),
                connection,
                notifications,
                outcome,
            }
        }
    }
}
