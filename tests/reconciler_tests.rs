//! End-to-end reconciliation against an in-memory database and a mocked MFA system.

mod test_utils;

use std::time::Duration;

use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait};
use uuid::Uuid;
use wiremock::{MockServer, ResponseTemplate};

use mfa_control_panel::models::mfa_system_connection::ConnectionStatus;
use mfa_control_panel::models::system_settings::SystemSettings;
use mfa_control_panel::models::tenant::TenantStatus;
use mfa_control_panel::models::tenant_notification::NotificationKind;
use mfa_control_panel::models::tenant_usage_stat::UsageMetric;
use mfa_control_panel::models::{tenant_api_log, tenant_notification, tenant_usage_stat};
use mfa_control_panel::reconciler::{
    ReconcileError, SyncOptions, SyncTarget, TenantOutcome, UsageAction,
};
use mfa_control_panel::repositories::{
    ApiLogRepository, ConnectionRepository, NotificationRepository, SettingsRepository,
    TenantRepository, UsageStatsRepository,
};
use mfa_control_panel::sync_command::{EXIT_HARD_FAILURE, exit_code};
use test_utils::{
    create_active_tenant, create_tenant, mock_stats, reconciler, reconciler_with_timeout,
    seed_usage, setup_test_db_arc, stats_body, stored_usage, test_now, test_period,
};

fn live() -> SyncOptions {
    SyncOptions::default()
}

fn dry_run() -> SyncOptions {
    SyncOptions {
        dry_run: true,
        ..SyncOptions::default()
    }
}

#[tokio::test]
async fn higher_remote_value_updates_stored_usage() {
    let db = setup_test_db_arc().await.unwrap();
    let server = MockServer::start().await;
    let tenant = create_active_tenant(&db, "alpha.test").await.unwrap();
    seed_usage(&db, tenant.id, UsageMetric::Authentications, 100)
        .await
        .unwrap();
    mock_stats(
        &server,
        tenant.id,
        ResponseTemplate::new(200).set_body_json(stats_body(140)),
    )
    .await;

    let report = reconciler(db.clone(), &server)
        .run_at(&live(), test_now())
        .await
        .unwrap();

    let tenant_report = &report.tenants[0];
    assert_eq!(tenant_report.outcome, TenantOutcome::Updated);
    let auth = tenant_report
        .usage
        .iter()
        .find(|c| c.metric == UsageMetric::Authentications)
        .unwrap();
    assert_eq!(auth.action, UsageAction::Update);
    assert_eq!(auth.stored, Some(100));
    assert_eq!(auth.remote, 140);

    assert_eq!(
        stored_usage(&db, tenant.id, UsageMetric::Authentications)
            .await
            .unwrap(),
        Some(140)
    );
    assert_eq!(
        stored_usage(&db, tenant.id, UsageMetric::Errors).await.unwrap(),
        Some(2)
    );

    let connection = ConnectionRepository::new(db.as_ref())
        .get_by_tenant(tenant.id)
        .await
        .unwrap();
    assert!(connection.is_connected);
    assert_eq!(connection.status, ConnectionStatus::Connected);
    assert_eq!(connection.total_users, 25);
    assert!(connection.last_sync.is_some());

    let refreshed = TenantRepository::new(db.as_ref())
        .get(tenant.id)
        .await
        .unwrap();
    assert!(refreshed.last_activity.is_some());

    let logs = ApiLogRepository::new(db.as_ref())
        .list_for_tenant(tenant.id, 10)
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status_code, 200);
    assert_eq!(logs[0].endpoint, "/api/tenant/stats/");
}

#[tokio::test]
async fn lower_remote_value_is_flagged_once_and_kept() {
    let db = setup_test_db_arc().await.unwrap();
    let server = MockServer::start().await;
    let tenant = create_active_tenant(&db, "alpha.test").await.unwrap();
    seed_usage(&db, tenant.id, UsageMetric::Authentications, 140)
        .await
        .unwrap();
    mock_stats(
        &server,
        tenant.id,
        ResponseTemplate::new(200).set_body_json(stats_body(100)),
    )
    .await;
    let reconciler = reconciler(db.clone(), &server);

    let first = reconciler.run_at(&live(), test_now()).await.unwrap();
    assert_eq!(first.tenants[0].outcome, TenantOutcome::AnomalyFlagged);
    assert_eq!(first.tenants[0].notifications.len(), 1);
    assert_eq!(
        first.tenants[0].notifications[0].kind,
        NotificationKind::Warning
    );

    let second = reconciler
        .run_at(&live(), test_now() + chrono::Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(second.tenants[0].outcome, TenantOutcome::AnomalyFlagged);
    assert!(second.tenants[0].notifications.is_empty());
    assert_eq!(second.tenants[0].changes, 0);

    assert_eq!(
        stored_usage(&db, tenant.id, UsageMetric::Authentications)
            .await
            .unwrap(),
        Some(140)
    );
    let notifications = NotificationRepository::new(db.as_ref())
        .list_for_tenant(tenant.id, 10)
        .await
        .unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::Warning);

    let connection = ConnectionRepository::new(db.as_ref())
        .get_by_tenant(tenant.id)
        .await
        .unwrap();
    assert!(connection.is_connected);
    assert!(connection.last_sync.is_some());
}

#[tokio::test]
async fn one_slow_tenant_does_not_stop_the_others() {
    let db = setup_test_db_arc().await.unwrap();
    let server = MockServer::start().await;
    let slow = create_active_tenant(&db, "slow.test").await.unwrap();
    let fast = create_active_tenant(&db, "fast.test").await.unwrap();
    mock_stats(
        &server,
        slow.id,
        ResponseTemplate::new(200)
            .set_body_json(stats_body(10))
            .set_delay(Duration::from_secs(3)),
    )
    .await;
    mock_stats(
        &server,
        fast.id,
        ResponseTemplate::new(200).set_body_json(stats_body(50)),
    )
    .await;

    let report = reconciler_with_timeout(db.clone(), &server, Duration::from_millis(300))
        .run_at(&live(), test_now())
        .await
        .unwrap();

    let outcome_of = |id: Uuid| {
        report
            .tenants
            .iter()
            .find(|t| t.tenant_id == id)
            .map(|t| t.outcome)
            .unwrap()
    };
    assert_eq!(outcome_of(slow.id), TenantOutcome::Unreachable);
    assert_eq!(outcome_of(fast.id), TenantOutcome::Updated);
    assert!(!report.has_hard_failure());

    assert_eq!(
        stored_usage(&db, slow.id, UsageMetric::Authentications)
            .await
            .unwrap(),
        None
    );
    assert_eq!(
        stored_usage(&db, fast.id, UsageMetric::Authentications)
            .await
            .unwrap(),
        Some(50)
    );

    let connection = ConnectionRepository::new(db.as_ref())
        .get_by_tenant(slow.id)
        .await
        .unwrap();
    assert_eq!(connection.status, ConnectionStatus::Unreachable);
    assert!(!connection.is_connected);
    assert!(connection.last_error.is_some());

    let logs = ApiLogRepository::new(db.as_ref())
        .list_for_tenant(slow.id, 10)
        .await
        .unwrap();
    assert_eq!(logs[0].status_code, 0);
}

#[tokio::test]
async fn rerun_with_same_remote_values_is_a_no_op() {
    let db = setup_test_db_arc().await.unwrap();
    let server = MockServer::start().await;
    let tenant = create_active_tenant(&db, "alpha.test").await.unwrap();
    mock_stats(
        &server,
        tenant.id,
        ResponseTemplate::new(200).set_body_json(stats_body(70)),
    )
    .await;
    let reconciler = reconciler(db.clone(), &server);

    let first = reconciler.run_at(&live(), test_now()).await.unwrap();
    assert_eq!(first.tenants[0].outcome, TenantOutcome::Updated);
    let tenants = TenantRepository::new(db.as_ref());
    let connections = ConnectionRepository::new(db.as_ref());
    let activity_after_first = tenants.get(tenant.id).await.unwrap().last_activity;
    let usage_after_first = UsageStatsRepository::new(db.as_ref())
        .list_for_tenant(tenant.id, None)
        .await
        .unwrap();
    let sync_after_first = connections.get_by_tenant(tenant.id).await.unwrap().last_sync;

    let second = reconciler
        .run_at(&live(), test_now() + chrono::Duration::minutes(5))
        .await
        .unwrap();
    assert_eq!(second.tenants[0].outcome, TenantOutcome::NoOp);
    assert_eq!(second.tenants[0].changes, 0);
    assert!(!second.tenants[0].connection_changed);
    assert!(
        second.tenants[0]
            .usage
            .iter()
            .all(|c| c.action == UsageAction::Unchanged)
    );

    assert_eq!(
        tenant_api_log::Entity::find()
            .count(db.as_ref())
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        tenant_notification::Entity::find()
            .count(db.as_ref())
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        tenants.get(tenant.id).await.unwrap().last_activity,
        activity_after_first
    );
    assert_eq!(
        UsageStatsRepository::new(db.as_ref())
            .list_for_tenant(tenant.id, None)
            .await
            .unwrap(),
        usage_after_first
    );

    // Only the heartbeat moves.
    let connection = connections.get_by_tenant(tenant.id).await.unwrap();
    assert!(connection.last_sync > sync_after_first);
    assert_eq!(connection.status, ConnectionStatus::Connected);
}

#[tokio::test]
async fn failed_writes_for_one_tenant_do_not_stop_the_others() {
    let db = setup_test_db_arc().await.unwrap();
    let server = MockServer::start().await;
    let broken = create_active_tenant(&db, "broken.test").await.unwrap();
    let healthy = create_active_tenant(&db, "healthy.test").await.unwrap();
    for tenant in [&broken, &healthy] {
        mock_stats(
            &server,
            tenant.id,
            ResponseTemplate::new(200).set_body_json(stats_body(50)),
        )
        .await;
    }
    db.execute_unprepared(
        "CREATE TRIGGER reject_broken_usage BEFORE INSERT ON tenant_usage_stats \
         WHEN NEW.tenant_id = (SELECT id FROM tenants WHERE domain = 'broken.test') \
         BEGIN SELECT RAISE(ABORT, 'usage row rejected'); END",
    )
    .await
    .unwrap();

    let report = reconciler(db.clone(), &server)
        .run_at(&live(), test_now())
        .await
        .unwrap();

    assert_eq!(report.tenants.len(), 2);
    let report_for = |id: Uuid| report.tenants.iter().find(|t| t.tenant_id == id).unwrap();
    let failed = report_for(broken.id);
    assert_eq!(failed.outcome, TenantOutcome::StorageError);
    assert!(failed.error.as_deref().unwrap().contains("usage row rejected"));
    assert!(failed.connection.is_none());
    assert_eq!(report_for(healthy.id).outcome, TenantOutcome::Updated);
    assert!(report.has_hard_failure());
    assert_eq!(exit_code(&report), EXIT_HARD_FAILURE);

    assert_eq!(
        stored_usage(&db, healthy.id, UsageMetric::Authentications)
            .await
            .unwrap(),
        Some(50)
    );
    assert_eq!(
        stored_usage(&db, broken.id, UsageMetric::Errors).await.unwrap(),
        None
    );
    // The failed tenant's transaction was rolled back as a whole.
    let connection = ConnectionRepository::new(db.as_ref())
        .get_by_tenant(broken.id)
        .await
        .unwrap();
    assert_eq!(connection.status, ConnectionStatus::Pending);
    assert!(connection.last_attempt_at.is_none());
    assert!(
        ApiLogRepository::new(db.as_ref())
            .list_for_tenant(broken.id, 10)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn contact_times_follow_the_run_not_its_start() {
    let db = setup_test_db_arc().await.unwrap();
    let server = MockServer::start().await;
    let slow = create_active_tenant(&db, "slow.test").await.unwrap();
    let next = create_active_tenant(&db, "next.test").await.unwrap();
    mock_stats(
        &server,
        slow.id,
        ResponseTemplate::new(200)
            .set_body_json(stats_body(10))
            .set_delay(Duration::from_millis(400)),
    )
    .await;
    mock_stats(
        &server,
        next.id,
        ResponseTemplate::new(200).set_body_json(stats_body(20)),
    )
    .await;

    let report = reconciler(db.clone(), &server)
        .run_at(&live(), test_now())
        .await
        .unwrap();
    assert!(
        report
            .tenants
            .iter()
            .all(|t| t.outcome == TenantOutcome::Updated)
    );
    assert_eq!(report.started_at, test_now());
    assert_eq!(report.period_start, test_period());

    let earliest = test_now() + chrono::Duration::milliseconds(400);
    let connections = ConnectionRepository::new(db.as_ref());
    let slow_sync = connections
        .get_by_tenant(slow.id)
        .await
        .unwrap()
        .last_sync
        .unwrap()
        .with_timezone(&chrono::Utc);
    assert!(slow_sync >= earliest, "{slow_sync} should be after {earliest}");
    assert!(slow_sync < test_now() + chrono::Duration::minutes(1));

    // Usage rows stay keyed on the run's period.
    assert_eq!(
        stored_usage(&db, next.id, UsageMetric::Authentications)
            .await
            .unwrap(),
        Some(20)
    );
}

#[tokio::test]
async fn disabled_usage_alerts_keep_the_value_without_notifying() {
    let db = setup_test_db_arc().await.unwrap();
    let server = MockServer::start().await;
    let tenant = create_active_tenant(&db, "alpha.test").await.unwrap();
    seed_usage(&db, tenant.id, UsageMetric::Authentications, 140)
        .await
        .unwrap();
    mock_stats(
        &server,
        tenant.id,
        ResponseTemplate::new(200).set_body_json(stats_body(100)),
    )
    .await;
    SettingsRepository::new(db.as_ref())
        .update(&SystemSettings {
            send_usage_alerts: false,
            ..SystemSettings::default()
        })
        .await
        .unwrap();

    let report = reconciler(db.clone(), &server)
        .run_at(&live(), test_now())
        .await
        .unwrap();

    assert_eq!(report.tenants[0].outcome, TenantOutcome::AnomalyFlagged);
    assert!(report.tenants[0].notifications.is_empty());
    assert_eq!(
        stored_usage(&db, tenant.id, UsageMetric::Authentications)
            .await
            .unwrap(),
        Some(140)
    );
    assert!(
        NotificationRepository::new(db.as_ref())
            .list_for_tenant(tenant.id, 10)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn dry_run_writes_nothing_and_predicts_the_live_run() {
    let db = setup_test_db_arc().await.unwrap();
    let server = MockServer::start().await;
    let tenant = create_active_tenant(&db, "alpha.test").await.unwrap();
    seed_usage(&db, tenant.id, UsageMetric::Authentications, 140)
        .await
        .unwrap();
    mock_stats(
        &server,
        tenant.id,
        ResponseTemplate::new(200).set_body_json(stats_body(100)),
    )
    .await;
    let reconciler = reconciler(db.clone(), &server);

    let preview = reconciler.run_at(&dry_run(), test_now()).await.unwrap();
    assert!(preview.dry_run);

    assert_eq!(
        tenant_usage_stat::Entity::find()
            .count(db.as_ref())
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        tenant_notification::Entity::find()
            .count(db.as_ref())
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        tenant_api_log::Entity::find()
            .count(db.as_ref())
            .await
            .unwrap(),
        0
    );
    let connection = ConnectionRepository::new(db.as_ref())
        .get_by_tenant(tenant.id)
        .await
        .unwrap();
    assert_eq!(connection.status, ConnectionStatus::Pending);
    assert!(connection.last_attempt_at.is_none());

    let applied = reconciler.run_at(&live(), test_now()).await.unwrap();
    let (planned, actual) = (&preview.tenants[0], &applied.tenants[0]);
    assert_eq!(planned.outcome, actual.outcome);
    assert_eq!(planned.changes, actual.changes);
    assert_eq!(planned.usage, actual.usage);
    assert_eq!(planned.notifications, actual.notifications);
    assert_eq!(planned.connection, actual.connection);
    assert_eq!(preview.totals(), applied.totals());
}

#[tokio::test]
async fn rejected_credentials_are_a_hard_failure_with_one_alert_per_day() {
    let db = setup_test_db_arc().await.unwrap();
    let server = MockServer::start().await;
    let tenant = create_active_tenant(&db, "alpha.test").await.unwrap();
    mock_stats(&server, tenant.id, ResponseTemplate::new(401)).await;
    let reconciler = reconciler(db.clone(), &server);

    let report = reconciler.run_at(&live(), test_now()).await.unwrap();
    assert_eq!(report.tenants[0].outcome, TenantOutcome::Unauthorized);
    assert!(report.has_hard_failure());

    reconciler
        .run_at(&live(), test_now() + chrono::Duration::hours(2))
        .await
        .unwrap();

    let notifications = NotificationRepository::new(db.as_ref())
        .list_for_tenant(tenant.id, 10)
        .await
        .unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::Security);

    let connection = ConnectionRepository::new(db.as_ref())
        .get_by_tenant(tenant.id)
        .await
        .unwrap();
    assert_eq!(connection.status, ConnectionStatus::Unauthorized);
    assert!(!connection.is_connected);

    let logs = ApiLogRepository::new(db.as_ref())
        .list_for_tenant(tenant.id, 10)
        .await
        .unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|log| log.status_code == 401));
}

#[tokio::test]
async fn server_errors_are_recorded_without_failing_the_run() {
    let db = setup_test_db_arc().await.unwrap();
    let server = MockServer::start().await;
    let tenant = create_active_tenant(&db, "alpha.test").await.unwrap();
    mock_stats(&server, tenant.id, ResponseTemplate::new(500)).await;

    let report = reconciler(db.clone(), &server)
        .run_at(&live(), test_now())
        .await
        .unwrap();

    assert_eq!(report.tenants[0].outcome, TenantOutcome::RemoteError);
    assert!(report.tenants[0].error.is_some());
    assert!(!report.has_hard_failure());
    let connection = ConnectionRepository::new(db.as_ref())
        .get_by_tenant(tenant.id)
        .await
        .unwrap();
    assert_eq!(connection.status, ConnectionStatus::Error);
}

#[tokio::test]
async fn only_active_tenants_are_synced_by_default() {
    let db = setup_test_db_arc().await.unwrap();
    let server = MockServer::start().await;
    let active = create_active_tenant(&db, "active.test").await.unwrap();
    let suspended = create_tenant(&db, "paused.test", TenantStatus::Suspended)
        .await
        .unwrap();
    mock_stats(
        &server,
        active.id,
        ResponseTemplate::new(200).set_body_json(stats_body(5)),
    )
    .await;

    let report = reconciler(db.clone(), &server)
        .run_at(&live(), test_now())
        .await
        .unwrap();

    assert_eq!(report.tenants.len(), 1);
    assert_eq!(report.tenants[0].tenant_id, active.id);
    assert!(report.tenants.iter().all(|t| t.tenant_id != suspended.id));
}

#[tokio::test]
async fn first_sync_creates_the_connection_row() {
    let db = setup_test_db_arc().await.unwrap();
    let server = MockServer::start().await;
    let tenant = create_tenant(&db, "fresh.test", TenantStatus::Active)
        .await
        .unwrap();
    mock_stats(
        &server,
        tenant.id,
        ResponseTemplate::new(200).set_body_json(stats_body(3)),
    )
    .await;

    let report = reconciler(db.clone(), &server)
        .run_at(
            &SyncOptions {
                target: SyncTarget::Tenant(tenant.id),
                dry_run: false,
            },
            test_now(),
        )
        .await
        .unwrap();

    assert!(report.tenants[0].connection_changed);
    let connection = ConnectionRepository::new(db.as_ref())
        .get_by_tenant(tenant.id)
        .await
        .unwrap();
    assert_eq!(connection.system_url, server.uri());
    assert_eq!(connection.connection_key, tenant.api_key);
    assert!(connection.is_connected);
}

#[tokio::test]
async fn unknown_tenant_target_is_rejected() {
    let db = setup_test_db_arc().await.unwrap();
    let server = MockServer::start().await;
    let missing = Uuid::new_v4();

    let err = reconciler(db, &server)
        .run_at(
            &SyncOptions {
                target: SyncTarget::Tenant(missing),
                dry_run: true,
            },
            test_now(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::TenantNotFound(id) if id == missing));
}
