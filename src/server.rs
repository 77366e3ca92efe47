//! # Server Configuration
//!
//! Router assembly, shared state and the HTTP server entry point.

use std::sync::Arc;

use axum::{
    Router,
    extract::Request,
    http::HeaderValue,
    middleware::{self, Next},
    response::{Json, Response},
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::admin::AdminService;
use crate::auth::auth_middleware;
use crate::config::AppConfig;
use crate::handlers::{self, connections, dashboard, settings, sync, tenants};
use crate::mfa::{MfaApi, MfaClient, MfaClientConfig};
use crate::reconciler::{ReconcilerConfig, SyncReconciler};
use crate::telemetry::{self, TraceContext, with_trace_context};

const TRACE_HEADER: &str = "x-trace-id";

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<DatabaseConnection>,
    pub admin: Arc<AdminService>,
}

impl AppState {
    /// Wire the reconciler and admin service around one MFA client.
    pub fn new(config: AppConfig, db: DatabaseConnection, client: Arc<dyn MfaApi>) -> Self {
        let db = Arc::new(db);
        let reconciler = Arc::new(SyncReconciler::new(
            Arc::clone(&db),
            Arc::clone(&client),
            ReconcilerConfig {
                usage_period: config.sync_usage_period,
                system_url: config.mfa_api_url.clone(),
            },
        ));
        let admin = Arc::new(AdminService::new(Arc::clone(&db), client, reconciler));
        Self {
            config: Arc::new(config),
            db,
            admin,
        }
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/v1/dashboard", get(dashboard::get_dashboard))
        .route("/api/v1/usage/trends", get(dashboard::get_usage_trends))
        .route("/api/v1/analytics", get(dashboard::get_analytics))
        .route("/api/v1/mfa/health", get(dashboard::get_mfa_health))
        .route(
            "/api/v1/settings",
            get(settings::get_settings).put(settings::update_settings),
        )
        .route(
            "/api/v1/tenants",
            get(tenants::list_tenants).post(tenants::create_tenant),
        )
        .route("/api/v1/tenants/actions", post(tenants::bulk_action))
        .route("/api/v1/tenants/{id}", get(tenants::get_tenant))
        .route(
            "/api/v1/tenants/{id}/features",
            get(tenants::get_features).put(tenants::update_features),
        )
        .route("/api/v1/tenants/{id}/usage", get(tenants::get_usage))
        .route(
            "/api/v1/tenants/{id}/notifications",
            get(tenants::get_notifications),
        )
        .route("/api/v1/tenants/{id}/api-logs", get(tenants::get_api_logs))
        .route("/api/v1/tenants/{id}/users", get(tenants::get_remote_users))
        .route(
            "/api/v1/tenants/{id}/auth-logs",
            get(tenants::get_remote_auth_logs),
        )
        .route("/api/v1/tenants/{id}/actions", post(tenants::tenant_action))
        .route(
            "/api/v1/tenants/{id}/connection",
            get(connections::get_connection),
        )
        .route(
            "/api/v1/tenants/{id}/connection/disconnect",
            post(connections::disconnect),
        )
        .route(
            "/api/v1/tenants/{id}/connection/security",
            axum::routing::put(connections::update_security),
        )
        .route("/api/v1/sync", post(sync::trigger_sync))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.config),
            auth_middleware,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/openapi.json", get(openapi_json))
        .merge(protected)
        .with_state(state)
        .layer(middleware::from_fn(trace_context_middleware))
        .layer(TraceLayer::new_for_http())
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Scope each request in a [`TraceContext`] and echo its id in the response.
async fn trace_context_middleware(request: Request, next: Next) -> Response {
    let context = TraceContext::from_header(
        request
            .headers()
            .get(TRACE_HEADER)
            .and_then(|value| value.to_str().ok()),
    );
    let trace_id = context.trace_id.clone();

    let mut response = with_trace_context(context, next.run(request)).await;
    if !response.headers().contains_key(TRACE_HEADER)
        && let Ok(value) = HeaderValue::from_str(&trace_id)
    {
        response.headers_mut().insert(TRACE_HEADER, value);
    }
    response
}

/// Starts the server with the given configuration
pub async fn run_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_tracing(&config)?;

    let db = crate::db::init_pool(&config).await?;
    crate::db::run_migrations(&db).await?;

    let client = MfaClient::new(MfaClientConfig::from_app_config(&config)?)?;
    let addr = config.bind_addr()?;
    let profile = config.profile.clone();

    let app = create_app(AppState::new(config, db, Arc::new(client)));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::dashboard::get_dashboard,
        crate::handlers::dashboard::get_usage_trends,
        crate::handlers::dashboard::get_analytics,
        crate::handlers::dashboard::get_mfa_health,
        crate::handlers::tenants::list_tenants,
        crate::handlers::tenants::create_tenant,
        crate::handlers::tenants::get_tenant,
        crate::handlers::tenants::get_features,
        crate::handlers::tenants::update_features,
        crate::handlers::tenants::get_usage,
        crate::handlers::tenants::get_notifications,
        crate::handlers::tenants::get_api_logs,
        crate::handlers::tenants::get_remote_users,
        crate::handlers::tenants::get_remote_auth_logs,
        crate::handlers::tenants::tenant_action,
        crate::handlers::tenants::bulk_action,
        crate::handlers::connections::get_connection,
        crate::handlers::connections::disconnect,
        crate::handlers::connections::update_security,
        crate::handlers::sync::trigger_sync,
        crate::handlers::settings::get_settings,
        crate::handlers::settings::update_settings,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::error::ApiError,
            crate::handlers::types::TenantDto,
            crate::handlers::types::ConnectionDto,
            crate::models::tenant_features::FeatureSet,
            crate::models::system_settings::SystemSettings,
            crate::admin::TenantAction,
        )
    ),
    modifiers(&SecurityAddon),
    info(
        title = "MFA Control Panel API",
        description = "Operator API for tenant management and MFA usage reconciliation",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
