//! HTTP API tests driving the full router with `tower::ServiceExt::oneshot`.

mod test_utils;

use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mfa_control_panel::config::AppConfig;
use mfa_control_panel::server::{AppState, create_app};
use test_utils::{client_for, setup_test_db};

const OPERATOR_TOKEN: &str = "operator-test-token";

async fn app(server: &MockServer) -> Router {
    let config = AppConfig {
        profile: "test".into(),
        operator_tokens: vec![OPERATOR_TOKEN.into()],
        mfa_api_url: server.uri(),
        ..AppConfig::default()
    };
    let db = setup_test_db().await.unwrap();
    create_app(AppState::new(
        config,
        db,
        client_for(server, Duration::from_secs(5)),
    ))
}

fn authed(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {OPERATOR_TOKEN}"))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    authed(method, uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn mock_registration(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/tenant/register/"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 99})))
        .mount(server)
        .await;
}

fn tenant_body(domain: &str) -> Value {
    json!({
        "name": "Acme Corp",
        "domain": domain,
        "contact_name": "Dana",
        "contact_email": format!("it@{domain}"),
        "plan": "basic"
    })
}

#[tokio::test]
async fn root_is_public() {
    let server = MockServer::start().await;
    let response = app(&server)
        .await
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-trace-id"));
    let body = body_json(response).await;
    assert_eq!(body["service"], "mfa-control-panel");
}

#[tokio::test]
async fn incoming_trace_id_is_echoed() {
    let server = MockServer::start().await;
    let response = app(&server)
        .await
        .oneshot(
            Request::builder()
                .uri("/")
                .header("x-trace-id", "trace-abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-trace-id"], "trace-abc");
}

#[tokio::test]
async fn admin_routes_require_operator_token() {
    let server = MockServer::start().await;
    let app = app(&server).await;

    let missing = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/tenants")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(missing).await["code"], "UNAUTHORIZED");

    let wrong = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/dashboard")
                .header(header::AUTHORIZATION, "Bearer nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_then_fetch_tenant() {
    let server = MockServer::start().await;
    mock_registration(&server).await;
    let app = app(&server).await;

    let created = app
        .clone()
        .oneshot(json_request("POST", "/api/v1/tenants", tenant_body("acme.test")))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let location = created.headers()["Location"].to_str().unwrap().to_string();
    let body = body_json(created).await;
    let id = body["tenant"]["id"].as_str().unwrap().to_string();
    assert_eq!(location, format!("/api/v1/tenants/{id}"));
    assert_eq!(body["tenant"]["status"], "pending");
    assert_eq!(body["connection"]["remote_tenant_id"], "99");
    assert!(body.get("remote_error").is_none());

    let fetched = app
        .clone()
        .oneshot(authed("GET", &location).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(fetched.status(), StatusCode::OK);
    assert_eq!(body_json(fetched).await["domain"], "acme.test");

    let listed = app
        .oneshot(authed("GET", "/api/v1/tenants").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_json(listed).await["count"], 1);
}

#[tokio::test]
async fn duplicate_domain_conflicts() {
    let server = MockServer::start().await;
    mock_registration(&server).await;
    let app = app(&server).await;

    app.clone()
        .oneshot(json_request("POST", "/api/v1/tenants", tenant_body("acme.test")))
        .await
        .unwrap();
    let duplicate = app
        .oneshot(json_request("POST", "/api/v1/tenants", tenant_body("acme.test")))
        .await
        .unwrap();

    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn malformed_body_is_a_validation_error() {
    let server = MockServer::start().await;
    let response = app(&server)
        .await
        .oneshot(
            authed("POST", "/api/v1/tenants")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn unknown_tenant_is_not_found() {
    let server = MockServer::start().await;
    let response = app(&server)
        .await
        .oneshot(
            authed("GET", &format!("/api/v1/tenants/{}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dashboard_summarizes_tenants() {
    let server = MockServer::start().await;
    mock_registration(&server).await;
    let app = app(&server).await;
    app.clone()
        .oneshot(json_request("POST", "/api/v1/tenants", tenant_body("acme.test")))
        .await
        .unwrap();

    let response = app
        .oneshot(authed("GET", "/api/v1/dashboard").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total_tenants"], 1);
    assert_eq!(body["connected_tenants"], 1);
    assert_eq!(body["api_calls_24h"], 1);
    assert_eq!(body["health"], "healthy");
}

#[tokio::test]
async fn sync_endpoint_returns_report() {
    let server = MockServer::start().await;
    mock_registration(&server).await;
    let app = app(&server).await;
    let created = app
        .clone()
        .oneshot(json_request("POST", "/api/v1/tenants", tenant_body("acme.test")))
        .await
        .unwrap();
    let id = body_json(created).await["tenant"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    Mock::given(method("GET"))
        .and(path("/api/tenant/stats/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"monthly_authentications": 8})),
        )
        .mount(&server)
        .await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/sync",
            json!({"tenant_id": id, "dry_run": true}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["dry_run"], true);
    assert_eq!(body["tenants"][0]["outcome"], "updated");
}

#[tokio::test]
async fn disconnect_blocked_is_forbidden() {
    let server = MockServer::start().await;
    mock_registration(&server).await;
    let app = app(&server).await;
    let created = app
        .clone()
        .oneshot(json_request("POST", "/api/v1/tenants", tenant_body("acme.test")))
        .await
        .unwrap();
    let id = body_json(created).await["tenant"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let locked = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/v1/tenants/{id}/connection/security"),
            json!({"admin_locked": false, "force_connection": true, "can_disconnect": true}),
        ))
        .await
        .unwrap();
    assert_eq!(locked.status(), StatusCode::OK);

    let response = app
        .oneshot(
            authed("POST", &format!("/api/v1/tenants/{id}/connection/disconnect"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "DISCONNECT_BLOCKED");
}

#[tokio::test]
async fn remote_health_failure_maps_to_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let response = app(&server)
        .await
        .oneshot(authed("GET", "/api/v1/mfa/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["code"], "MFA_REMOTE_ERROR");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let server = MockServer::start().await;
    let response = app(&server)
        .await
        .oneshot(Request::builder().uri("/openapi.json").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["paths"]["/api/v1/tenants"].is_object());
    assert!(body["paths"]["/api/v1/settings"].is_object());
    assert!(body["paths"]["/api/v1/analytics"].is_object());
}

#[tokio::test]
async fn settings_round_trip_and_reject_negative_limits() {
    let server = MockServer::start().await;
    let app = app(&server).await;

    let defaults = app
        .clone()
        .oneshot(authed("GET", "/api/v1/settings").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(defaults.status(), StatusCode::OK);
    let mut settings = body_json(defaults).await;
    assert_eq!(settings["allow_free_plan"], true);
    assert_eq!(settings["default_user_limit"], 50);
    assert_eq!(settings["send_usage_alerts"], true);

    settings["default_auth_limit"] = json!(4_000);
    settings["admin_email"] = json!("ops@panel.test");
    let saved = app
        .clone()
        .oneshot(json_request("PUT", "/api/v1/settings", settings.clone()))
        .await
        .unwrap();
    assert_eq!(saved.status(), StatusCode::OK);

    let fetched = app
        .clone()
        .oneshot(authed("GET", "/api/v1/settings").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_json(fetched).await, settings);

    settings["default_user_limit"] = json!(-5);
    let rejected = app
        .oneshot(json_request("PUT", "/api/v1/settings", settings))
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn analytics_reports_calls_and_sign_ups() {
    let server = MockServer::start().await;
    mock_registration(&server).await;
    let app = app(&server).await;
    app.clone()
        .oneshot(json_request("POST", "/api/v1/tenants", tenant_body("acme.test")))
        .await
        .unwrap();

    let response = app
        .oneshot(
            authed("GET", "/api/v1/analytics?days=7")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["days"], 7);
    assert_eq!(body["api_performance"][0]["total_calls"], 1);
    assert_eq!(body["api_performance"][0]["error_count"], 0);
    assert_eq!(body["top_endpoints"][0]["endpoint"], "/api/tenant/register/");
    assert_eq!(body["plan_growth"][0]["plan"], "basic");
    assert_eq!(body["plan_growth"][0]["count"], 1);
}
