//! HTTP client for the remote MFA system.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::histogram;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use super::endpoints;
use super::error::MfaClientError;
use super::types::{
    AuthLogPage, AuthLogWindow, FeaturesAck, HealthStatus, RegistrationResponse, TenantIdentity,
    TenantRegistration, TenantStats, UsersPage,
};
use crate::config::{AppConfig, ConfigError};
use crate::models::tenant_features::FeatureSet;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const BODY_SNIPPET_CHARS: usize = 200;

/// Explicit client configuration; the client never reads process state.
#[derive(Debug, Clone)]
pub struct MfaClientConfig {
    pub base_url: Url,
    /// Control-panel credential sent as `Authorization: Bearer`
    pub api_key: String,
    /// Bound for each call, connect through body
    pub timeout: Duration,
    pub user_agent: String,
}

impl MfaClientConfig {
    pub fn new(base_url: Url, api_key: impl Into<String>) -> Self {
        Self {
            base_url,
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("MFA-Control-Panel/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let base_url =
            Url::parse(&config.mfa_api_url).map_err(|source| ConfigError::InvalidMfaApiUrl {
                value: config.mfa_api_url.clone(),
                source,
            })?;
        Ok(Self::new(base_url, config.mfa_api_key.clone().unwrap_or_default())
            .with_timeout(Duration::from_secs(config.mfa_timeout_seconds)))
    }
}

/// Operations offered by the remote MFA system.
#[async_trait]
pub trait MfaApi: Send + Sync {
    async fn get_health(&self) -> Result<HealthStatus, MfaClientError>;

    async fn get_tenant_stats(&self, tenant: &TenantIdentity)
    -> Result<TenantStats, MfaClientError>;

    /// Register a tenant; returns the identifier assigned by the remote system.
    async fn register_tenant(
        &self,
        tenant: &TenantIdentity,
        registration: &TenantRegistration,
    ) -> Result<String, MfaClientError>;

    async fn update_features(
        &self,
        tenant: &TenantIdentity,
        features: &FeatureSet,
    ) -> Result<FeaturesAck, MfaClientError>;

    async fn get_users(
        &self,
        tenant: &TenantIdentity,
        limit: u32,
        offset: u32,
    ) -> Result<UsersPage, MfaClientError>;

    async fn get_auth_logs(
        &self,
        tenant: &TenantIdentity,
        window: AuthLogWindow,
    ) -> Result<AuthLogPage, MfaClientError>;
}

/// reqwest-backed [`MfaApi`]. No retries: callers decide what a failure means.
#[derive(Debug, Clone)]
pub struct MfaClient {
    http: reqwest::Client,
    config: MfaClientConfig,
}

struct Call<'a> {
    method: Method,
    endpoint: &'static str,
    tenant: Option<&'a TenantIdentity>,
    query: Vec<(&'static str, String)>,
    body: Option<Value>,
}

impl<'a> Call<'a> {
    fn new(method: Method, endpoint: &'static str, tenant: Option<&'a TenantIdentity>) -> Self {
        Self {
            method,
            endpoint,
            tenant,
            query: Vec::new(),
            body: None,
        }
    }
}

impl MfaClient {
    pub fn new(config: MfaClientConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &MfaClientConfig {
        &self.config
    }

    fn url_for(&self, endpoint: &str) -> String {
        format!(
            "{}{}",
            self.config.base_url.as_str().trim_end_matches('/'),
            endpoint
        )
    }

    async fn execute<T: DeserializeOwned>(&self, call: Call<'_>) -> Result<T, MfaClientError> {
        let started = Instant::now();
        let result = self.execute_inner(&call).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(err) => err.kind(),
        };
        histogram!(
            "mfa_remote_call_duration_seconds",
            "endpoint" => call.endpoint,
            "outcome" => outcome
        )
        .record(started.elapsed().as_secs_f64());

        if let Err(err) = &result {
            tracing::warn!(
                endpoint = call.endpoint,
                tenant_id = ?err.tenant_id(),
                error = %err,
                "MFA system call failed"
            );
        }
        result
    }

    async fn execute_inner<T: DeserializeOwned>(&self, call: &Call<'_>) -> Result<T, MfaClientError> {
        let tenant_id = call.tenant.map(|t| t.tenant_id);
        let endpoint = call.endpoint;

        let mut request = self
            .http
            .request(call.method.clone(), self.url_for(endpoint))
            .bearer_auth(&self.config.api_key)
            .header("Accept", "application/json");
        if let Some(tenant) = call.tenant {
            request = request
                .header("X-Tenant-ID", tenant.tenant_id.to_string())
                .header("X-Tenant-Key", &tenant.api_key);
        }
        if !call.query.is_empty() {
            request = request.query(&call.query);
        }
        if let Some(body) = &call.body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MfaClientError::Unreachable {
                tenant_id,
                endpoint,
                message: describe_transport_error(&e),
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(MfaClientError::Unauthorized {
                tenant_id,
                endpoint,
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                MfaClientError::Unreachable {
                    tenant_id,
                    endpoint,
                    message: describe_transport_error(&e),
                }
            } else {
                MfaClientError::RemoteError {
                    tenant_id,
                    endpoint,
                    status: Some(status.as_u16()),
                    message: format!("failed to read response body: {e}"),
                }
            }
        })?;

        if !status.is_success() {
            return Err(MfaClientError::RemoteError {
                tenant_id,
                endpoint,
                status: Some(status.as_u16()),
                message: format!("HTTP {}: {}", status.as_u16(), snippet(&bytes)),
            });
        }

        let body: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
            b"{}"
        } else {
            &bytes
        };
        serde_json::from_slice(body).map_err(|e| MfaClientError::RemoteError {
            tenant_id,
            endpoint,
            status: Some(status.as_u16()),
            message: format!("undecodable response body: {e}"),
        })
    }
}

fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("request timed out: {error}")
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        error.to_string()
    }
}

fn snippet(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    if trimmed.chars().count() > BODY_SNIPPET_CHARS {
        let truncated: String = trimmed.chars().take(BODY_SNIPPET_CHARS).collect();
        format!("{truncated}...")
    } else {
        trimmed.to_string()
    }
}

#[async_trait]
impl MfaApi for MfaClient {
    async fn get_health(&self) -> Result<HealthStatus, MfaClientError> {
        self.execute(Call::new(Method::GET, endpoints::HEALTH, None))
            .await
    }

    async fn get_tenant_stats(
        &self,
        tenant: &TenantIdentity,
    ) -> Result<TenantStats, MfaClientError> {
        self.execute(Call::new(Method::GET, endpoints::TENANT_STATS, Some(tenant)))
            .await
    }

    async fn register_tenant(
        &self,
        tenant: &TenantIdentity,
        registration: &TenantRegistration,
    ) -> Result<String, MfaClientError> {
        let mut call = Call::new(Method::POST, endpoints::TENANT_REGISTER, Some(tenant));
        call.body = Some(serde_json::to_value(registration).map_err(|e| {
            MfaClientError::RemoteError {
                tenant_id: Some(tenant.tenant_id),
                endpoint: endpoints::TENANT_REGISTER,
                status: None,
                message: format!("failed to encode registration: {e}"),
            }
        })?);

        let response: RegistrationResponse = self.execute(call).await?;
        response
            .remote_id()
            .ok_or_else(|| MfaClientError::RemoteError {
                tenant_id: Some(tenant.tenant_id),
                endpoint: endpoints::TENANT_REGISTER,
                status: None,
                message: "registration response did not include a tenant id".to_string(),
            })
    }

    async fn update_features(
        &self,
        tenant: &TenantIdentity,
        features: &FeatureSet,
    ) -> Result<FeaturesAck, MfaClientError> {
        let mut call = Call::new(Method::PUT, endpoints::TENANT_FEATURES, Some(tenant));
        call.body = Some(serde_json::to_value(features).map_err(|e| {
            MfaClientError::RemoteError {
                tenant_id: Some(tenant.tenant_id),
                endpoint: endpoints::TENANT_FEATURES,
                status: None,
                message: format!("failed to encode features: {e}"),
            }
        })?);
        self.execute(call).await
    }

    async fn get_users(
        &self,
        tenant: &TenantIdentity,
        limit: u32,
        offset: u32,
    ) -> Result<UsersPage, MfaClientError> {
        let mut call = Call::new(Method::GET, endpoints::TENANT_USERS, Some(tenant));
        call.query = vec![("limit", limit.to_string()), ("offset", offset.to_string())];
        self.execute(call).await
    }

    async fn get_auth_logs(
        &self,
        tenant: &TenantIdentity,
        window: AuthLogWindow,
    ) -> Result<AuthLogPage, MfaClientError> {
        let mut call = Call::new(Method::GET, endpoints::TENANT_AUTH_LOGS, Some(tenant));
        call.query = vec![
            ("days", window.days.to_string()),
            ("limit", window.limit.to_string()),
        ];
        self.execute(call).await
    }
}
