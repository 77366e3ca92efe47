//! Wire types exchanged with the remote MFA system.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::tenant::{Model as TenantModel, TenantPlan};
use crate::models::tenant_features::FeatureSet;

/// Credentials sent as `X-Tenant-ID` / `X-Tenant-Key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantIdentity {
    pub tenant_id: Uuid,
    pub api_key: String,
}

impl From<&TenantModel> for TenantIdentity {
    fn from(tenant: &TenantModel) -> Self {
        Self {
            tenant_id: tenant.id,
            api_key: tenant.api_key.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthStatus {
    #[serde(default = "unknown_status")]
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
}

fn unknown_status() -> String {
    "unknown".to_string()
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self.status.as_str(), "ok" | "healthy")
    }
}

/// Counters reported by `GET /api/tenant/stats/`. Missing fields read as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TenantStats {
    #[serde(default, deserialize_with = "counter")]
    pub total_users: u64,
    #[serde(default, deserialize_with = "counter")]
    pub active_users: u64,
    #[serde(default, deserialize_with = "counter")]
    pub total_authentications: u64,
    #[serde(default, deserialize_with = "counter")]
    pub monthly_authentications: u64,
    #[serde(default, deserialize_with = "counter")]
    pub api_calls: u64,
    #[serde(default, deserialize_with = "counter")]
    pub error_count: u64,
    #[serde(default)]
    pub success_rate: f64,
}

/// Accepts integers, non-negative floats (truncated) and `null` (zero).
fn counter<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_u64() {
                Ok(v)
            } else if let Some(f) = n.as_f64()
                && f.is_finite()
                && f >= 0.0
            {
                Ok(f.trunc() as u64)
            } else {
                Err(D::Error::custom(format!("invalid counter value {n}")))
            }
        }
        Some(other) => Err(D::Error::custom(format!("invalid counter value {other}"))),
    }
}

/// Payload for `POST /api/tenant/register/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantRegistration {
    pub tenant_id: Uuid,
    pub name: String,
    pub domain: String,
    pub additional_domains: Vec<String>,
    pub plan: TenantPlan,
    pub contact_email: String,
    pub api_key: String,
    pub max_users: i64,
    pub max_monthly_authentications: i64,
    pub features: FeatureSet,
}

impl TenantRegistration {
    pub fn new(tenant: &TenantModel, features: FeatureSet) -> Self {
        Self {
            tenant_id: tenant.id,
            name: tenant.name.clone(),
            domain: tenant.domain.clone(),
            additional_domains: tenant.additional_domains(),
            plan: tenant.plan,
            contact_email: tenant.contact_email.clone(),
            api_key: tenant.api_key.clone(),
            max_users: tenant.max_users,
            max_monthly_authentications: tenant.max_monthly_authentications,
            features,
        }
    }
}

/// Registration response; the remote id may be a string or a number.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RegistrationResponse {
    #[serde(default)]
    tenant_id: Option<Value>,
    #[serde(default)]
    id: Option<Value>,
}

impl RegistrationResponse {
    pub(crate) fn remote_id(&self) -> Option<String> {
        [&self.tenant_id, &self.id]
            .into_iter()
            .flatten()
            .find_map(|value| match value {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    }
}

/// Acknowledgement of `PUT /api/tenant/features/`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FeaturesAck {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One page of `GET /api/tenant/users/`; user objects are passed through as returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UsersPage {
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub users: Vec<Value>,
    #[serde(default, deserialize_with = "counter")]
    pub total: u64,
}

/// Query window for `GET /api/tenant/auth-logs/`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthLogWindow {
    pub days: u32,
    pub limit: u32,
}

impl Default for AuthLogWindow {
    fn default() -> Self {
        Self { days: 7, limit: 100 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AuthLogPage {
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub logs: Vec<Value>,
    #[serde(default, deserialize_with = "counter")]
    pub total: u64,
}
