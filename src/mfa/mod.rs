//! Remote MFA system client.
//!
//! [`MfaApi`] is the seam the reconciler and the admin service depend on;
//! [`MfaClient`] is the HTTP implementation.

pub mod client;
pub mod error;
pub mod types;

pub use client::{MfaApi, MfaClient, MfaClientConfig};
pub use error::MfaClientError;
pub use types::{
    AuthLogPage, AuthLogWindow, FeaturesAck, HealthStatus, TenantIdentity, TenantRegistration,
    TenantStats, UsersPage,
};

/// Endpoint paths relative to the remote base URL.
pub mod endpoints {
    pub const HEALTH: &str = "/api/health/";
    pub const TENANT_STATS: &str = "/api/tenant/stats/";
    pub const TENANT_REGISTER: &str = "/api/tenant/register/";
    pub const TENANT_FEATURES: &str = "/api/tenant/features/";
    pub const TENANT_USERS: &str = "/api/tenant/users/";
    pub const TENANT_AUTH_LOGS: &str = "/api/tenant/auth-logs/";
}
