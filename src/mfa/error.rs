//! Failure taxonomy for remote MFA calls.

use thiserror::Error;
use uuid::Uuid;

/// Every failure carries the endpoint and, for tenant calls, the tenant id.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MfaClientError {
    /// Network, connect or timeout failure; no HTTP response was received
    #[error("MFA system unreachable at {endpoint}: {message}")]
    Unreachable {
        tenant_id: Option<Uuid>,
        endpoint: &'static str,
        message: String,
    },
    /// The remote system rejected the credentials (401/403)
    #[error("MFA system rejected credentials at {endpoint} (HTTP {status})")]
    Unauthorized {
        tenant_id: Option<Uuid>,
        endpoint: &'static str,
        status: u16,
    },
    /// Any other non-2xx status, or a 2xx body that could not be decoded
    #[error("MFA system error at {endpoint}: {message}")]
    RemoteError {
        tenant_id: Option<Uuid>,
        endpoint: &'static str,
        status: Option<u16>,
        message: String,
    },
}

impl MfaClientError {
    pub fn tenant_id(&self) -> Option<Uuid> {
        match self {
            Self::Unreachable { tenant_id, .. }
            | Self::Unauthorized { tenant_id, .. }
            | Self::RemoteError { tenant_id, .. } => *tenant_id,
        }
    }

    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Unreachable { endpoint, .. }
            | Self::Unauthorized { endpoint, .. }
            | Self::RemoteError { endpoint, .. } => endpoint,
        }
    }

    /// HTTP status received, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unreachable { .. } => None,
            Self::Unauthorized { status, .. } => Some(*status),
            Self::RemoteError { status, .. } => *status,
        }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unreachable { .. } => "unreachable",
            Self::Unauthorized { .. } => "unauthorized",
            Self::RemoteError { .. } => "remote_error",
        }
    }
}
