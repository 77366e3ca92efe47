//! # API Handlers
//!
//! HTTP endpoint handlers for the control panel API.

pub mod connections;
pub mod dashboard;
pub mod settings;
pub mod sync;
pub mod tenants;
pub mod types;

use crate::models::ServiceInfo;
use axum::response::Json;

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}
