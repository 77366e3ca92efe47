//! # Tenant Repository
//!
//! Creation, lookup, lifecycle transitions and aggregate counts for tenants.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;
use sea_orm::sea_query::{Condition, Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::tenant::{
    ActiveModel as TenantActiveModel, Column, Entity as Tenant, Model as TenantModel, PlanLimits,
    TenantPlan, TenantStatus,
};

static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}$").expect("valid regex")
});

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"));

const MAX_NAME_LEN: usize = 200;

/// Data required to create a tenant
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub name: String,
    pub domain: String,
    pub additional_domains: Vec<String>,
    pub contact_name: String,
    pub contact_email: String,
    pub plan: TenantPlan,
    pub settings: Option<Value>,
}

/// Optional filters for listing tenants
#[derive(Debug, Clone, Default)]
pub struct TenantFilter {
    pub status: Option<TenantStatus>,
    pub plan: Option<TenantPlan>,
    /// Case-insensitive match on name, domain or contact email
    pub search: Option<String>,
}

/// Freshly generated tenant credentials
#[derive(Debug, Clone)]
pub struct TenantCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl TenantCredentials {
    pub fn generate() -> Self {
        Self {
            api_key: format!("mfa_{}", random_token(24)),
            api_secret: random_token(32),
        }
    }
}

fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill(&mut bytes[..]);
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Repository for tenant database operations
pub struct TenantRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> TenantRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Create a tenant in `pending` status with the given limits and fresh credentials.
    pub async fn create(
        &self,
        request: NewTenant,
        limits: PlanLimits,
    ) -> Result<TenantModel, RepositoryError> {
        let name = request.name.trim().to_string();
        validate_name(&name)?;
        let domain = normalize_domain(&request.domain)?;
        let additional_domains = request
            .additional_domains
            .iter()
            .map(|d| normalize_domain(d))
            .collect::<Result<Vec<_>, _>>()?;
        validate_email(&request.contact_email)?;

        if self.find_by_domain(&domain).await?.is_some() {
            return Err(RepositoryError::Conflict(format!(
                "domain '{}' is already registered",
                domain
            )));
        }

        let credentials = TenantCredentials::generate();
        let now = Utc::now().fixed_offset();

        let tenant = TenantActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            domain: Set(domain.clone()),
            additional_domains: Set(json!(additional_domains)),
            contact_name: Set(request.contact_name.trim().to_string()),
            contact_email: Set(request.contact_email.trim().to_string()),
            plan: Set(request.plan),
            status: Set(TenantStatus::Pending),
            api_key: Set(credentials.api_key),
            api_secret: Set(credentials.api_secret),
            max_users: Set(limits.max_users),
            max_monthly_authentications: Set(limits.max_monthly_authentications),
            settings: Set(request.settings.unwrap_or_else(|| json!({}))),
            created_at: Set(now),
            updated_at: Set(now),
            last_activity: Set(None),
        };

        let created = tenant
            .insert(self.db)
            .await
            .map_err(|e| {
                RepositoryError::from_write(e, format!("domain '{}' is already registered", domain))
            })?;

        tracing::info!(
            tenant_id = %created.id,
            domain = %created.domain,
            plan = created.plan.as_str(),
            "Tenant created"
        );

        Ok(created)
    }

    pub async fn find_by_id(&self, tenant_id: Uuid) -> Result<Option<TenantModel>, RepositoryError> {
        Tenant::find_by_id(tenant_id)
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Like [`Self::find_by_id`] but a missing tenant is an error.
    pub async fn get(&self, tenant_id: Uuid) -> Result<TenantModel, RepositoryError> {
        self.find_by_id(tenant_id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("tenant", tenant_id))
    }

    pub async fn find_by_domain(&self, domain: &str) -> Result<Option<TenantModel>, RepositoryError> {
        Tenant::find()
            .filter(Column::Domain.eq(domain.trim().to_ascii_lowercase()))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// List tenants newest first.
    pub async fn list(
        &self,
        filter: &TenantFilter,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<TenantModel>, RepositoryError> {
        let mut query = Tenant::find();

        if let Some(status) = filter.status {
            query = query.filter(Column::Status.eq(status));
        }
        if let Some(plan) = filter.plan {
            query = query.filter(Column::Plan.eq(plan));
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search.to_ascii_lowercase());
            query = query.filter(
                Condition::any()
                    .add(Expr::expr(Func::lower(Expr::col(Column::Name))).like(pattern.clone()))
                    .add(Column::Domain.like(pattern.clone()))
                    .add(Expr::expr(Func::lower(Expr::col(Column::ContactEmail))).like(pattern)),
            );
        }

        query
            .order_by_desc(Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Active tenants in creation order, the default sync target set.
    pub async fn list_active(&self) -> Result<Vec<TenantModel>, RepositoryError> {
        Tenant::find()
            .filter(Column::Status.eq(TenantStatus::Active))
            .order_by_asc(Column::CreatedAt)
            .order_by_asc(Column::Id)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn count(&self) -> Result<u64, RepositoryError> {
        Tenant::find()
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn count_by_status(&self) -> Result<BTreeMap<String, i64>, RepositoryError> {
        let rows: Vec<(TenantStatus, i64)> = Tenant::find()
            .select_only()
            .column(Column::Status)
            .column_as(Column::Id.count(), "count")
            .group_by(Column::Status)
            .into_tuple()
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(rows
            .into_iter()
            .map(|(status, count)| (status.as_str().to_string(), count))
            .collect())
    }

    /// Tenants created on or after `since`, oldest first.
    pub async fn list_created_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<TenantModel>, RepositoryError> {
        Tenant::find()
            .filter(Column::CreatedAt.gte(since.fixed_offset()))
            .order_by_asc(Column::CreatedAt)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn count_by_plan(&self) -> Result<BTreeMap<String, i64>, RepositoryError> {
        let rows: Vec<(TenantPlan, i64)> = Tenant::find()
            .select_only()
            .column(Column::Plan)
            .column_as(Column::Id.count(), "count")
            .group_by(Column::Plan)
            .into_tuple()
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(rows
            .into_iter()
            .map(|(plan, count)| (plan.as_str().to_string(), count))
            .collect())
    }

    /// Move a tenant to `next`, rejecting transitions the lifecycle forbids.
    pub async fn set_status(
        &self,
        tenant_id: Uuid,
        next: TenantStatus,
    ) -> Result<TenantModel, RepositoryError> {
        let tenant = self.get(tenant_id).await?;
        if tenant.status == next {
            return Ok(tenant);
        }
        if !tenant.status.can_transition_to(next) {
            return Err(RepositoryError::validation_error(format!(
                "cannot move tenant from {} to {}",
                tenant.status.as_str(),
                next.as_str()
            )));
        }

        let previous = tenant.status;
        let mut active = tenant.into_active_model();
        active.status = Set(next);
        active.updated_at = Set(Utc::now().fixed_offset());
        let updated = active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        tracing::info!(
            tenant_id = %tenant_id,
            from = previous.as_str(),
            to = next.as_str(),
            "Tenant status changed"
        );

        Ok(updated)
    }

    /// Switch plan and reset user/authentication limits to the plan's values.
    pub async fn change_plan(
        &self,
        tenant_id: Uuid,
        plan: TenantPlan,
        limits: PlanLimits,
    ) -> Result<TenantModel, RepositoryError> {
        let tenant = self.get(tenant_id).await?;
        if tenant.status == TenantStatus::Cancelled {
            return Err(RepositoryError::validation_error(
                "cannot change the plan of a cancelled tenant",
            ));
        }

        let mut active = tenant.into_active_model();
        active.plan = Set(plan);
        active.max_users = Set(limits.max_users);
        active.max_monthly_authentications = Set(limits.max_monthly_authentications);
        active.updated_at = Set(Utc::now().fixed_offset());

        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn regenerate_credentials(
        &self,
        tenant_id: Uuid,
    ) -> Result<TenantModel, RepositoryError> {
        let tenant = self.get(tenant_id).await?;
        let credentials = TenantCredentials::generate();

        let mut active = tenant.into_active_model();
        active.api_key = Set(credentials.api_key);
        active.api_secret = Set(credentials.api_secret);
        active.updated_at = Set(Utc::now().fixed_offset());

        active
            .update(self.db)
            .await
            .map_err(|e| RepositoryError::from_write(e, "generated API key collided, retry"))
    }

    /// Record that the remote system reported activity for the tenant.
    pub async fn touch_activity(
        &self,
        tenant_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        Tenant::update_many()
            .col_expr(Column::LastActivity, Expr::value(at.fixed_offset()))
            .filter(Column::Id.eq(tenant_id))
            .exec(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), RepositoryError> {
    if name.is_empty() {
        return Err(RepositoryError::validation_error("tenant name cannot be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(RepositoryError::validation_error(format!(
            "tenant name cannot exceed {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(())
}

/// Lowercase and validate a domain name.
pub fn normalize_domain(domain: &str) -> Result<String, RepositoryError> {
    let normalized = domain.trim().trim_end_matches('.').to_ascii_lowercase();
    if normalized.is_empty() {
        return Err(RepositoryError::validation_error("domain cannot be empty"));
    }
    if normalized.len() > 253 || !DOMAIN_RE.is_match(&normalized) {
        return Err(RepositoryError::validation_error(format!(
            "'{}' is not a valid domain",
            domain.trim()
        )));
    }
    Ok(normalized)
}

pub(crate) fn validate_email(email: &str) -> Result<(), RepositoryError> {
    if !EMAIL_RE.is_match(email.trim()) {
        return Err(RepositoryError::validation_error(format!(
            "'{}' is not a valid contact email",
            email.trim()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_domains() {
        assert_eq!(normalize_domain(" Example.COM. ").unwrap(), "example.com");
        assert_eq!(normalize_domain("auth.my-site.co.uk").unwrap(), "auth.my-site.co.uk");
    }

    #[test]
    fn rejects_invalid_domains() {
        for bad in ["", "localhost", "-bad.com", "spaces in.com", "under_score.com"] {
            assert!(normalize_domain(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn validates_contact_email() {
        assert!(validate_email("ops@example.com").is_ok());
        assert!(validate_email("not-an-email").is_err());
    }

    #[test]
    fn generated_credentials_are_distinct() {
        let a = TenantCredentials::generate();
        let b = TenantCredentials::generate();
        assert!(a.api_key.starts_with("mfa_"));
        assert_ne!(a.api_key, b.api_key);
        assert_ne!(a.api_secret, b.api_secret);
    }
}
