//! # Tenant Features Repository

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter, Set,
};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::tenant::TenantPlan;
use crate::models::tenant_features::{
    ActiveModel as FeaturesActiveModel, Column, Entity as TenantFeatures, FeatureSet,
    Model as FeaturesModel,
};

pub struct FeaturesRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> FeaturesRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Create the feature row for a new tenant using the plan defaults.
    pub async fn create_for_plan(
        &self,
        tenant_id: Uuid,
        plan: TenantPlan,
    ) -> Result<FeaturesModel, RepositoryError> {
        let mut active = FeaturesActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            updated_at: Set(Utc::now().fixed_offset()),
            ..Default::default()
        };
        FeatureSet::for_plan(plan).apply_to(&mut active);

        active
            .insert(self.db)
            .await
            .map_err(|e| RepositoryError::from_write(e, "tenant already has a feature set"))
    }

    pub async fn find_by_tenant(
        &self,
        tenant_id: Uuid,
    ) -> Result<Option<FeaturesModel>, RepositoryError> {
        TenantFeatures::find()
            .filter(Column::TenantId.eq(tenant_id))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn get_by_tenant(&self, tenant_id: Uuid) -> Result<FeaturesModel, RepositoryError> {
        self.find_by_tenant(tenant_id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("tenant features", tenant_id))
    }

    /// Overwrite every flag with `features`.
    pub async fn update(
        &self,
        tenant_id: Uuid,
        features: &FeatureSet,
    ) -> Result<FeaturesModel, RepositoryError> {
        if features.api_rate_limit_per_minute <= 0 || features.api_rate_limit_per_hour <= 0 {
            return Err(RepositoryError::validation_error(
                "API rate limits must be positive",
            ));
        }
        if features.api_rate_limit_per_minute > features.api_rate_limit_per_hour {
            return Err(RepositoryError::validation_error(
                "per-minute rate limit cannot exceed the per-hour limit",
            ));
        }

        let existing = self.get_by_tenant(tenant_id).await?;
        let mut active = existing.into_active_model();
        features.apply_to(&mut active);
        active.updated_at = Set(Utc::now().fixed_offset());

        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}
