//! # System Settings Repository
//!
//! Reads and writes the single settings row. Until an operator saves
//! settings the table is empty and the defaults apply.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, IntoActiveModel, Set};

use crate::error::RepositoryError;
use crate::models::system_settings::{
    ActiveModel as SettingsActiveModel, Entity as SystemSettingsEntity, Model as SettingsModel,
    SETTINGS_ID, SystemSettings,
};
use crate::repositories::tenant::validate_email;

pub struct SettingsRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> SettingsRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    async fn find(&self) -> Result<Option<SettingsModel>, RepositoryError> {
        SystemSettingsEntity::find_by_id(SETTINGS_ID)
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Current settings; never writes.
    pub async fn load(&self) -> Result<SystemSettings, RepositoryError> {
        Ok(self
            .find()
            .await?
            .map(|model| SystemSettings::from(&model))
            .unwrap_or_default())
    }

    pub async fn update(&self, settings: &SystemSettings) -> Result<SystemSettings, RepositoryError> {
        validate(settings)?;
        let now = Utc::now().fixed_offset();

        let saved = match self.find().await? {
            Some(existing) => {
                let mut active = existing.into_active_model();
                settings.apply_to(&mut active);
                active.updated_at = Set(now);
                active.update(self.db).await
            }
            None => {
                let mut active = SettingsActiveModel {
                    id: Set(SETTINGS_ID),
                    updated_at: Set(now),
                    ..Default::default()
                };
                settings.apply_to(&mut active);
                active.insert(self.db).await
            }
        }
        .map_err(RepositoryError::database_error)?;

        tracing::info!(
            allow_free_plan = saved.allow_free_plan,
            send_usage_alerts = saved.send_usage_alerts,
            send_security_alerts = saved.send_security_alerts,
            "System settings updated"
        );
        Ok(SystemSettings::from(&saved))
    }
}

fn validate(settings: &SystemSettings) -> Result<(), RepositoryError> {
    if settings.service_name.trim().is_empty() {
        return Err(RepositoryError::validation_error("service name must not be empty"));
    }
    if settings.default_user_limit < 0 || settings.default_auth_limit < 0 {
        return Err(RepositoryError::validation_error(
            "default limits must not be negative",
        ));
    }
    if let Some(email) = settings.admin_email.as_deref() {
        validate_email(email)?;
    }
    Ok(())
}
