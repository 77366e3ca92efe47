//! Append-only log of API calls made on behalf of a tenant.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tenant_api_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tenant_id: Uuid,

    pub method: String,

    pub endpoint: String,

    pub status_code: i32,

    pub response_time_ms: i64,

    pub error_message: Option<String>,

    pub ip_address: Option<String>,

    pub user_agent: Option<String>,

    pub timestamp: DateTimeWithTimeZone,
}

impl Model {
    /// No response (`0`) or an HTTP error status.
    pub fn is_error(&self) -> bool {
        self.status_code == 0 || self.status_code >= 400
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tenant::Entity",
        from = "Column::TenantId",
        to = "super::tenant::Column::Id"
    )]
    Tenant,
}

impl Related<super::tenant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
