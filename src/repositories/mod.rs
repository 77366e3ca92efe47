//! # Repository Layer
//!
//! Repositories wrap SeaORM operations per table. Each one borrows any
//! [`sea_orm::ConnectionTrait`] so the same code runs against the pool or
//! inside a transaction.

pub mod api_log;
pub mod connection;
pub mod features;
pub mod notification;
pub mod settings;
pub mod tenant;
pub mod usage;

pub use api_log::ApiLogRepository;
pub use connection::ConnectionRepository;
pub use features::FeaturesRepository;
pub use notification::NotificationRepository;
pub use settings::SettingsRepository;
pub use tenant::TenantRepository;
pub use usage::UsageStatsRepository;
