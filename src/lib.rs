//! # MFA Control Panel Library
//!
//! Tenant management for a multi-tenant MFA service and reconciliation of
//! tenant usage with the remote MFA system.

pub mod admin;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod mfa;
pub mod models;
pub mod reconciler;
pub mod repositories;
pub mod server;
pub mod sync_command;
pub mod telemetry;
pub use migration;
