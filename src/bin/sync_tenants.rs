//! Reconcile tenant usage with the remote MFA system.
//!
//! Exit codes: 0 no hard failure, 1 a tenant hard-failed (or was not found),
//! 2 configuration or storage failure.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mfa_control_panel::{
    config::ConfigLoader,
    db,
    mfa::{MfaClient, MfaClientConfig},
    reconciler::{ReconcilerConfig, SyncReconciler},
    sync_command::{EXIT_SYSTEMIC, SyncCommand},
    telemetry,
};

#[derive(Parser)]
#[command(name = "sync_tenants")]
#[command(about = "Pull tenant usage from the MFA system and reconcile local records")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    command: SyncCommand,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let reconciler = match build_reconciler().await {
        Ok(reconciler) => reconciler,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::from(EXIT_SYSTEMIC);
        }
    };

    let mut stdout = std::io::stdout().lock();
    ExitCode::from(cli.command.execute(&reconciler, &mut stdout).await)
}

async fn build_reconciler() -> Result<SyncReconciler> {
    let config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;

    telemetry::init_tracing(&config)
        .context("initializing tracing")?;

    let db = db::init_pool(&config)
        .await
        .context("initializing database connection pool")?;

    let client_config =
        MfaClientConfig::from_app_config(&config).context("building MFA client configuration")?;
    let client = MfaClient::new(client_config).context("building MFA client")?;

    Ok(SyncReconciler::new(
        Arc::new(db),
        Arc::new(client),
        ReconcilerConfig {
            usage_period: config.sync_usage_period,
            system_url: config.mfa_api_url.clone(),
        },
    ))
}
