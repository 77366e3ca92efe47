//! # MFA Control Panel Entry Point

use mfa_control_panel::{config::ConfigLoader, server::run_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from layered env files and variables
    let config_loader = ConfigLoader::new();
    let config = config_loader.load()?;

    // Secrets are redacted before the configuration is printed
    eprintln!("Loaded configuration for profile: {}", config.profile);
    if let Ok(redacted_json) = config.redacted_json() {
        eprintln!("Configuration: {}", redacted_json);
    }

    run_server(config).await
}
