//! Command-line modes of `xkfw-grab`
//!
//! Every mode loads configuration first and only then initializes logging,
//! so the configured level can take effect.

pub mod grab;
pub mod init;
pub mod login;

use crate::{
    Settings,
    config::ConfigLoader,
    session::{NetworkManager, PortalClient, SessionNegotiator},
    types::Credentials,
};
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Load settings for a CLI run
///
/// Configuration precedence:
/// 1. Command line arguments (applied by the caller)
/// 2. Environment variables
/// 3. Configuration file (from --config, XKFW_CONFIG or default location)
/// 4. Default values
pub fn load_settings(config: Option<&str>) -> Result<Settings> {
    let config_path = match config {
        Some(path) => Some(PathBuf::from(path)),
        None => ConfigLoader::get_config_path(),
    };

    ConfigLoader::new()
        .load(config_path.as_deref())
        .context("failed to load configuration")
}

/// Initialize logging on stderr
///
/// Precedence: `--verbose` (debug), then `RUST_LOG`, then the configured level.
pub fn init_logging(settings: &Settings, verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("debug")
    } else if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(&settings.logging.level)
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    if settings.logging.format.eq_ignore_ascii_case("json") {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Credentials from the merged settings
pub fn credentials(settings: &Settings) -> Credentials {
    Credentials::new(
        settings.account.username.as_str(),
        settings.account.password.as_str(),
    )
}

/// Portal client and negotiator sharing one network manager
pub fn build_clients(settings: &Settings) -> Result<(PortalClient, SessionNegotiator)> {
    let network = NetworkManager::new(settings).context("failed to create HTTP client")?;
    let client = PortalClient::with_network(network, settings);
    let negotiator = SessionNegotiator::new(client.clone(), settings.auth.clone());
    Ok((client, negotiator))
}
