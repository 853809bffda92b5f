//! Login mode: negotiate once and print what was resolved

use super::{build_clients, credentials, init_logging, load_settings};
use crate::{error::format_error, session::Negotiate};
use anyhow::{Result, bail};

/// Arguments for login mode
#[derive(Debug, Default)]
pub struct LoginArgs {
    pub config: Option<String>,
    pub username: Option<String>,
    pub verbose: bool,
}

/// Run login mode; prints the session summary as JSON on stdout
pub async fn run_login_mode(args: LoginArgs) -> Result<()> {
    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(username) = args.username {
        settings.account.username = username;
    }

    init_logging(&settings, args.verbose || settings.logging.verbose);
    tracing::debug!("Starting {}", crate::utils::version::build_info());

    let (_, negotiator) = build_clients(&settings)?;
    let session = match negotiator.negotiate(&credentials(&settings)).await {
        Ok(session) => session,
        Err(e) => bail!("login failed: {}", format_error(&e)),
    };

    println!("{}", serde_json::to_string_pretty(&session.summary())?);
    Ok(())
}
