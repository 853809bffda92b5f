//! Default mode: log in and grab every configured course

use super::{build_clients, credentials, init_logging, load_settings};
use crate::{
    error::format_error,
    reservation::{Campaign, StopReason},
    session::SessionStore,
    types::{EventKind, ReservationTarget},
    utils::version,
};
use anyhow::{Result, bail};
use std::sync::Arc;
use tracing::{info, warn};

/// Arguments for grab mode
#[derive(Debug, Default)]
pub struct GrabArgs {
    pub config: Option<String>,
    pub username: Option<String>,
    /// Replaces the configured course list when not empty
    pub courses: Vec<ReservationTarget>,
    pub verbose: bool,
}

/// Run grab mode with the given arguments
pub async fn run_grab_mode(args: GrabArgs) -> Result<()> {
    let mut settings = load_settings(args.config.as_deref())?;

    if let Some(username) = args.username {
        settings.account.username = username;
    }
    if !args.courses.is_empty() {
        settings.courses = args.courses;
    }
    settings.logging.verbose = settings.logging.verbose || args.verbose;
    settings.validate()?;

    init_logging(&settings, settings.logging.verbose);
    info!("Starting {}", version::build_info());

    if settings.courses.is_empty() {
        bail!("no courses configured; add [[courses]] to the config or pass --course CODE:CATEGORY");
    }

    let (client, negotiator) = build_clients(&settings)?;
    let store = Arc::new(SessionStore::new(
        Arc::new(negotiator),
        credentials(&settings),
        settings.reservation.relogin_interval,
    ));

    let handle = match store.refresh().await {
        Ok(handle) => handle,
        Err(e) => bail!("login failed: {}", format_error(&e)),
    };
    println!(
        "Logged in as {} ({}), registration window {}",
        handle.session.display_name(),
        handle.session.student_code(),
        handle.session.batch_code()
    );

    let campaign = Campaign::new(store, Arc::new(client), settings.reservation.clone());
    let mut running = campaign.start(&settings.courses)?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    let mut monitor_alive = true;

    loop {
        let stop_requested = tokio::select! {
            event = running.events.recv() => match event {
                Some(event) => {
                    if settings.logging.log_events || event.kind != EventKind::Rejected {
                        println!("{}", event);
                    }
                    false
                }
                None => break,
            },
            changed = running.online.changed(), if monitor_alive => {
                match changed {
                    Ok(()) => {
                        let online = *running.online.borrow();
                        if let Some(online) = online {
                            info!(online, reauthenticating = running.reauthenticating(), "Online users");
                        }
                    }
                    Err(_) => monitor_alive = false,
                }
                false
            }
            result = &mut ctrl_c, if !interrupted => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                true
            }
        };

        if stop_requested {
            interrupted = true;
            println!("Stopping...");
            running.cancel();
        }
    }

    let results = running.wait().await?;
    for (target, reason) in &results {
        match reason {
            StopReason::Success => println!("{}: reserved", target),
            StopReason::Cancelled => println!("{}: cancelled", target),
        }
    }

    Ok(())
}
