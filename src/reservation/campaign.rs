//! Running several reservation loops over one session

use super::{
    monitor::spawn_online_monitor,
    runner::{self, LoopState, ReservationHandle, StopReason},
};
use crate::{
    Error, Result,
    config::settings::ReservationSettings,
    session::{ReservationApi, SessionStore},
    types::{ReservationEvent, ReservationTarget},
};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

const EVENT_BUFFER: usize = 64;

/// One loop per target, all sharing a session store
#[derive(Clone)]
pub struct Campaign {
    store: Arc<SessionStore>,
    api: Arc<dyn ReservationApi>,
    settings: ReservationSettings,
}

impl Campaign {
    pub fn new(
        store: Arc<SessionStore>,
        api: Arc<dyn ReservationApi>,
        settings: ReservationSettings,
    ) -> Self {
        Self {
            store,
            api,
            settings,
        }
    }

    /// Spawn a loop per target plus the online-user monitor
    pub fn start(&self, targets: &[ReservationTarget]) -> Result<CampaignHandle> {
        if targets.is_empty() {
            return Err(Error::validation("courses", "no courses to reserve"));
        }
        if targets.len() > self.settings.max_concurrent_targets {
            return Err(Error::validation(
                "courses".to_string(),
                format!(
                    "{} courses requested but at most {} may run at once",
                    targets.len(),
                    self.settings.max_concurrent_targets
                ),
            ));
        }

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let loops = targets
            .iter()
            .map(|target| {
                runner::spawn(
                    Arc::clone(&self.store),
                    Arc::clone(&self.api),
                    target.clone(),
                    &self.settings,
                    events_tx.clone(),
                )
            })
            .collect::<Vec<_>>();
        drop(events_tx);

        let (monitor_tx, monitor_rx) = watch::channel(false);
        let (online, monitor) = spawn_online_monitor(
            Arc::clone(&self.store),
            Arc::clone(&self.api),
            self.settings.online_poll_interval,
            monitor_rx,
        );

        info!(loops = loops.len(), "Reservation campaign started");

        Ok(CampaignHandle {
            events: events_rx,
            online,
            loops,
            monitor_shutdown: monitor_tx,
            monitor,
        })
    }
}

/// Running campaign
///
/// `events` closes once every loop has stopped.
pub struct CampaignHandle {
    pub events: mpsc::Receiver<ReservationEvent>,
    pub online: watch::Receiver<Option<u64>>,
    loops: Vec<ReservationHandle>,
    monitor_shutdown: watch::Sender<bool>,
    monitor: JoinHandle<()>,
}

impl CampaignHandle {
    /// Cancel every loop that is still running
    pub fn cancel(&self) {
        for handle in &self.loops {
            handle.cancel();
        }
    }

    /// Loops currently waiting on a new login
    pub fn reauthenticating(&self) -> usize {
        self.loops
            .iter()
            .filter(|handle| handle.state() == LoopState::ReAuthenticating)
            .count()
    }

    /// Wait for every loop, then stop the monitor
    pub async fn wait(self) -> Result<Vec<(ReservationTarget, StopReason)>> {
        let mut results = Vec::with_capacity(self.loops.len());
        for handle in self.loops {
            let target = handle.target().clone();
            let reason = handle.join().await?;
            results.push((target, reason));
        }

        self.monitor_shutdown.send_replace(true);
        if let Err(e) = self.monitor.await {
            warn!("Online-user monitor ended abnormally: {}", e);
        }

        Ok(results)
    }
}
