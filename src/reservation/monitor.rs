//! Periodic online-user probe

use crate::session::{ReservationApi, SessionStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Poll the online-user count every `period` and publish it
///
/// The count stays `None` until the first successful probe; failed probes
/// keep the last value. Polling is skipped while no valid session exists.
pub fn spawn_online_monitor(
    store: Arc<SessionStore>,
    api: Arc<dyn ReservationApi>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> (watch::Receiver<Option<u64>>, JoinHandle<()>) {
    let (count_tx, count_rx) = watch::channel(None);

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let Some(handle) = store.current().await else {
                        continue;
                    };
                    match api.online_users(&handle.session).await {
                        Ok(count) => {
                            count_tx.send_replace(Some(count));
                        }
                        Err(e) => debug!("Online-user probe failed: {}", e),
                    }
                }
                _ = shutdown.changed() => {
                    debug!("Online-user monitor shutting down");
                    break;
                }
            }
        }
    });

    (count_rx, task)
}
