//! Retry loop for one reservation target
//!
//! Each loop runs as its own task and reports every attempt on an event
//! channel. It reads the session from the shared store, invalidates the
//! version it used when the portal reports the login gone, and goes through
//! the store to get a new one. Cancellation is checked at the top of every
//! iteration and interrupts sleeps, but never a request in flight.

use super::classify::{OutcomeMarkers, classify_response};
use crate::{
    Error, Result,
    config::settings::ReservationSettings,
    error::format_error,
    session::{ReservationApi, SessionStore},
    types::{EventKind, ReservationEvent, ReservationOutcome, ReservationTarget},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Why a loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Success,
    Cancelled,
}

/// Where a loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    ReAuthenticating,
    Stopped(StopReason),
}

/// Handle to a spawned loop
#[derive(Debug)]
pub struct ReservationHandle {
    target: ReservationTarget,
    cancel: watch::Sender<bool>,
    state: watch::Receiver<LoopState>,
    join: JoinHandle<StopReason>,
}

impl ReservationHandle {
    pub fn target(&self) -> &ReservationTarget {
        &self.target
    }

    /// Latest state the loop reported
    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Ask the loop to stop; calling it again, or after the loop ended, does nothing
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the loop to stop
    pub async fn join(self) -> Result<StopReason> {
        self.join
            .await
            .map_err(|e| Error::internal(format!("reservation task for {} failed: {}", self.target, e)))
    }
}

/// State of one running loop
pub struct ReservationLoop {
    store: Arc<SessionStore>,
    api: Arc<dyn ReservationApi>,
    target: ReservationTarget,
    markers: OutcomeMarkers,
    attempt_interval: Duration,
    relogin_backoff: Duration,
    events: mpsc::Sender<ReservationEvent>,
    cancel: watch::Receiver<bool>,
    state: watch::Sender<LoopState>,
    attempts: u64,
}

impl ReservationLoop {
    pub fn new(
        store: Arc<SessionStore>,
        api: Arc<dyn ReservationApi>,
        target: ReservationTarget,
        settings: &ReservationSettings,
        events: mpsc::Sender<ReservationEvent>,
        cancel: watch::Receiver<bool>,
        state: watch::Sender<LoopState>,
    ) -> Self {
        Self {
            store,
            api,
            target,
            markers: OutcomeMarkers::from(settings),
            attempt_interval: settings.attempt_interval,
            relogin_backoff: settings.relogin_backoff,
            events,
            cancel,
            state,
            attempts: 0,
        }
    }

    fn set_state(&self, state: LoopState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(course = %self.target.code, from = ?previous, to = ?state, "Loop state changed");
        }
    }

    fn is_cancelled(&self) -> bool {
        // A dropped handle counts as cancellation
        *self.cancel.borrow() || self.cancel.has_changed().is_err()
    }

    /// Sleep unless cancelled first; returns false when cancelled
    async fn pause(&mut self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        let slept = tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.cancel.changed() => false,
        };
        slept || !self.is_cancelled()
    }

    async fn emit(&self, kind: EventKind, message: impl Into<String>) {
        self.send(ReservationEvent::new(&self.target, kind, message)).await;
    }

    async fn send(&self, event: ReservationEvent) {
        if self.events.send(event).await.is_err() {
            debug!(course = %self.target.code, "Event receiver dropped");
        }
    }

    /// Run until the seat is taken or the loop is cancelled
    pub async fn run(mut self) -> StopReason {
        info!(course = %self.target, "Reservation loop started");

        let reason = loop {
            if self.is_cancelled() {
                self.emit(EventKind::Cancelled, "cancelled").await;
                break StopReason::Cancelled;
            }

            let handle = match self.store.current().await {
                Some(handle) => handle,
                None => {
                    self.set_state(LoopState::ReAuthenticating);
                    match self.store.refresh().await {
                        Ok(handle) => {
                            self.emit(
                                EventKind::Reauthenticated,
                                format!("logged in again as {}", handle.session.display_name()),
                            )
                            .await;
                            handle
                        }
                        Err(Error::RateLimit { .. }) => {
                            self.pause(self.relogin_backoff).await;
                            continue;
                        }
                        Err(e) => {
                            self.emit(EventKind::ReauthFailed, format!("re-login failed: {}", format_error(&e)))
                                .await;
                            self.pause(self.relogin_backoff).await;
                            continue;
                        }
                    }
                }
            };
            self.set_state(LoopState::Running);

            self.attempts += 1;
            let outcome = match self.api.submit(&handle.session, &self.target).await {
                Ok(message) => classify_response(&message, &self.markers),
                Err(e) => {
                    warn!(course = %self.target, "Reservation attempt failed: {}", e);
                    ReservationOutcome::TransientError(format_error(&e))
                }
            };
            self.send(ReservationEvent::from_outcome(&self.target, &outcome)).await;

            if outcome.is_terminal() {
                info!(course = %self.target, attempts = self.attempts, "Seat reserved");
                break StopReason::Success;
            }
            if let ReservationOutcome::SessionExpired(_) = outcome {
                self.store.invalidate(handle.version).await;
                continue;
            }
            self.pause(self.attempt_interval).await;
        };

        self.set_state(LoopState::Stopped(reason));
        info!(course = %self.target, reason = ?reason, attempts = self.attempts, "Reservation loop stopped");
        reason
    }
}

/// Spawn one loop for `target`
///
/// Events go to `events`, which may be shared between loops.
pub fn spawn(
    store: Arc<SessionStore>,
    api: Arc<dyn ReservationApi>,
    target: ReservationTarget,
    settings: &ReservationSettings,
    events: mpsc::Sender<ReservationEvent>,
) -> ReservationHandle {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let (state_tx, state_rx) = watch::channel(LoopState::Running);
    let reservation = ReservationLoop::new(
        store,
        api,
        target.clone(),
        settings,
        events,
        cancel_rx,
        state_tx,
    );
    let join = tokio::spawn(reservation.run());

    ReservationHandle {
        target,
        cancel: cancel_tx,
        state: state_rx,
        join,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Negotiate;
    use crate::types::{Category, Credentials, Session, SessionParts};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn session(token: &str) -> Session {
        Session::try_from(SessionParts {
            cookies: [("JSESSIONID", "abc")].into_iter().collect(),
            token: token.to_string(),
            ticket: "ST-1".to_string(),
            prefix: "202420252".to_string(),
            display_name: "张三".to_string(),
            student_code: "2201111111".to_string(),
            batch_code: "e3a1".to_string(),
        })
        .unwrap()
    }

    struct FakeNegotiator {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Negotiate for FakeNegotiator {
        async fn negotiate(&self, _credentials: &Credentials) -> Result<Session> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(session(&format!("token-{}", call)))
        }
    }

    /// Replays scripted answers, then keeps repeating the last one
    struct ScriptedApi {
        script: Mutex<VecDeque<Result<String>>>,
        fallback: String,
        tokens: Mutex<Vec<String>>,
    }

    impl ScriptedApi {
        fn new(script: Vec<Result<String>>, fallback: &str) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                fallback: fallback.to_string(),
                tokens: Mutex::new(Vec::new()),
            })
        }

        fn submitted_tokens(&self) -> Vec<String> {
            self.tokens.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ReservationApi for ScriptedApi {
        async fn submit(&self, session: &Session, _target: &ReservationTarget) -> Result<String> {
            self.tokens.lock().unwrap().push(session.token().to_string());
            match self.script.lock().unwrap().pop_front() {
                Some(answer) => answer,
                None => Ok(self.fallback.clone()),
            }
        }

        async fn online_users(&self, _session: &Session) -> Result<u64> {
            Ok(0)
        }
    }

    fn fast_settings() -> ReservationSettings {
        ReservationSettings {
            attempt_interval: Duration::from_millis(5),
            relogin_backoff: Duration::from_millis(5),
            ..ReservationSettings::default()
        }
    }

    async fn store_with_session() -> (Arc<FakeNegotiator>, Arc<SessionStore>) {
        let negotiator = Arc::new(FakeNegotiator {
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(SessionStore::new(
            negotiator.clone(),
            Credentials::new("2201111111", "secret"),
            Duration::from_secs(5),
        ));
        store.install(session("token-0")).await;
        (negotiator, store)
    }

    async fn collect(mut rx: mpsc::Receiver<ReservationEvent>) -> Vec<EventKind> {
        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            kinds.push(event.kind);
        }
        kinds
    }

    fn target() -> ReservationTarget {
        ReservationTarget::new("COMP30072701", Category::Major)
    }

    #[tokio::test]
    async fn test_success_stops_after_one_attempt() {
        let (_, store) = store_with_session().await;
        let api = ScriptedApi::new(vec![], "选课成功");
        let (tx, mut rx) = mpsc::channel(16);

        let handle = spawn(store, api.clone(), target(), &fast_settings(), tx);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::Success);
        assert_eq!(event.message, "选课成功");

        // Cancelling after success changes nothing
        handle.cancel();
        handle.cancel();
        assert_eq!(handle.join().await.unwrap(), StopReason::Success);
        assert!(rx.recv().await.is_none());
        assert_eq!(api.submitted_tokens().len(), 1);
    }

    #[tokio::test]
    async fn test_expiry_triggers_relogin_then_continues() {
        let (negotiator, store) = store_with_session().await;
        let api = ScriptedApi::new(
            vec![Ok("课程容量已满".to_string()), Ok("登录失效，请重新登录".to_string())],
            "选课成功",
        );
        let (tx, rx) = mpsc::channel(16);

        let handle = spawn(store.clone(), api.clone(), target(), &fast_settings(), tx);
        assert_eq!(handle.join().await.unwrap(), StopReason::Success);

        assert_eq!(
            collect(rx).await,
            vec![
                EventKind::Rejected,
                EventKind::SessionExpired,
                EventKind::Reauthenticated,
                EventKind::Success,
            ]
        );
        assert_eq!(
            api.submitted_tokens(),
            vec!["token-0", "token-0", "token-1"]
        );
        assert_eq!(negotiator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.version().await, 2);
    }

    #[tokio::test]
    async fn test_transport_errors_are_transient() {
        let (_, store) = store_with_session().await;
        let api = ScriptedApi::new(
            vec![Err(Error::internal("connection reset"))],
            "选课成功",
        );
        let (tx, rx) = mpsc::channel(16);

        let handle = spawn(store, api, target(), &fast_settings(), tx);
        assert_eq!(handle.join().await.unwrap(), StopReason::Success);
        assert_eq!(
            collect(rx).await,
            vec![EventKind::TransientError, EventKind::Success]
        );
    }

    #[tokio::test]
    async fn test_cancel_interrupts_sleep() {
        let (_, store) = store_with_session().await;
        let api = ScriptedApi::new(vec![], "课程容量已满");
        let settings = ReservationSettings {
            attempt_interval: Duration::from_secs(60),
            ..ReservationSettings::default()
        };
        let (tx, mut rx) = mpsc::channel(16);

        let handle = spawn(store, api.clone(), target(), &settings, tx);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::Rejected);

        handle.cancel();
        let reason = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .expect("loop did not stop")
            .unwrap();

        assert_eq!(reason, StopReason::Cancelled);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::Cancelled);
        assert_eq!(api.submitted_tokens().len(), 1);
    }

    #[tokio::test]
    async fn test_handle_reports_loop_state() {
        let (_, store) = store_with_session().await;
        store.invalidate(1).await;
        let api = ScriptedApi::new(vec![], "课程容量已满");
        let settings = ReservationSettings {
            attempt_interval: Duration::from_secs(60),
            ..fast_settings()
        };
        let (tx, mut rx) = mpsc::channel(16);

        let handle = spawn(store, api, target(), &settings, tx);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::Reauthenticated);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::Rejected);
        assert_eq!(handle.state(), LoopState::Running);

        handle.cancel();
        let mut state = handle.state.clone();
        let reason = handle.join().await.unwrap();
        assert_eq!(reason, StopReason::Cancelled);
        assert_eq!(
            *state.borrow_and_update(),
            LoopState::Stopped(StopReason::Cancelled)
        );
    }
}
