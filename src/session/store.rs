//! Shared, versioned session cell with single-flight re-authentication
//!
//! Every reservation loop reads the current session from one [`SessionStore`].
//! A loop that sees the session expire invalidates exactly the version it
//! used; if another loop already replaced it, the invalidation is ignored.
//! Refreshing is serialized: one negotiation runs at a time and callers that
//! queued behind it adopt its result.

use super::negotiator::Negotiate;
use crate::{
    Error, Result,
    types::{Credentials, Session},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A session together with the version it was installed under
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub version: u64,
    pub session: Arc<Session>,
}

#[derive(Debug, Default)]
struct SessionCell {
    version: u64,
    session: Option<Arc<Session>>,
    valid: bool,
}

/// Session store shared by all loops
pub struct SessionStore {
    cell: RwLock<SessionCell>,
    /// Held for the whole refresh; stores when the last negotiation started
    refresh_guard: Mutex<Option<Instant>>,
    negotiator: Arc<dyn Negotiate>,
    credentials: Arc<Credentials>,
    relogin_interval: Duration,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("username", &self.credentials.username())
            .field("relogin_interval", &self.relogin_interval)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Create an empty store; the first [`refresh`](Self::refresh) logs in
    pub fn new(
        negotiator: Arc<dyn Negotiate>,
        credentials: Credentials,
        relogin_interval: Duration,
    ) -> Self {
        Self {
            cell: RwLock::new(SessionCell::default()),
            refresh_guard: Mutex::new(None),
            negotiator,
            credentials: Arc::new(credentials),
            relogin_interval,
        }
    }

    /// Current session, if it is still valid
    pub async fn current(&self) -> Option<SessionHandle> {
        let cell = self.cell.read().await;
        match (&cell.session, cell.valid) {
            (Some(session), true) => Some(SessionHandle {
                version: cell.version,
                session: Arc::clone(session),
            }),
            _ => None,
        }
    }

    /// Version of the installed session, valid or not; 0 before the first login
    pub async fn version(&self) -> u64 {
        self.cell.read().await.version
    }

    /// Install a freshly negotiated session under the next version
    pub async fn install(&self, session: Session) -> SessionHandle {
        let mut cell = self.cell.write().await;
        cell.version += 1;
        let session = Arc::new(session);
        cell.session = Some(Arc::clone(&session));
        cell.valid = true;

        SessionHandle {
            version: cell.version,
            session,
        }
    }

    /// Mark `version` invalid if it is still the installed one
    ///
    /// Returns whether anything changed.
    pub async fn invalidate(&self, version: u64) -> bool {
        let mut cell = self.cell.write().await;
        if cell.version == version && cell.valid {
            cell.valid = false;
            debug!(version, "Session invalidated");
            true
        } else {
            debug!(
                version,
                current = cell.version,
                "Ignoring invalidation of a superseded session"
            );
            false
        }
    }

    /// Get a valid session, negotiating a new one if needed
    ///
    /// At most one negotiation runs at a time and at most one starts per
    /// relogin interval. A caller that waited behind a successful negotiation
    /// gets its session without negotiating again. A refused attempt yields
    /// [`Error::RateLimit`].
    pub async fn refresh(&self) -> Result<SessionHandle> {
        let mut last_attempt = self.refresh_guard.lock().await;

        if let Some(handle) = self.current().await {
            return Ok(handle);
        }

        if let Some(started) = *last_attempt {
            let elapsed = started.elapsed();
            if elapsed < self.relogin_interval {
                let retry_after = self.relogin_interval - elapsed;
                return Err(Error::RateLimit {
                    message: "re-login attempted too recently".to_string(),
                    retry_after_ms: retry_after.as_millis() as u64,
                });
            }
        }

        *last_attempt = Some(Instant::now());
        info!("Re-authenticating");

        match self.negotiator.negotiate(&self.credentials).await {
            Ok(session) => {
                let handle = self.install(session).await;
                info!(version = handle.version, "New session installed");
                Ok(handle)
            }
            Err(e) => {
                warn!("Re-authentication failed: {}", e);
                Err(e)
            }
        }
    }
}
