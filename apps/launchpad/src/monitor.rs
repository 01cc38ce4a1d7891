//! # Session Monitor
//!
//! Tracks one session per user and purges expired ones on a fixed interval.
//!
//! The monitor is an ordinary value constructed by the application root and
//! shared through [`crate::api::AppState`]. `start` spawns the purge loop on
//! the current tokio runtime; calling it again while the loop runs is a
//! no-op. `stop` cancels the loop and waits for it to exit.

use launchpad_core::{Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Snapshot of a user's session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub has_session: bool,
    pub expires_at: Option<Timestamp>,
    /// Milliseconds left before expiry.
    pub time_until_expiry: Option<u64>,
    pub user_id: Option<String>,
}

impl SessionInfo {
    fn none() -> Self {
        Self {
            has_session: false,
            expires_at: None,
            time_until_expiry: None,
            user_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Session {
    last_seen: Timestamp,
    expires_at: Timestamp,
}

impl Session {
    fn is_live(&self, now: Timestamp) -> bool {
        self.expires_at > now
    }
}

struct MonitorTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Session bookkeeping plus its purge loop.
#[derive(Clone)]
pub struct SessionMonitor {
    ttl_ms: u64,
    sessions: Arc<RwLock<BTreeMap<UserId, Session>>>,
    task: Arc<Mutex<Option<MonitorTask>>>,
}

impl std::fmt::Debug for SessionMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMonitor")
            .field("ttl_ms", &self.ttl_ms)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl SessionMonitor {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl_ms: ttl.as_millis() as u64,
            sessions: Arc::new(RwLock::new(BTreeMap::new())),
            task: Arc::new(Mutex::new(None)),
        }
    }

    fn info(&self, user: &UserId, session: Option<&Session>, now: Timestamp) -> SessionInfo {
        match session.filter(|s| s.is_live(now)) {
            Some(session) => SessionInfo {
                has_session: true,
                expires_at: Some(session.expires_at),
                time_until_expiry: Some(session.expires_at.since(now)),
                user_id: Some(user.to_string()),
            },
            None => SessionInfo::none(),
        }
    }

    // =========================================================================
    // SESSIONS
    // =========================================================================

    /// Record activity, opening a session when the user has no live one.
    pub async fn touch(&self, user: &UserId, now: Timestamp) -> SessionInfo {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(user.clone())
            .and_modify(|s| {
                if !s.is_live(now) {
                    s.expires_at = now.plus_millis(self.ttl_ms);
                    tracing::debug!(user = %user, "Session reopened");
                }
                s.last_seen = now;
            })
            .or_insert_with(|| {
                tracing::debug!(user = %user, "Session opened");
                Session {
                    last_seen: now,
                    expires_at: now.plus_millis(self.ttl_ms),
                }
            });
        let session = *session;
        self.info(user, Some(&session), now)
    }

    pub async fn session_info(&self, user: &UserId, now: Timestamp) -> SessionInfo {
        let sessions = self.sessions.read().await;
        self.info(user, sessions.get(user), now)
    }

    /// Push a live session's expiry a full lifetime past `now`.
    ///
    /// Returns false when the user has no live session to refresh.
    pub async fn force_refresh(&self, user: &UserId, now: Timestamp) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(user) {
            Some(session) if session.is_live(now) => {
                session.expires_at = now.plus_millis(self.ttl_ms);
                session.last_seen = now;
                tracing::info!(user = %user, "Session refreshed");
                true
            }
            _ => {
                tracing::warn!(user = %user, "Session refresh without a live session");
                false
            }
        }
    }

    /// End a session. Returns whether one existed.
    pub async fn end(&self, user: &UserId) -> bool {
        self.sessions.write().await.remove(user).is_some()
    }

    /// Drop every expired session.
    pub async fn purge_expired(&self, now: Timestamp) -> Vec<UserId> {
        let mut sessions = self.sessions.write().await;
        let expired: Vec<UserId> = sessions
            .iter()
            .filter(|(_, s)| !s.is_live(now))
            .map(|(user, _)| user.clone())
            .collect();
        for user in &expired {
            sessions.remove(user);
        }
        expired
    }

    pub async fn active_count(&self, now: Timestamp) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.is_live(now))
            .count()
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Start the purge loop. Returns false if it was already running.
    pub fn start(&self, interval: Duration) -> bool {
        let mut slot = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().is_some_and(|task| !task.handle.is_finished()) {
            tracing::debug!("Session monitor already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let monitor = self.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            tracing::info!(
                interval_ms = interval.as_millis() as u64,
                "Session monitor started"
            );
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::info!("Session monitor stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let now = crate::now();
                        let expired = monitor.purge_expired(now).await;
                        if expired.is_empty() {
                            tracing::trace!("Session check: nothing expired");
                        } else {
                            tracing::info!(count = expired.len(), "Expired sessions purged");
                        }
                    }
                }
            }
        });

        *slot = Some(MonitorTask { cancel, handle });
        true
    }

    /// Stop the purge loop and wait for it to finish.
    pub async fn stop(&self) {
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                tracing::warn!(error = %e, "Session monitor task ended abnormally");
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        UserId::new(id)
    }

    #[tokio::test]
    async fn touch_opens_a_session() {
        let monitor = SessionMonitor::new(Duration::from_secs(60));
        let info = monitor.touch(&user("u1"), Timestamp(1_000)).await;
        assert!(info.has_session);
        assert_eq!(info.expires_at, Some(Timestamp(61_000)));
        assert_eq!(info.time_until_expiry, Some(60_000));
        assert_eq!(info.user_id.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn touch_does_not_extend_a_live_session() {
        let monitor = SessionMonitor::new(Duration::from_secs(60));
        monitor.touch(&user("u1"), Timestamp(0)).await;
        let info = monitor.touch(&user("u1"), Timestamp(30_000)).await;
        assert_eq!(info.expires_at, Some(Timestamp(60_000)));
    }

    #[tokio::test]
    async fn refresh_extends_a_live_session() {
        let monitor = SessionMonitor::new(Duration::from_secs(60));
        monitor.touch(&user("u1"), Timestamp(0)).await;
        assert!(monitor.force_refresh(&user("u1"), Timestamp(50_000)).await);
        let info = monitor.session_info(&user("u1"), Timestamp(70_000)).await;
        assert_eq!(info.expires_at, Some(Timestamp(110_000)));
    }

    #[tokio::test]
    async fn refresh_needs_a_live_session() {
        let monitor = SessionMonitor::new(Duration::from_secs(1));
        assert!(!monitor.force_refresh(&user("ghost"), Timestamp(0)).await);
        monitor.touch(&user("u1"), Timestamp(0)).await;
        assert!(!monitor.force_refresh(&user("u1"), Timestamp(5_000)).await);
    }

    #[tokio::test]
    async fn purge_drops_only_expired_sessions() {
        let monitor = SessionMonitor::new(Duration::from_secs(10));
        monitor.touch(&user("old"), Timestamp(0)).await;
        monitor.touch(&user("new"), Timestamp(8_000)).await;
        let expired = monitor.purge_expired(Timestamp(12_000)).await;
        assert_eq!(expired, vec![user("old")]);
        assert_eq!(monitor.active_count(Timestamp(12_000)).await, 1);
        assert!(!monitor.session_info(&user("old"), Timestamp(12_000)).await.has_session);
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_ends_the_loop() {
        let monitor = SessionMonitor::new(Duration::from_secs(10));
        assert!(monitor.start(Duration::from_millis(10)));
        assert!(!monitor.start(Duration::from_millis(10)));
        assert!(monitor.is_running());
        monitor.stop().await;
        assert!(!monitor.is_running());
        assert!(monitor.start(Duration::from_millis(10)));
        monitor.stop().await;
    }
}
