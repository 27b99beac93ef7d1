use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use crate::session::machine::Session;
use crate::session::SharedSession;

/// In-memory registry of live wizard sessions. Nothing survives a restart.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, SharedSession>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> SharedSession {
        let session = Session::new();
        let id = session.id();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, Arc::clone(&shared));
        shared
    }

    /// Looks up a session and marks it active.
    pub async fn get(&self, id: Uuid) -> Option<SharedSession> {
        let shared = self.sessions.read().await.get(&id).cloned()?;
        shared.lock().await.touch();
        Some(shared)
    }

    /// Removes the session, cancelling whatever it still had running.
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id);
        match removed {
            Some(session) => {
                session.lock().await.reset();
                true
            }
            None => false,
        }
    }

    /// Drops every session no client has touched for `max_age`, cancelling
    /// its in-flight work. Returns how many were dropped.
    pub async fn purge_idle(&self, max_age: Duration) -> usize {
        let candidates: Vec<(Uuid, SharedSession)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, s)| (*id, Arc::clone(s)))
            .collect();

        let mut expired = Vec::new();
        for (id, session) in candidates {
            if session.lock().await.idle_for() >= max_age {
                expired.push(id);
            }
        }

        let mut purged = 0;
        for id in expired {
            // Re-check under the write lock: a request may have touched it since.
            let mut sessions = self.sessions.write().await;
            let Some(session) = sessions.get(&id).cloned() else {
                continue;
            };
            let mut guard = session.lock().await;
            if guard.idle_for() < max_age {
                continue;
            }
            sessions.remove(&id);
            drop(sessions);
            guard.reset();
            debug!(session = %id, "idle session dropped");
            purged += 1;
        }
        purged
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Starts the background sweep that drops sessions idle for longer than `ttl`,
/// checking every `every`.
pub fn spawn_sweeper(store: SessionStore, ttl: Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval_at(time::Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let purged = store.purge_idle(ttl).await;
            if purged > 0 {
                let live = store.len().await;
                info!(purged, live, "idle sessions swept");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::upload::CandidateFile;
    use crate::session::Stage;
    use bytes::Bytes;

    const TTL: Duration = Duration::from_secs(30 * 60);

    #[tokio::test]
    async fn test_create_get_remove() {
        let store = SessionStore::new();
        let session = store.create().await;
        let id = session.lock().await.id();

        assert!(store.get(id).await.is_some());
        assert_eq!(store.len().await, 1);
        assert!(store.remove(id).await);
        assert!(store.get(id).await.is_none());
        assert!(!store.remove(id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_idle_drops_only_expired_sessions() {
        let store = SessionStore::new();
        let stale = store.create().await;
        let stale_id = stale.lock().await.id();
        let fresh_id = store.create().await.lock().await.id();

        time::advance(Duration::from_secs(20 * 60)).await;
        // A request at minute 20 keeps this one alive.
        assert!(store.get(fresh_id).await.is_some());
        time::advance(Duration::from_secs(15 * 60)).await;

        assert_eq!(store.purge_idle(TTL).await, 1);
        assert!(store.get(stale_id).await.is_none());
        assert!(store.get(fresh_id).await.is_some());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_idle_cancels_in_flight_work() {
        let store = SessionStore::new();
        let session = store.create().await;
        let job = session.lock().await.accept_file(CandidateFile::new(
            "cv.pdf",
            "application/pdf",
            Bytes::from_static(b"%PDF"),
        ));

        time::advance(TTL).await;
        assert_eq!(store.purge_idle(TTL).await, 1);
        assert!(job.token.is_cancelled());
        assert_eq!(session.lock().await.stage(), Stage::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_on_interval() {
        let store = SessionStore::new();
        let id = store.create().await.lock().await.id();
        let sweeper = spawn_sweeper(store.clone(), TTL, Duration::from_secs(60));

        time::sleep(TTL - Duration::from_secs(30)).await;
        assert_eq!(store.len().await, 1);

        time::sleep(Duration::from_secs(90)).await;
        assert_eq!(store.len().await, 0);
        assert!(store.get(id).await.is_none());
        sweeper.abort();
    }
}
