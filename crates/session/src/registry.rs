//! Registry of live agent sessions and "current session" selection.
//!
//! More than one session may exist transiently during reconnects; the
//! dispatcher always picks the active session with the most recent
//! activity. A shared periodic sweep covers half-open sockets that never
//! deliver a clean close.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use tabbridge_core::config::LivenessConfig;

use crate::mux::Multiplexer;
use crate::session::{AgentSession, SessionState};

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<AgentSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: Arc<AgentSession>) {
        self.sessions.write().await.insert(session.id, session);
    }

    pub async fn remove(&self, id: Uuid) -> Option<Arc<AgentSession>> {
        let removed = self.sessions.write().await.remove(&id);
        if let Some(session) = &removed {
            session.set_closed();
        }
        removed
    }

    /// The designated current session: active, most recent activity.
    pub async fn current(&self) -> Option<Arc<AgentSession>> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.is_active())
            .max_by_key(|s| s.last_activity())
            .cloned()
    }

    pub async fn active_count(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.is_active())
            .count()
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<AgentSession>> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Force-evict active sessions whose last activity is older than
    /// `stale`. Returns how many sessions were evicted.
    pub async fn sweep_stale(&self, stale: Duration, mux: &Multiplexer) -> usize {
        let stale_sessions: Vec<Arc<AgentSession>> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.state() == SessionState::Active && s.last_activity().elapsed() > stale)
            .cloned()
            .collect();

        let mut evicted = 0;
        for session in stale_sessions {
            if session.begin_evict() {
                info!(session = %session.id, "stale session evicted");
                mux.fail_session(session.id);
                evicted += 1;
            }
        }
        evicted
    }
}

/// Shared background sweep for stale sessions.
pub fn spawn_sweeper(
    registry: Arc<SessionRegistry>,
    mux: Arc<Multiplexer>,
    cfg: LivenessConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cfg.sweep_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            registry.sweep_stale(cfg.stale_session(), &mux).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabbridge_core::Config;
    use tokio::sync::mpsc;

    fn session() -> (Arc<AgentSession>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(4);
        (Arc::new(AgentSession::new(tx, None)), rx)
    }

    #[tokio::test]
    async fn test_current_prefers_most_recent_activity() {
        let registry = SessionRegistry::new();
        let (first, _rx1) = session();
        let (second, _rx2) = session();
        registry.insert(first.clone()).await;
        registry.insert(second.clone()).await;

        tokio::time::sleep(Duration::from_millis(5)).await;
        first.touch();
        assert_eq!(registry.current().await.unwrap().id, first.id);

        tokio::time::sleep(Duration::from_millis(5)).await;
        second.touch();
        assert_eq!(registry.current().await.unwrap().id, second.id);
    }

    #[tokio::test]
    async fn test_current_skips_evicting_sessions() {
        let registry = SessionRegistry::new();
        let (only, _rx) = session();
        registry.insert(only.clone()).await;
        only.begin_evict();
        assert!(registry.current().await.is_none());
        assert_eq!(registry.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_remove_closes_session() {
        let registry = SessionRegistry::new();
        let (s, _rx) = session();
        registry.insert(s.clone()).await;
        registry.remove(s.id).await;
        assert_eq!(s.state(), SessionState::Closed);
        assert!(registry.get(s.id).await.is_none());
    }

    #[tokio::test]
    async fn test_sweep_evicts_only_stale_sessions() {
        let config = Config::default();
        let registry = Arc::new(SessionRegistry::new());
        let cache = Arc::new(crate::cache::SnapshotCache::new(&config.limits));
        let mux = Multiplexer::new(registry.clone(), cache, &config);

        let (stale, _rx1) = session();
        let (fresh, _rx2) = session();
        registry.insert(stale.clone()).await;
        registry.insert(fresh.clone()).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        fresh.touch();

        let evicted = registry.sweep_stale(Duration::from_millis(20), &mux).await;
        assert_eq!(evicted, 1);
        assert_eq!(stale.state(), SessionState::Evicting);
        assert_eq!(fresh.state(), SessionState::Active);
    }
}
