//! Session Store
//!
//! Concurrent map of sessions with per-session exclusion. Sessions are
//! created on first use and never removed.

use dashmap::DashMap;
use log::info;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::state::{Session, SessionInfo};

/// A session behind its own lock
pub type SessionEntry = Arc<Mutex<Session>>;

/// Session store. Cloning shares the same map.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, SessionEntry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a session, creating it on first use
    pub fn entry(&self, session_id: &str) -> SessionEntry {
        if let Some(existing) = self.sessions.get(session_id) {
            return existing.value().clone();
        }

        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                info!("Created session: {}", session_id);
                Arc::new(Mutex::new(Session::new(session_id)))
            })
            .value()
            .clone()
    }

    /// Get a session without creating it
    pub fn get(&self, session_id: &str) -> Option<SessionEntry> {
        self.sessions.get(session_id).map(|s| s.value().clone())
    }

    /// All entries, collected so no map shard stays locked while awaiting
    pub fn entries(&self) -> Vec<SessionEntry> {
        self.sessions.iter().map(|s| s.value().clone()).collect()
    }

    /// Serializable view of one session
    pub async fn snapshot(&self, session_id: &str) -> Option<SessionInfo> {
        let entry = self.get(session_id)?;
        let session = entry.lock().await;
        Some(SessionInfo::from(&*session))
    }

    /// Total session count
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sessions with a running search
    pub async fn generating_count(&self) -> usize {
        let mut count = 0;
        for entry in self.entries() {
            if entry.lock().await.is_generating() {
                count += 1;
            }
        }
        count
    }
}
