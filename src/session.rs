//! In-process conversation session registry.
//!
//! Sessions are short-lived: a bounded history of recent exchanges keyed by
//! an opaque id, swept away after an idle timeout. The store owns every
//! session exclusively — all mutation goes through it, serialized by its
//! lock — and entries within one session are appended in arrival order.
//! Sweeping runs opportunistically when the live count crosses a threshold;
//! stale sessions only waste memory, so a fixed schedule is unnecessary.

use crate::config::SessionConfig;
use crate::intent::Intent;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, info};

/// One completed exchange.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub answer: String,
    /// Classified intent of the query, kept for audit.
    pub intent: Intent,
}

/// A conversation session. Owned exclusively by the [`SessionStore`].
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub history: Vec<HistoryEntry>,
}

/// Compact listing entry for the sessions endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub exchanges: usize,
}

pub struct SessionStore {
    inner: Mutex<HashMap<String, Session>>,
    counter: AtomicU64,
    idle_timeout: chrono::Duration,
    history_cap: usize,
    sweep_threshold: usize,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
            idle_timeout: chrono::Duration::seconds(config.idle_timeout_secs as i64),
            history_cap: config.history_cap,
            sweep_threshold: config.sweep_threshold,
        }
    }

    /// Resolve a session id, creating the session if needed. A missing id
    /// gets a fresh one derived from the current time plus a process-local
    /// counter (unique within the process even for same-second requests).
    /// Refreshes `last_activity` and sweeps opportunistically.
    pub fn get_or_create(&self, id: Option<&str>) -> String {
        let now = Utc::now();
        let id = match id {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => {
                let n = self.counter.fetch_add(1, Ordering::Relaxed);
                format!("session_{}_{n:04}", now.format("%Y%m%d_%H%M%S"))
            }
        };

        let mut sessions = self.inner.lock().expect("session store lock poisoned");
        match sessions.get_mut(&id) {
            Some(session) => session.last_activity = now,
            None => {
                debug!(session = %id, "created session");
                sessions.insert(
                    id.clone(),
                    Session {
                        id: id.clone(),
                        started_at: now,
                        last_activity: now,
                        history: Vec::new(),
                    },
                );
            }
        }

        if sessions.len() > self.sweep_threshold {
            Self::sweep_locked(&mut sessions, self.idle_timeout);
        }

        id
    }

    /// Append a completed exchange. Unknown ids are ignored — the exchange
    /// belongs to a session that was already swept, which is not an error.
    pub fn append(&self, id: &str, query: &str, answer: &str, intent: Intent) {
        let now = Utc::now();
        let mut sessions = self.inner.lock().expect("session store lock poisoned");
        let Some(session) = sessions.get_mut(id) else {
            debug!(session = %id, "append to unknown session ignored");
            return;
        };
        session.history.push(HistoryEntry {
            timestamp: now,
            query: query.to_string(),
            answer: answer.to_string(),
            intent,
        });
        // Keep only the most recent entries
        if session.history.len() > self.history_cap {
            let excess = session.history.len() - self.history_cap;
            session.history.drain(..excess);
        }
        session.last_activity = now;
    }

    /// Snapshot a session by id.
    pub fn get(&self, id: &str) -> Option<Session> {
        self.inner
            .lock()
            .expect("session store lock poisoned")
            .get(id)
            .cloned()
    }

    /// Delete a session. Returns whether it existed.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self
            .inner
            .lock()
            .expect("session store lock poisoned")
            .remove(id)
            .is_some();
        if removed {
            debug!(session = %id, "session deleted");
        }
        removed
    }

    /// Remove sessions idle past the timeout. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let mut sessions = self.inner.lock().expect("session store lock poisoned");
        Self::sweep_locked(&mut sessions, self.idle_timeout)
    }

    fn sweep_locked(sessions: &mut HashMap<String, Session>, idle_timeout: chrono::Duration) -> usize {
        let now = Utc::now();
        let before = sessions.len();
        sessions.retain(|_, session| now - session.last_activity <= idle_timeout);
        let removed = before - sessions.len();
        if removed > 0 {
            info!(removed, remaining = sessions.len(), "swept idle sessions");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("session store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Compact listing of all live sessions.
    pub fn summaries(&self) -> Vec<SessionSummary> {
        let sessions = self.inner.lock().expect("session store lock poisoned");
        let mut summaries: Vec<SessionSummary> = sessions
            .values()
            .map(|s| SessionSummary {
                session_id: s.id.clone(),
                started_at: s.started_at,
                last_activity: s.last_activity,
                exchanges: s.history.len(),
            })
            .collect();
        summaries.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(history_cap: usize, idle_timeout_secs: u64) -> SessionStore {
        SessionStore::new(&SessionConfig {
            idle_timeout_secs,
            history_cap,
            recent_exchanges: 5,
            sweep_threshold: 50,
        })
    }

    #[test]
    fn generated_ids_are_unique() {
        let store = store_with(10, 3600);
        let a = store.get_or_create(None);
        let b = store.get_or_create(None);
        assert_ne!(a, b);
        assert!(a.starts_with("session_"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn supplied_id_is_reused() {
        let store = store_with(10, 3600);
        let a = store.get_or_create(Some("mine"));
        let b = store.get_or_create(Some("mine"));
        assert_eq!(a, "mine");
        assert_eq!(b, "mine");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn blank_id_gets_generated() {
        let store = store_with(10, 3600);
        let id = store.get_or_create(Some("  "));
        assert!(id.starts_with("session_"));
    }

    #[test]
    fn history_capped_at_most_recent() {
        let store = store_with(3, 3600);
        let id = store.get_or_create(None);
        for i in 0..8 {
            store.append(&id, &format!("q{i}"), &format!("a{i}"), Intent::default());
        }
        let session = store.get(&id).unwrap();
        assert_eq!(session.history.len(), 3);
        // Retained entries are the most recent, in arrival order
        let queries: Vec<&str> = session.history.iter().map(|e| e.query.as_str()).collect();
        assert_eq!(queries, vec!["q5", "q6", "q7"]);
    }

    #[test]
    fn append_refreshes_last_activity() {
        let store = store_with(10, 3600);
        let id = store.get_or_create(None);
        let before = store.get(&id).unwrap().last_activity;
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.append(&id, "q", "a", Intent::default());
        let after = store.get(&id).unwrap().last_activity;
        assert!(after > before);
    }

    #[test]
    fn append_to_unknown_session_is_ignored() {
        let store = store_with(10, 3600);
        store.append("ghost", "q", "a", Intent::default());
        assert!(store.get("ghost").is_none());
    }

    #[test]
    fn remove_reports_existence() {
        let store = store_with(10, 3600);
        let id = store.get_or_create(None);
        assert!(store.remove(&id));
        assert!(!store.remove(&id));
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn sweep_removes_only_idle_sessions() {
        let store = store_with(10, 0);
        let stale = store.get_or_create(None);
        std::thread::sleep(std::time::Duration::from_millis(20));
        let removed = store.sweep();
        assert_eq!(removed, 1);
        assert!(store.get(&stale).is_none());
    }

    #[test]
    fn sweep_keeps_active_sessions() {
        let store = store_with(10, 3600);
        let id = store.get_or_create(None);
        assert_eq!(store.sweep(), 0);
        assert!(store.get(&id).is_some());
    }

    #[test]
    fn summaries_sorted_by_recency() {
        let store = store_with(10, 3600);
        let first = store.get_or_create(None);
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = store.get_or_create(None);
        let summaries = store.summaries();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].session_id, second);
        assert_eq!(summaries[1].session_id, first);
    }
}
