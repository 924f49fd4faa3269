//! Concurrent session store.
//!
//! Maps session id to a shared session record and accounts for
//! live-process slots. All map operations happen under one lock, so
//! insert/get/remove/rekey are linearizable and a slot reservation is
//! atomic with its capacity check; per-session mutation is serialized
//! separately by each session's own mutex.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::models::session::{is_temp_id, Session, SessionStatus};
use crate::{AppError, Result};

/// A session shared between the store, I/O tasks, and tool operations.
pub type SharedSession = Arc<Mutex<Session>>;

struct StoreEntry {
    session: SharedSession,
    /// Monotonic insertion sequence; survives rekey so "most recently
    /// created" stays meaningful after the id changes.
    seq: u64,
}

/// Store of all tracked sessions.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<StoreInner>>,
}

#[derive(Default)]
struct StoreInner {
    sessions: HashMap<String, StoreEntry>,
    /// Ids holding a live-process slot. A slot is taken *before* the
    /// process is spawned, under the same lock hold that checks the cap,
    /// so concurrent spawns at the boundary cannot both pass the check.
    live: HashSet<String>,
    next_seq: u64,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session under its current id.
    pub async fn insert(&self, session: Session) -> SharedSession {
        let id = session.id.clone();
        let shared: SharedSession = Arc::new(Mutex::new(session));
        let mut inner = self.inner.lock().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.sessions.insert(
            id,
            StoreEntry {
                session: Arc::clone(&shared),
                seq,
            },
        );
        shared
    }

    /// Look up a session by exact id.
    pub async fn get(&self, id: &str) -> Option<SharedSession> {
        self.inner
            .lock()
            .await
            .sessions
            .get(id)
            .map(|e| Arc::clone(&e.session))
    }

    /// Atomically move a session from `old_id` to `new_id`.
    ///
    /// The caller updates `Session::id` itself; this relocates the map
    /// entry and any live-process slot held under the old id. After the
    /// move the old id no longer resolves.
    ///
    /// # Errors
    ///
    /// Returns `AppError::UnknownSession` when `old_id` is not present.
    pub async fn rekey(&self, old_id: &str, new_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let entry = inner
            .sessions
            .remove(old_id)
            .ok_or_else(|| AppError::UnknownSession(old_id.to_owned()))?;
        inner.sessions.insert(new_id.to_owned(), entry);
        if inner.live.remove(old_id) {
            inner.live.insert(new_id.to_owned());
        }
        Ok(())
    }

    /// Remove a session, freeing any slot it still holds.
    pub async fn remove(&self, id: &str) -> Option<SharedSession> {
        let mut inner = self.inner.lock().await;
        inner.live.remove(id);
        inner.sessions.remove(id).map(|e| e.session)
    }

    /// All sessions ordered oldest-first by insertion.
    pub async fn snapshot(&self) -> Vec<(String, SharedSession)> {
        let inner = self.inner.lock().await;
        let mut entries: Vec<(&String, &StoreEntry)> = inner.sessions.iter().collect();
        entries.sort_by_key(|(_, e)| e.seq);
        entries
            .into_iter()
            .map(|(id, e)| (id.clone(), Arc::clone(&e.session)))
            .collect()
    }

    /// Number of sessions holding a live-process slot.
    pub async fn count_active(&self) -> usize {
        self.inner.lock().await.live.len()
    }

    /// Take the live-process slot for `id`, failing when the cap is full.
    ///
    /// The capacity check and the reservation happen under one lock hold;
    /// an id that already holds its slot re-reserves as a no-op (the
    /// resume path runs through here again after the initial spawn).
    ///
    /// # Errors
    ///
    /// Returns `AppError::CapacityExceeded` when `max_sessions` slots are
    /// already taken.
    pub async fn reserve_slot(&self, id: &str, max_sessions: usize) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.live.contains(id) {
            return Ok(());
        }
        if inner.live.len() >= max_sessions {
            return Err(AppError::CapacityExceeded(format!(
                "{} of {max_sessions} live sessions in use",
                inner.live.len()
            )));
        }
        inner.live.insert(id.to_owned());
        Ok(())
    }

    /// Free the live-process slot for `id` (process reaped or spawn
    /// failed). Unknown ids are a no-op.
    pub async fn release_slot(&self, id: &str) {
        self.inner.lock().await.live.remove(id);
    }

    /// Resolve the session an approval request belongs to.
    ///
    /// Order: exact id match; else, for a not-yet-initialized label (temp
    /// id or the `unknown` sentinel), the most recently inserted session
    /// still on a temp id; else the most recently created session that is
    /// ACTIVE or AWAITING_INPUT. Covers the race where the agent's
    /// approval path fires before its init event.
    pub async fn resolve_approval_label(&self, label: &str) -> Option<SharedSession> {
        if let Some(session) = self.get(label).await {
            return Some(session);
        }

        let mut sessions = self.snapshot().await;
        sessions.reverse(); // newest first

        if label.is_empty() || label == "unknown" || is_temp_id(label) {
            for (id, session) in &sessions {
                if is_temp_id(id) {
                    return Some(Arc::clone(session));
                }
            }
        }

        for (_, session) in &sessions {
            let status = session.lock().await.status;
            if matches!(status, SessionStatus::Active | SessionStatus::AwaitingInput) {
                return Some(Arc::clone(session));
            }
        }

        None
    }
}
