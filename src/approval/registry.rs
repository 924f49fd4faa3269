//! Pending-question registry.
//!
//! Each registered question owns a oneshot resolver and an armed timer.
//! Resolution happens exactly once: the first of operator answer or timer
//! expiry removes the entry under the registry lock and fires the sender;
//! the loser finds the id gone. The timeout callback runs *after* the
//! registry lock is released, so callers may lock their session state
//! inside it without ordering hazards.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

/// Callback producing the default (deny) payload when a question times out.
///
/// Runs outside the registry lock; implementations typically also restore
/// their session's status.
pub type TimeoutFn = Box<dyn FnOnce() -> BoxFuture<'static, Value> + Send>;

struct Entry {
    tx: oneshot::Sender<Value>,
    timer: JoinHandle<()>,
}

/// Registry of questions awaiting an operator decision.
#[derive(Clone, Default)]
pub struct QuestionRegistry {
    inner: Arc<Mutex<HashMap<String, Entry>>>,
}

impl QuestionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending id and arm its timeout.
    ///
    /// The returned receiver yields the translated response: either the
    /// operator's (via [`resolve`](Self::resolve)) or, after `timeout`,
    /// whatever `on_timeout` produces.
    pub async fn register(
        &self,
        id: &str,
        timeout: Duration,
        on_timeout: TimeoutFn,
    ) -> oneshot::Receiver<Value> {
        let (tx, rx) = oneshot::channel();

        // Hold the map lock across spawn + insert: a timer that fires
        // immediately then blocks on the lock and still finds its entry.
        let mut inner = self.inner.lock().await;

        let timer = {
            let map = Arc::clone(&self.inner);
            let id = id.to_owned();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                // Win or lose the race under the lock, then run the
                // callback and send with the lock released.
                let entry = map.lock().await.remove(&id);
                if let Some(entry) = entry {
                    debug!(question_id = %id, "pending question timed out");
                    let value = on_timeout().await;
                    let _ = entry.tx.send(value);
                }
            })
        };

        let previous = inner.insert(id.to_owned(), Entry { tx, timer });
        if let Some(previous) = previous {
            // A stale entry under the same id can only come from a
            // misbehaving agent reusing request ids; drop its timer.
            previous.timer.abort();
        }

        rx
    }

    /// Resolve a pending id with the operator's translated response.
    ///
    /// Returns `false` when the id is unknown or already resolved (for
    /// example by the timeout path racing ahead).
    pub async fn resolve(&self, id: &str, value: Value) -> bool {
        let entry = self.inner.lock().await.remove(id);
        match entry {
            Some(entry) => {
                entry.timer.abort();
                let _ = entry.tx.send(value);
                true
            }
            None => false,
        }
    }

    /// Cancel the timer for an id without resolving it.
    ///
    /// The awaiting side observes a closed channel.
    pub async fn clear(&self, id: &str) -> bool {
        match self.inner.lock().await.remove(id) {
            Some(entry) => {
                entry.timer.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every armed timer and forget all ids.
    pub async fn cleanup(&self) {
        let entries: Vec<Entry> = self.inner.lock().await.drain().map(|(_, e)| e).collect();
        for entry in entries {
            entry.timer.abort();
        }
    }

    /// Number of currently pending ids.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Whether no ids are pending.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}
