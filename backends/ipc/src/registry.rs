//! Registry of calls awaiting a reply.
//!
//! Every dispatched call owns exactly one entry, keyed by its request id.
//! Resolution removes the entry under the lock and hands the outcome to the
//! waiting caller, so a second reply carrying the same id finds nothing.
//! Entries are also removed when the caller stops waiting, when they are
//! expired by the integrator, or when the connection goes away.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::oneshot;
use transport::{BackendError, Result};

type Outcome = Result<Value>;

#[derive(Debug)]
struct Entry {
    tx: oneshot::Sender<Outcome>,
    registered_at: Instant,
}

#[derive(Debug, Default)]
struct State {
    calls: HashMap<String, Entry>,
    high_water_mark: usize,
    resolved: u64,
    unmatched: u64,
    abandoned: u64,
}

/// Point-in-time counters for the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Calls currently awaiting a reply
    pub pending: usize,
    /// Largest number of simultaneously pending calls seen
    pub high_water_mark: usize,
    /// Replies matched to a pending call
    pub resolved: u64,
    /// Well-formed replies whose id matched nothing
    pub unmatched: u64,
    /// Calls whose caller stopped waiting before a reply arrived
    pub abandoned: u64,
}

/// Shared map of request id to waiting caller.
#[derive(Debug, Clone)]
pub struct PendingRegistry {
    state: Arc<Mutex<State>>,
    max_pending: Option<usize>,
}

impl PendingRegistry {
    /// Creates an empty registry; `max_pending` caps simultaneous entries.
    pub fn new(max_pending: Option<usize>) -> Self {
        Self { state: Arc::new(Mutex::new(State::default())), max_pending }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers interest in the reply to `id`.
    pub fn register(&self, id: String) -> Result<PendingCall> {
        let (tx, rx) = oneshot::channel();
        let mut state = self.lock();
        if let Some(max) = self.max_pending {
            if state.calls.len() >= max {
                return Err(BackendError::Transport(format!(
                    "too many pending calls ({} awaiting a reply)",
                    max
                )));
            }
        }
        if state.calls.contains_key(&id) {
            return Err(BackendError::Transport(format!("request id {} is already pending", id)));
        }
        state.calls.insert(id.clone(), Entry { tx, registered_at: Instant::now() });
        state.high_water_mark = state.high_water_mark.max(state.calls.len());
        drop(state);

        Ok(PendingCall { id, rx, registry: self.clone() })
    }

    /// Completes the call registered under `id`.
    ///
    /// Returns `false` when nothing is pending under that id; the outcome is
    /// dropped.
    pub fn resolve(&self, id: &str, outcome: Outcome) -> bool {
        let entry = {
            let mut state = self.lock();
            match state.calls.remove(id) {
                Some(entry) => {
                    state.resolved += 1;
                    entry
                }
                None => {
                    state.unmatched += 1;
                    return false;
                }
            }
        };
        // The caller may have gone away in the meantime; nothing to do then.
        let _ = entry.tx.send(outcome);
        true
    }

    /// Fails every pending call with `error` and empties the registry.
    pub fn fail_all(&self, error: &BackendError) -> usize {
        let drained: Vec<Entry> = self.lock().calls.drain().map(|(_, entry)| entry).collect();
        let count = drained.len();
        for entry in drained {
            let _ = entry.tx.send(Err(error.clone()));
        }
        count
    }

    /// Fails and removes calls that have waited at least `max_age`.
    ///
    /// Returns the ids that were expired.
    pub fn expire_older_than(&self, max_age: Duration) -> Vec<String> {
        let expired: Vec<(String, Entry)> = {
            let mut state = self.lock();
            let ids: Vec<String> = state
                .calls
                .iter()
                .filter(|(_, entry)| entry.registered_at.elapsed() >= max_age)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| state.calls.remove(&id).map(|entry| (id, entry)))
                .collect()
        };

        let mut ids = Vec::with_capacity(expired.len());
        for (id, entry) in expired {
            let _ = entry.tx.send(Err(BackendError::Transport(format!(
                "no response to {} within {:?}",
                id, max_age
            ))));
            ids.push(id);
        }
        ids
    }

    fn abandon(&self, id: &str) {
        let mut state = self.lock();
        if state.calls.remove(id).is_some() {
            state.abandoned += 1;
        }
    }

    /// Number of calls awaiting a reply.
    pub fn len(&self) -> usize { self.lock().calls.len() }

    /// Whether no call is awaiting a reply.
    pub fn is_empty(&self) -> bool { self.lock().calls.is_empty() }

    /// Ids of the calls awaiting a reply, oldest first.
    pub fn ids(&self) -> Vec<String> {
        let state = self.lock();
        let mut entries: Vec<(&String, &Entry)> = state.calls.iter().collect();
        entries.sort_by_key(|(_, entry)| entry.registered_at);
        entries.into_iter().map(|(id, _)| id.clone()).collect()
    }

    /// Current counters.
    pub fn stats(&self) -> RegistryStats {
        let state = self.lock();
        RegistryStats {
            pending: state.calls.len(),
            high_water_mark: state.high_water_mark,
            resolved: state.resolved,
            unmatched: state.unmatched,
            abandoned: state.abandoned,
        }
    }
}

/// The caller's side of one registry entry.
///
/// Dropping it before the reply arrives deregisters the id; a reply that
/// shows up later is discarded as unmatched.
#[derive(Debug)]
pub struct PendingCall {
    id: String,
    rx: oneshot::Receiver<Outcome>,
    registry: PendingRegistry,
}

impl PendingCall {
    /// The request id this call is registered under.
    pub fn id(&self) -> &str { &self.id }

    /// Waits for the outcome.
    pub async fn wait(mut self) -> Outcome {
        match (&mut self.rx).await {
            Ok(outcome) => outcome,
            Err(_) => Err(BackendError::Transport(format!(
                "pending call {} was dropped without a response",
                self.id
            ))),
        }
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) { self.registry.abandon(&self.id); }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_resolve_delivers_once() {
        let registry = PendingRegistry::new(None);
        let call = registry.register("a".to_string()).expect("register");
        assert_eq!(registry.len(), 1);

        assert!(registry.resolve("a", Ok(json!(1))));
        assert!(!registry.resolve("a", Ok(json!(2))));
        assert!(registry.is_empty());

        assert_eq!(call.wait().await.expect("outcome"), json!(1));
        let stats = registry.stats();
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.unmatched, 1);
        assert_eq!(stats.abandoned, 0);
    }

    #[tokio::test]
    async fn test_unknown_id_is_ignored() {
        let registry = PendingRegistry::new(None);
        let call = registry.register("a".to_string()).expect("register");
        assert!(!registry.resolve("zzz", Ok(json!(null))));
        assert_eq!(registry.len(), 1);
        drop(call);
    }

    #[test]
    fn test_dropped_call_deregisters() {
        let registry = PendingRegistry::new(None);
        let call = registry.register("a".to_string()).expect("register");
        drop(call);
        assert!(registry.is_empty());
        assert_eq!(registry.stats().abandoned, 1);
        assert!(!registry.resolve("a", Ok(json!(1))));
    }

    #[test]
    fn test_max_pending_bound() {
        let registry = PendingRegistry::new(Some(2));
        let _a = registry.register("a".to_string()).expect("a");
        let _b = registry.register("b".to_string()).expect("b");
        assert!(matches!(registry.register("c".to_string()), Err(BackendError::Transport(_))));
        assert_eq!(registry.stats().high_water_mark, 2);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let registry = PendingRegistry::new(None);
        let _a = registry.register("a".to_string()).expect("a");
        assert!(registry.register("a".to_string()).is_err());
    }

    #[tokio::test]
    async fn test_fail_all_drains() {
        let registry = PendingRegistry::new(None);
        let a = registry.register("a".to_string()).expect("a");
        let b = registry.register("b".to_string()).expect("b");

        let error = BackendError::Transport("connection closed".to_string());
        assert_eq!(registry.fail_all(&error), 2);
        assert!(registry.is_empty());
        assert_eq!(a.wait().await, Err(error.clone()));
        assert_eq!(b.wait().await, Err(error));
    }

    #[tokio::test]
    async fn test_expire_older_than() {
        let registry = PendingRegistry::new(None);
        let old = registry.register("old".to_string()).expect("old");
        std::thread::sleep(Duration::from_millis(20));
        let fresh = registry.register("fresh".to_string()).expect("fresh");

        assert_eq!(registry.ids(), vec!["old".to_string(), "fresh".to_string()]);
        assert_eq!(registry.expire_older_than(Duration::from_millis(10)), vec!["old".to_string()]);
        assert_eq!(registry.ids(), vec!["fresh".to_string()]);
        assert!(matches!(old.wait().await, Err(BackendError::Transport(_))));
        drop(fresh);
    }
}
