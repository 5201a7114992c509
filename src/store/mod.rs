//! The single in-memory snapshot and everything that happens around a
//! transition: payload validation, invariant enforcement, persistence and
//! fan-out to subscribers.

pub mod invariants;
pub mod persistence;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::action::Action;
use crate::models::AppState;
use crate::reducer::reduce;

pub use invariants::InvariantPolicy;
pub use persistence::{PersistenceError, SessionFormat};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Invalid payload for {action}: {message}")]
    InvalidPayload { action: String, message: String },

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Snapshot violates {count} invariant(s), first: {first}")]
    InvalidSnapshot { count: usize, first: String },

    #[error("Failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Store runtime has shut down")]
    Closed,
}

pub type SubscriptionId = u64;

/// A stream of committed snapshots, starting with the one current at
/// subscription time.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub receiver: mpsc::UnboundedReceiver<Arc<AppState>>,
}

pub struct Store {
    state: Arc<AppState>,
    policy: InvariantPolicy,
    session_file: Option<PathBuf>,
    subscribers: BTreeMap<SubscriptionId, mpsc::UnboundedSender<Arc<AppState>>>,
    next_subscription: SubscriptionId,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(AppState::default())
    }
}

impl Store {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
            policy: InvariantPolicy::default(),
            session_file: None,
            subscribers: BTreeMap::new(),
            next_subscription: 0,
        }
    }

    pub fn with_policy(mut self, policy: InvariantPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// File rewritten after persistence-worthy actions when auto-save is on.
    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = Some(path.into());
        self
    }

    /// Restores the session at `path`, or starts fresh when it is absent or
    /// unusable.
    pub fn open(path: impl Into<PathBuf>, policy: InvariantPolicy) -> Self {
        let path = path.into();
        let mut store = Self::default()
            .with_policy(policy)
            .with_session_file(path.clone());
        if path.exists() {
            if let Err(e) = store.load_from_file(&path) {
                tracing::warn!("Starting with a fresh session: {}", e);
            }
        } else {
            tracing::info!("No session at {}, starting fresh", path.display());
        }
        store
    }

    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    pub fn policy(&self) -> InvariantPolicy {
        self.policy
    }

    pub fn session_file(&self) -> Option<&Path> {
        self.session_file.as_deref()
    }

    /// Commits one action and returns the new snapshot.
    pub fn dispatch(&mut self, action: &Action) -> Arc<AppState> {
        let mut next = reduce((*self.state).clone(), action);
        self.enforce(&mut next, action.tag());

        self.state = Arc::new(next);
        tracing::debug!("Dispatched {}", action.tag());

        if action.is_persistent() && self.state.settings.auto_save {
            if let Some(path) = &self.session_file {
                if let Err(e) = persistence::save(path, &self.state) {
                    tracing::warn!("Auto-save after {} failed: {}", action.tag(), e);
                }
            }
        }

        self.broadcast();
        self.state()
    }

    /// Validates a wire action, commits it and hands back the decoded
    /// action. Nothing is committed when validation fails.
    pub fn dispatch_json(&mut self, value: serde_json::Value) -> Result<Action, StoreError> {
        let action = Action::from_json(value)?;
        self.dispatch(&action);
        Ok(action)
    }

    pub fn state_json(&self) -> Result<serde_json::Value, StoreError> {
        Ok(serde_json::to_value(&*self.state)?)
    }

    fn enforce(&self, state: &mut AppState, tag: &str) {
        match self.policy {
            InvariantPolicy::Panic => {
                let found = invariants::check(state);
                if !found.is_empty() {
                    let list: Vec<String> = found.iter().map(ToString::to_string).collect();
                    panic!("{} broke state invariants: {}", tag, list.join("; "));
                }
            }
            InvariantPolicy::Repair => {
                for violation in invariants::repair(state) {
                    tracing::error!("Repaired after {}: {}", tag, violation);
                }
            }
        }
    }

    pub fn subscribe(&mut self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_subscription;
        self.next_subscription += 1;
        // The receiver is alive, so the initial send cannot fail.
        let _ = tx.send(self.state());
        self.subscribers.insert(id, tx);
        tracing::debug!("Subscriber {} attached", id);
        Subscription { id, receiver: rx }
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn broadcast(&mut self) {
        let snapshot = &self.state;
        self.subscribers.retain(|id, tx| {
            let alive = tx.send(Arc::clone(snapshot)).is_ok();
            if !alive {
                tracing::debug!("Dropping closed subscriber {}", id);
            }
            alive
        });
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), StoreError> {
        persistence::save(path, &self.state)?;
        tracing::info!("Saved session to {}", path.display());
        Ok(())
    }

    /// Replaces the snapshot with the one at `path`. On any failure the store
    /// falls back to a default state and the error is returned.
    pub fn load_from_file(&mut self, path: &Path) -> Result<(), StoreError> {
        let result = persistence::load(path)
            .map_err(StoreError::from)
            .and_then(|state| {
                let found = invariants::check(&state);
                match found.first() {
                    None => Ok(state),
                    Some(first) => Err(StoreError::InvalidSnapshot {
                        count: found.len(),
                        first: first.to_string(),
                    }),
                }
            });

        let outcome = match result {
            Ok(state) => {
                tracing::info!(
                    "Loaded session from {} ({} project(s))",
                    path.display(),
                    state.projects.len()
                );
                self.state = Arc::new(state);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Could not load {}: {}", path.display(), e);
                self.state = Arc::new(AppState::default());
                Err(e)
            }
        };
        self.broadcast();
        outcome
    }
}
