//! The single writer. One task owns the store, the scheduler and the
//! service poller; everything else talks to it through a [`Dispatcher`].

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::action::Action;
use crate::models::AppState;
use crate::scheduler::poller::ServicePoller;
use crate::scheduler::{Collaborators, Scheduler};
use crate::store::{Store, StoreError, Subscription, SubscriptionId};

enum Request {
    Dispatch {
        action: Action,
        reply: oneshot::Sender<()>,
    },
    DispatchJson {
        value: serde_json::Value,
        reply: oneshot::Sender<Result<(), StoreError>>,
    },
    State {
        reply: oneshot::Sender<Arc<AppState>>,
    },
    StateJson {
        reply: oneshot::Sender<Result<serde_json::Value, StoreError>>,
    },
    Subscribe {
        reply: oneshot::Sender<Subscription>,
    },
    Unsubscribe {
        id: SubscriptionId,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cheap handle to a running [`Runtime`]. Every call fails with
/// [`StoreError::Closed`] once the runtime has stopped.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Request>,
}

impl Dispatcher {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Request,
    ) -> Result<T, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(make(reply)).map_err(|_| StoreError::Closed)?;
        rx.await.map_err(|_| StoreError::Closed)
    }

    /// Resolves once the action is committed and examined by the scheduler.
    pub async fn dispatch(&self, action: Action) -> Result<(), StoreError> {
        self.request(|reply| Request::Dispatch { action, reply })
            .await
    }

    pub async fn dispatch_json(&self, value: serde_json::Value) -> Result<(), StoreError> {
        self.request(|reply| Request::DispatchJson { value, reply })
            .await?
    }

    pub async fn snapshot(&self) -> Result<Arc<AppState>, StoreError> {
        self.request(|reply| Request::State { reply }).await
    }

    pub async fn state(&self) -> Result<serde_json::Value, StoreError> {
        self.request(|reply| Request::StateJson { reply }).await?
    }

    pub async fn subscribe(&self) -> Result<Subscription, StoreError> {
        self.request(|reply| Request::Subscribe { reply }).await
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        let _ = self.tx.send(Request::Unsubscribe { id });
    }

    /// Saves the session, aborts every job and stops the runtime.
    pub async fn shutdown(&self) -> Result<(), StoreError> {
        self.request(|reply| Request::Shutdown { reply }).await
    }
}

pub struct Runtime {
    store: Store,
    scheduler: Scheduler,
    poller: Option<ServicePoller>,
    polling: bool,
    followups: mpsc::UnboundedReceiver<Action>,
}

impl Runtime {
    pub fn new(store: Store, collaborators: Collaborators) -> Self {
        let (sink, followups) = mpsc::unbounded_channel();
        Self {
            store,
            scheduler: Scheduler::new(collaborators, sink),
            poller: None,
            polling: true,
            followups,
        }
    }

    /// Skips the periodic container refresh.
    pub fn without_polling(mut self) -> Self {
        self.polling = false;
        self
    }

    pub fn spawn(self) -> (Dispatcher, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(self.run(rx));
        (Dispatcher { tx }, handle)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Request>) {
        tracing::info!(
            "Runtime started with {} project(s), invariant policy {:?}",
            self.store.state().projects.len(),
            self.store.policy()
        );
        let state = self.store.state();
        let resumed = self.scheduler.resume(&state);
        if !resumed.is_empty() {
            tracing::debug!("Resumed {} job(s)", resumed.len());
        }
        self.sync_poller();

        loop {
            tokio::select! {
                request = rx.recv() => {
                    let Some(request) = request else {
                        tracing::debug!("All dispatchers dropped");
                        break;
                    };
                    if let Some(reply) = self.handle(request) {
                        rx.close();
                        self.stop();
                        let _ = reply.send(());
                        return;
                    }
                }
                Some(action) = self.followups.recv() => self.apply(&action),
            }
        }
        self.stop();
    }

    /// Returns the reply channel when the request asks to shut down.
    fn handle(&mut self, request: Request) -> Option<oneshot::Sender<()>> {
        match request {
            Request::Dispatch { action, reply } => {
                self.apply(&action);
                let _ = reply.send(());
            }
            Request::DispatchJson { value, reply } => {
                let before = self.store.state();
                let result = self
                    .store
                    .dispatch_json(value)
                    .map(|action| self.react(&action, &before));
                if let Err(e) = &result {
                    tracing::warn!("Rejected action: {}", e);
                }
                let _ = reply.send(result);
            }
            Request::State { reply } => {
                let _ = reply.send(self.store.state());
            }
            Request::StateJson { reply } => {
                let _ = reply.send(self.store.state_json());
            }
            Request::Subscribe { reply } => {
                let subscription = self.store.subscribe();
                tracing::debug!("{} subscriber(s)", self.store.subscriber_count());
                let _ = reply.send(subscription);
            }
            Request::Unsubscribe { id } => {
                self.store.unsubscribe(id);
            }
            Request::Shutdown { reply } => return Some(reply),
        }
        None
    }

    fn apply(&mut self, action: &Action) {
        let before = self.store.state();
        self.store.dispatch(action);
        self.react(action, &before);
    }

    /// Runs the scheduler over a committed action.
    fn react(&mut self, action: &Action, before: &AppState) {
        let after = self.store.state();
        for outcome in self.scheduler.examine(action, before, &after) {
            tracing::trace!("{} -> {:?}", action.tag(), outcome);
        }
        if before.settings.poll_interval_ms != after.settings.poll_interval_ms {
            self.sync_poller();
        }
    }

    fn sync_poller(&mut self) {
        if !self.polling {
            return;
        }
        let interval = self.store.state().settings.poll_interval();
        if self.poller.as_ref().map(ServicePoller::interval) != Some(interval) {
            let sink = self.scheduler.sink();
            self.poller = Some(ServicePoller::spawn(sink, interval));
        }
    }

    fn stop(&mut self) {
        self.poller = None;
        let running = self.scheduler.running_jobs();
        if !running.is_empty() {
            tracing::info!("Aborting {} running job(s)", running.len());
        }
        self.scheduler.shutdown();
        if let Some(path) = self.store.session_file().map(ToOwned::to_owned) {
            if let Err(e) = self.store.save_to_file(&path) {
                tracing::error!("Could not save session on shutdown: {}", e);
            }
        }
        tracing::info!("Runtime stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::models::{ServiceInfo, ServiceStatus};
    use crate::scheduler::fakes::{FakeAi, FakeContainers, Fakes};
    use crate::store::persistence;

    fn add_project() -> Action {
        Action::AddProject {
            id: "p".to_string(),
            name: "demo".to_string(),
            path: "/p".to_string(),
            main_branch: "main".to_string(),
        }
    }

    fn quiet(fakes: &Fakes) -> (Dispatcher, JoinHandle<()>) {
        Runtime::new(Store::default(), fakes.collaborators())
            .without_polling()
            .spawn()
    }

    async fn wait_for(
        subscription: &mut Subscription,
        done: impl Fn(&AppState) -> bool,
    ) -> Arc<AppState> {
        tokio::time::timeout(Duration::from_secs(3), async {
            loop {
                let snapshot = subscription
                    .receiver
                    .recv()
                    .await
                    .expect("runtime stopped");
                if done(&snapshot) {
                    return snapshot;
                }
            }
        })
        .await
        .expect("state never settled")
    }

    #[tokio::test]
    async fn dispatch_commits_before_replying() {
        let fakes = Fakes::default();
        let (dispatcher, _handle) = quiet(&fakes);

        dispatcher.dispatch(add_project()).await.unwrap();
        let state = dispatcher.state().await.unwrap();
        assert_eq!(state["projects"][0]["id"], json!("p"));
        assert_eq!(state["projects"][0]["worktrees"][0]["id"], json!("p-main"));
    }

    #[tokio::test]
    async fn wire_actions_are_validated() {
        let fakes = Fakes::default();
        let (dispatcher, _handle) = quiet(&fakes);

        let err = dispatcher
            .dispatch_json(json!({"type": "Explode", "payload": {}}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownAction(_)));

        dispatcher
            .dispatch_json(json!({"type": "AddProject", "payload": {"id": "p", "name": "p", "path": "/p"}}))
            .await
            .unwrap();
        assert_eq!(dispatcher.snapshot().await.unwrap().projects.len(), 1);
    }

    #[tokio::test]
    async fn proposal_round_trip_through_jobs() {
        let fakes = Fakes {
            ai: Arc::new(FakeAi {
                chunks: vec!["Split the cache ".to_string(), "by tenant.".to_string()],
                ..FakeAi::default()
            }),
            ..Fakes::default()
        };
        let (dispatcher, _handle) = quiet(&fakes);
        let mut subscription = dispatcher.subscribe().await.unwrap();

        dispatcher.dispatch(add_project()).await.unwrap();
        dispatcher
            .dispatch(Action::CreateChange {
                worktree: None,
                id: "c1".to_string(),
                name: "Tenant cache".to_string(),
                intent: "Stop tenants evicting each other".to_string(),
                timestamp: chrono::Utc::now(),
            })
            .await
            .unwrap();
        dispatcher
            .dispatch(Action::GenerateProposal {
                worktree: None,
                change_id: "c1".to_string(),
                timestamp: chrono::Utc::now(),
            })
            .await
            .unwrap();

        let settled = wait_for(&mut subscription, |s| {
            s.resolve_worktree(None)
                .and_then(|w| w.changes.get("c1"))
                .is_some_and(|c| c.proposal.is_some())
        })
        .await;
        let change = settled
            .resolve_worktree(None)
            .and_then(|w| w.changes.get("c1"))
            .unwrap();
        assert_eq!(change.proposal.as_deref(), Some("Split the cache by tenant."));
        assert!(!change.is_generating());
    }

    #[tokio::test]
    async fn poller_refreshes_services() {
        let fakes = Fakes {
            containers: Arc::new(FakeContainers::default()),
            ..Fakes::default()
        };
        fakes.containers.services.lock().unwrap().push(ServiceInfo {
            id: "redis".to_string(),
            name: "redis".to_string(),
            image: "redis:7".to_string(),
            status: ServiceStatus::Running,
            port: Some(6379),
            service_type: "cache".to_string(),
            group: None,
            managed: false,
            pending_operation: None,
            logs: None,
        });
        let (dispatcher, _handle) = Runtime::new(Store::default(), fakes.collaborators()).spawn();
        let mut subscription = dispatcher.subscribe().await.unwrap();

        let settled = wait_for(&mut subscription, |s| s.docker.service("redis").is_some()).await;
        assert_eq!(settled.docker.services.len(), 1);
    }

    #[tokio::test]
    async fn shutdown_saves_and_closes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        let mut state = AppState::default();
        state.settings.auto_save = false;
        let store = Store::new(state).with_session_file(&path);
        let fakes = Fakes::default();
        let (dispatcher, handle) = Runtime::new(store, fakes.collaborators())
            .without_polling()
            .spawn();

        dispatcher.dispatch(add_project()).await.unwrap();
        assert!(!path.exists());

        dispatcher.shutdown().await.unwrap();
        handle.await.unwrap();
        let saved = persistence::load(&path).unwrap();
        assert_eq!(saved.projects.len(), 1);

        let err = dispatcher.dispatch(Action::ClearError).await.unwrap_err();
        assert!(matches!(err, StoreError::Closed));
    }

    #[tokio::test]
    async fn dropping_every_dispatcher_stops_the_runtime() {
        let fakes = Fakes::default();
        let (dispatcher, handle) = quiet(&fakes);
        drop(dispatcher);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("runtime kept running")
            .unwrap();
    }
}
