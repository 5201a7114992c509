//! Turns committed actions into background work.
//!
//! Only a fixed set of actions start jobs, and at most one job runs per
//! [`JobKey`]. Jobs never touch state; they send follow-up actions through
//! the sink handed to [`Scheduler::new`], which the runtime dispatches like
//! any other action.

#[cfg(test)]
pub(crate) mod fakes;
mod jobs;
pub mod poller;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::action::Action;
use crate::collaborators::{
    AiClient, ClaudeCli, CommandRunner, ProcessPty, PromptRenderer, PtyInput,
    PtySpawner, ShellRunner,
};
use crate::explorer::{DirectoryLister, FsLister};
use crate::models::{AppState, ProjectState, ServiceOperation, TaskStatus, WorktreeState};
use crate::services::{effective_port, ContainerManager, DockerCli};
use crate::utils::normalize_path;
use crate::workflow::{ConstitutionStatus, GenerationKind};

use jobs::{
    ChatJob, CommandJob, ConstitutionJob, GenerationJob, ServiceJob, Sink, TerminalJob,
};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobKey {
    ServiceRefresh,
    Service(String),
    ServiceLogs(String),
    Command(String),
    Change(String, String),
    ConstitutionCheck(String),
    Constitution(String),
    Chat(String),
    Directory(String, String),
    Terminal(String, String),
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKey::ServiceRefresh => write!(f, "service-refresh"),
            JobKey::Service(id) => write!(f, "service:{id}"),
            JobKey::ServiceLogs(id) => write!(f, "service-logs:{id}"),
            JobKey::Command(wt) => write!(f, "command:{wt}"),
            JobKey::Change(wt, id) => write!(f, "change:{wt}:{id}"),
            JobKey::ConstitutionCheck(wt) => write!(f, "constitution-check:{wt}"),
            JobKey::Constitution(wt) => write!(f, "constitution:{wt}"),
            JobKey::Chat(wt) => write!(f, "chat:{wt}"),
            JobKey::Directory(wt, path) => write!(f, "directory:{wt}:{path}"),
            JobKey::Terminal(wt, id) => write!(f, "terminal:{wt}:{id}"),
        }
    }
}

impl JobKey {
    /// Keys whose duplicate requests share the running job.
    fn joins(&self) -> bool {
        matches!(self, JobKey::ServiceRefresh | JobKey::Directory(..))
    }

    /// True when whatever the job works for has left the state.
    fn is_orphaned(&self, state: &AppState) -> bool {
        match self {
            JobKey::ServiceRefresh | JobKey::Service(_) | JobKey::ServiceLogs(_) => false,
            JobKey::Command(wt)
            | JobKey::ConstitutionCheck(wt)
            | JobKey::Constitution(wt)
            | JobKey::Chat(wt)
            | JobKey::Directory(wt, _) => state.locate_worktree(wt).is_none(),
            JobKey::Change(wt, id) => state
                .resolve_worktree(Some(wt))
                .map_or(true, |w| w.changes.get(id).is_none()),
            JobKey::Terminal(wt, id) => state
                .resolve_worktree(Some(wt))
                .map_or(true, |w| w.terminal.get(id).is_none()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerOutcome {
    Launched(JobKey),
    /// An identical job was already running; its result serves both.
    Joined(JobKey),
    /// A different request holds the key; this one was dropped.
    Busy(JobKey),
    Cancelled(JobKey),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Action channel closed")]
    Closed,
}

/// The outside world, as seen by jobs.
#[derive(Clone)]
pub struct Collaborators {
    pub lister: Arc<dyn DirectoryLister>,
    pub containers: Arc<dyn ContainerManager>,
    pub ai: Arc<dyn AiClient>,
    pub runner: Arc<dyn CommandRunner>,
    pub pty: Arc<dyn PtySpawner>,
    pub prompts: Arc<PromptRenderer>,
}

impl Collaborators {
    /// Process-backed implementations.
    pub fn system(docker_bin: &str, ai_command: &str, ai_args: &[String], shell: &str) -> Self {
        Self {
            lister: Arc::new(FsLister::default()),
            containers: Arc::new(DockerCli::new(docker_bin)),
            ai: Arc::new(ClaudeCli::new(ai_command).with_args(ai_args.to_vec())),
            runner: Arc::new(ShellRunner::default()),
            pty: Arc::new(ProcessPty::new(shell)),
            prompts: Arc::new(PromptRenderer::new()),
        }
    }
}

/// Worktree plus the project that owns it.
fn locate<'a>(
    state: &'a AppState,
    target: Option<&str>,
) -> Option<(&'a ProjectState, &'a WorktreeState)> {
    let (pi, wi) = match target {
        Some(id) => state.locate_worktree(id)?,
        None => {
            let project = state.active_project()?;
            (state.active_project_index, project.active_worktree_index)
        }
    };
    let project = state.projects.get(pi)?;
    Some((project, project.worktrees.get(wi)?))
}

pub struct Scheduler {
    collaborators: Collaborators,
    sink: Sink,
    jobs: BTreeMap<JobKey, JoinHandle<()>>,
    /// Input channels of running terminals, keyed by (worktree, session).
    terminal_inputs: BTreeMap<(String, String), mpsc::UnboundedSender<PtyInput>>,
}

impl Scheduler {
    pub fn new(collaborators: Collaborators, sink: mpsc::UnboundedSender<Action>) -> Self {
        Self {
            collaborators,
            sink,
            jobs: BTreeMap::new(),
            terminal_inputs: BTreeMap::new(),
        }
    }

    /// Channel follow-up actions are sent on.
    pub fn sink(&self) -> mpsc::UnboundedSender<Action> {
        self.sink.clone()
    }

    pub fn is_running(&self, key: &JobKey) -> bool {
        self.jobs.get(key).is_some_and(|h| !h.is_finished())
    }

    pub fn running_jobs(&self) -> Vec<JobKey> {
        self.jobs
            .iter()
            .filter(|(_, h)| !h.is_finished())
            .map(|(k, _)| k.clone())
            .collect()
    }

    fn send(&self, action: Action) {
        if self.sink.send(action).is_err() {
            tracing::debug!("Follow-up dropped: action channel closed");
        }
    }

    fn launch<F>(&mut self, key: JobKey, job: F) -> SchedulerOutcome
    where
        F: Future<Output = Result<(), SchedulerError>> + Send + 'static,
    {
        if self.is_running(&key) {
            if key.joins() {
                tracing::debug!("Joined running job {}", key);
                return SchedulerOutcome::Joined(key);
            }
            tracing::warn!("Job {} is busy, request dropped", key);
            return SchedulerOutcome::Busy(key);
        }
        let label = key.to_string();
        let handle = tokio::spawn(async move {
            if let Err(e) = job.await {
                tracing::debug!("Job {} stopped early: {}", label, e);
            }
        });
        tracing::debug!("Launched job {}", key);
        self.jobs.insert(key.clone(), handle);
        SchedulerOutcome::Launched(key)
    }

    fn cancel(&mut self, key: JobKey) -> Option<SchedulerOutcome> {
        let handle = self.jobs.remove(&key)?;
        let running = !handle.is_finished();
        handle.abort();
        if let JobKey::Terminal(wt, id) = &key {
            self.terminal_inputs.remove(&(wt.clone(), id.clone()));
        }
        running.then(|| {
            tracing::info!("Cancelled job {}", key);
            SchedulerOutcome::Cancelled(key)
        })
    }

    /// Drops finished jobs and aborts those whose target left the state.
    fn prune(&mut self, state: &AppState) {
        let mut orphaned = Vec::new();
        self.jobs.retain(|key, handle| {
            if handle.is_finished() {
                return false;
            }
            if key.is_orphaned(state) {
                handle.abort();
                orphaned.push(key.to_string());
                return false;
            }
            true
        });
        for key in orphaned {
            tracing::info!("Aborted orphaned job {}", key);
        }
        let live: BTreeSet<(&str, &str)> = state
            .worktrees()
            .flat_map(|w| {
                w.terminal
                    .sessions
                    .iter()
                    .filter(|s| s.status.is_live())
                    .map(move |s| (w.id.as_str(), s.id.as_str()))
            })
            .collect();
        self.terminal_inputs.retain(|(wt, id), tx| {
            !tx.is_closed() && live.contains(&(wt.as_str(), id.as_str()))
        });
    }

    /// Looks at one committed action and starts, joins or cancels jobs.
    /// `before` and `after` are the snapshots around the transition; a
    /// request the reducer refused starts nothing.
    pub fn examine(
        &mut self,
        action: &Action,
        before: &AppState,
        after: &AppState,
    ) -> Vec<SchedulerOutcome> {
        self.prune(after);
        let target = action.worktree();
        let mut outcomes = Vec::new();

        match action {
            Action::RefreshServices => outcomes.push(self.refresh_services()),

            Action::StartService { service_id }
            | Action::StopService { service_id }
            | Action::RestartService { service_id }
            | Action::ResolvePortConflict { service_id, .. } => {
                if let Some(outcome) = self.service_operation(action, service_id, before, after) {
                    outcomes.push(outcome);
                }
            }

            Action::FetchServiceLogs { service_id } => {
                let loading = after
                    .docker
                    .service(service_id)
                    .and_then(|s| s.logs.as_ref())
                    .is_some_and(|l| l.loading);
                if loading {
                    let job = jobs::fetch_logs(
                        Arc::clone(&self.collaborators.containers),
                        service_id.clone(),
                        self.sink.clone(),
                    );
                    outcomes.push(self.launch(JobKey::ServiceLogs(service_id.clone()), job));
                }
            }
            Action::CancelServiceLogs { service_id } => {
                outcomes.extend(self.cancel(JobKey::ServiceLogs(service_id.clone())));
            }

            Action::RunCommand { name, .. } => {
                if let Some(outcome) = self.run_command(target, name, before, after) {
                    outcomes.push(outcome);
                }
            }
            Action::StopCommand { .. } => {
                if let Some((_, wt)) = locate(after, target) {
                    let stopped = locate(before, target)
                        .and_then(|(_, w)| w.tasks.running_command().map(str::to_string));
                    if let Some(outcome) = self.cancel(JobKey::Command(wt.id.clone())) {
                        outcomes.push(outcome);
                        if let Some(name) = stopped {
                            self.send(Action::CommandFinished {
                                worktree: Some(wt.id.clone()),
                                name,
                                exit_code: None,
                                error: None,
                            });
                        }
                    }
                }
            }

            Action::GenerateProposal { change_id, .. }
            | Action::GeneratePlan { change_id, .. }
            | Action::StartImplementation { change_id, .. } => {
                if let Some(outcome) = self.generate_change(target, change_id, before, after) {
                    outcomes.push(outcome);
                }
            }
            Action::CancelChange { change_id, .. } | Action::FailChange { change_id, .. } => {
                if let Some((_, wt)) = locate(after, target) {
                    outcomes.extend(self.cancel(JobKey::Change(wt.id.clone(), change_id.clone())));
                }
            }

            Action::GenerateConstitution { .. } => {
                if let Some(outcome) = self.generate_constitution(target, before, after) {
                    outcomes.push(outcome);
                }
            }
            Action::ResetConstitutionWorkflow { .. } => {
                if let Some((_, wt)) = locate(after, target) {
                    outcomes.extend(self.cancel(JobKey::Constitution(wt.id.clone())));
                }
            }

            Action::SendChatMessage { id, content, .. } => {
                if let Some(outcome) = self.chat_reply(target, id, content, after) {
                    outcomes.push(outcome);
                }
            }
            Action::ClearChat { .. } => {
                if let Some((_, wt)) = locate(after, target) {
                    outcomes.extend(self.cancel(JobKey::Chat(wt.id.clone())));
                }
            }

            Action::ExpandDirectory { .. } | Action::InvalidateDirectoryCache { .. } => {
                if let Some((_, wt)) = locate(after, target) {
                    let id = wt.id.clone();
                    outcomes.extend(self.sync_loading(after, |w| w.id == id));
                }
            }

            Action::AddProject { .. } | Action::AddWorktree { .. } => {
                let known: BTreeSet<&str> = before.worktrees().map(|w| w.id.as_str()).collect();
                let added: BTreeSet<String> = after
                    .worktrees()
                    .filter(|w| !known.contains(w.id.as_str()))
                    .map(|w| w.id.clone())
                    .collect();
                for wt in after.worktrees().filter(|w| added.contains(&w.id)) {
                    let job = jobs::check_constitution(
                        wt.id.clone(),
                        wt.path.clone(),
                        self.sink.clone(),
                    );
                    outcomes.push(self.launch(JobKey::ConstitutionCheck(wt.id.clone()), job));
                }
                outcomes.extend(self.sync_loading(after, |w| added.contains(&w.id)));
            }

            Action::SpawnTerminal { session_id, .. } => {
                if let Some(outcome) = self.spawn_terminal(target, session_id, before, after) {
                    outcomes.push(outcome);
                }
            }
            Action::WriteTerminalInput {
                session_id, data, ..
            } => self.terminal_input(after, target, session_id, PtyInput::Data(data.clone())),
            Action::ResizeTerminal {
                session_id,
                cols,
                rows,
                ..
            } => self.terminal_input(
                after,
                target,
                session_id,
                PtyInput::Resize {
                    cols: *cols,
                    rows: *rows,
                },
            ),
            Action::KillTerminal { session_id, .. } => {
                if let Some((_, wt)) = locate(after, target) {
                    let key = JobKey::Terminal(wt.id.clone(), session_id.clone());
                    if let Some(outcome) = self.cancel(key) {
                        outcomes.push(outcome);
                        self.send(Action::TerminalExited {
                            worktree: Some(wt.id.clone()),
                            session_id: session_id.clone(),
                            code: None,
                        });
                    }
                }
            }

            _ => {}
        }
        outcomes
    }

    fn refresh_services(&mut self) -> SchedulerOutcome {
        let job = jobs::refresh_services(
            Arc::clone(&self.collaborators.containers),
            self.sink.clone(),
        );
        self.launch(JobKey::ServiceRefresh, job)
    }

    /// Starts the container work a start/stop/restart or a conflict
    /// resolution left pending.
    fn service_operation(
        &mut self,
        action: &Action,
        service_id: &str,
        before: &AppState,
        after: &AppState,
    ) -> Option<SchedulerOutcome> {
        let was_pending = before
            .docker
            .service(service_id)
            .and_then(|s| s.pending_operation)
            .is_some();
        let operation = after.docker.service(service_id)?.pending_operation?;
        if was_pending {
            return None;
        }
        let stop_first = match action {
            Action::ResolvePortConflict { resolution, .. } if resolution.stops_conflicting() => {
                before
                    .docker
                    .pending_conflict
                    .as_ref()
                    .map(|c| c.conflicting_container.id.clone())
            }
            _ => None,
        };
        let port = match operation {
            ServiceOperation::Start => effective_port(&after.docker, service_id),
            _ => None,
        };
        let job = jobs::service_operation(
            Arc::clone(&self.collaborators.containers),
            ServiceJob {
                service_id: service_id.to_string(),
                operation,
                port,
                stop_first,
            },
            self.sink.clone(),
        );
        Some(self.launch(JobKey::Service(service_id.to_string()), job))
    }

    fn run_command(
        &mut self,
        target: Option<&str>,
        name: &str,
        before: &AppState,
        after: &AppState,
    ) -> Option<SchedulerOutcome> {
        let (project, wt) = locate(after, target)?;
        let was_running = locate(before, target)
            .is_some_and(|(_, w)| w.tasks.status_of(name) == TaskStatus::Running);
        if was_running || wt.tasks.status_of(name) != TaskStatus::Running {
            return None;
        }
        let command = wt.tasks.command(name)?;
        let env_file = project
            .env_config
            .env_file
            .as_deref()
            .map(|f| Path::new(&project.path).join(f));
        let job = jobs::run_command(
            Arc::clone(&self.collaborators.runner),
            CommandJob {
                worktree: wt.id.clone(),
                name: name.to_string(),
                command: command.command.clone(),
                cwd: wt.path.clone(),
                env: project.env_config.variables.clone(),
                env_file,
            },
            self.sink.clone(),
        );
        Some(self.launch(JobKey::Command(wt.id.clone()), job))
    }

    fn generate_change(
        &mut self,
        target: Option<&str>,
        change_id: &str,
        before: &AppState,
        after: &AppState,
    ) -> Option<SchedulerOutcome> {
        let (_, wt) = locate(after, target)?;
        let change = wt.changes.get(change_id)?;
        let kind = change.generation?;
        let previous = locate(before, target)
            .and_then(|(_, w)| w.changes.get(change_id))
            .and_then(|c| c.generation);
        if previous.is_some() {
            return None;
        }

        let prompts = &self.collaborators.prompts;
        let prompt = match kind {
            GenerationKind::Proposal => prompts.proposal(&wt.path, change),
            GenerationKind::Plan => prompts.plan(&wt.path, change),
            GenerationKind::Implementation => prompts.implementation(&wt.path, change),
        };
        let prompt = match prompt {
            Ok(prompt) => prompt,
            Err(e) => {
                self.send(Action::ChangeGenerationFailed {
                    worktree: Some(wt.id.clone()),
                    change_id: change_id.to_string(),
                    error: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                return None;
            }
        };
        let job = jobs::generate_change(
            Arc::clone(&self.collaborators.ai),
            GenerationJob {
                worktree: wt.id.clone(),
                cwd: wt.path.clone(),
                change_id: change_id.to_string(),
                kind,
                prompt,
            },
            self.sink.clone(),
        );
        Some(self.launch(JobKey::Change(wt.id.clone(), change_id.to_string()), job))
    }

    fn generate_constitution(
        &mut self,
        target: Option<&str>,
        before: &AppState,
        after: &AppState,
    ) -> Option<SchedulerOutcome> {
        let is_generating = |state: &AppState| {
            locate(state, target)
                .and_then(|(_, w)| w.tasks.constitution_workflow.as_ref())
                .is_some_and(|wf| wf.status == ConstitutionStatus::Generating)
        };
        if is_generating(before) || !is_generating(after) {
            return None;
        }
        let (_, wt) = locate(after, target)?;
        let workflow = wt.tasks.constitution_workflow.as_ref()?;
        let answers = workflow.answered_questions(&after.settings.constitution_questions);
        let prompt = match self.collaborators.prompts.constitution(
            &wt.path,
            &answers,
            workflow.use_claude_md_reference,
        ) {
            Ok(prompt) => prompt,
            Err(e) => {
                self.send(Action::ConstitutionFailed {
                    worktree: Some(wt.id.clone()),
                    error: e.to_string(),
                });
                return None;
            }
        };
        let job = jobs::generate_constitution(
            Arc::clone(&self.collaborators.ai),
            ConstitutionJob {
                worktree: wt.id.clone(),
                cwd: wt.path.clone(),
                prompt,
            },
            self.sink.clone(),
        );
        Some(self.launch(JobKey::Constitution(wt.id.clone()), job))
    }

    fn chat_reply(
        &mut self,
        target: Option<&str>,
        message_id: &str,
        content: &str,
        after: &AppState,
    ) -> Option<SchedulerOutcome> {
        let (_, wt) = locate(after, target)?;
        if wt.chat.pending_message_id.as_deref() != Some(message_id) {
            return None;
        }
        let history = wt
            .chat
            .messages
            .split_last()
            .map(|(_, earlier)| earlier)
            .unwrap_or_default();
        let prompt = match self.collaborators.prompts.chat(history, content) {
            Ok(prompt) => prompt,
            Err(e) => {
                self.send(Action::ChatFailed {
                    worktree: Some(wt.id.clone()),
                    error: e.to_string(),
                });
                return None;
            }
        };
        let job = jobs::chat_reply(
            Arc::clone(&self.collaborators.ai),
            ChatJob {
                worktree: wt.id.clone(),
                cwd: wt.path.clone(),
                prompt,
            },
            self.sink.clone(),
        );
        Some(self.launch(JobKey::Chat(wt.id.clone()), job))
    }

    /// Lists every loading path of the selected worktrees that has no job yet.
    fn sync_loading(
        &mut self,
        state: &AppState,
        include: impl Fn(&WorktreeState) -> bool,
    ) -> Vec<SchedulerOutcome> {
        let pending: Vec<(String, String)> = state
            .worktrees()
            .filter(|w| include(w))
            .flat_map(|w| {
                w.explorer
                    .loading_paths
                    .iter()
                    .map(move |p| (w.id.clone(), normalize_path(p)))
            })
            .collect();
        pending
            .into_iter()
            .map(|(worktree, path)| {
                let key = JobKey::Directory(worktree.clone(), path.clone());
                let job = jobs::list_directory(
                    Arc::clone(&self.collaborators.lister),
                    worktree,
                    path,
                    self.sink.clone(),
                );
                self.launch(key, job)
            })
            .collect()
    }

    fn spawn_terminal(
        &mut self,
        target: Option<&str>,
        session_id: &str,
        before: &AppState,
        after: &AppState,
    ) -> Option<SchedulerOutcome> {
        let existed = locate(before, target).is_some_and(|(_, w)| w.terminal.get(session_id).is_some());
        let (_, wt) = locate(after, target)?;
        let session = wt.terminal.get(session_id)?;
        if existed {
            return None;
        }
        let key = JobKey::Terminal(wt.id.clone(), session_id.to_string());
        if self.is_running(&key) {
            tracing::warn!("Job {} is busy, request dropped", key);
            return Some(SchedulerOutcome::Busy(key));
        }
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        self.terminal_inputs
            .insert((wt.id.clone(), session_id.to_string()), input_tx);
        let job = jobs::run_terminal(
            Arc::clone(&self.collaborators.pty),
            TerminalJob {
                worktree: wt.id.clone(),
                session_id: session_id.to_string(),
                cols: session.cols,
                rows: session.rows,
                cwd: session.cwd.clone(),
            },
            input_rx,
            self.sink.clone(),
        );
        Some(self.launch(key, job))
    }

    fn terminal_input(
        &self,
        state: &AppState,
        target: Option<&str>,
        session_id: &str,
        input: PtyInput,
    ) {
        let tx = locate(state, target).and_then(|(_, wt)| {
            self.terminal_inputs
                .get(&(wt.id.clone(), session_id.to_string()))
        });
        match tx {
            Some(tx) if tx.send(input).is_ok() => {}
            _ => tracing::debug!("No running terminal {} for input", session_id),
        }
    }

    /// Settles work a restored snapshot claims is in flight and starts the
    /// listings and checks a fresh session needs.
    pub fn resume(&mut self, state: &AppState) -> Vec<SchedulerOutcome> {
        const INTERRUPTED: &str = "Interrupted by restart";
        let now = chrono::Utc::now();

        for service in state.docker.services.values() {
            if service.pending_operation.is_some() {
                self.send(Action::ServiceOperationFailed {
                    service_id: service.id.clone(),
                    error: INTERRUPTED.to_string(),
                });
            }
            if service.logs.as_ref().is_some_and(|l| l.loading) {
                self.send(Action::CancelServiceLogs {
                    service_id: service.id.clone(),
                });
            }
        }

        let mut outcomes = Vec::new();
        for wt in state.worktrees() {
            let worktree = Some(wt.id.clone());
            if let Some(name) = wt.tasks.running_command() {
                self.send(Action::CommandFinished {
                    worktree: worktree.clone(),
                    name: name.to_string(),
                    exit_code: None,
                    error: Some(INTERRUPTED.to_string()),
                });
            }
            if let Some(wf) = &wt.tasks.constitution_workflow {
                if wf.status == ConstitutionStatus::Generating {
                    self.send(Action::ConstitutionFailed {
                        worktree: worktree.clone(),
                        error: INTERRUPTED.to_string(),
                    });
                }
            }
            if wt.tasks.constitution_exists.is_none() {
                let job =
                    jobs::check_constitution(wt.id.clone(), wt.path.clone(), self.sink.clone());
                outcomes.push(self.launch(JobKey::ConstitutionCheck(wt.id.clone()), job));
            }
            for change in wt.changes.changes.iter().filter(|c| c.is_generating()) {
                self.send(Action::ChangeGenerationFailed {
                    worktree: worktree.clone(),
                    change_id: change.id.clone(),
                    error: INTERRUPTED.to_string(),
                    timestamp: now,
                });
            }
            if wt.chat.is_streaming() {
                self.send(Action::ChatFailed {
                    worktree: worktree.clone(),
                    error: INTERRUPTED.to_string(),
                });
            }
            for session in wt.terminal.sessions.iter().filter(|s| s.status.is_live()) {
                self.send(Action::TerminalExited {
                    worktree: worktree.clone(),
                    session_id: session.id.clone(),
                    code: None,
                });
            }
        }
        outcomes.extend(self.sync_loading(state, |_| true));
        outcomes
    }

    /// Aborts every job. Child processes die with their handles.
    pub fn shutdown(&mut self) {
        for (key, handle) in std::mem::take(&mut self.jobs) {
            if !handle.is_finished() {
                tracing::debug!("Aborting job {}", key);
            }
            handle.abort();
        }
        self.terminal_inputs.clear();
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
