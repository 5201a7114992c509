//! Structural invariants that must hold after every transition.
//!
//! [`check`] reports violations without touching the state; [`repair`]
//! corrects each one in place and reports what it changed.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::{
    AppState, ChangesState, ChatState, DockersState, ExplorerState, McpState, ProjectState,
    ReviewState, TasksState, TerminalState,
};
use crate::workflow::{ChangeStatus, ConstitutionStatus};

/// What the store does when a transition breaks an invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvariantPolicy {
    Panic,
    Repair,
}

impl Default for InvariantPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            InvariantPolicy::Panic
        } else {
            InvariantPolicy::Repair
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub location: String,
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

struct Audit {
    found: Vec<Violation>,
}

impl Audit {
    fn report(&mut self, location: &str, message: impl Into<String>) {
        self.found.push(Violation {
            location: location.to_string(),
            message: message.into(),
        });
    }

    /// Drops later items whose key was already seen.
    fn dedupe<T>(
        &mut self,
        location: &str,
        what: &str,
        items: &mut Vec<T>,
        key: impl Fn(&T) -> String,
    ) {
        let mut seen = BTreeSet::new();
        let mut dupes = Vec::new();
        items.retain(|item| {
            let k = key(item);
            if seen.insert(k.clone()) {
                true
            } else {
                dupes.push(k);
                false
            }
        });
        for k in dupes {
            self.report(location, format!("duplicate {what} {k}"));
        }
    }

    /// Clears a by-id pointer that no longer resolves.
    fn dangling(
        &mut self,
        location: &str,
        what: &str,
        pointer: &mut Option<String>,
        exists: impl Fn(&str) -> bool,
    ) {
        if let Some(id) = pointer.as_deref() {
            if !exists(id) {
                self.report(location, format!("{what} {id} does not exist"));
                *pointer = None;
            }
        }
    }

    fn index(&mut self, location: &str, what: &str, index: &mut usize, len: usize) {
        let valid = if len == 0 { *index == 0 } else { *index < len };
        if !valid {
            self.report(location, format!("{what} {index} out of range for {len}"));
            *index = len.saturating_sub(1).min(*index);
        }
    }
}

/// Reports every violation in `state`.
pub fn check(state: &AppState) -> Vec<Violation> {
    let mut copy = state.clone();
    repair(&mut copy)
}

/// Corrects every violation in `state` and returns what was wrong.
pub fn repair(state: &mut AppState) -> Vec<Violation> {
    let mut audit = Audit { found: Vec::new() };
    audit_app(&mut audit, state);
    audit.found
}

fn audit_app(audit: &mut Audit, state: &mut AppState) {
    audit.dedupe("projects", "project id", &mut state.projects, |p| p.id.clone());
    audit.dedupe("projects", "project path", &mut state.projects, |p| p.path.clone());
    audit.index(
        "app",
        "active_project_index",
        &mut state.active_project_index,
        state.projects.len(),
    );

    let mut worktree_ids = BTreeSet::new();
    for project in &mut state.projects {
        audit_project(audit, project, &mut worktree_ids);
    }

    audit.dedupe("notifications", "notification id", &mut state.notifications, |n| {
        n.id.clone()
    });
    let max = state.settings.max_notifications;
    if state.notifications.len() > max {
        audit.report(
            "notifications",
            format!("{} notifications exceed the limit of {max}", state.notifications.len()),
        );
        let excess = state.notifications.len() - max;
        state.notifications.drain(..excess);
    }

    let AppState {
        projects,
        review,
        docker,
        settings,
        ..
    } = state;
    audit_review(audit, review);
    audit_docker(audit, docker);
    let question_count = settings.question_count();
    for project in projects.iter_mut() {
        for worktree in &mut project.worktrees {
            let location = format!("worktree {}", worktree.id);
            audit_tasks(audit, &location, &mut worktree.tasks, question_count);
            audit_changes(audit, &location, &mut worktree.changes, review);
            audit_explorer(audit, &location, &mut worktree.explorer);
            audit_terminal(audit, &location, &mut worktree.terminal);
            audit_chat(audit, &location, &mut worktree.chat);
            audit_mcp(audit, &location, &mut worktree.mcp);
        }
    }
}

fn audit_project(audit: &mut Audit, project: &mut ProjectState, seen: &mut BTreeSet<String>) {
    let location = format!("project {}", project.id);
    let before = project.worktrees.len();
    project.worktrees.retain(|w| seen.insert(w.id.clone()));
    if project.worktrees.len() != before {
        audit.report(&location, "duplicate worktree ids");
    }
    audit.index(
        &location,
        "active_worktree_index",
        &mut project.active_worktree_index,
        project.worktrees.len(),
    );
    let mut main_seen = false;
    for worktree in &mut project.worktrees {
        if worktree.is_main {
            if main_seen {
                audit.report(&location, format!("{} is a second main worktree", worktree.id));
                worktree.is_main = false;
            }
            main_seen = true;
        }
    }
}

fn audit_tasks(audit: &mut Audit, location: &str, tasks: &mut TasksState, question_count: usize) {
    audit.dedupe(location, "command", &mut tasks.commands, |c| c.name.clone());
    let known: BTreeSet<String> = tasks.commands.iter().map(|c| c.name.clone()).collect();
    let stale: Vec<String> = tasks
        .task_statuses
        .keys()
        .filter(|name| !known.contains(*name))
        .cloned()
        .collect();
    for name in stale {
        audit.report(location, format!("status recorded for unknown command {name}"));
        tasks.task_statuses.remove(&name);
    }
    audit.dangling(location, "active command", &mut tasks.active_command, |n| {
        known.contains(n)
    });

    let Some(workflow) = tasks.constitution_workflow.as_mut() else {
        return;
    };
    if workflow.current_question > question_count {
        audit.report(
            location,
            format!(
                "constitution question {} past the last of {question_count}",
                workflow.current_question
            ),
        );
        workflow.current_question = question_count;
    }
    if workflow.status == ConstitutionStatus::Complete && workflow.output.trim().is_empty() {
        audit.report(location, "constitution complete with empty output");
        workflow.status = ConstitutionStatus::Error;
        workflow.error = Some("Constitution output was empty".to_string());
    }
    if workflow.status == ConstitutionStatus::Error && workflow.error.is_none() {
        audit.report(location, "constitution failed without an error message");
        workflow.error = Some("Constitution generation failed".to_string());
    }
}

fn audit_changes(
    audit: &mut Audit,
    location: &str,
    changes: &mut ChangesState,
    review: &ReviewState,
) {
    audit.dedupe(location, "change", &mut changes.changes, |c| c.id.clone());
    let ids: BTreeSet<String> = changes.changes.iter().map(|c| c.id.clone()).collect();
    audit.dangling(location, "active change", &mut changes.active_change_id, |id| {
        ids.contains(id)
    });

    for change in &mut changes.changes {
        let location = format!("{location} change {}", change.id);
        if change.plan.is_some() && change.proposal.is_none() {
            audit.report(&location, "plan without a proposal");
            change.plan = None;
        }
        if change.status.requires_plan() && change.plan.is_none() {
            audit.report(&location, format!("{} without a plan", change.status));
            change.status = ChangeStatus::Failed;
            change.generation = None;
            change.error = Some("Change lost its plan".to_string());
        }
        if change.generation.is_some() && change.status.is_terminal() {
            audit.report(&location, format!("generation running while {}", change.status));
            change.generation = None;
        }
        for pointer in change.review_ids_mut() {
            audit.dangling(&location, "review session", pointer, |id| review.contains(id));
        }
    }
}

fn audit_review(audit: &mut Audit, review: &mut ReviewState) {
    audit.dedupe("review", "session", &mut review.sessions, |s| s.id.clone());
    let ids: BTreeSet<String> = review.sessions.iter().map(|s| s.id.clone()).collect();
    audit.dangling("review", "active session", &mut review.active_session_id, |id| {
        ids.contains(id)
    });
    for session in &mut review.sessions {
        if session.iteration == 0 {
            audit.report("review", format!("session {} has iteration 0", session.id));
            session.iteration = 1;
        }
    }
}

fn audit_docker(audit: &mut Audit, docker: &mut DockersState) {
    for (key, service) in docker.services.iter_mut() {
        if &service.id != key {
            audit.report("docker", format!("service {} filed under {key}", service.id));
            service.id = key.clone();
        }
    }
    let stale: Vec<String> = docker
        .port_overrides
        .keys()
        .filter(|id| !docker.services.contains_key(*id))
        .cloned()
        .collect();
    for id in stale {
        audit.report("docker", format!("port override for unknown service {id}"));
        docker.port_overrides.remove(&id);
    }
    if let Some(conflict) = &docker.pending_conflict {
        if !docker.services.contains_key(&conflict.service_id) {
            audit.report(
                "docker",
                format!("port conflict for unknown service {}", conflict.service_id),
            );
            docker.pending_conflict = None;
        }
    }
}

fn audit_explorer(audit: &mut Audit, location: &str, explorer: &mut ExplorerState) {
    let missing: Vec<String> = explorer
        .expanded_paths
        .iter()
        .filter(|p| !explorer.loading_paths.contains(*p) && !explorer.directory_cache.contains(p))
        .cloned()
        .collect();
    for path in missing {
        audit.report(location, format!("{path} is expanded but neither cached nor loading"));
        explorer.loading_paths.insert(path);
    }
}

fn audit_terminal(audit: &mut Audit, location: &str, terminal: &mut TerminalState) {
    audit.dedupe(location, "terminal", &mut terminal.sessions, |s| s.id.clone());
    let ids: BTreeSet<String> = terminal.sessions.iter().map(|s| s.id.clone()).collect();
    audit.dangling(location, "active terminal", &mut terminal.active_session_id, |id| {
        ids.contains(id)
    });
}

fn audit_chat(audit: &mut Audit, location: &str, chat: &mut ChatState) {
    if chat.streaming.is_some() != chat.pending_message_id.is_some() {
        audit.report(location, "chat stream and pending message disagree");
        chat.streaming = None;
        chat.pending_message_id = None;
    }
}

fn audit_mcp(audit: &mut Audit, location: &str, mcp: &mut McpState) {
    audit.dedupe(location, "MCP server", &mut mcp.servers, |s| s.name.clone());
}
