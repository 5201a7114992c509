//! Pure state transitions.
//!
//! [`reduce`] is the only way an [`AppState`] changes. Each action touches the
//! slice it names; a refused action leaves that slice as it was and records
//! the reason in the slice's `error` field. Nothing here reads a clock,
//! touches the filesystem, or logs.

mod app;
mod changes;
mod chat;
mod constitution;
mod dockers;
mod explorer;
mod mcp;
mod notifications;
mod review;
mod tasks;
mod terminal;

#[cfg(test)]
pub(crate) mod strategies;

use crate::action::Action;
use crate::models::{
    AppState, ChangesState, ChatState, DockersState, ExplorerState, McpState, ReviewState,
    ServiceOperation, Settings, TasksState, TerminalState, WorktreeState,
};

/// Result of a slice transition; `Err` carries the message for the slice's
/// `error` field.
pub(crate) type Outcome = Result<(), String>;

/// A slice with its own error field.
trait Slice {
    fn error_slot(&mut self) -> &mut Option<String>;
}

macro_rules! impl_slice {
    ($($ty:ty),* $(,)?) => {
        $(impl Slice for $ty {
            fn error_slot(&mut self) -> &mut Option<String> {
                &mut self.error
            }
        })*
    };
}

impl_slice!(
    AppState,
    TasksState,
    ChangesState,
    ReviewState,
    DockersState,
    ExplorerState,
    TerminalState,
    ChatState,
    McpState,
);

/// Runs a slice transition and records a refusal in that slice.
fn guard<S: Slice>(slice: &mut S, f: impl FnOnce(&mut S) -> Outcome) {
    if let Err(message) = f(slice) {
        *slice.error_slot() = Some(message);
    }
}

/// Resolves the target worktree and hands it over together with the global
/// settings and review registry. An unresolvable target is an app error.
fn scoped(
    state: &mut AppState,
    target: &Option<String>,
    f: impl FnOnce(&mut WorktreeState, &Settings, &ReviewState),
) {
    let AppState {
        projects,
        active_project_index,
        settings,
        review,
        error,
        ..
    } = state;
    let worktree = match target.as_deref() {
        Some(id) => projects
            .iter_mut()
            .flat_map(|p| p.worktrees.iter_mut())
            .find(|w| w.id == id),
        None => projects.get_mut(*active_project_index).and_then(|p| {
            let index = p.active_worktree_index;
            p.worktrees.get_mut(index)
        }),
    };
    match worktree {
        Some(worktree) => f(worktree, settings, review),
        None => {
            *error = Some(match target {
                Some(id) => format!("Unknown worktree: {id}"),
                None => "No active worktree".to_string(),
            })
        }
    }
}

pub fn reduce(mut state: AppState, action: &Action) -> AppState {
    apply(&mut state, action);
    state
}

fn apply(state: &mut AppState, action: &Action) {
    match action {
        // Projects and app
        Action::AddProject {
            id,
            name,
            path,
            main_branch,
        } => guard(state, |s| app::add_project(s, id, name, path, main_branch)),
        Action::RemoveProject { id } => guard(state, |s| app::remove_project(s, id)),
        Action::SetActiveProject { id } => guard(state, |s| app::set_active_project(s, id)),
        Action::AddWorktree {
            project_id,
            id,
            path,
            branch,
        } => guard(state, |s| app::add_worktree(s, project_id, id, path, branch)),
        Action::RemoveWorktree { project_id, id } => {
            guard(state, |s| app::remove_worktree(s, project_id, id))
        }
        Action::SetActiveWorktree { project_id, id } => {
            guard(state, |s| app::set_active_worktree(s, project_id, id))
        }
        Action::SetActiveView { view } => state.active_view = *view,
        Action::SetEnvConfig {
            project_id,
            env_config,
        } => guard(state, |s| app::set_env_config(s, project_id, env_config)),
        Action::SetAgentRulesConfig {
            project_id,
            agent_rules_config,
        } => guard(state, |s| {
            app::set_agent_rules_config(s, project_id, agent_rules_config)
        }),
        Action::UpdateSettings { settings } => guard(state, |s| app::update_settings(s, settings)),
        Action::ClearError => state.error = None,

        // Notifications
        Action::AddNotification {
            id,
            level,
            message,
            timestamp,
        } => notifications::add(state, id, *level, message, *timestamp),
        Action::MarkNotificationRead { id } => notifications::mark_read(state, id),
        Action::DismissNotification { id } => notifications::dismiss(state, id),
        Action::ClearNotifications => notifications::clear(state),

        // Tasks
        Action::SetCommands { worktree, commands } => scoped(state, worktree, |wt, _, _| {
            tasks::set_commands(&mut wt.tasks, commands)
        }),
        Action::SetActiveCommand { worktree, name } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.tasks, |t| tasks::set_active_command(t, name.as_deref()))
        }),
        Action::SetTaskStatus {
            worktree,
            name,
            status,
        } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.tasks, |t| tasks::set_task_status(t, name, *status))
        }),
        Action::RunCommand { worktree, name } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.tasks, |t| tasks::run_command(t, name))
        }),
        Action::StopCommand { worktree } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.tasks, tasks::stop_command)
        }),
        Action::AppendTaskOutput { worktree, chunk } => {
            scoped(state, worktree, |wt, _, _| tasks::append_output(&mut wt.tasks, chunk))
        }
        Action::CommandFinished {
            worktree,
            name,
            exit_code,
            error,
        } => scoped(state, worktree, |wt, _, _| {
            tasks::command_finished(&mut wt.tasks, name, *exit_code, error.as_deref())
        }),
        Action::ClearTaskOutput { worktree } => {
            scoped(state, worktree, |wt, _, _| wt.tasks.output.clear())
        }
        Action::SetConstitutionExists { worktree, exists } => {
            scoped(state, worktree, |wt, _, _| {
                wt.tasks.constitution_exists = Some(*exists)
            })
        }
        Action::SetTasksError { worktree, error } => scoped(state, worktree, |wt, _, _| {
            wt.tasks.error = Some(error.clone())
        }),
        Action::ClearTasksError { worktree } => {
            scoped(state, worktree, |wt, _, _| wt.tasks.error = None)
        }

        // Constitution
        Action::StartConstitutionWorkflow {
            worktree,
            use_claude_md_reference,
        } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.tasks, |t| {
                constitution::start(t, *use_claude_md_reference)
            })
        }),
        Action::AnswerConstitutionQuestion { worktree, answer } => {
            scoped(state, worktree, |wt, settings, _| {
                guard(&mut wt.tasks, |t| {
                    constitution::answer(t, answer, settings.question_count())
                })
            })
        }
        Action::PreviousConstitutionQuestion { worktree } => {
            scoped(state, worktree, |wt, _, _| {
                guard(&mut wt.tasks, constitution::previous)
            })
        }
        Action::SetUseClaudeMdReference { worktree, enabled } => {
            scoped(state, worktree, |wt, _, _| {
                guard(&mut wt.tasks, |t| constitution::set_use_claude_md(t, *enabled))
            })
        }
        Action::GenerateConstitution { worktree } => {
            scoped(state, worktree, |wt, settings, _| {
                guard(&mut wt.tasks, |t| {
                    constitution::generate(t, settings.question_count())
                })
            })
        }
        Action::AppendConstitutionOutput { worktree, chunk } => {
            scoped(state, worktree, |wt, _, _| {
                constitution::append_output(&mut wt.tasks, chunk)
            })
        }
        Action::CompleteConstitution { worktree } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.tasks, constitution::complete)
        }),
        Action::ConstitutionFailed { worktree, error } => {
            scoped(state, worktree, |wt, _, _| {
                constitution::failed(&mut wt.tasks, error)
            })
        }
        Action::ResetConstitutionWorkflow { worktree } => {
            scoped(state, worktree, |wt, _, _| constitution::reset(&mut wt.tasks))
        }

        // Changes
        Action::CreateChange {
            worktree,
            id,
            name,
            intent,
            timestamp,
        } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.changes, |c| {
                changes::create(c, id, name, intent, *timestamp)
            })
        }),
        Action::SetActiveChange {
            worktree,
            change_id,
        } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.changes, |c| {
                changes::set_active(c, change_id.as_deref())
            })
        }),
        Action::GenerateProposal {
            worktree,
            change_id,
            timestamp,
        } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.changes, |c| {
                changes::step(c, change_id, |ch| ch.begin_proposal(*timestamp))
            })
        }),
        Action::AppendChangeOutput {
            worktree,
            change_id,
            chunk,
        } => scoped(state, worktree, |wt, _, _| {
            changes::append_output(&mut wt.changes, change_id, chunk)
        }),
        Action::CompleteProposal {
            worktree,
            change_id,
            timestamp,
        } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.changes, |c| {
                changes::step(c, change_id, |ch| ch.complete_proposal(*timestamp))
            })
        }),
        Action::GeneratePlan {
            worktree,
            change_id,
            timestamp,
        } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.changes, |c| {
                changes::step(c, change_id, |ch| ch.begin_plan(*timestamp))
            })
        }),
        Action::CompletePlan {
            worktree,
            change_id,
            timestamp,
        } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.changes, |c| {
                changes::step(c, change_id, |ch| ch.complete_plan(*timestamp))
            })
        }),
        Action::StartImplementation {
            worktree,
            change_id,
            timestamp,
        } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.changes, |c| {
                changes::step(c, change_id, |ch| ch.start_implementation(*timestamp))
            })
        }),
        Action::CompleteImplementation {
            worktree,
            change_id,
            timestamp,
        } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.changes, |c| {
                changes::step(c, change_id, |ch| ch.complete_implementation(*timestamp))
            })
        }),
        Action::MarkChangeDone {
            worktree,
            change_id,
            timestamp,
        } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.changes, |c| {
                changes::step(c, change_id, |ch| ch.mark_done(*timestamp))
            })
        }),
        Action::ArchiveChange {
            worktree,
            change_id,
            timestamp,
        } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.changes, |c| {
                changes::step(c, change_id, |ch| ch.archive(*timestamp))
            })
        }),
        Action::CancelChange {
            worktree,
            change_id,
            timestamp,
        } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.changes, |c| {
                changes::step(c, change_id, |ch| ch.cancel(*timestamp))
            })
        }),
        Action::FailChange {
            worktree,
            change_id,
            error,
            timestamp,
        } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.changes, |c| {
                changes::step(c, change_id, |ch| ch.fail(error, *timestamp))
            })
        }),
        Action::ChangeGenerationFailed {
            worktree,
            change_id,
            error,
            timestamp,
        } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.changes, |c| {
                changes::generation_failed(c, change_id, error, *timestamp)
            })
        }),
        Action::AddChangeContextFile {
            worktree,
            change_id,
            path,
        } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.changes, |c| {
                changes::add_context_file(c, change_id, path)
            })
        }),
        Action::RemoveChangeContextFile {
            worktree,
            change_id,
            path,
        } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.changes, |c| {
                changes::remove_context_file(c, change_id, path)
            })
        }),
        Action::LinkReviewSession {
            worktree,
            change_id,
            session_id,
        } => scoped(state, worktree, |wt, _, review| {
            guard(&mut wt.changes, |c| {
                changes::link_review(c, review, change_id, session_id)
            })
        }),
        Action::DeleteChange {
            worktree,
            change_id,
        } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.changes, |c| changes::delete(c, change_id))
        }),
        Action::ClearChangesError { worktree } => {
            scoped(state, worktree, |wt, _, _| wt.changes.error = None)
        }

        // Review gate
        Action::CreateReviewSession {
            id,
            content,
            timestamp,
        } => guard(&mut state.review, |r| {
            review::create(r, id, content, *timestamp)
        }),
        Action::SetActiveReviewSession { session_id } => guard(&mut state.review, |r| {
            review::set_active(r, session_id.as_deref())
        }),
        Action::StartReview {
            session_id,
            timestamp,
        } => guard(&mut state.review, |r| {
            review::step(r, session_id, |s| s.start(*timestamp))
        }),
        Action::AddReviewComment {
            session_id,
            target,
            content,
            author,
            timestamp,
        } => guard(&mut state.review, |r| {
            review::step(r, session_id, |s| {
                s.add_comment(target.clone(), content, author, *timestamp)
                    .map(|_| ())
            })
        }),
        Action::ResolveReviewComment {
            session_id,
            comment_id,
            timestamp,
        } => guard(&mut state.review, |r| {
            review::step(r, session_id, |s| {
                s.set_comment_resolved(comment_id, true, *timestamp)
            })
        }),
        Action::UnresolveReviewComment {
            session_id,
            comment_id,
            timestamp,
        } => guard(&mut state.review, |r| {
            review::step(r, session_id, |s| {
                s.set_comment_resolved(comment_id, false, *timestamp)
            })
        }),
        Action::DeleteReviewComment {
            session_id,
            comment_id,
            ..
        } => guard(&mut state.review, |r| {
            review::step(r, session_id, |s| s.delete_comment(comment_id))
        }),
        Action::SubmitReviewFeedback {
            session_id,
            timestamp,
        } => guard(&mut state.review, |r| {
            review::step(r, session_id, |s| s.submit_feedback(*timestamp))
        }),
        Action::ReviseReviewContent {
            session_id,
            content,
            timestamp,
        } => guard(&mut state.review, |r| {
            review::step(r, session_id, |s| s.revise(content.clone(), *timestamp))
        }),
        Action::ApproveReview {
            session_id,
            timestamp,
        } => guard(&mut state.review, |r| {
            review::step(r, session_id, |s| s.approve(*timestamp))
        }),
        Action::RejectReview {
            session_id,
            timestamp,
        } => guard(&mut state.review, |r| {
            review::step(r, session_id, |s| s.reject(*timestamp))
        }),
        Action::RemoveReviewSession { session_id } => {
            if let Err(message) = review::remove(state, session_id) {
                state.review.error = Some(message);
            }
        }
        Action::ClearReviewError => state.review.error = None,

        // Dockers
        Action::RefreshServices => state.docker.refreshing = true,
        Action::SetServices { services } => {
            dockers::set_services(&mut state.docker, services.clone())
        }
        Action::ServicesRefreshFailed { error } => {
            guard(&mut state.docker, |d| dockers::refresh_failed(d, error))
        }
        Action::StartService { service_id } => {
            guard(&mut state.docker, |d| dockers::start(d, service_id))
        }
        Action::StopService { service_id } => guard(&mut state.docker, |d| {
            dockers::queue(d, service_id, ServiceOperation::Stop)
        }),
        Action::RestartService { service_id } => guard(&mut state.docker, |d| {
            dockers::queue(d, service_id, ServiceOperation::Restart)
        }),
        Action::ServiceOperationFinished { service_id } => {
            dockers::operation_finished(&mut state.docker, service_id)
        }
        Action::ServiceOperationFailed { service_id, error } => {
            guard(&mut state.docker, |d| {
                dockers::operation_failed(d, service_id, error)
            })
        }
        Action::FetchServiceLogs { service_id } => {
            guard(&mut state.docker, |d| dockers::fetch_logs(d, service_id))
        }
        Action::SetServiceLogs {
            service_id,
            content,
            timestamp,
        } => dockers::set_logs(&mut state.docker, service_id, content, *timestamp),
        Action::ServiceLogsFailed { service_id, error } => {
            guard(&mut state.docker, |d| dockers::logs_failed(d, service_id, error))
        }
        Action::CancelServiceLogs { service_id } => {
            dockers::cancel_logs(&mut state.docker, service_id)
        }
        Action::SetPortConflict { conflict } => guard(&mut state.docker, |d| {
            dockers::set_port_conflict(d, conflict.clone())
        }),
        Action::ResolvePortConflict {
            service_id,
            resolution,
        } => guard(&mut state.docker, |d| {
            dockers::resolve_port_conflict(d, service_id, resolution)
        }),
        Action::CancelPortConflict { service_id } => {
            dockers::cancel_port_conflict(&mut state.docker, service_id)
        }
        Action::ClearPortOverride { service_id } => {
            state.docker.port_overrides.remove(service_id);
        }
        Action::ClearDockersError => state.docker.error = None,

        // Explorer
        Action::ExpandDirectory { worktree, path } => scoped(state, worktree, |wt, _, _| {
            explorer::expand(&mut wt.explorer, path)
        }),
        Action::CollapseDirectory { worktree, path } => {
            scoped(state, worktree, |wt, _, _| {
                explorer::collapse(&mut wt.explorer, path)
            })
        }
        Action::CollapseAll { worktree } => scoped(state, worktree, |wt, _, _| {
            explorer::collapse_all(&mut wt.explorer)
        }),
        Action::SetDirectoryCache {
            worktree,
            path,
            entries,
        } => scoped(state, worktree, |wt, _, review| {
            explorer::set_directory_cache(&mut wt.explorer, review, path, entries)
        }),
        Action::InvalidateDirectoryCache {
            worktree,
            path,
            recursive,
        } => scoped(state, worktree, |wt, _, _| {
            explorer::invalidate(&mut wt.explorer, path, *recursive)
        }),
        Action::DirectoryLoadFailed {
            worktree,
            path,
            error,
        } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.explorer, |e| explorer::load_failed(e, path, error))
        }),
        Action::SelectPath { worktree, path } => scoped(state, worktree, |wt, _, _| {
            explorer::select(&mut wt.explorer, path.as_deref())
        }),
        Action::NavigateBack { worktree } => scoped(state, worktree, |wt, _, _| {
            explorer::navigate_back(&mut wt.explorer)
        }),
        Action::NavigateForward { worktree } => scoped(state, worktree, |wt, _, _| {
            explorer::navigate_forward(&mut wt.explorer)
        }),
        Action::SetSortConfig {
            worktree,
            sort_config,
        } => scoped(state, worktree, |wt, _, _| {
            explorer::set_sort_config(&mut wt.explorer, *sort_config)
        }),
        Action::ClearExplorerError { worktree } => {
            scoped(state, worktree, |wt, _, _| wt.explorer.error = None)
        }

        // Terminal
        Action::SpawnTerminal {
            worktree,
            session_id,
            title,
            cols,
            rows,
            cwd,
        } => scoped(state, worktree, |wt, _, _| {
            let cwd = cwd.clone().unwrap_or_else(|| wt.path.clone());
            guard(&mut wt.terminal, |t| {
                terminal::spawn(
                    t,
                    terminal::SpawnRequest {
                        session_id,
                        title: title.as_deref(),
                        cols: *cols,
                        rows: *rows,
                        cwd: &cwd,
                    },
                )
            })
        }),
        Action::TerminalStarted {
            worktree,
            session_id,
        } => scoped(state, worktree, |wt, _, _| {
            terminal::started(&mut wt.terminal, session_id)
        }),
        Action::AppendTerminalOutput {
            worktree,
            session_id,
            chunk,
        } => scoped(state, worktree, |wt, settings, _| {
            terminal::append_output(
                &mut wt.terminal,
                session_id,
                chunk,
                settings.terminal_scrollback,
            )
        }),
        Action::WriteTerminalInput {
            worktree,
            session_id,
            ..
        } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.terminal, |t| terminal::write_input(t, session_id))
        }),
        Action::ResizeTerminal {
            worktree,
            session_id,
            cols,
            rows,
        } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.terminal, |t| {
                terminal::resize(t, session_id, *cols, *rows)
            })
        }),
        Action::KillTerminal {
            worktree,
            session_id,
        } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.terminal, |t| terminal::kill(t, session_id))
        }),
        Action::TerminalExited {
            worktree,
            session_id,
            code,
        } => scoped(state, worktree, |wt, _, _| {
            terminal::exited(&mut wt.terminal, session_id, *code)
        }),
        Action::CloseTerminal {
            worktree,
            session_id,
        } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.terminal, |t| terminal::close(t, session_id))
        }),
        Action::SetActiveTerminal {
            worktree,
            session_id,
        } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.terminal, |t| {
                terminal::set_active(t, session_id.as_deref())
            })
        }),
        Action::TerminalFailed {
            worktree,
            session_id,
            error,
        } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.terminal, |t| terminal::failed(t, session_id, error))
        }),

        // Chat
        Action::SendChatMessage {
            worktree,
            id,
            content,
            timestamp,
        } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.chat, |c| chat::send(c, id, content, *timestamp))
        }),
        Action::AppendChatStream { worktree, chunk } => {
            scoped(state, worktree, |wt, _, _| chat::append(&mut wt.chat, chunk))
        }
        Action::CompleteChatStream {
            worktree,
            timestamp,
        } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.chat, |c| chat::complete(c, *timestamp))
        }),
        Action::ChatFailed { worktree, error } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.chat, |c| chat::failed(c, error))
        }),
        Action::ClearChat { worktree } => {
            scoped(state, worktree, |wt, _, _| chat::clear(&mut wt.chat))
        }

        // MCP
        Action::SetMcpServers { worktree, servers } => scoped(state, worktree, |wt, _, _| {
            mcp::set_servers(&mut wt.mcp, servers)
        }),
        Action::ToggleMcpServer { worktree, name } => scoped(state, worktree, |wt, _, _| {
            guard(&mut wt.mcp, |m| mcp::toggle(m, name))
        }),
    }
}
