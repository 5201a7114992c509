//! proptest generators for action sequences. Ids come from small pools so
//! random sequences actually hit existing projects, changes and sessions.

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

use crate::action::Action;
use crate::models::{
    AgentRulesConfig, ConflictResolution, ConflictingContainer, EntryKind, EnvConfig, FileEntry,
    McpServer, NotificationLevel, PortConflict, ServiceInfo, ServiceStatus, Settings, SortConfig,
    SortDirection, SortField, TaskCommand, TaskStatus, View,
};
use crate::workflow::{CommentTarget, ReviewContent, ReviewKind};

fn pick(pool: &'static [&'static str]) -> impl Strategy<Value = String> {
    prop::sample::select(pool).prop_map(str::to_string)
}

fn project_id() -> impl Strategy<Value = String> {
    pick(&["p0", "p1"])
}

fn worktree() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        3 => Just(None),
        1 => pick(&["p0-main", "p1-main", "p0-feat", "ghost"]).prop_map(Some),
    ]
}

fn change_id() -> impl Strategy<Value = String> {
    pick(&["c0", "c1"])
}

fn session_id() -> impl Strategy<Value = String> {
    pick(&["r0", "r1"])
}

fn service_id() -> impl Strategy<Value = String> {
    pick(&["db", "cache", "web"])
}

fn terminal_id() -> impl Strategy<Value = String> {
    pick(&["t0", "t1"])
}

fn notification_id() -> impl Strategy<Value = String> {
    pick(&["n0", "n1", "n2", "n3"])
}

/// Ids handed out by `AddReviewComment` plus one that never exists.
fn comment_id() -> impl Strategy<Value = (String, String)> {
    (session_id(), pick(&["c1", "c2", "c9"]))
        .prop_map(|(session, seq)| (format!("{session}-{seq}"), session))
}

fn text() -> impl Strategy<Value = String> {
    "[a-z ]{0,12}"
}

fn timestamp() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..10_000).prop_map(|offset| Utc.timestamp_opt(1_700_000_000 + offset, 0).unwrap())
}

fn dir_path() -> impl Strategy<Value = String> {
    pick(&["/p0", "/p0/src", "/p0/src/lib", "/p0/docs", "/p1"])
}

fn arbitrary_entry() -> impl Strategy<Value = FileEntry> {
    (
        pick(&["a.rs", "b.md", "lib", "Zeta"]),
        prop_oneof![Just(EntryKind::File), Just(EntryKind::Directory)],
        0u64..4096,
    )
        .prop_map(|(name, kind, size)| FileEntry {
            path: format!("/p0/{name}"),
            name,
            kind,
            size,
            permissions: "rw-r--r--".to_string(),
            modified: None,
            git_status: None,
            comment_count: 0,
        })
}

fn arbitrary_service() -> impl Strategy<Value = ServiceInfo> {
    (
        service_id(),
        prop_oneof![
            Just(ServiceStatus::Running),
            Just(ServiceStatus::Stopped),
            Just(ServiceStatus::Exited),
        ],
        prop::option::of(prop::sample::select(&[5432u16, 6379, 8080][..])),
    )
        .prop_map(|(id, status, port)| ServiceInfo {
            name: format!("{id}-1"),
            image: format!("{id}:latest"),
            id,
            status,
            port,
            service_type: "container".to_string(),
            group: None,
            managed: true,
            pending_operation: None,
            logs: None,
        })
}

fn arbitrary_review_content() -> impl Strategy<Value = ReviewContent> {
    (
        prop_oneof![
            Just(ReviewKind::Plan),
            Just(ReviewKind::Proposal),
            Just(ReviewKind::Code),
            Just(ReviewKind::Artifact),
        ],
        text(),
    )
        .prop_map(|(kind, title)| ReviewContent {
            kind,
            title,
            body: String::new(),
            files: vec![],
        })
}

fn arbitrary_comment_target() -> impl Strategy<Value = CommentTarget> {
    prop_oneof![
        Just(CommentTarget::Document),
        pick(&["/p0/a.rs", "a.rs"]).prop_map(|path| CommentTarget::File {
            path,
            line: Some(1)
        }),
    ]
}

fn arbitrary_settings() -> impl Strategy<Value = Settings> {
    (1usize..6, 16usize..256, any::<bool>()).prop_map(|(max, scrollback, short_list)| {
        let mut settings = Settings {
            max_notifications: max,
            terminal_scrollback: scrollback,
            ..Settings::default()
        };
        if short_list {
            settings.constitution_questions.truncate(2);
        }
        settings
    })
}

fn app_actions() -> BoxedStrategy<Action> {
    prop_oneof![
        (project_id(), text()).prop_map(|(id, name)| Action::AddProject {
            path: format!("/{id}"),
            id,
            name,
            main_branch: "main".to_string(),
        }),
        project_id().prop_map(|id| Action::RemoveProject { id }),
        project_id().prop_map(|id| Action::SetActiveProject { id }),
        Just(Action::AddWorktree {
            project_id: "p0".to_string(),
            id: "p0-feat".to_string(),
            path: "/p0/.worktrees/feat".to_string(),
            branch: "feat".to_string(),
        }),
        pick(&["p0-feat", "p0-main"]).prop_map(|id| Action::RemoveWorktree {
            project_id: "p0".to_string(),
            id
        }),
        pick(&["p0-feat", "p0-main"]).prop_map(|id| Action::SetActiveWorktree {
            project_id: "p0".to_string(),
            id
        }),
        Just(Action::SetActiveView { view: View::Chat }),
        arbitrary_settings().prop_map(|settings| Action::UpdateSettings { settings }),
        Just(Action::ClearError),
        (project_id(), prop::option::of(pick(&[".env", ".env.local"]))).prop_map(
            |(project_id, env_file)| Action::SetEnvConfig {
                project_id,
                env_config: EnvConfig {
                    variables: [("RUST_LOG".to_string(), "debug".to_string())].into(),
                    env_file,
                },
            }
        ),
        (project_id(), any::<bool>()).prop_map(|(project_id, use_claude_md)| {
            Action::SetAgentRulesConfig {
                project_id,
                agent_rules_config: AgentRulesConfig {
                    rules: vec!["keep diffs small".to_string()],
                    use_claude_md,
                },
            }
        }),
        (notification_id(), timestamp()).prop_map(|(id, timestamp)| {
            Action::AddNotification {
                id,
                level: NotificationLevel::Warning,
                message: "heads up".to_string(),
                timestamp,
            }
        }),
        notification_id().prop_map(|id| Action::MarkNotificationRead { id }),
        notification_id().prop_map(|id| Action::DismissNotification { id }),
        Just(Action::ClearNotifications),
    ]
    .boxed()
}

fn task_actions() -> BoxedStrategy<Action> {
    let commands = vec![
        TaskCommand {
            name: "build".to_string(),
            command: "cargo build".to_string(),
            description: None,
        },
        TaskCommand {
            name: "test".to_string(),
            command: "cargo test".to_string(),
            description: None,
        },
    ];
    prop_oneof![
        worktree().prop_map(move |worktree| Action::SetCommands {
            worktree,
            commands: commands.clone(),
        }),
        (worktree(), pick(&["build", "test", "lint"])).prop_map(|(worktree, name)| {
            Action::RunCommand { worktree, name }
        }),
        worktree().prop_map(|worktree| Action::StopCommand { worktree }),
        (worktree(), text()).prop_map(|(worktree, chunk)| Action::AppendTaskOutput {
            worktree,
            chunk
        }),
        (worktree(), pick(&["build", "test"]), prop::option::of(0i32..3)).prop_map(
            |(worktree, name, exit_code)| Action::CommandFinished {
                worktree,
                name,
                exit_code,
                error: None,
            }
        ),
        (worktree(), pick(&["build", "test"])).prop_map(|(worktree, name)| {
            Action::SetTaskStatus {
                worktree,
                name,
                status: TaskStatus::Failed,
            }
        }),
        (worktree(), prop::option::of(pick(&["build", "lint"]))).prop_map(
            |(worktree, name)| Action::SetActiveCommand { worktree, name }
        ),
        worktree().prop_map(|worktree| Action::ClearTaskOutput { worktree }),
        (worktree(), any::<bool>()).prop_map(|(worktree, exists)| {
            Action::SetConstitutionExists { worktree, exists }
        }),
        worktree().prop_map(|worktree| Action::SetTasksError {
            worktree,
            error: "boom".to_string()
        }),
        worktree().prop_map(|worktree| Action::ClearTasksError { worktree }),
    ]
    .boxed()
}

fn constitution_actions() -> BoxedStrategy<Action> {
    prop_oneof![
        1 => (worktree(), any::<bool>()).prop_map(|(worktree, use_claude_md_reference)| {
            Action::StartConstitutionWorkflow {
                worktree,
                use_claude_md_reference,
            }
        }),
        3 => (worktree(), text()).prop_map(|(worktree, answer)| {
            Action::AnswerConstitutionQuestion { worktree, answer }
        }),
        1 => worktree().prop_map(|worktree| Action::PreviousConstitutionQuestion { worktree }),
        1 => (worktree(), any::<bool>()).prop_map(|(worktree, enabled)| {
            Action::SetUseClaudeMdReference { worktree, enabled }
        }),
        2 => worktree().prop_map(|worktree| Action::GenerateConstitution { worktree }),
        2 => (worktree(), text()).prop_map(|(worktree, chunk)| {
            Action::AppendConstitutionOutput { worktree, chunk }
        }),
        1 => worktree().prop_map(|worktree| Action::CompleteConstitution { worktree }),
        1 => worktree().prop_map(|worktree| Action::ConstitutionFailed {
            worktree,
            error: "quota".to_string()
        }),
        1 => worktree().prop_map(|worktree| Action::ResetConstitutionWorkflow { worktree }),
    ]
    .boxed()
}

fn change_actions() -> BoxedStrategy<Action> {
    let step = (worktree(), change_id(), timestamp(), 0u8..11).prop_map(
        |(worktree, change_id, timestamp, which)| match which {
            0 => Action::GenerateProposal {
                worktree,
                change_id,
                timestamp,
            },
            1 => Action::CompleteProposal {
                worktree,
                change_id,
                timestamp,
            },
            2 => Action::GeneratePlan {
                worktree,
                change_id,
                timestamp,
            },
            3 => Action::CompletePlan {
                worktree,
                change_id,
                timestamp,
            },
            4 => Action::StartImplementation {
                worktree,
                change_id,
                timestamp,
            },
            5 => Action::CompleteImplementation {
                worktree,
                change_id,
                timestamp,
            },
            6 => Action::MarkChangeDone {
                worktree,
                change_id,
                timestamp,
            },
            7 => Action::CancelChange {
                worktree,
                change_id,
                timestamp,
            },
            8 => Action::ArchiveChange {
                worktree,
                change_id,
                timestamp,
            },
            9 => Action::FailChange {
                worktree,
                change_id,
                error: "tests broke".to_string(),
                timestamp,
            },
            _ => Action::ChangeGenerationFailed {
                worktree,
                change_id,
                error: "stream closed".to_string(),
                timestamp,
            },
        },
    );
    prop_oneof![
        1 => (worktree(), change_id(), text(), timestamp()).prop_map(
            |(worktree, id, name, timestamp)| Action::CreateChange {
                worktree,
                id,
                name: format!("change {name}"),
                intent: String::new(),
                timestamp,
            }
        ),
        6 => step,
        3 => (worktree(), change_id(), text()).prop_map(|(worktree, change_id, chunk)| {
            Action::AppendChangeOutput {
                worktree,
                change_id,
                chunk,
            }
        }),
        1 => (worktree(), change_id(), session_id()).prop_map(
            |(worktree, change_id, session_id)| Action::LinkReviewSession {
                worktree,
                change_id,
                session_id,
            }
        ),
        1 => (worktree(), change_id()).prop_map(|(worktree, change_id)| Action::AddChangeContextFile {
            worktree,
            change_id,
            path: "src/lib.rs".to_string(),
        }),
        1 => (worktree(), change_id()).prop_map(|(worktree, change_id)| {
            Action::RemoveChangeContextFile {
                worktree,
                change_id,
                path: "src/lib.rs".to_string(),
            }
        }),
        1 => (worktree(), change_id()).prop_map(|(worktree, change_id)| Action::DeleteChange {
            worktree,
            change_id
        }),
        1 => worktree().prop_map(|worktree| Action::ClearChangesError { worktree }),
        1 => (worktree(), prop::option::of(change_id())).prop_map(|(worktree, change_id)| {
            Action::SetActiveChange {
                worktree,
                change_id,
            }
        }),
    ]
    .boxed()
}

fn review_actions() -> BoxedStrategy<Action> {
    prop_oneof![
        (session_id(), arbitrary_review_content(), timestamp()).prop_map(
            |(id, content, timestamp)| Action::CreateReviewSession {
                id,
                content,
                timestamp,
            }
        ),
        (session_id(), timestamp()).prop_map(|(session_id, timestamp)| Action::StartReview {
            session_id,
            timestamp
        }),
        (session_id(), arbitrary_comment_target(), timestamp()).prop_map(
            |(session_id, target, timestamp)| Action::AddReviewComment {
                session_id,
                target,
                content: "nit".to_string(),
                author: "you".to_string(),
                timestamp,
            }
        ),
        (comment_id(), timestamp()).prop_map(|((comment_id, session_id), timestamp)| {
            Action::ResolveReviewComment {
                session_id,
                comment_id,
                timestamp,
            }
        }),
        (comment_id(), timestamp()).prop_map(|((comment_id, session_id), timestamp)| {
            Action::UnresolveReviewComment {
                session_id,
                comment_id,
                timestamp,
            }
        }),
        (comment_id(), timestamp()).prop_map(|((comment_id, session_id), timestamp)| {
            Action::DeleteReviewComment {
                session_id,
                comment_id,
                timestamp,
            }
        }),
        (session_id(), timestamp()).prop_map(|(session_id, timestamp)| {
            Action::SubmitReviewFeedback {
                session_id,
                timestamp,
            }
        }),
        (session_id(), arbitrary_review_content(), timestamp()).prop_map(
            |(session_id, content, timestamp)| Action::ReviseReviewContent {
                session_id,
                content,
                timestamp,
            }
        ),
        (session_id(), timestamp()).prop_map(|(session_id, timestamp)| Action::ApproveReview {
            session_id,
            timestamp
        }),
        (session_id(), timestamp()).prop_map(|(session_id, timestamp)| Action::RejectReview {
            session_id,
            timestamp
        }),
        session_id().prop_map(|session_id| Action::RemoveReviewSession { session_id }),
        prop::option::of(session_id())
            .prop_map(|session_id| Action::SetActiveReviewSession { session_id }),
        Just(Action::ClearReviewError),
    ]
    .boxed()
}

fn docker_actions() -> BoxedStrategy<Action> {
    let resolution = prop_oneof![
        Just(ConflictResolution::UseSuggestedPort),
        (1024u16..1100).prop_map(|port| ConflictResolution::UseCustomPort { port }),
        Just(ConflictResolution::StopConflictingContainer),
    ];
    prop_oneof![
        Just(Action::RefreshServices),
        prop::collection::vec(arbitrary_service(), 0..4)
            .prop_map(|services| Action::SetServices { services }),
        service_id().prop_map(|service_id| Action::StartService { service_id }),
        Just(Action::ServicesRefreshFailed {
            error: "daemon unreachable".to_string()
        }),
        service_id().prop_map(|service_id| Action::StopService { service_id }),
        service_id().prop_map(|service_id| Action::RestartService { service_id }),
        service_id().prop_map(|service_id| Action::ServiceOperationFinished { service_id }),
        service_id().prop_map(|service_id| Action::ServiceOperationFailed {
            service_id,
            error: "no such container".to_string()
        }),
        service_id().prop_map(|service_id| Action::FetchServiceLogs { service_id }),
        service_id().prop_map(|service_id| Action::ServiceLogsFailed {
            service_id,
            error: "gone".to_string()
        }),
        service_id().prop_map(|service_id| Action::CancelServiceLogs { service_id }),
        service_id().prop_map(|service_id| Action::CancelPortConflict { service_id }),
        (service_id(), service_id()).prop_map(|(service_id, other)| Action::SetPortConflict {
            conflict: PortConflict {
                service_id,
                requested_port: 5432,
                suggested_port: 5433,
                conflicting_container: ConflictingContainer {
                    name: other.clone(),
                    id: other,
                },
            },
        }),
        (service_id(), resolution).prop_map(|(service_id, resolution)| {
            Action::ResolvePortConflict {
                service_id,
                resolution,
            }
        }),
        (service_id(), timestamp()).prop_map(|(service_id, timestamp)| Action::SetServiceLogs {
            service_id,
            content: "ready".to_string(),
            timestamp,
        }),
        service_id().prop_map(|service_id| Action::ClearPortOverride { service_id }),
        Just(Action::ClearDockersError),
    ]
    .boxed()
}

fn explorer_actions() -> BoxedStrategy<Action> {
    prop_oneof![
        2 => (worktree(), dir_path()).prop_map(|(worktree, path)| Action::ExpandDirectory {
            worktree,
            path
        }),
        1 => (worktree(), dir_path()).prop_map(|(worktree, path)| Action::CollapseDirectory {
            worktree,
            path
        }),
        1 => worktree().prop_map(|worktree| Action::CollapseAll { worktree }),
        2 => (
            worktree(),
            dir_path(),
            prop::collection::vec(arbitrary_entry(), 0..4)
        )
            .prop_map(|(worktree, path, entries)| Action::SetDirectoryCache {
                worktree,
                path,
                entries,
            }),
        1 => (worktree(), dir_path(), any::<bool>()).prop_map(|(worktree, path, recursive)| {
            Action::InvalidateDirectoryCache {
                worktree,
                path,
                recursive,
            }
        }),
        1 => (worktree(), dir_path()).prop_map(|(worktree, path)| Action::DirectoryLoadFailed {
            worktree,
            path,
            error: "denied".to_string(),
        }),
        1 => (worktree(), prop::option::of(dir_path())).prop_map(|(worktree, path)| {
            Action::SelectPath { worktree, path }
        }),
        1 => worktree().prop_map(|worktree| Action::NavigateBack { worktree }),
        1 => worktree().prop_map(|worktree| Action::NavigateForward { worktree }),
        1 => worktree().prop_map(|worktree| Action::ClearExplorerError { worktree }),
        1 => (worktree(), any::<bool>()).prop_map(|(worktree, desc)| Action::SetSortConfig {
            worktree,
            sort_config: SortConfig {
                field: SortField::Size,
                direction: if desc {
                    SortDirection::Desc
                } else {
                    SortDirection::Asc
                },
                directories_first: !desc,
            },
        }),
    ]
    .boxed()
}

fn session_actions() -> BoxedStrategy<Action> {
    prop_oneof![
        (worktree(), terminal_id()).prop_map(|(worktree, session_id)| {
            Action::SpawnTerminal {
                worktree,
                session_id,
                title: None,
                cols: 80,
                rows: 24,
                cwd: None,
            }
        }),
        (worktree(), terminal_id()).prop_map(|(worktree, session_id)| {
            Action::TerminalStarted {
                worktree,
                session_id,
            }
        }),
        (worktree(), terminal_id(), text()).prop_map(|(worktree, session_id, chunk)| {
            Action::AppendTerminalOutput {
                worktree,
                session_id,
                chunk,
            }
        }),
        (worktree(), terminal_id(), text()).prop_map(|(worktree, session_id, data)| {
            Action::WriteTerminalInput {
                worktree,
                session_id,
                data,
            }
        }),
        (worktree(), terminal_id(), 0u16..300, 0u16..100).prop_map(
            |(worktree, session_id, cols, rows)| Action::ResizeTerminal {
                worktree,
                session_id,
                cols,
                rows,
            }
        ),
        (worktree(), terminal_id()).prop_map(|(worktree, session_id)| Action::KillTerminal {
            worktree,
            session_id
        }),
        (worktree(), prop::option::of(terminal_id())).prop_map(|(worktree, session_id)| {
            Action::SetActiveTerminal {
                worktree,
                session_id,
            }
        }),
        (worktree(), terminal_id()).prop_map(|(worktree, session_id)| Action::TerminalFailed {
            worktree,
            session_id,
            error: "no pty".to_string(),
        }),
        (worktree(), terminal_id()).prop_map(|(worktree, session_id)| {
            Action::TerminalExited {
                worktree,
                session_id,
                code: Some(0),
            }
        }),
        (worktree(), terminal_id()).prop_map(|(worktree, session_id)| Action::CloseTerminal {
            worktree,
            session_id
        }),
        (worktree(), pick(&["m0", "m1"]), text(), timestamp()).prop_map(
            |(worktree, id, content, timestamp)| Action::SendChatMessage {
                worktree,
                id,
                content: format!("q {content}"),
                timestamp,
            }
        ),
        (worktree(), text()).prop_map(|(worktree, chunk)| Action::AppendChatStream {
            worktree,
            chunk
        }),
        (worktree(), timestamp()).prop_map(|(worktree, timestamp)| {
            Action::CompleteChatStream {
                worktree,
                timestamp,
            }
        }),
        worktree().prop_map(|worktree| Action::ChatFailed {
            worktree,
            error: "rate limited".to_string()
        }),
        worktree().prop_map(|worktree| Action::ClearChat { worktree }),
        worktree().prop_map(|worktree| Action::SetMcpServers {
            worktree,
            servers: vec![McpServer {
                name: "fs".to_string(),
                command: "mcp-fs".to_string(),
                args: vec![],
                enabled: true,
            }],
        }),
        worktree().prop_map(|worktree| Action::ToggleMcpServer {
            worktree,
            name: "fs".to_string()
        }),
    ]
    .boxed()
}

pub(crate) fn arbitrary_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        3 => app_actions(),
        2 => task_actions(),
        2 => constitution_actions(),
        3 => change_actions(),
        2 => review_actions(),
        2 => docker_actions(),
        2 => explorer_actions(),
        2 => session_actions(),
    ]
}

/// A sequence that starts by opening `p0`, so most actions have a target.
pub(crate) fn arbitrary_actions(max_len: usize) -> impl Strategy<Value = Vec<Action>> {
    prop::collection::vec(arbitrary_action(), 0..max_len).prop_map(|mut actions| {
        actions.insert(
            0,
            Action::AddProject {
                id: "p0".to_string(),
                name: "zero".to_string(),
                path: "/p0".to_string(),
                main_branch: "main".to_string(),
            },
        );
        actions
    })
}
