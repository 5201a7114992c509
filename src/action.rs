//! The closed set of state transitions.
//!
//! Serialized adjacently tagged: `{"type": "AddProject", "payload": {...}}`.
//! Worktree-scoped variants carry `worktree: Option<String>`; `None` targets
//! the active worktree of the active project. Timestamps travel inside the
//! action so reduction never reads a clock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    AgentRulesConfig, ConflictResolution, EnvConfig, FileEntry, McpServer, NotificationLevel,
    PortConflict, ServiceInfo, Settings, SortConfig, TaskCommand, TaskStatus, View,
};
use crate::store::StoreError;
use crate::workflow::{CommentTarget, ReviewContent};

fn default_branch() -> String {
    "main".to_string()
}

fn default_cols() -> u16 {
    80
}

fn default_rows() -> u16 {
    24
}

fn default_author() -> String {
    "you".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Action {
    // Projects and app
    AddProject {
        id: String,
        name: String,
        path: String,
        #[serde(default = "default_branch")]
        main_branch: String,
    },
    RemoveProject {
        id: String,
    },
    SetActiveProject {
        id: String,
    },
    AddWorktree {
        project_id: String,
        id: String,
        path: String,
        branch: String,
    },
    RemoveWorktree {
        project_id: String,
        id: String,
    },
    SetActiveWorktree {
        project_id: String,
        id: String,
    },
    SetActiveView {
        view: View,
    },
    SetEnvConfig {
        project_id: String,
        env_config: EnvConfig,
    },
    SetAgentRulesConfig {
        project_id: String,
        agent_rules_config: AgentRulesConfig,
    },
    UpdateSettings {
        settings: Settings,
    },
    ClearError,

    // Notifications
    AddNotification {
        id: String,
        #[serde(default)]
        level: NotificationLevel,
        message: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    MarkNotificationRead {
        id: String,
    },
    DismissNotification {
        id: String,
    },
    ClearNotifications,

    // Tasks
    SetCommands {
        #[serde(default)]
        worktree: Option<String>,
        commands: Vec<TaskCommand>,
    },
    SetActiveCommand {
        #[serde(default)]
        worktree: Option<String>,
        name: Option<String>,
    },
    SetTaskStatus {
        #[serde(default)]
        worktree: Option<String>,
        name: String,
        status: TaskStatus,
    },
    RunCommand {
        #[serde(default)]
        worktree: Option<String>,
        name: String,
    },
    StopCommand {
        #[serde(default)]
        worktree: Option<String>,
    },
    AppendTaskOutput {
        #[serde(default)]
        worktree: Option<String>,
        chunk: String,
    },
    CommandFinished {
        #[serde(default)]
        worktree: Option<String>,
        name: String,
        #[serde(default)]
        exit_code: Option<i32>,
        #[serde(default)]
        error: Option<String>,
    },
    ClearTaskOutput {
        #[serde(default)]
        worktree: Option<String>,
    },
    SetConstitutionExists {
        #[serde(default)]
        worktree: Option<String>,
        exists: bool,
    },
    SetTasksError {
        #[serde(default)]
        worktree: Option<String>,
        error: String,
    },
    ClearTasksError {
        #[serde(default)]
        worktree: Option<String>,
    },

    // Constitution
    StartConstitutionWorkflow {
        #[serde(default)]
        worktree: Option<String>,
        #[serde(default)]
        use_claude_md_reference: bool,
    },
    AnswerConstitutionQuestion {
        #[serde(default)]
        worktree: Option<String>,
        answer: String,
    },
    PreviousConstitutionQuestion {
        #[serde(default)]
        worktree: Option<String>,
    },
    SetUseClaudeMdReference {
        #[serde(default)]
        worktree: Option<String>,
        enabled: bool,
    },
    GenerateConstitution {
        #[serde(default)]
        worktree: Option<String>,
    },
    AppendConstitutionOutput {
        #[serde(default)]
        worktree: Option<String>,
        chunk: String,
    },
    CompleteConstitution {
        #[serde(default)]
        worktree: Option<String>,
    },
    ConstitutionFailed {
        #[serde(default)]
        worktree: Option<String>,
        error: String,
    },
    ResetConstitutionWorkflow {
        #[serde(default)]
        worktree: Option<String>,
    },

    // Changes
    CreateChange {
        #[serde(default)]
        worktree: Option<String>,
        id: String,
        name: String,
        #[serde(default)]
        intent: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    SetActiveChange {
        #[serde(default)]
        worktree: Option<String>,
        change_id: Option<String>,
    },
    GenerateProposal {
        #[serde(default)]
        worktree: Option<String>,
        change_id: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    AppendChangeOutput {
        #[serde(default)]
        worktree: Option<String>,
        change_id: String,
        chunk: String,
    },
    CompleteProposal {
        #[serde(default)]
        worktree: Option<String>,
        change_id: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    GeneratePlan {
        #[serde(default)]
        worktree: Option<String>,
        change_id: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    CompletePlan {
        #[serde(default)]
        worktree: Option<String>,
        change_id: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    StartImplementation {
        #[serde(default)]
        worktree: Option<String>,
        change_id: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    CompleteImplementation {
        #[serde(default)]
        worktree: Option<String>,
        change_id: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    MarkChangeDone {
        #[serde(default)]
        worktree: Option<String>,
        change_id: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    ArchiveChange {
        #[serde(default)]
        worktree: Option<String>,
        change_id: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    CancelChange {
        #[serde(default)]
        worktree: Option<String>,
        change_id: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    FailChange {
        #[serde(default)]
        worktree: Option<String>,
        change_id: String,
        error: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    ChangeGenerationFailed {
        #[serde(default)]
        worktree: Option<String>,
        change_id: String,
        error: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    AddChangeContextFile {
        #[serde(default)]
        worktree: Option<String>,
        change_id: String,
        path: String,
    },
    RemoveChangeContextFile {
        #[serde(default)]
        worktree: Option<String>,
        change_id: String,
        path: String,
    },
    LinkReviewSession {
        #[serde(default)]
        worktree: Option<String>,
        change_id: String,
        session_id: String,
    },
    DeleteChange {
        #[serde(default)]
        worktree: Option<String>,
        change_id: String,
    },
    ClearChangesError {
        #[serde(default)]
        worktree: Option<String>,
    },

    // Review gate
    CreateReviewSession {
        id: String,
        content: ReviewContent,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    SetActiveReviewSession {
        session_id: Option<String>,
    },
    StartReview {
        session_id: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    AddReviewComment {
        session_id: String,
        target: CommentTarget,
        content: String,
        #[serde(default = "default_author")]
        author: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    ResolveReviewComment {
        session_id: String,
        comment_id: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    UnresolveReviewComment {
        session_id: String,
        comment_id: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    DeleteReviewComment {
        session_id: String,
        comment_id: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    SubmitReviewFeedback {
        session_id: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    ReviseReviewContent {
        session_id: String,
        content: ReviewContent,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    ApproveReview {
        session_id: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    RejectReview {
        session_id: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    RemoveReviewSession {
        session_id: String,
    },
    ClearReviewError,

    // Dockers
    RefreshServices,
    SetServices {
        services: Vec<ServiceInfo>,
    },
    ServicesRefreshFailed {
        error: String,
    },
    StartService {
        service_id: String,
    },
    StopService {
        service_id: String,
    },
    RestartService {
        service_id: String,
    },
    ServiceOperationFinished {
        service_id: String,
    },
    ServiceOperationFailed {
        service_id: String,
        error: String,
    },
    FetchServiceLogs {
        service_id: String,
    },
    SetServiceLogs {
        service_id: String,
        content: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    ServiceLogsFailed {
        service_id: String,
        error: String,
    },
    CancelServiceLogs {
        service_id: String,
    },
    SetPortConflict {
        conflict: PortConflict,
    },
    ResolvePortConflict {
        service_id: String,
        resolution: ConflictResolution,
    },
    CancelPortConflict {
        service_id: String,
    },
    ClearPortOverride {
        service_id: String,
    },
    ClearDockersError,

    // Explorer
    ExpandDirectory {
        #[serde(default)]
        worktree: Option<String>,
        path: String,
    },
    CollapseDirectory {
        #[serde(default)]
        worktree: Option<String>,
        path: String,
    },
    CollapseAll {
        #[serde(default)]
        worktree: Option<String>,
    },
    SetDirectoryCache {
        #[serde(default)]
        worktree: Option<String>,
        path: String,
        entries: Vec<FileEntry>,
    },
    InvalidateDirectoryCache {
        #[serde(default)]
        worktree: Option<String>,
        path: String,
        #[serde(default)]
        recursive: bool,
    },
    DirectoryLoadFailed {
        #[serde(default)]
        worktree: Option<String>,
        path: String,
        error: String,
    },
    SelectPath {
        #[serde(default)]
        worktree: Option<String>,
        path: Option<String>,
    },
    NavigateBack {
        #[serde(default)]
        worktree: Option<String>,
    },
    NavigateForward {
        #[serde(default)]
        worktree: Option<String>,
    },
    SetSortConfig {
        #[serde(default)]
        worktree: Option<String>,
        sort_config: SortConfig,
    },
    ClearExplorerError {
        #[serde(default)]
        worktree: Option<String>,
    },

    // Terminal
    SpawnTerminal {
        #[serde(default)]
        worktree: Option<String>,
        session_id: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default = "default_cols")]
        cols: u16,
        #[serde(default = "default_rows")]
        rows: u16,
        #[serde(default)]
        cwd: Option<String>,
    },
    TerminalStarted {
        #[serde(default)]
        worktree: Option<String>,
        session_id: String,
    },
    AppendTerminalOutput {
        #[serde(default)]
        worktree: Option<String>,
        session_id: String,
        chunk: String,
    },
    WriteTerminalInput {
        #[serde(default)]
        worktree: Option<String>,
        session_id: String,
        data: String,
    },
    ResizeTerminal {
        #[serde(default)]
        worktree: Option<String>,
        session_id: String,
        cols: u16,
        rows: u16,
    },
    KillTerminal {
        #[serde(default)]
        worktree: Option<String>,
        session_id: String,
    },
    TerminalExited {
        #[serde(default)]
        worktree: Option<String>,
        session_id: String,
        #[serde(default)]
        code: Option<i32>,
    },
    CloseTerminal {
        #[serde(default)]
        worktree: Option<String>,
        session_id: String,
    },
    SetActiveTerminal {
        #[serde(default)]
        worktree: Option<String>,
        session_id: Option<String>,
    },
    TerminalFailed {
        #[serde(default)]
        worktree: Option<String>,
        session_id: String,
        error: String,
    },

    // Chat
    SendChatMessage {
        #[serde(default)]
        worktree: Option<String>,
        id: String,
        content: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    AppendChatStream {
        #[serde(default)]
        worktree: Option<String>,
        chunk: String,
    },
    CompleteChatStream {
        #[serde(default)]
        worktree: Option<String>,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    ChatFailed {
        #[serde(default)]
        worktree: Option<String>,
        error: String,
    },
    ClearChat {
        #[serde(default)]
        worktree: Option<String>,
    },

    // MCP
    SetMcpServers {
        #[serde(default)]
        worktree: Option<String>,
        servers: Vec<McpServer>,
    },
    ToggleMcpServer {
        #[serde(default)]
        worktree: Option<String>,
        name: String,
    },
}

/// Every variant name accepted on the wire.
pub const ACTION_TAGS: &[&str] = &[
    "AddProject",
    "RemoveProject",
    "SetActiveProject",
    "AddWorktree",
    "RemoveWorktree",
    "SetActiveWorktree",
    "SetActiveView",
    "SetEnvConfig",
    "SetAgentRulesConfig",
    "UpdateSettings",
    "ClearError",
    "AddNotification",
    "MarkNotificationRead",
    "DismissNotification",
    "ClearNotifications",
    "SetCommands",
    "SetActiveCommand",
    "SetTaskStatus",
    "RunCommand",
    "StopCommand",
    "AppendTaskOutput",
    "CommandFinished",
    "ClearTaskOutput",
    "SetConstitutionExists",
    "SetTasksError",
    "ClearTasksError",
    "StartConstitutionWorkflow",
    "AnswerConstitutionQuestion",
    "PreviousConstitutionQuestion",
    "SetUseClaudeMdReference",
    "GenerateConstitution",
    "AppendConstitutionOutput",
    "CompleteConstitution",
    "ConstitutionFailed",
    "ResetConstitutionWorkflow",
    "CreateChange",
    "SetActiveChange",
    "GenerateProposal",
    "AppendChangeOutput",
    "CompleteProposal",
    "GeneratePlan",
    "CompletePlan",
    "StartImplementation",
    "CompleteImplementation",
    "MarkChangeDone",
    "ArchiveChange",
    "CancelChange",
    "FailChange",
    "ChangeGenerationFailed",
    "AddChangeContextFile",
    "RemoveChangeContextFile",
    "LinkReviewSession",
    "DeleteChange",
    "ClearChangesError",
    "CreateReviewSession",
    "SetActiveReviewSession",
    "StartReview",
    "AddReviewComment",
    "ResolveReviewComment",
    "UnresolveReviewComment",
    "DeleteReviewComment",
    "SubmitReviewFeedback",
    "ReviseReviewContent",
    "ApproveReview",
    "RejectReview",
    "RemoveReviewSession",
    "ClearReviewError",
    "RefreshServices",
    "SetServices",
    "ServicesRefreshFailed",
    "StartService",
    "StopService",
    "RestartService",
    "ServiceOperationFinished",
    "ServiceOperationFailed",
    "FetchServiceLogs",
    "SetServiceLogs",
    "ServiceLogsFailed",
    "CancelServiceLogs",
    "SetPortConflict",
    "ResolvePortConflict",
    "CancelPortConflict",
    "ClearPortOverride",
    "ClearDockersError",
    "ExpandDirectory",
    "CollapseDirectory",
    "CollapseAll",
    "SetDirectoryCache",
    "InvalidateDirectoryCache",
    "DirectoryLoadFailed",
    "SelectPath",
    "NavigateBack",
    "NavigateForward",
    "SetSortConfig",
    "ClearExplorerError",
    "SpawnTerminal",
    "TerminalStarted",
    "AppendTerminalOutput",
    "WriteTerminalInput",
    "ResizeTerminal",
    "KillTerminal",
    "TerminalExited",
    "CloseTerminal",
    "SetActiveTerminal",
    "TerminalFailed",
    "SendChatMessage",
    "AppendChatStream",
    "CompleteChatStream",
    "ChatFailed",
    "ClearChat",
    "SetMcpServers",
    "ToggleMcpServer",
];

impl Action {
    /// Validates a wire value: the tag must name a variant and the payload
    /// must match it.
    pub fn from_json(value: serde_json::Value) -> Result<Action, StoreError> {
        let tag = match value.get("type") {
            Some(serde_json::Value::String(tag)) => tag.clone(),
            Some(_) => {
                return Err(StoreError::InvalidPayload {
                    action: String::new(),
                    message: "`type` must be a string".to_string(),
                })
            }
            None => {
                return Err(StoreError::InvalidPayload {
                    action: String::new(),
                    message: "missing `type`".to_string(),
                })
            }
        };
        if !ACTION_TAGS.contains(&tag.as_str()) {
            return Err(StoreError::UnknownAction(tag));
        }
        serde_json::from_value(value).map_err(|e| StoreError::InvalidPayload {
            action: tag,
            message: e.to_string(),
        })
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Action::AddProject { .. } => "AddProject",
            Action::RemoveProject { .. } => "RemoveProject",
            Action::SetActiveProject { .. } => "SetActiveProject",
            Action::AddWorktree { .. } => "AddWorktree",
            Action::RemoveWorktree { .. } => "RemoveWorktree",
            Action::SetActiveWorktree { .. } => "SetActiveWorktree",
            Action::SetActiveView { .. } => "SetActiveView",
            Action::SetEnvConfig { .. } => "SetEnvConfig",
            Action::SetAgentRulesConfig { .. } => "SetAgentRulesConfig",
            Action::UpdateSettings { .. } => "UpdateSettings",
            Action::ClearError => "ClearError",
            Action::AddNotification { .. } => "AddNotification",
            Action::MarkNotificationRead { .. } => "MarkNotificationRead",
            Action::DismissNotification { .. } => "DismissNotification",
            Action::ClearNotifications => "ClearNotifications",
            Action::SetCommands { .. } => "SetCommands",
            Action::SetActiveCommand { .. } => "SetActiveCommand",
            Action::SetTaskStatus { .. } => "SetTaskStatus",
            Action::RunCommand { .. } => "RunCommand",
            Action::StopCommand { .. } => "StopCommand",
            Action::AppendTaskOutput { .. } => "AppendTaskOutput",
            Action::CommandFinished { .. } => "CommandFinished",
            Action::ClearTaskOutput { .. } => "ClearTaskOutput",
            Action::SetConstitutionExists { .. } => "SetConstitutionExists",
            Action::SetTasksError { .. } => "SetTasksError",
            Action::ClearTasksError { .. } => "ClearTasksError",
            Action::StartConstitutionWorkflow { .. } => "StartConstitutionWorkflow",
            Action::AnswerConstitutionQuestion { .. } => "AnswerConstitutionQuestion",
            Action::PreviousConstitutionQuestion { .. } => "PreviousConstitutionQuestion",
            Action::SetUseClaudeMdReference { .. } => "SetUseClaudeMdReference",
            Action::GenerateConstitution { .. } => "GenerateConstitution",
            Action::AppendConstitutionOutput { .. } => "AppendConstitutionOutput",
            Action::CompleteConstitution { .. } => "CompleteConstitution",
            Action::ConstitutionFailed { .. } => "ConstitutionFailed",
            Action::ResetConstitutionWorkflow { .. } => "ResetConstitutionWorkflow",
            Action::CreateChange { .. } => "CreateChange",
            Action::SetActiveChange { .. } => "SetActiveChange",
            Action::GenerateProposal { .. } => "GenerateProposal",
            Action::AppendChangeOutput { .. } => "AppendChangeOutput",
            Action::CompleteProposal { .. } => "CompleteProposal",
            Action::GeneratePlan { .. } => "GeneratePlan",
            Action::CompletePlan { .. } => "CompletePlan",
            Action::StartImplementation { .. } => "StartImplementation",
            Action::CompleteImplementation { .. } => "CompleteImplementation",
            Action::MarkChangeDone { .. } => "MarkChangeDone",
            Action::ArchiveChange { .. } => "ArchiveChange",
            Action::CancelChange { .. } => "CancelChange",
            Action::FailChange { .. } => "FailChange",
            Action::ChangeGenerationFailed { .. } => "ChangeGenerationFailed",
            Action::AddChangeContextFile { .. } => "AddChangeContextFile",
            Action::RemoveChangeContextFile { .. } => "RemoveChangeContextFile",
            Action::LinkReviewSession { .. } => "LinkReviewSession",
            Action::DeleteChange { .. } => "DeleteChange",
            Action::ClearChangesError { .. } => "ClearChangesError",
            Action::CreateReviewSession { .. } => "CreateReviewSession",
            Action::SetActiveReviewSession { .. } => "SetActiveReviewSession",
            Action::StartReview { .. } => "StartReview",
            Action::AddReviewComment { .. } => "AddReviewComment",
            Action::ResolveReviewComment { .. } => "ResolveReviewComment",
            Action::UnresolveReviewComment { .. } => "UnresolveReviewComment",
            Action::DeleteReviewComment { .. } => "DeleteReviewComment",
            Action::SubmitReviewFeedback { .. } => "SubmitReviewFeedback",
            Action::ReviseReviewContent { .. } => "ReviseReviewContent",
            Action::ApproveReview { .. } => "ApproveReview",
            Action::RejectReview { .. } => "RejectReview",
            Action::RemoveReviewSession { .. } => "RemoveReviewSession",
            Action::ClearReviewError => "ClearReviewError",
            Action::RefreshServices => "RefreshServices",
            Action::SetServices { .. } => "SetServices",
            Action::ServicesRefreshFailed { .. } => "ServicesRefreshFailed",
            Action::StartService { .. } => "StartService",
            Action::StopService { .. } => "StopService",
            Action::RestartService { .. } => "RestartService",
            Action::ServiceOperationFinished { .. } => "ServiceOperationFinished",
            Action::ServiceOperationFailed { .. } => "ServiceOperationFailed",
            Action::FetchServiceLogs { .. } => "FetchServiceLogs",
            Action::SetServiceLogs { .. } => "SetServiceLogs",
            Action::ServiceLogsFailed { .. } => "ServiceLogsFailed",
            Action::CancelServiceLogs { .. } => "CancelServiceLogs",
            Action::SetPortConflict { .. } => "SetPortConflict",
            Action::ResolvePortConflict { .. } => "ResolvePortConflict",
            Action::CancelPortConflict { .. } => "CancelPortConflict",
            Action::ClearPortOverride { .. } => "ClearPortOverride",
            Action::ClearDockersError => "ClearDockersError",
            Action::ExpandDirectory { .. } => "ExpandDirectory",
            Action::CollapseDirectory { .. } => "CollapseDirectory",
            Action::CollapseAll { .. } => "CollapseAll",
            Action::SetDirectoryCache { .. } => "SetDirectoryCache",
            Action::InvalidateDirectoryCache { .. } => "InvalidateDirectoryCache",
            Action::DirectoryLoadFailed { .. } => "DirectoryLoadFailed",
            Action::SelectPath { .. } => "SelectPath",
            Action::NavigateBack { .. } => "NavigateBack",
            Action::NavigateForward { .. } => "NavigateForward",
            Action::SetSortConfig { .. } => "SetSortConfig",
            Action::ClearExplorerError { .. } => "ClearExplorerError",
            Action::SpawnTerminal { .. } => "SpawnTerminal",
            Action::TerminalStarted { .. } => "TerminalStarted",
            Action::AppendTerminalOutput { .. } => "AppendTerminalOutput",
            Action::WriteTerminalInput { .. } => "WriteTerminalInput",
            Action::ResizeTerminal { .. } => "ResizeTerminal",
            Action::KillTerminal { .. } => "KillTerminal",
            Action::TerminalExited { .. } => "TerminalExited",
            Action::CloseTerminal { .. } => "CloseTerminal",
            Action::SetActiveTerminal { .. } => "SetActiveTerminal",
            Action::TerminalFailed { .. } => "TerminalFailed",
            Action::SendChatMessage { .. } => "SendChatMessage",
            Action::AppendChatStream { .. } => "AppendChatStream",
            Action::CompleteChatStream { .. } => "CompleteChatStream",
            Action::ChatFailed { .. } => "ChatFailed",
            Action::ClearChat { .. } => "ClearChat",
            Action::SetMcpServers { .. } => "SetMcpServers",
            Action::ToggleMcpServer { .. } => "ToggleMcpServer",
        }
    }

    /// Whether the session file should be rewritten after this action.
    /// Streaming appends, loading flags, polling results and selection are
    /// transient.
    pub fn is_persistent(&self) -> bool {
        !matches!(
            self,
            Action::ClearError
                | Action::AppendTaskOutput { .. }
                | Action::SetActiveCommand { .. }
                | Action::AppendConstitutionOutput { .. }
                | Action::AppendChangeOutput { .. }
                | Action::SetActiveChange { .. }
                | Action::SetActiveReviewSession { .. }
                | Action::ClearReviewError
                | Action::RefreshServices
                | Action::SetServices { .. }
                | Action::ServicesRefreshFailed { .. }
                | Action::FetchServiceLogs { .. }
                | Action::SetServiceLogs { .. }
                | Action::ServiceLogsFailed { .. }
                | Action::CancelServiceLogs { .. }
                | Action::ClearDockersError
                | Action::ExpandDirectory { .. }
                | Action::CollapseDirectory { .. }
                | Action::CollapseAll { .. }
                | Action::SetDirectoryCache { .. }
                | Action::InvalidateDirectoryCache { .. }
                | Action::DirectoryLoadFailed { .. }
                | Action::SelectPath { .. }
                | Action::NavigateBack { .. }
                | Action::NavigateForward { .. }
                | Action::ClearExplorerError { .. }
                | Action::AppendTerminalOutput { .. }
                | Action::WriteTerminalInput { .. }
                | Action::ResizeTerminal { .. }
                | Action::SetActiveTerminal { .. }
                | Action::AppendChatStream { .. }
                | Action::SetActiveView { .. }
        )
    }

    /// The explicit worktree id of a worktree-scoped action.
    pub fn worktree(&self) -> Option<&str> {
        match self {
            Action::SetCommands { worktree, .. }
            | Action::SetActiveCommand { worktree, .. }
            | Action::SetTaskStatus { worktree, .. }
            | Action::RunCommand { worktree, .. }
            | Action::StopCommand { worktree }
            | Action::AppendTaskOutput { worktree, .. }
            | Action::CommandFinished { worktree, .. }
            | Action::ClearTaskOutput { worktree }
            | Action::SetConstitutionExists { worktree, .. }
            | Action::SetTasksError { worktree, .. }
            | Action::ClearTasksError { worktree }
            | Action::StartConstitutionWorkflow { worktree, .. }
            | Action::AnswerConstitutionQuestion { worktree, .. }
            | Action::PreviousConstitutionQuestion { worktree }
            | Action::SetUseClaudeMdReference { worktree, .. }
            | Action::GenerateConstitution { worktree }
            | Action::AppendConstitutionOutput { worktree, .. }
            | Action::CompleteConstitution { worktree }
            | Action::ConstitutionFailed { worktree, .. }
            | Action::ResetConstitutionWorkflow { worktree }
            | Action::CreateChange { worktree, .. }
            | Action::SetActiveChange { worktree, .. }
            | Action::GenerateProposal { worktree, .. }
            | Action::AppendChangeOutput { worktree, .. }
            | Action::CompleteProposal { worktree, .. }
            | Action::GeneratePlan { worktree, .. }
            | Action::CompletePlan { worktree, .. }
            | Action::StartImplementation { worktree, .. }
            | Action::CompleteImplementation { worktree, .. }
            | Action::MarkChangeDone { worktree, .. }
            | Action::ArchiveChange { worktree, .. }
            | Action::CancelChange { worktree, .. }
            | Action::FailChange { worktree, .. }
            | Action::ChangeGenerationFailed { worktree, .. }
            | Action::AddChangeContextFile { worktree, .. }
            | Action::RemoveChangeContextFile { worktree, .. }
            | Action::LinkReviewSession { worktree, .. }
            | Action::DeleteChange { worktree, .. }
            | Action::ClearChangesError { worktree }
            | Action::ExpandDirectory { worktree, .. }
            | Action::CollapseDirectory { worktree, .. }
            | Action::CollapseAll { worktree }
            | Action::SetDirectoryCache { worktree, .. }
            | Action::InvalidateDirectoryCache { worktree, .. }
            | Action::DirectoryLoadFailed { worktree, .. }
            | Action::SelectPath { worktree, .. }
            | Action::NavigateBack { worktree }
            | Action::NavigateForward { worktree }
            | Action::SetSortConfig { worktree, .. }
            | Action::ClearExplorerError { worktree }
            | Action::SpawnTerminal { worktree, .. }
            | Action::TerminalStarted { worktree, .. }
            | Action::AppendTerminalOutput { worktree, .. }
            | Action::WriteTerminalInput { worktree, .. }
            | Action::ResizeTerminal { worktree, .. }
            | Action::KillTerminal { worktree, .. }
            | Action::TerminalExited { worktree, .. }
            | Action::CloseTerminal { worktree, .. }
            | Action::SetActiveTerminal { worktree, .. }
            | Action::TerminalFailed { worktree, .. }
            | Action::SendChatMessage { worktree, .. }
            | Action::AppendChatStream { worktree, .. }
            | Action::CompleteChatStream { worktree, .. }
            | Action::ChatFailed { worktree, .. }
            | Action::ClearChat { worktree }
            | Action::SetMcpServers { worktree, .. }
            | Action::ToggleMcpServer { worktree, .. } => worktree.as_deref(),
            _ => None,
        }
    }
}
