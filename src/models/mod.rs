mod app;
mod changes;
mod chat;
mod docker;
mod explorer;
mod mcp;
mod notification;
mod project;
mod review;
mod settings;
mod tasks;
mod terminal;

pub use app::{AppState, View, STATE_VERSION};
pub use changes::ChangesState;
pub use chat::{ChatMessage, ChatRole, ChatState};
pub use docker::{
    ConflictResolution, ConflictingContainer, DockersState, PortConflict, ServiceInfo,
    ServiceLogs, ServiceOperation, ServiceStatus,
};
pub use explorer::{
    EntryKind, ExplorerState, FileEntry, GitStatus, SortConfig, SortDirection, SortField,
};
pub use mcp::{McpServer, McpState};
pub use notification::{Notification, NotificationLevel};
pub use project::{AgentRulesConfig, EnvConfig, ProjectState, WorktreeState};
pub use review::ReviewState;
pub use settings::{Settings, MAX_POLL_INTERVAL_MS, MIN_POLL_INTERVAL_MS};
pub use tasks::{TaskCommand, TaskStatus, TasksState};
pub use terminal::{TerminalSession, TerminalState, TerminalStatus};
