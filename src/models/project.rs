use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ChangesState, ChatState, ExplorerState, McpState, TasksState, TerminalState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EnvConfig {
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub env_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AgentRulesConfig {
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub use_claude_md: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectState {
    pub id: String,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub worktrees: Vec<WorktreeState>,
    #[serde(default)]
    pub active_worktree_index: usize,
    #[serde(default)]
    pub env_config: EnvConfig,
    #[serde(default)]
    pub agent_rules_config: AgentRulesConfig,
}

impl ProjectState {
    /// Creates a project together with its main worktree (`<id>-main`).
    pub fn new(id: String, name: String, path: String, main_branch: String) -> Self {
        let main = WorktreeState::new(format!("{id}-main"), path.clone(), main_branch, true);
        Self {
            id,
            name,
            path,
            worktrees: vec![main],
            active_worktree_index: 0,
            env_config: EnvConfig::default(),
            agent_rules_config: AgentRulesConfig::default(),
        }
    }

    pub fn active_worktree(&self) -> Option<&WorktreeState> {
        self.worktrees.get(self.active_worktree_index)
    }

    pub fn main_worktree(&self) -> Option<&WorktreeState> {
        self.worktrees.iter().find(|w| w.is_main)
    }

    pub fn worktree_index(&self, worktree_id: &str) -> Option<usize> {
        self.worktrees.iter().position(|w| w.id == worktree_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorktreeState {
    pub id: String,
    pub path: String,
    pub branch: String,
    #[serde(default)]
    pub is_main: bool,
    #[serde(default)]
    pub tasks: TasksState,
    #[serde(default)]
    pub changes: ChangesState,
    #[serde(default)]
    pub mcp: McpState,
    #[serde(default)]
    pub chat: ChatState,
    #[serde(default)]
    pub terminal: TerminalState,
    #[serde(default)]
    pub explorer: ExplorerState,
}

impl WorktreeState {
    pub fn new(id: String, path: String, branch: String, is_main: bool) -> Self {
        let explorer = ExplorerState::new(&path);
        Self {
            id,
            path,
            branch,
            is_main,
            tasks: TasksState::default(),
            changes: ChangesState::default(),
            mcp: McpState::default(),
            chat: ChatState::default(),
            terminal: TerminalState::default(),
            explorer,
        }
    }
}
