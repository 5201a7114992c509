use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::workflow::ConstitutionWorkflow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCommand {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TasksState {
    #[serde(default)]
    pub commands: Vec<TaskCommand>,
    #[serde(default)]
    pub task_statuses: BTreeMap<String, TaskStatus>,
    #[serde(default)]
    pub active_command: Option<String>,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub constitution_workflow: Option<ConstitutionWorkflow>,
    /// `None` until the filesystem has been checked.
    #[serde(default)]
    pub constitution_exists: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TasksState {
    pub fn command(&self, name: &str) -> Option<&TaskCommand> {
        self.commands.iter().find(|c| c.name == name)
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.command(name).is_some()
    }

    pub fn status_of(&self, name: &str) -> TaskStatus {
        self.task_statuses.get(name).copied().unwrap_or_default()
    }

    pub fn running_command(&self) -> Option<&str> {
        self.task_statuses
            .iter()
            .find(|(_, status)| **status == TaskStatus::Running)
            .map(|(name, _)| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_defaults_to_idle() {
        let tasks = TasksState::default();
        assert_eq!(tasks.status_of("build"), TaskStatus::Idle);
        assert!(tasks.running_command().is_none());
    }

    #[test]
    fn constitution_exists_is_tri_state() {
        let mut tasks = TasksState::default();
        let json = serde_json::to_value(&tasks).unwrap();
        assert!(json["constitution_exists"].is_null());

        tasks.constitution_exists = Some(false);
        let json = serde_json::to_string(&tasks).unwrap();
        let back: TasksState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.constitution_exists, Some(false));
    }
}
