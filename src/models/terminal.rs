use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TerminalStatus {
    #[default]
    Starting,
    Running,
    Exited {
        code: Option<i32>,
    },
}

impl TerminalStatus {
    pub fn is_live(self) -> bool {
        !matches!(self, TerminalStatus::Exited { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSession {
    pub id: String,
    pub title: String,
    pub cols: u16,
    pub rows: u16,
    pub cwd: String,
    #[serde(default)]
    pub status: TerminalStatus,
    #[serde(default)]
    pub kill_requested: bool,
    /// Scrollback, trimmed from the front to `Settings::terminal_scrollback`.
    #[serde(default)]
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TerminalState {
    #[serde(default)]
    pub sessions: Vec<TerminalSession>,
    #[serde(default)]
    pub active_session_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TerminalState {
    pub fn get(&self, session_id: &str) -> Option<&TerminalSession> {
        self.sessions.iter().find(|s| s.id == session_id)
    }

    pub fn get_mut(&mut self, session_id: &str) -> Option<&mut TerminalSession> {
        self.sessions.iter_mut().find(|s| s.id == session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exited_status_carries_code() {
        let json = serde_json::to_value(TerminalStatus::Exited { code: Some(130) }).unwrap();
        assert_eq!(json["state"], "exited");
        assert_eq!(json["code"], 130);
        assert!(!TerminalStatus::Exited { code: None }.is_live());
        assert!(TerminalStatus::Running.is_live());
    }
}
