use serde::{Deserialize, Serialize};

use crate::workflow::ReviewSession;

/// Registry of review sessions. Changes refer to sessions by id only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ReviewState {
    #[serde(default)]
    pub sessions: Vec<ReviewSession>,
    #[serde(default)]
    pub active_session_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ReviewState {
    pub fn get(&self, session_id: &str) -> Option<&ReviewSession> {
        self.sessions.iter().find(|s| s.id == session_id)
    }

    pub fn get_mut(&mut self, session_id: &str) -> Option<&mut ReviewSession> {
        self.sessions.iter_mut().find(|s| s.id == session_id)
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.get(session_id).is_some()
    }
}
