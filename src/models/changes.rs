use serde::{Deserialize, Serialize};

use crate::workflow::Change;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChangesState {
    #[serde(default)]
    pub changes: Vec<Change>,
    #[serde(default)]
    pub active_change_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ChangesState {
    pub fn get(&self, change_id: &str) -> Option<&Change> {
        self.changes.iter().find(|c| c.id == change_id)
    }

    pub fn get_mut(&mut self, change_id: &str) -> Option<&mut Change> {
        self.changes.iter_mut().find(|c| c.id == change_id)
    }
}
