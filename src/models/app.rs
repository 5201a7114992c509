use serde::{Deserialize, Serialize};

use super::{DockersState, Notification, ProjectState, ReviewState, Settings, WorktreeState};

/// Schema version written to every session file.
pub const STATE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum View {
    #[default]
    Tasks,
    Changes,
    Review,
    Dockers,
    Explorer,
    Terminal,
    Chat,
    Settings,
}

/// Root of the state tree. Everything the UI shows is derived from here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub projects: Vec<ProjectState>,
    #[serde(default)]
    pub active_project_index: usize,
    #[serde(default)]
    pub docker: DockersState,
    #[serde(default)]
    pub review: ReviewState,
    #[serde(default)]
    pub notifications: Vec<Notification>,
    #[serde(default)]
    pub active_view: View,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub error: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            projects: Vec::new(),
            active_project_index: 0,
            docker: DockersState::default(),
            review: ReviewState::default(),
            notifications: Vec::new(),
            active_view: View::default(),
            settings: Settings::default(),
            error: None,
        }
    }
}

impl AppState {
    pub fn active_project(&self) -> Option<&ProjectState> {
        self.projects.get(self.active_project_index)
    }

    pub fn project(&self, project_id: &str) -> Option<&ProjectState> {
        self.projects.iter().find(|p| p.id == project_id)
    }

    pub fn project_mut(&mut self, project_id: &str) -> Option<&mut ProjectState> {
        self.projects.iter_mut().find(|p| p.id == project_id)
    }

    /// Locates a worktree by walking down from the project list.
    pub fn locate_worktree(&self, worktree_id: &str) -> Option<(usize, usize)> {
        self.projects.iter().enumerate().find_map(|(pi, project)| {
            project
                .worktrees
                .iter()
                .position(|w| w.id == worktree_id)
                .map(|wi| (pi, wi))
        })
    }

    /// Resolves an optional worktree id; `None` means the active worktree of
    /// the active project.
    pub fn resolve_worktree(&self, target: Option<&str>) -> Option<&WorktreeState> {
        match target {
            Some(id) => self
                .locate_worktree(id)
                .map(|(pi, wi)| &self.projects[pi].worktrees[wi]),
            None => self.active_project().and_then(|p| p.active_worktree()),
        }
    }

    pub fn resolve_worktree_mut(&mut self, target: Option<&str>) -> Option<&mut WorktreeState> {
        let (pi, wi) = match target {
            Some(id) => self.locate_worktree(id)?,
            None => {
                let project = self.projects.get(self.active_project_index)?;
                if project.worktrees.is_empty() {
                    return None;
                }
                (self.active_project_index, project.active_worktree_index)
            }
        };
        self.projects.get_mut(pi)?.worktrees.get_mut(wi)
    }

    pub fn worktrees(&self) -> impl Iterator<Item = &WorktreeState> {
        self.projects.iter().flat_map(|p| p.worktrees.iter())
    }

    pub fn worktrees_mut(&mut self) -> impl Iterator<Item = &mut WorktreeState> {
        self.projects.iter_mut().flat_map(|p| p.worktrees.iter_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_two_projects() -> AppState {
        let mut state = AppState::default();
        let mut a = ProjectState::new("a".into(), "alpha".into(), "/a".into(), "main".into());
        a.worktrees.push(WorktreeState::new(
            "a-feat".into(),
            "/a/.worktrees/feat".into(),
            "feat".into(),
            false,
        ));
        a.active_worktree_index = 1;
        let b = ProjectState::new("b".into(), "beta".into(), "/b".into(), "main".into());
        state.projects = vec![a, b];
        state
    }

    #[test]
    fn default_state_carries_current_version() {
        let state = AppState::default();
        assert_eq!(state.version, STATE_VERSION);
        assert!(state.projects.is_empty());
        assert_eq!(state.active_project_index, 0);
    }

    #[test]
    fn resolve_worktree_defaults_to_active() {
        let state = state_with_two_projects();
        let wt = state.resolve_worktree(None).unwrap();
        assert_eq!(wt.id, "a-feat");

        let wt = state.resolve_worktree(Some("b-main")).unwrap();
        assert_eq!(wt.path, "/b");
    }

    #[test]
    fn resolve_worktree_unknown_is_none() {
        let state = state_with_two_projects();
        assert!(state.resolve_worktree(Some("nope")).is_none());
        assert!(AppState::default().resolve_worktree(None).is_none());
    }

    #[test]
    fn locate_worktree_walks_down_from_projects() {
        let state = state_with_two_projects();
        assert_eq!(state.locate_worktree("a-feat"), Some((0, 1)));
        assert_eq!(state.locate_worktree("b-main"), Some((1, 0)));
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let state: AppState = serde_json::from_str(r#"{"version": 1}"#).unwrap();
        assert_eq!(state, AppState::default());
    }
}
