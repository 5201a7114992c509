use super::Outcome;
use crate::models::{
    AgentRulesConfig, AppState, EnvConfig, ProjectState, Settings, WorktreeState,
};
use crate::utils::{keep_tail, normalize_path};

pub(super) fn add_project(
    state: &mut AppState,
    id: &str,
    name: &str,
    path: &str,
    main_branch: &str,
) -> Outcome {
    let path = normalize_path(path);
    if id.trim().is_empty() || path.is_empty() {
        return Err("Project id and path are required".to_string());
    }
    if state.project(id).is_some() {
        return Err(format!("Project {id} already exists"));
    }
    if state.projects.iter().any(|p| p.path == path) {
        return Err(format!("A project is already open at {path}"));
    }
    let main_id = format!("{id}-main");
    if state.locate_worktree(&main_id).is_some() {
        return Err(format!("Worktree {main_id} already exists"));
    }
    state.projects.push(ProjectState::new(
        id.to_string(),
        name.to_string(),
        path,
        main_branch.to_string(),
    ));
    state.active_project_index = state.projects.len() - 1;
    Ok(())
}

/// Index to keep after removing `removed` from a list of `len_after` items.
fn index_after_removal(active: usize, removed: usize, len_after: usize) -> usize {
    if len_after == 0 {
        0
    } else if removed < active {
        active - 1
    } else {
        active.min(len_after - 1)
    }
}

pub(super) fn remove_project(state: &mut AppState, id: &str) -> Outcome {
    let index = state
        .projects
        .iter()
        .position(|p| p.id == id)
        .ok_or_else(|| format!("Unknown project: {id}"))?;
    state.projects.remove(index);
    state.active_project_index =
        index_after_removal(state.active_project_index, index, state.projects.len());
    Ok(())
}

pub(super) fn set_active_project(state: &mut AppState, id: &str) -> Outcome {
    let index = state
        .projects
        .iter()
        .position(|p| p.id == id)
        .ok_or_else(|| format!("Unknown project: {id}"))?;
    state.active_project_index = index;
    Ok(())
}

pub(super) fn add_worktree(
    state: &mut AppState,
    project_id: &str,
    id: &str,
    path: &str,
    branch: &str,
) -> Outcome {
    if id.trim().is_empty() {
        return Err("Worktree id is required".to_string());
    }
    if state.locate_worktree(id).is_some() {
        return Err(format!("Worktree {id} already exists"));
    }
    let project = state
        .project_mut(project_id)
        .ok_or_else(|| format!("Unknown project: {project_id}"))?;
    project.worktrees.push(WorktreeState::new(
        id.to_string(),
        normalize_path(path),
        branch.to_string(),
        false,
    ));
    Ok(())
}

pub(super) fn remove_worktree(state: &mut AppState, project_id: &str, id: &str) -> Outcome {
    let project = state
        .project_mut(project_id)
        .ok_or_else(|| format!("Unknown project: {project_id}"))?;
    let index = project
        .worktree_index(id)
        .ok_or_else(|| format!("Unknown worktree: {id}"))?;
    if project.worktrees[index].is_main {
        return Err("The main worktree cannot be removed".to_string());
    }
    project.worktrees.remove(index);
    project.active_worktree_index =
        index_after_removal(project.active_worktree_index, index, project.worktrees.len());
    Ok(())
}

pub(super) fn set_active_worktree(state: &mut AppState, project_id: &str, id: &str) -> Outcome {
    let project = state
        .project_mut(project_id)
        .ok_or_else(|| format!("Unknown project: {project_id}"))?;
    let index = project
        .worktree_index(id)
        .ok_or_else(|| format!("Unknown worktree: {id}"))?;
    project.active_worktree_index = index;
    Ok(())
}

pub(super) fn set_env_config(state: &mut AppState, project_id: &str, env: &EnvConfig) -> Outcome {
    let project = state
        .project_mut(project_id)
        .ok_or_else(|| format!("Unknown project: {project_id}"))?;
    project.env_config = env.clone();
    Ok(())
}

pub(super) fn set_agent_rules_config(
    state: &mut AppState,
    project_id: &str,
    rules: &AgentRulesConfig,
) -> Outcome {
    let project = state
        .project_mut(project_id)
        .ok_or_else(|| format!("Unknown project: {project_id}"))?;
    project.agent_rules_config = rules.clone();
    Ok(())
}

/// Replaces settings. Changing the question list is refused while any
/// worktree has a constitution workflow that depends on the old list.
pub(super) fn update_settings(state: &mut AppState, settings: &Settings) -> Outcome {
    if settings.constitution_questions != state.settings.constitution_questions {
        let new_count = settings.question_count();
        let blocked = state.worktrees().any(|w| {
            w.tasks.constitution_workflow.as_ref().is_some_and(|wf| {
                wf.status.is_active() || wf.current_question > new_count
            })
        });
        if blocked {
            return Err(
                "Finish or reset the constitution workflow before changing its questions"
                    .to_string(),
            );
        }
    }

    state.settings = settings.clone();

    let max = state.settings.max_notifications;
    if state.notifications.len() > max {
        let excess = state.notifications.len() - max;
        state.notifications.drain(..excess);
    }
    let scrollback = state.settings.terminal_scrollback;
    for worktree in state.worktrees_mut() {
        for session in &mut worktree.terminal.sessions {
            keep_tail(&mut session.output, scrollback);
        }
    }
    Ok(())
}
