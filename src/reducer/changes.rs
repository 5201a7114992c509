use chrono::{DateTime, Utc};

use super::Outcome;
use crate::models::{ChangesState, ReviewState};
use crate::workflow::{Change, WorkflowError};

fn change<'a>(changes: &'a mut ChangesState, change_id: &str) -> Result<&'a mut Change, String> {
    changes
        .get_mut(change_id)
        .ok_or_else(|| format!("Unknown change: {change_id}"))
}

/// Runs one workflow step against a change, mapping the machine's error.
pub(super) fn step(
    changes: &mut ChangesState,
    change_id: &str,
    f: impl FnOnce(&mut Change) -> Result<(), WorkflowError>,
) -> Outcome {
    f(change(changes, change_id)?).map_err(|e| e.to_string())
}

pub(super) fn create(
    changes: &mut ChangesState,
    id: &str,
    name: &str,
    intent: &str,
    now: DateTime<Utc>,
) -> Outcome {
    if id.trim().is_empty() || name.trim().is_empty() {
        return Err("A change needs an id and a name".to_string());
    }
    if changes.get(id).is_some() {
        return Err(format!("Change {id} already exists"));
    }
    changes.changes.push(Change::new(
        id.to_string(),
        name.trim().to_string(),
        intent.to_string(),
        now,
    ));
    changes.active_change_id = Some(id.to_string());
    Ok(())
}

pub(super) fn set_active(changes: &mut ChangesState, change_id: Option<&str>) -> Outcome {
    if let Some(id) = change_id {
        if changes.get(id).is_none() {
            return Err(format!("Unknown change: {id}"));
        }
    }
    changes.active_change_id = change_id.map(str::to_string);
    Ok(())
}

/// Chunks for a change with no stream in flight are dropped.
pub(super) fn append_output(changes: &mut ChangesState, change_id: &str, chunk: &str) {
    if let Some(change) = changes.get_mut(change_id) {
        let _ = change.append_output(chunk);
    }
}

/// Stream failures that arrive after a cancel are dropped.
pub(super) fn generation_failed(
    changes: &mut ChangesState,
    change_id: &str,
    error: &str,
    now: DateTime<Utc>,
) -> Outcome {
    let change = change(changes, change_id)?;
    if !change.is_generating() {
        return Ok(());
    }
    change
        .generation_failed(error, now)
        .map_err(|e| e.to_string())?;
    Err(format!("{} failed: {error}", change.name))
}

pub(super) fn add_context_file(changes: &mut ChangesState, change_id: &str, path: &str) -> Outcome {
    if path.trim().is_empty() {
        return Err("Context file path is empty".to_string());
    }
    change(changes, change_id)?.add_context_file(path);
    Ok(())
}

pub(super) fn remove_context_file(
    changes: &mut ChangesState,
    change_id: &str,
    path: &str,
) -> Outcome {
    if change(changes, change_id)?.remove_context_file(path) {
        Ok(())
    } else {
        Err(format!("{path} is not attached to change {change_id}"))
    }
}

pub(super) fn link_review(
    changes: &mut ChangesState,
    review: &ReviewState,
    change_id: &str,
    session_id: &str,
) -> Outcome {
    let session = review
        .get(session_id)
        .ok_or_else(|| format!("Unknown review session: {session_id}"))?;
    change(changes, change_id)?.link_review(session.content.kind, session_id.to_string());
    Ok(())
}

pub(super) fn delete(changes: &mut ChangesState, change_id: &str) -> Outcome {
    let before = changes.changes.len();
    changes.changes.retain(|c| c.id != change_id);
    if before == changes.changes.len() {
        return Err(format!("Unknown change: {change_id}"));
    }
    if changes.active_change_id.as_deref() == Some(change_id) {
        changes.active_change_id = None;
    }
    Ok(())
}
