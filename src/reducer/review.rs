use chrono::{DateTime, Utc};

use super::Outcome;
use crate::models::{AppState, ReviewState};
use crate::workflow::{ReviewContent, ReviewSession, WorkflowError};

pub(super) fn step(
    review: &mut ReviewState,
    session_id: &str,
    f: impl FnOnce(&mut ReviewSession) -> Result<(), WorkflowError>,
) -> Outcome {
    let session = review
        .get_mut(session_id)
        .ok_or_else(|| format!("Unknown review session: {session_id}"))?;
    f(session).map_err(|e| e.to_string())
}

pub(super) fn create(
    review: &mut ReviewState,
    id: &str,
    content: &ReviewContent,
    now: DateTime<Utc>,
) -> Outcome {
    if id.trim().is_empty() {
        return Err("Review session id is required".to_string());
    }
    if review.contains(id) {
        return Err(format!("Review session {id} already exists"));
    }
    review
        .sessions
        .push(ReviewSession::new(id.to_string(), content.clone(), now));
    if review.active_session_id.is_none() {
        review.active_session_id = Some(id.to_string());
    }
    Ok(())
}

pub(super) fn set_active(review: &mut ReviewState, session_id: Option<&str>) -> Outcome {
    if let Some(id) = session_id {
        if !review.contains(id) {
            return Err(format!("Unknown review session: {id}"));
        }
    }
    review.active_session_id = session_id.map(str::to_string);
    Ok(())
}

/// Removes a session and every change's link to it.
pub(super) fn remove(state: &mut AppState, session_id: &str) -> Outcome {
    let before = state.review.sessions.len();
    state.review.sessions.retain(|s| s.id != session_id);
    if before == state.review.sessions.len() {
        return Err(format!("Unknown review session: {session_id}"));
    }
    if state.review.active_session_id.as_deref() == Some(session_id) {
        state.review.active_session_id = None;
    }
    for worktree in state.worktrees_mut() {
        for change in &mut worktree.changes.changes {
            for link in change.review_ids_mut() {
                if link.as_deref() == Some(session_id) {
                    *link = None;
                }
            }
        }
    }
    Ok(())
}
