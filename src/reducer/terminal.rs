use super::Outcome;
use crate::models::{TerminalSession, TerminalState, TerminalStatus};
use crate::utils::keep_tail;

fn session<'a>(
    terminal: &'a mut TerminalState,
    session_id: &str,
) -> Result<&'a mut TerminalSession, String> {
    terminal
        .get_mut(session_id)
        .ok_or_else(|| format!("Unknown terminal: {session_id}"))
}

pub(super) struct SpawnRequest<'a> {
    pub session_id: &'a str,
    pub title: Option<&'a str>,
    pub cols: u16,
    pub rows: u16,
    pub cwd: &'a str,
}

pub(super) fn spawn(terminal: &mut TerminalState, req: SpawnRequest<'_>) -> Outcome {
    if req.session_id.trim().is_empty() {
        return Err("Terminal id is required".to_string());
    }
    if terminal.get(req.session_id).is_some() {
        return Err(format!("Terminal {} already exists", req.session_id));
    }
    if req.cols == 0 || req.rows == 0 {
        return Err("Terminal size must be non-zero".to_string());
    }
    let title = req
        .title
        .map(str::to_string)
        .unwrap_or_else(|| format!("Terminal {}", terminal.sessions.len() + 1));
    terminal.sessions.push(TerminalSession {
        id: req.session_id.to_string(),
        title,
        cols: req.cols,
        rows: req.rows,
        cwd: req.cwd.to_string(),
        status: TerminalStatus::Starting,
        kill_requested: false,
        output: String::new(),
    });
    terminal.active_session_id = Some(req.session_id.to_string());
    Ok(())
}

pub(super) fn started(terminal: &mut TerminalState, session_id: &str) {
    if let Some(s) = terminal.get_mut(session_id) {
        if s.status == TerminalStatus::Starting {
            s.status = TerminalStatus::Running;
        }
    }
}

/// Output for closed or exited sessions is dropped.
pub(super) fn append_output(
    terminal: &mut TerminalState,
    session_id: &str,
    chunk: &str,
    scrollback: usize,
) {
    if let Some(s) = terminal.get_mut(session_id) {
        if s.status.is_live() {
            s.output.push_str(chunk);
            keep_tail(&mut s.output, scrollback);
        }
    }
}

/// Input is forwarded by the scheduler; state only checks the target is live.
pub(super) fn write_input(terminal: &mut TerminalState, session_id: &str) -> Outcome {
    let s = session(terminal, session_id)?;
    if !s.status.is_live() {
        return Err(format!("{} has exited", s.title));
    }
    Ok(())
}

pub(super) fn resize(terminal: &mut TerminalState, session_id: &str, cols: u16, rows: u16) -> Outcome {
    if cols == 0 || rows == 0 {
        return Err("Terminal size must be non-zero".to_string());
    }
    let s = session(terminal, session_id)?;
    s.cols = cols;
    s.rows = rows;
    Ok(())
}

pub(super) fn kill(terminal: &mut TerminalState, session_id: &str) -> Outcome {
    let s = session(terminal, session_id)?;
    if s.status.is_live() {
        s.kill_requested = true;
    }
    Ok(())
}

pub(super) fn exited(terminal: &mut TerminalState, session_id: &str, code: Option<i32>) {
    if let Some(s) = terminal.get_mut(session_id) {
        if s.status.is_live() {
            s.status = TerminalStatus::Exited { code };
        }
    }
}

pub(super) fn close(terminal: &mut TerminalState, session_id: &str) -> Outcome {
    let index = terminal
        .sessions
        .iter()
        .position(|s| s.id == session_id)
        .ok_or_else(|| format!("Unknown terminal: {session_id}"))?;
    terminal.sessions.remove(index);
    if terminal.active_session_id.as_deref() == Some(session_id) {
        terminal.active_session_id = terminal
            .sessions
            .get(index.min(terminal.sessions.len().saturating_sub(1)))
            .map(|s| s.id.clone());
    }
    Ok(())
}

pub(super) fn set_active(terminal: &mut TerminalState, session_id: Option<&str>) -> Outcome {
    if let Some(id) = session_id {
        session(terminal, id)?;
    }
    terminal.active_session_id = session_id.map(str::to_string);
    Ok(())
}

pub(super) fn failed(terminal: &mut TerminalState, session_id: &str, error: &str) -> Outcome {
    exited(terminal, session_id, None);
    Err(format!("Terminal {session_id} failed: {error}"))
}
