//! Background job bodies. A job owns no state: it talks to one collaborator
//! and reports back by sending follow-up actions that name their worktree,
//! change or session explicitly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::mpsc;

use super::SchedulerError;
use crate::action::Action;
use crate::collaborators::{
    AiClient, CommandEvent, CommandRunner, PtyEvent, PtyInput, PtySession, PtySpawner,
};
use crate::explorer::DirectoryLister;
use crate::models::ServiceOperation;
use crate::services::ContainerManager;
use crate::workflow::GenerationKind;

pub(super) type Sink = mpsc::UnboundedSender<Action>;
pub(super) type JobResult = Result<(), SchedulerError>;

/// Lines of container output fetched per logs request.
pub const LOG_TAIL_LINES: usize = 500;

pub fn constitution_path(worktree_path: &str) -> PathBuf {
    Path::new(worktree_path)
        .join(".devdeck")
        .join("constitution.md")
}

fn emit(sink: &Sink, action: Action) -> JobResult {
    sink.send(action).map_err(|_| SchedulerError::Closed)
}

pub(super) async fn refresh_services(containers: Arc<dyn ContainerManager>, sink: Sink) -> JobResult {
    let action = match containers.list().await {
        Ok(services) => Action::SetServices { services },
        Err(e) => Action::ServicesRefreshFailed {
            error: e.to_string(),
        },
    };
    emit(&sink, action)
}

pub(super) struct ServiceJob {
    pub service_id: String,
    pub operation: ServiceOperation,
    pub port: Option<u16>,
    /// Container to stop before starting this one.
    pub stop_first: Option<String>,
}

pub(super) async fn service_operation(
    containers: Arc<dyn ContainerManager>,
    job: ServiceJob,
    sink: Sink,
) -> JobResult {
    if let Some(other) = &job.stop_first {
        if let Err(e) = containers.stop(other).await {
            emit(
                &sink,
                Action::ServiceOperationFailed {
                    service_id: other.clone(),
                    error: e.to_string(),
                },
            )?;
            return emit(
                &sink,
                Action::ServiceOperationFailed {
                    service_id: job.service_id,
                    error: format!("Could not free the port held by {other}"),
                },
            );
        }
        emit(
            &sink,
            Action::ServiceOperationFinished {
                service_id: other.clone(),
            },
        )?;
    }

    let result = match job.operation {
        ServiceOperation::Start => containers.start(&job.service_id, job.port).await,
        ServiceOperation::Stop => containers.stop(&job.service_id).await,
        ServiceOperation::Restart => containers.restart(&job.service_id).await,
    };
    let action = match result {
        Ok(()) => Action::ServiceOperationFinished {
            service_id: job.service_id,
        },
        Err(e) => Action::ServiceOperationFailed {
            service_id: job.service_id,
            error: e.to_string(),
        },
    };
    emit(&sink, action)?;
    emit(&sink, Action::RefreshServices)
}

pub(super) async fn fetch_logs(
    containers: Arc<dyn ContainerManager>,
    service_id: String,
    sink: Sink,
) -> JobResult {
    let action = match containers.logs(&service_id, LOG_TAIL_LINES).await {
        Ok(content) => Action::SetServiceLogs {
            service_id,
            content,
            timestamp: Utc::now(),
        },
        Err(e) => Action::ServiceLogsFailed {
            service_id,
            error: e.to_string(),
        },
    };
    emit(&sink, action)
}

pub(super) struct CommandJob {
    pub worktree: String,
    pub name: String,
    pub command: String,
    pub cwd: String,
    pub env: BTreeMap<String, String>,
    /// Dotenv file merged under `env`.
    pub env_file: Option<PathBuf>,
}

/// Reads `KEY=VALUE` lines; blank lines, comments and malformed lines are
/// skipped and surrounding quotes are stripped.
pub(super) fn parse_env_file(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

pub(super) async fn run_command(
    runner: Arc<dyn CommandRunner>,
    job: CommandJob,
    sink: Sink,
) -> JobResult {
    let finished = |exit_code: Option<i32>, error: Option<String>| Action::CommandFinished {
        worktree: Some(job.worktree.clone()),
        name: job.name.clone(),
        exit_code,
        error,
    };

    let mut env = BTreeMap::new();
    if let Some(path) = &job.env_file {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => env.extend(parse_env_file(&content)),
            Err(e) => tracing::warn!("Skipping env file {}: {}", path.display(), e),
        }
    }
    env.extend(job.env.clone());

    let mut stream = match runner.run(&job.command, &job.cwd, &env).await {
        Ok(stream) => stream,
        Err(e) => return emit(&sink, finished(None, Some(e.to_string()))),
    };
    while let Some(event) = stream.next().await {
        match event {
            Ok(CommandEvent::Output(chunk)) => emit(
                &sink,
                Action::AppendTaskOutput {
                    worktree: Some(job.worktree.clone()),
                    chunk,
                },
            )?,
            Ok(CommandEvent::Exited { code }) => return emit(&sink, finished(code, None)),
            Err(e) => return emit(&sink, finished(None, Some(e.to_string()))),
        }
    }
    emit(
        &sink,
        finished(None, Some("Command ended without an exit status".to_string())),
    )
}

/// Forwards every chunk through `on_chunk` and returns the whole reply, or
/// the error message if the stream failed or produced nothing.
async fn stream_reply(
    ai: Arc<dyn AiClient>,
    prompt: String,
    cwd: &str,
    sink: &Sink,
    on_chunk: impl Fn(String) -> Action,
) -> Result<Result<String, String>, SchedulerError> {
    let mut stream = match ai.stream(prompt, cwd).await {
        Ok(stream) => stream,
        Err(e) => return Ok(Err(e.to_string())),
    };
    let mut reply = String::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => {
                reply.push_str(&chunk);
                emit(sink, on_chunk(chunk))?;
            }
            Err(e) => return Ok(Err(e.to_string())),
        }
    }
    if reply.trim().is_empty() {
        return Ok(Err("The assistant returned an empty reply".to_string()));
    }
    Ok(Ok(reply))
}

pub(super) struct GenerationJob {
    pub worktree: String,
    pub cwd: String,
    pub change_id: String,
    pub kind: GenerationKind,
    pub prompt: String,
}

pub(super) async fn generate_change(ai: Arc<dyn AiClient>, job: GenerationJob, sink: Sink) -> JobResult {
    let worktree = Some(job.worktree.clone());
    let change_id = job.change_id.clone();
    let reply = stream_reply(ai, job.prompt, &job.cwd, &sink, |chunk| {
        Action::AppendChangeOutput {
            worktree: worktree.clone(),
            change_id: change_id.clone(),
            chunk,
        }
    })
    .await?;

    let timestamp = Utc::now();
    let worktree = Some(job.worktree);
    let change_id = job.change_id;
    let action = match (reply, job.kind) {
        (Ok(_), GenerationKind::Proposal) => Action::CompleteProposal {
            worktree,
            change_id,
            timestamp,
        },
        (Ok(_), GenerationKind::Plan) => Action::CompletePlan {
            worktree,
            change_id,
            timestamp,
        },
        (Ok(_), GenerationKind::Implementation) => Action::CompleteImplementation {
            worktree,
            change_id,
            timestamp,
        },
        (Err(error), _) => Action::ChangeGenerationFailed {
            worktree,
            change_id,
            error,
            timestamp,
        },
    };
    emit(&sink, action)
}

pub(super) struct ConstitutionJob {
    pub worktree: String,
    pub cwd: String,
    pub prompt: String,
}

/// Streams the constitution and writes it under the worktree before the
/// workflow is marked complete.
pub(super) async fn generate_constitution(
    ai: Arc<dyn AiClient>,
    job: ConstitutionJob,
    sink: Sink,
) -> JobResult {
    let worktree = Some(job.worktree.clone());
    let reply = stream_reply(ai, job.prompt, &job.cwd, &sink, |chunk| {
        Action::AppendConstitutionOutput {
            worktree: worktree.clone(),
            chunk,
        }
    })
    .await?;

    let written = match reply {
        Ok(text) => write_constitution(&job.cwd, &text).await,
        Err(error) => Err(error),
    };
    let action = match written {
        Ok(path) => {
            tracing::info!("Wrote constitution to {}", path.display());
            Action::CompleteConstitution {
                worktree: Some(job.worktree),
            }
        }
        Err(error) => Action::ConstitutionFailed {
            worktree: Some(job.worktree),
            error,
        },
    };
    emit(&sink, action)
}

async fn write_constitution(cwd: &str, text: &str) -> Result<PathBuf, String> {
    let path = constitution_path(cwd);
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| format!("Failed to create {}: {}", dir.display(), e))?;
    }
    tokio::fs::write(&path, text)
        .await
        .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
    Ok(path)
}

pub(super) async fn check_constitution(worktree: String, cwd: String, sink: Sink) -> JobResult {
    let exists = tokio::fs::try_exists(constitution_path(&cwd))
        .await
        .unwrap_or(false);
    emit(
        &sink,
        Action::SetConstitutionExists {
            worktree: Some(worktree),
            exists,
        },
    )
}

pub(super) struct ChatJob {
    pub worktree: String,
    pub cwd: String,
    pub prompt: String,
}

pub(super) async fn chat_reply(ai: Arc<dyn AiClient>, job: ChatJob, sink: Sink) -> JobResult {
    let worktree = Some(job.worktree.clone());
    let reply = stream_reply(ai, job.prompt, &job.cwd, &sink, |chunk| {
        Action::AppendChatStream {
            worktree: worktree.clone(),
            chunk,
        }
    })
    .await?;
    let action = match reply {
        Ok(_) => Action::CompleteChatStream {
            worktree: Some(job.worktree),
            timestamp: Utc::now(),
        },
        Err(error) => Action::ChatFailed {
            worktree: Some(job.worktree),
            error,
        },
    };
    emit(&sink, action)
}

pub(super) async fn list_directory(
    lister: Arc<dyn DirectoryLister>,
    worktree: String,
    path: String,
    sink: Sink,
) -> JobResult {
    let action = match lister.list(&path).await {
        Ok(entries) => Action::SetDirectoryCache {
            worktree: Some(worktree),
            path,
            entries,
        },
        Err(e) => Action::DirectoryLoadFailed {
            worktree: Some(worktree),
            path,
            error: e.to_string(),
        },
    };
    emit(&sink, action)
}

pub(super) struct TerminalJob {
    pub worktree: String,
    pub session_id: String,
    pub cols: u16,
    pub rows: u16,
    pub cwd: String,
}

/// Runs one terminal until it exits, relaying input from the scheduler.
pub(super) async fn run_terminal(
    pty: Arc<dyn PtySpawner>,
    job: TerminalJob,
    mut input: mpsc::UnboundedReceiver<PtyInput>,
    sink: Sink,
) -> JobResult {
    let worktree = Some(job.worktree);
    let session_id = job.session_id;
    let PtySession {
        mut events,
        input: pty_input,
    } = match pty.spawn(job.cols, job.rows, &job.cwd).await {
        Ok(session) => session,
        Err(e) => {
            return emit(
                &sink,
                Action::TerminalFailed {
                    worktree,
                    session_id,
                    error: e.to_string(),
                },
            )
        }
    };
    emit(
        &sink,
        Action::TerminalStarted {
            worktree: worktree.clone(),
            session_id: session_id.clone(),
        },
    )?;

    loop {
        tokio::select! {
            event = events.next() => {
                let action = match event {
                    Some(Ok(PtyEvent::Output(chunk))) => Action::AppendTerminalOutput {
                        worktree: worktree.clone(),
                        session_id: session_id.clone(),
                        chunk,
                    },
                    Some(Ok(PtyEvent::Exited { code })) => {
                        return emit(&sink, Action::TerminalExited { worktree, session_id, code });
                    }
                    Some(Err(e)) => {
                        return emit(&sink, Action::TerminalFailed {
                            worktree,
                            session_id,
                            error: e.to_string(),
                        });
                    }
                    None => {
                        return emit(&sink, Action::TerminalExited { worktree, session_id, code: None });
                    }
                };
                emit(&sink, action)?;
            }
            Some(data) = input.recv() => {
                if pty_input.send(data).is_err() {
                    tracing::debug!("Terminal {} stopped reading input", session_id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_file_lines_are_parsed() {
        let env = parse_env_file(
            "# comment\n\nexport A=1\nB = \"two words\"\nC='x'\nnot a pair\n=empty\n",
        );
        assert_eq!(env.len(), 3);
        assert_eq!(env["A"], "1");
        assert_eq!(env["B"], "two words");
        assert_eq!(env["C"], "x");
    }

    #[test]
    fn constitution_lives_under_devdeck_dir() {
        assert_eq!(
            constitution_path("/work/app"),
            PathBuf::from("/work/app/.devdeck/constitution.md")
        );
    }

    #[tokio::test]
    async fn constitution_check_reports_presence() {
        let dir = tempfile::TempDir::new().unwrap();
        let cwd = dir.path().to_string_lossy().to_string();
        let (tx, mut rx) = mpsc::unbounded_channel();

        check_constitution("w".to_string(), cwd.clone(), tx.clone())
            .await
            .unwrap();
        assert!(matches!(
            rx.recv().await,
            Some(Action::SetConstitutionExists { exists: false, .. })
        ));

        write_constitution(&cwd, "# Rules").await.unwrap();
        check_constitution("w".to_string(), cwd, tx).await.unwrap();
        assert!(matches!(
            rx.recv().await,
            Some(Action::SetConstitutionExists { exists: true, .. })
        ));
    }
}
