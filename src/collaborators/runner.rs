use std::collections::BTreeMap;
use std::process::Stdio;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use super::{CollaboratorError, CollaboratorResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEvent {
    /// One line of combined stdout/stderr, newline included.
    Output(String),
    Exited { code: Option<i32> },
}

pub type CommandStream = BoxStream<'static, CollaboratorResult<CommandEvent>>;

#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        command: &str,
        cwd: &str,
        env: &BTreeMap<String, String>,
    ) -> CollaboratorResult<CommandStream>;
}

/// Runs task commands through `sh -c`.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new("sh")
    }
}

impl ShellRunner {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

fn forward_lines<R>(pipe: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(pipe);
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

struct RunState {
    lines: mpsc::UnboundedReceiver<String>,
    child: Option<Child>,
}

impl RunState {
    async fn next_event(mut self) -> Option<(CollaboratorResult<CommandEvent>, Self)> {
        if let Some(line) = self.lines.recv().await {
            return Some((Ok(CommandEvent::Output(line)), self));
        }
        let mut child = self.child.take()?;
        let event = child
            .wait()
            .await
            .map(|status| CommandEvent::Exited {
                code: status.code(),
            })
            .map_err(CollaboratorError::from);
        Some((event, self))
    }
}

/// Spawns `program args...` and merges its output into one line stream.
/// Dropping the stream kills the process.
pub(crate) fn spawn_streaming(
    mut command: Command,
    program: &str,
) -> CollaboratorResult<CommandStream> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| CollaboratorError::spawn(program, e))?;

    let (tx, rx) = mpsc::unbounded_channel();
    if let Some(stdout) = child.stdout.take() {
        forward_lines(stdout, tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        forward_lines(stderr, tx);
    }

    let state = RunState {
        lines: rx,
        child: Some(child),
    };
    Ok(stream::unfold(state, RunState::next_event).boxed())
}

#[async_trait::async_trait]
impl CommandRunner for ShellRunner {
    async fn run(
        &self,
        command: &str,
        cwd: &str,
        env: &BTreeMap<String, String>,
    ) -> CollaboratorResult<CommandStream> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(command).current_dir(cwd).envs(env);
        tracing::debug!("Running `{}` in {}", command, cwd);
        spawn_streaming(cmd, &self.shell)
    }
}
