use std::process::Stdio;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

use super::{CollaboratorError, CollaboratorResult};

/// Ordered text chunks; the stream ends on completion or after one error.
pub type AiStream = BoxStream<'static, CollaboratorResult<String>>;

#[async_trait::async_trait]
pub trait AiClient: Send + Sync {
    async fn stream(&self, prompt: String, cwd: &str) -> CollaboratorResult<AiStream>;
}

/// Runs the Claude CLI in print mode and streams its stdout line by line.
#[derive(Debug, Clone)]
pub struct ClaudeCli {
    program: String,
    extra_args: Vec<String>,
}

impl Default for ClaudeCli {
    fn default() -> Self {
        Self::new("claude")
    }
}

impl ClaudeCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }
}

struct ChildStream {
    program: String,
    reader: BufReader<ChildStdout>,
    child: Child,
    stderr: Option<JoinHandle<String>>,
    finished: bool,
}

impl ChildStream {
    async fn next_chunk(mut self) -> Option<(CollaboratorResult<String>, Self)> {
        if self.finished {
            return None;
        }
        let mut line = String::new();
        match self.reader.read_line(&mut line).await {
            Ok(0) => {
                self.finished = true;
                match self.finish().await {
                    Ok(()) => None,
                    Err(e) => Some((Err(e), self)),
                }
            }
            Ok(_) => Some((Ok(line), self)),
            Err(e) => {
                self.finished = true;
                Some((Err(e.into()), self))
            }
        }
    }

    async fn finish(&mut self) -> CollaboratorResult<()> {
        let status = self.child.wait().await?;
        if status.success() {
            return Ok(());
        }
        let stderr = match self.stderr.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };
        Err(CollaboratorError::failed(
            self.program.clone(),
            status,
            stderr.as_bytes(),
        ))
    }
}

#[async_trait::async_trait]
impl AiClient for ClaudeCli {
    async fn stream(&self, prompt: String, cwd: &str) -> CollaboratorResult<AiStream> {
        let mut child = Command::new(&self.program)
            .arg("-p")
            .arg(&prompt)
            .args(&self.extra_args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CollaboratorError::spawn(&self.program, e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CollaboratorError::parse(&self.program, "stdout was not captured"))?;
        let stderr = child.stderr.take().map(|mut pipe| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = pipe.read_to_string(&mut buf).await;
                buf
            })
        });

        tracing::debug!("Started {} in {}", self.program, cwd);

        let state = ChildStream {
            program: self.program.clone(),
            reader: BufReader::new(stdout),
            child,
            stderr,
            finished: false,
        };
        Ok(stream::unfold(state, ChildStream::next_chunk).boxed())
    }
}
