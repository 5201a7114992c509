use std::io::{Read, Write};

use futures::stream::{self, BoxStream, StreamExt};
use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, MasterPty, PtySize};
use tokio::sync::mpsc;

use super::{CollaboratorError, CollaboratorResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PtyEvent {
    Output(String),
    Exited { code: Option<i32> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PtyInput {
    Data(String),
    Resize { cols: u16, rows: u16 },
}

/// A running terminal. Dropping `events` kills the child; dropping `input`
/// closes the master side of the terminal.
pub struct PtySession {
    pub events: BoxStream<'static, CollaboratorResult<PtyEvent>>,
    pub input: mpsc::UnboundedSender<PtyInput>,
}

#[async_trait::async_trait]
pub trait PtySpawner: Send + Sync {
    async fn spawn(&self, cols: u16, rows: u16, cwd: &str) -> CollaboratorResult<PtySession>;
}

/// Interactive shell on a native pseudo-terminal.
#[derive(Debug, Clone)]
pub struct ProcessPty {
    shell: String,
}

impl Default for ProcessPty {
    fn default() -> Self {
        Self::new(std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string()))
    }
}

impl ProcessPty {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

fn pty_size(cols: u16, rows: u16) -> PtySize {
    PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

/// Decodes byte chunks into text without splitting multi-byte characters.
#[derive(Default)]
struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                    }
                }
            }
        }
    }
}

enum Chunk {
    Bytes(Vec<u8>),
    Exit(std::io::Result<i32>),
}

/// Writes input and applies resizes on a blocking thread. Owns the master,
/// so the terminal closes once the sender side is gone.
fn pump_input(
    master: Box<dyn MasterPty + Send>,
    mut writer: Box<dyn Write + Send>,
    mut rx: mpsc::UnboundedReceiver<PtyInput>,
) {
    while let Some(input) = rx.blocking_recv() {
        match input {
            PtyInput::Data(data) => {
                if writer.write_all(data.as_bytes()).is_err() {
                    break;
                }
                let _ = writer.flush();
            }
            PtyInput::Resize { cols, rows } => {
                if let Err(e) = master.resize(pty_size(cols, rows)) {
                    tracing::warn!("Terminal resize to {}x{} failed: {}", cols, rows, e);
                }
            }
        }
    }
}

struct PtyState {
    chunks: mpsc::UnboundedReceiver<Chunk>,
    decoder: Utf8Carry,
    killer: Box<dyn ChildKiller + Send + Sync>,
    exited: bool,
}

impl PtyState {
    async fn next_event(mut self) -> Option<(CollaboratorResult<PtyEvent>, Self)> {
        if self.exited {
            return None;
        }
        while let Some(chunk) = self.chunks.recv().await {
            match chunk {
                Chunk::Bytes(bytes) => {
                    let text = self.decoder.push(&bytes);
                    if !text.is_empty() {
                        return Some((Ok(PtyEvent::Output(text)), self));
                    }
                }
                Chunk::Exit(status) => {
                    self.exited = true;
                    let event = status
                        .map(|code| PtyEvent::Exited { code: Some(code) })
                        .map_err(CollaboratorError::from);
                    return Some((event, self));
                }
            }
        }
        None
    }
}

impl Drop for PtyState {
    fn drop(&mut self) {
        if !self.exited {
            let _ = self.killer.kill();
        }
    }
}

#[async_trait::async_trait]
impl PtySpawner for ProcessPty {
    async fn spawn(&self, cols: u16, rows: u16, cwd: &str) -> CollaboratorResult<PtySession> {
        let pair = native_pty_system()
            .openpty(pty_size(cols, rows))
            .map_err(|e| CollaboratorError::pty("open", e))?;

        let mut command = CommandBuilder::new(&self.shell);
        command.cwd(cwd);
        command.env("TERM", "xterm-256color");
        let mut child = pair
            .slave
            .spawn_command(command)
            .map_err(|e| CollaboratorError::pty("spawn", e))?;
        drop(pair.slave);

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| CollaboratorError::pty("attach reader", e))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| CollaboratorError::pty("attach writer", e))?;
        let killer = child.clone_killer();

        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    // EIO once the child side closes.
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if chunk_tx.send(Chunk::Bytes(buf[..n].to_vec())).is_err() {
                            break;
                        }
                    }
                }
            }
            let status = child.wait().map(|s| s.exit_code() as i32);
            let _ = chunk_tx.send(Chunk::Exit(status));
        });

        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let master = pair.master;
        std::thread::spawn(move || pump_input(master, writer, input_rx));

        tracing::debug!("Spawned {} ({}x{}) in {}", self.shell, cols, rows, cwd);

        let state = PtyState {
            chunks: chunk_rx,
            decoder: Utf8Carry::default(),
            killer,
            exited: false,
        };
        Ok(PtySession {
            events: stream::unfold(state, PtyState::next_event).boxed(),
            input: input_tx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn carry_holds_incomplete_sequence() {
        let mut carry = Utf8Carry::default();
        let bytes = "日本".as_bytes();
        assert_eq!(carry.push(&bytes[..4]), "日");
        assert_eq!(carry.push(&bytes[4..]), "本");
    }

    #[test]
    fn carry_replaces_invalid_bytes() {
        let mut carry = Utf8Carry::default();
        assert_eq!(carry.push(&[b'a', 0xff, b'b']), "a\u{fffd}b");
    }

    async fn read_until(session: &mut PtySession, output: &mut String, needle: &str) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !output.contains(needle) {
                match session.events.next().await {
                    Some(Ok(PtyEvent::Output(text))) => output.push_str(&text),
                    other => panic!("terminal ended early: {:?}", other.map(|r| r.ok())),
                }
            }
        })
        .await
        .unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn shell_runs_on_a_terminal_that_follows_resizes() {
        let pty = ProcessPty::new("/bin/sh");
        let mut session = pty.spawn(120, 40, "/").await.unwrap();
        let mut output = String::new();

        // Arithmetic keeps the echoed command line from matching the result.
        session
            .input
            .send(PtyInput::Data(
                "test -t 1 && echo tty-$((6*7)); stty size\n".to_string(),
            ))
            .unwrap();
        read_until(&mut session, &mut output, "tty-42").await;
        read_until(&mut session, &mut output, "40 120").await;

        session
            .input
            .send(PtyInput::Resize {
                cols: 200,
                rows: 50,
            })
            .unwrap();
        session
            .input
            .send(PtyInput::Data("stty size; exit 7\n".to_string()))
            .unwrap();
        read_until(&mut session, &mut output, "50 200").await;

        let exit = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match session.events.next().await {
                    Some(Ok(PtyEvent::Exited { code })) => return code,
                    Some(Ok(PtyEvent::Output(_))) => continue,
                    other => panic!("unexpected end: {:?}", other.map(|r| r.ok())),
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(exit, Some(7));
        assert!(session.events.next().await.is_none());
    }
}
