//! In-memory collaborators for scheduler and runtime tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::{mpsc, Notify};

use super::Collaborators;
use crate::collaborators::{
    AiClient, CollaboratorError, CollaboratorResult, CommandEvent, CommandRunner,
    PromptRenderer, PtyEvent, PtyInput, PtySession, PtySpawner,
};
use crate::explorer::DirectoryLister;
use crate::models::{EntryKind, FileEntry, ServiceInfo};
use crate::services::ContainerManager;

pub(crate) fn file(path: &str, kind: EntryKind) -> FileEntry {
    FileEntry {
        name: path.rsplit('/').next().unwrap_or(path).to_string(),
        path: path.to_string(),
        kind,
        size: 0,
        permissions: "rw-r--r--".to_string(),
        modified: None,
        git_status: None,
        comment_count: 0,
    }
}

#[derive(Default)]
pub(crate) struct FakeLister {
    pub listings: Mutex<BTreeMap<String, Vec<FileEntry>>>,
    pub calls: Mutex<Vec<String>>,
    pub gate: Option<Arc<Notify>>,
}

#[async_trait::async_trait]
impl DirectoryLister for FakeLister {
    async fn list(&self, path: &str) -> CollaboratorResult<Vec<FileEntry>> {
        self.calls.lock().unwrap().push(path.to_string());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.listings
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| CollaboratorError::parse("ls", format!("no such directory {path}")))
    }
}

#[derive(Default)]
pub(crate) struct FakeContainers {
    pub services: Mutex<Vec<ServiceInfo>>,
    pub calls: Mutex<Vec<String>>,
    pub logs_gate: Option<Arc<Notify>>,
}

#[async_trait::async_trait]
impl ContainerManager for FakeContainers {
    async fn list(&self) -> CollaboratorResult<Vec<ServiceInfo>> {
        self.calls.lock().unwrap().push("list".to_string());
        Ok(self.services.lock().unwrap().clone())
    }

    async fn start(&self, id: &str, port: Option<u16>) -> CollaboratorResult<()> {
        let call = match port {
            Some(port) => format!("start {id}:{port}"),
            None => format!("start {id}"),
        };
        self.calls.lock().unwrap().push(call);
        Ok(())
    }

    async fn stop(&self, id: &str) -> CollaboratorResult<()> {
        self.calls.lock().unwrap().push(format!("stop {id}"));
        Ok(())
    }

    async fn restart(&self, id: &str) -> CollaboratorResult<()> {
        self.calls.lock().unwrap().push(format!("restart {id}"));
        Ok(())
    }

    async fn logs(&self, id: &str, _tail: usize) -> CollaboratorResult<String> {
        self.calls.lock().unwrap().push(format!("logs {id}"));
        if let Some(gate) = &self.logs_gate {
            gate.notified().await;
        }
        Ok(format!("{id} ready\n"))
    }
}

/// Replies with fixed chunks, or fails after them when `error` is set.
#[derive(Default)]
pub(crate) struct FakeAi {
    pub chunks: Vec<String>,
    pub error: Option<String>,
    pub prompts: Mutex<Vec<String>>,
    pub gate: Option<Arc<Notify>>,
}

#[async_trait::async_trait]
impl AiClient for FakeAi {
    async fn stream(&self, prompt: String, _cwd: &str) -> CollaboratorResult<BoxStream<'static, CollaboratorResult<String>>> {
        self.prompts.lock().unwrap().push(prompt);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let mut items: Vec<CollaboratorResult<String>> =
            self.chunks.iter().cloned().map(Ok).collect();
        if let Some(error) = &self.error {
            items.push(Err(CollaboratorError::parse("ai", error.clone())));
        }
        Ok(stream::iter(items).boxed())
    }
}

/// Prints `lines`, then waits for `gate` (if any) before exiting with `code`.
#[derive(Default)]
pub(crate) struct FakeRunner {
    pub lines: Vec<String>,
    pub code: Option<i32>,
    pub gate: Option<Arc<Notify>>,
    pub runs: Mutex<Vec<(String, BTreeMap<String, String>)>>,
}

#[async_trait::async_trait]
impl CommandRunner for FakeRunner {
    async fn run(
        &self,
        command: &str,
        _cwd: &str,
        env: &BTreeMap<String, String>,
    ) -> CollaboratorResult<BoxStream<'static, CollaboratorResult<CommandEvent>>> {
        self.runs
            .lock()
            .unwrap()
            .push((command.to_string(), env.clone()));
        let lines: Vec<CollaboratorResult<CommandEvent>> = self
            .lines
            .iter()
            .cloned()
            .map(|l| Ok(CommandEvent::Output(l)))
            .collect();
        let gate = self.gate.clone();
        let code = self.code;
        let exit = stream::once(async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            Ok(CommandEvent::Exited { code })
        });
        Ok(stream::iter(lines).chain(exit).boxed())
    }
}

/// Emits `banner` once and then stays open, recording input.
#[derive(Default)]
pub(crate) struct FakePty {
    pub banner: String,
    pub inputs: Arc<Mutex<Vec<PtyInput>>>,
}

#[async_trait::async_trait]
impl PtySpawner for FakePty {
    async fn spawn(&self, _cols: u16, _rows: u16, _cwd: &str) -> CollaboratorResult<PtySession> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let inputs = Arc::clone(&self.inputs);
        tokio::spawn(async move {
            while let Some(input) = rx.recv().await {
                inputs.lock().unwrap().push(input);
            }
        });
        let banner = stream::iter(vec![Ok(PtyEvent::Output(self.banner.clone()))]);
        Ok(PtySession {
            events: banner.chain(stream::pending()).boxed(),
            input: tx,
        })
    }
}

#[derive(Default)]
pub(crate) struct Fakes {
    pub lister: Arc<FakeLister>,
    pub containers: Arc<FakeContainers>,
    pub ai: Arc<FakeAi>,
    pub runner: Arc<FakeRunner>,
    pub pty: Arc<FakePty>,
}

impl Fakes {
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            lister: self.lister.clone(),
            containers: self.containers.clone(),
            ai: self.ai.clone(),
            runner: self.runner.clone(),
            pty: self.pty.clone(),
            prompts: Arc::new(PromptRenderer::new()),
        }
    }
}
