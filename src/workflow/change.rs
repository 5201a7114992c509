use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ReviewKind, WorkflowError};

const MACHINE: &str = "change";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    #[default]
    Proposed,
    Planning,
    Planned,
    Implementing,
    Testing,
    Done,
    Archived,
    Cancelled,
    Failed,
}

impl ChangeStatus {
    #[cfg(test)]
    pub const ALL: [ChangeStatus; 9] = [
        ChangeStatus::Proposed,
        ChangeStatus::Planning,
        ChangeStatus::Planned,
        ChangeStatus::Implementing,
        ChangeStatus::Testing,
        ChangeStatus::Done,
        ChangeStatus::Archived,
        ChangeStatus::Cancelled,
        ChangeStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeStatus::Proposed => "proposed",
            ChangeStatus::Planning => "planning",
            ChangeStatus::Planned => "planned",
            ChangeStatus::Implementing => "implementing",
            ChangeStatus::Testing => "testing",
            ChangeStatus::Done => "done",
            ChangeStatus::Archived => "archived",
            ChangeStatus::Cancelled => "cancelled",
            ChangeStatus::Failed => "failed",
        }
    }

    /// Done is terminal for cancel/fail purposes; it can still be archived.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ChangeStatus::Done
                | ChangeStatus::Archived
                | ChangeStatus::Cancelled
                | ChangeStatus::Failed
        )
    }

    pub fn requires_plan(self) -> bool {
        matches!(
            self,
            ChangeStatus::Implementing | ChangeStatus::Testing | ChangeStatus::Done
        )
    }

    pub fn can_transition_to(self, next: ChangeStatus) -> bool {
        use ChangeStatus::*;
        match (self, next) {
            (Proposed, Planning)
            | (Planning, Planned)
            | (Planned, Implementing)
            | (Implementing, Testing)
            | (Testing, Done)
            | (Done, Archived) => true,
            (from, Cancelled | Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which AI stream is currently feeding `streaming_output`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    Proposal,
    Plan,
    Implementation,
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GenerationKind::Proposal => "proposal",
            GenerationKind::Plan => "plan",
            GenerationKind::Implementation => "implementation",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub id: String,
    pub name: String,
    pub status: ChangeStatus,
    pub intent: String,
    #[serde(default)]
    pub proposal: Option<String>,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub implementation_log: Option<String>,
    #[serde(default)]
    pub streaming_output: String,
    #[serde(default)]
    pub generation: Option<GenerationKind>,
    #[serde(default)]
    pub context_files: Vec<String>,
    #[serde(default)]
    pub proposal_review_id: Option<String>,
    #[serde(default)]
    pub plan_review_id: Option<String>,
    #[serde(default)]
    pub code_review_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Change {
    pub fn new(id: String, name: String, intent: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name,
            status: ChangeStatus::Proposed,
            intent,
            proposal: None,
            plan: None,
            implementation_log: None,
            streaming_output: String::new(),
            generation: None,
            context_files: Vec::new(),
            proposal_review_id: None,
            plan_review_id: None,
            code_review_id: None,
            created_at: now,
            updated_at: now,
            error: None,
        }
    }

    pub fn is_generating(&self) -> bool {
        self.generation.is_some()
    }

    fn advance(&mut self, next: ChangeStatus, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        if !self.status.can_transition_to(next) {
            return Err(WorkflowError::transition(MACHINE, self.status, next));
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    fn start_stream(&mut self, kind: GenerationKind) {
        self.generation = Some(kind);
        self.streaming_output.clear();
        self.error = None;
    }

    fn take_stream(&mut self, kind: GenerationKind) -> Result<String, WorkflowError> {
        if self.generation != Some(kind) {
            return Err(WorkflowError::precondition(format!(
                "No {kind} generation in progress for change {}",
                self.id
            )));
        }
        if self.streaming_output.trim().is_empty() {
            return Err(WorkflowError::EmptyOutput);
        }
        self.generation = None;
        Ok(std::mem::take(&mut self.streaming_output))
    }

    pub fn begin_proposal(&mut self, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        if self.status != ChangeStatus::Proposed {
            return Err(WorkflowError::precondition(format!(
                "Proposal can only be generated while proposed (change is {})",
                self.status
            )));
        }
        if let Some(kind) = self.generation {
            return Err(WorkflowError::precondition(format!(
                "A {kind} generation is already running"
            )));
        }
        self.start_stream(GenerationKind::Proposal);
        self.updated_at = now;
        Ok(())
    }

    pub fn append_output(&mut self, chunk: &str) -> Result<(), WorkflowError> {
        if self.generation.is_none() {
            return Err(WorkflowError::precondition(format!(
                "Output arrived for change {} with no generation running",
                self.id
            )));
        }
        self.streaming_output.push_str(chunk);
        Ok(())
    }

    pub fn complete_proposal(&mut self, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        let proposal = self.take_stream(GenerationKind::Proposal)?;
        self.proposal = Some(proposal);
        self.updated_at = now;
        Ok(())
    }

    pub fn begin_plan(&mut self, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        if self.proposal.is_none() {
            return Err(WorkflowError::precondition(
                "A plan needs a completed proposal",
            ));
        }
        if self.status == ChangeStatus::Planning || self.generation.is_some() {
            return Err(WorkflowError::precondition("Planning is already underway"));
        }
        self.advance(ChangeStatus::Planning, now)?;
        self.start_stream(GenerationKind::Plan);
        Ok(())
    }

    pub fn complete_plan(&mut self, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        if !self.status.can_transition_to(ChangeStatus::Planned) {
            return Err(WorkflowError::transition(
                MACHINE,
                self.status,
                ChangeStatus::Planned,
            ));
        }
        let plan = self.take_stream(GenerationKind::Plan)?;
        self.plan = Some(plan);
        self.advance(ChangeStatus::Planned, now)
    }

    pub fn start_implementation(&mut self, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        if self.plan.is_none() {
            return Err(WorkflowError::precondition(
                "Implementation needs a completed plan",
            ));
        }
        self.advance(ChangeStatus::Implementing, now)?;
        self.start_stream(GenerationKind::Implementation);
        Ok(())
    }

    pub fn complete_implementation(&mut self, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        if !self.status.can_transition_to(ChangeStatus::Testing) {
            return Err(WorkflowError::transition(
                MACHINE,
                self.status,
                ChangeStatus::Testing,
            ));
        }
        let log = self.take_stream(GenerationKind::Implementation)?;
        self.implementation_log = Some(log);
        self.advance(ChangeStatus::Testing, now)
    }

    pub fn mark_done(&mut self, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        self.advance(ChangeStatus::Done, now)
    }

    pub fn archive(&mut self, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        self.advance(ChangeStatus::Archived, now)
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        self.advance(ChangeStatus::Cancelled, now)?;
        self.generation = None;
        Ok(())
    }

    pub fn fail(&mut self, error: &str, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        self.advance(ChangeStatus::Failed, now)?;
        self.generation = None;
        self.error = Some(error.to_string());
        Ok(())
    }

    /// A failed proposal stream leaves the change proposed; failed planning or
    /// implementation streams fail the change.
    pub fn generation_failed(
        &mut self,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        match self.generation {
            None => Err(WorkflowError::precondition(format!(
                "No generation running for change {}",
                self.id
            ))),
            Some(GenerationKind::Proposal) => {
                self.generation = None;
                self.streaming_output.clear();
                self.error = Some(error.to_string());
                self.updated_at = now;
                Ok(())
            }
            Some(_) => self.fail(error, now),
        }
    }

    pub fn add_context_file(&mut self, path: &str) -> bool {
        if self.context_files.iter().any(|p| p == path) {
            return false;
        }
        self.context_files.push(path.to_string());
        true
    }

    pub fn remove_context_file(&mut self, path: &str) -> bool {
        let before = self.context_files.len();
        self.context_files.retain(|p| p != path);
        before != self.context_files.len()
    }

    pub fn link_review(&mut self, kind: ReviewKind, session_id: String) {
        match kind {
            ReviewKind::Proposal => self.proposal_review_id = Some(session_id),
            ReviewKind::Plan => self.plan_review_id = Some(session_id),
            ReviewKind::Code | ReviewKind::Artifact => self.code_review_id = Some(session_id),
        }
    }

    pub fn review_ids_mut(&mut self) -> [&mut Option<String>; 3] {
        [
            &mut self.proposal_review_id,
            &mut self.plan_review_id,
            &mut self.code_review_id,
        ]
    }
}
