use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::WorkflowError;

const MACHINE: &str = "constitution";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConstitutionStatus {
    #[default]
    Collecting,
    Generating,
    Complete,
    Error,
}

impl ConstitutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstitutionStatus::Collecting => "collecting",
            ConstitutionStatus::Generating => "generating",
            ConstitutionStatus::Complete => "complete",
            ConstitutionStatus::Error => "error",
        }
    }

    pub fn can_transition_to(self, next: ConstitutionStatus) -> bool {
        use ConstitutionStatus::*;
        matches!(
            (self, next),
            (Collecting, Generating)
                | (Generating, Complete)
                | (Generating, Error)
                | (Error, Collecting)
                | (Error, Generating)
        )
    }

    pub fn is_active(self) -> bool {
        matches!(
            self,
            ConstitutionStatus::Collecting | ConstitutionStatus::Generating
        )
    }
}

impl fmt::Display for ConstitutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Question-and-answer wizard that ends in a generated project constitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConstitutionWorkflow {
    pub current_question: usize,
    #[serde(default)]
    pub answers: BTreeMap<usize, String>,
    #[serde(default)]
    pub output: String,
    pub status: ConstitutionStatus,
    #[serde(default)]
    pub use_claude_md_reference: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl ConstitutionWorkflow {
    pub fn new(use_claude_md_reference: bool) -> Self {
        Self {
            use_claude_md_reference,
            ..Self::default()
        }
    }

    /// Records the answer to the current question and moves to the next one.
    pub fn answer(&mut self, answer: &str, question_count: usize) -> Result<(), WorkflowError> {
        if self.status != ConstitutionStatus::Collecting {
            return Err(WorkflowError::precondition(format!(
                "Cannot answer questions while constitution is {}",
                self.status
            )));
        }
        if self.current_question >= question_count {
            return Err(WorkflowError::precondition(format!(
                "All {question_count} constitution questions are already answered"
            )));
        }
        self.answers
            .insert(self.current_question, answer.trim().to_string());
        self.current_question += 1;
        Ok(())
    }

    /// Steps back to the previous question, keeping its recorded answer.
    pub fn previous(&mut self) -> Result<(), WorkflowError> {
        if self.status != ConstitutionStatus::Collecting {
            return Err(WorkflowError::precondition(format!(
                "Cannot revisit questions while constitution is {}",
                self.status
            )));
        }
        if self.current_question == 0 {
            return Err(WorkflowError::precondition("Already at the first question"));
        }
        self.current_question -= 1;
        Ok(())
    }

    pub fn is_ready(&self, question_count: usize) -> bool {
        self.current_question == question_count
    }

    pub fn begin_generation(&mut self, question_count: usize) -> Result<(), WorkflowError> {
        if !self.status.can_transition_to(ConstitutionStatus::Generating) {
            return Err(WorkflowError::transition(
                MACHINE,
                self.status,
                ConstitutionStatus::Generating,
            ));
        }
        if !self.is_ready(question_count) {
            return Err(WorkflowError::precondition(format!(
                "Answer all {} questions before generating ({} answered)",
                question_count, self.current_question
            )));
        }
        self.status = ConstitutionStatus::Generating;
        self.output.clear();
        self.error = None;
        Ok(())
    }

    pub fn append_output(&mut self, chunk: &str) -> Result<(), WorkflowError> {
        if self.status != ConstitutionStatus::Generating {
            return Err(WorkflowError::precondition(
                "Constitution output arrived while not generating",
            ));
        }
        self.output.push_str(chunk);
        Ok(())
    }

    /// Finishes generation. Empty output is never accepted as complete.
    pub fn complete(&mut self) -> Result<(), WorkflowError> {
        if !self.status.can_transition_to(ConstitutionStatus::Complete) {
            return Err(WorkflowError::transition(
                MACHINE,
                self.status,
                ConstitutionStatus::Complete,
            ));
        }
        if self.output.trim().is_empty() {
            return Err(WorkflowError::EmptyOutput);
        }
        self.status = ConstitutionStatus::Complete;
        self.error = None;
        Ok(())
    }

    pub fn fail(&mut self, message: &str) -> Result<(), WorkflowError> {
        if !self.status.can_transition_to(ConstitutionStatus::Error) {
            return Err(WorkflowError::transition(
                MACHINE,
                self.status,
                ConstitutionStatus::Error,
            ));
        }
        self.status = ConstitutionStatus::Error;
        self.error = Some(if message.trim().is_empty() {
            "Constitution generation failed".to_string()
        } else {
            message.to_string()
        });
        Ok(())
    }

    /// Ordered (question, answer) pairs for prompt rendering.
    pub fn answered_questions<'a>(&'a self, questions: &'a [String]) -> Vec<(&'a str, &'a str)> {
        questions
            .iter()
            .enumerate()
            .filter_map(|(i, q)| self.answers.get(&i).map(|a| (q.as_str(), a.as_str())))
            .collect()
    }
}
