use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::WorkflowError;

const MACHINE: &str = "review";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Reviewing,
    Iterating,
    Approved,
    Rejected,
}

impl ReviewStatus {
    #[cfg(test)]
    pub const ALL: [ReviewStatus; 5] = [
        ReviewStatus::Pending,
        ReviewStatus::Reviewing,
        ReviewStatus::Iterating,
        ReviewStatus::Approved,
        ReviewStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Reviewing => "reviewing",
            ReviewStatus::Iterating => "iterating",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ReviewStatus::Approved | ReviewStatus::Rejected)
    }

    pub fn can_transition_to(self, next: ReviewStatus) -> bool {
        use ReviewStatus::*;
        matches!(
            (self, next),
            (Pending, Reviewing)
                | (Reviewing, Iterating)
                | (Iterating, Reviewing)
                | (Reviewing | Iterating, Approved | Rejected)
        )
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewKind {
    Plan,
    Proposal,
    Code,
    Artifact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub change_kind: FileChangeKind,
    #[serde(default)]
    pub diff: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewContent {
    pub kind: ReviewKind,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub files: Vec<FileChange>,
}

/// What a review comment is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum CommentTarget {
    Document,
    Section { heading: String },
    File { path: String, line: Option<u32> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewComment {
    pub id: String,
    pub target: CommentTarget,
    pub content: String,
    pub resolved: bool,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Human review gate over a plan, proposal, or code change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSession {
    pub id: String,
    pub content: ReviewContent,
    pub status: ReviewStatus,
    pub iteration: u32,
    #[serde(default)]
    pub comments: Vec<ReviewComment>,
    #[serde(default)]
    pub next_comment_seq: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewSession {
    pub fn new(id: String, content: ReviewContent, now: DateTime<Utc>) -> Self {
        Self {
            id,
            content,
            status: ReviewStatus::Pending,
            iteration: 1,
            comments: Vec::new(),
            next_comment_seq: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn advance(&mut self, next: ReviewStatus, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        if !self.status.can_transition_to(next) {
            return Err(WorkflowError::transition(MACHINE, self.status, next));
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), WorkflowError> {
        if self.status.is_terminal() {
            return Err(WorkflowError::SessionClosed(self.id.clone()));
        }
        Ok(())
    }

    fn comment_mut(&mut self, comment_id: &str) -> Result<&mut ReviewComment, WorkflowError> {
        self.comments
            .iter_mut()
            .find(|c| c.id == comment_id)
            .ok_or_else(|| WorkflowError::CommentNotFound(comment_id.to_string()))
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        self.advance(ReviewStatus::Reviewing, now)
    }

    /// Appends an unresolved comment and returns its id.
    pub fn add_comment(
        &mut self,
        target: CommentTarget,
        content: &str,
        author: &str,
        now: DateTime<Utc>,
    ) -> Result<String, WorkflowError> {
        self.ensure_open()?;
        if content.trim().is_empty() {
            return Err(WorkflowError::precondition("Comment content is empty"));
        }
        let seq = self.next_comment_seq.max(1);
        let id = format!("{}-c{}", self.id, seq);
        self.next_comment_seq = seq + 1;
        self.comments.push(ReviewComment {
            id: id.clone(),
            target,
            content: content.to_string(),
            resolved: false,
            author: author.to_string(),
            created_at: now,
            updated_at: now,
        });
        self.updated_at = now;
        Ok(id)
    }

    pub fn set_comment_resolved(
        &mut self,
        comment_id: &str,
        resolved: bool,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        self.ensure_open()?;
        let comment = self.comment_mut(comment_id)?;
        comment.resolved = resolved;
        comment.updated_at = now;
        self.updated_at = now;
        Ok(())
    }

    pub fn delete_comment(&mut self, comment_id: &str) -> Result<(), WorkflowError> {
        self.ensure_open()?;
        let before = self.comments.len();
        self.comments.retain(|c| c.id != comment_id);
        if before == self.comments.len() {
            return Err(WorkflowError::CommentNotFound(comment_id.to_string()));
        }
        Ok(())
    }

    pub fn unresolved_count(&self) -> usize {
        self.comments.iter().filter(|c| !c.resolved).count()
    }

    /// Sends reviewer feedback back to the author for another iteration.
    pub fn submit_feedback(&mut self, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        self.advance(ReviewStatus::Iterating, now)?;
        self.iteration += 1;
        Ok(())
    }

    /// Replaces the content after an iteration and returns to review.
    pub fn revise(
        &mut self,
        content: ReviewContent,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        if self.status != ReviewStatus::Iterating {
            return Err(WorkflowError::transition(
                MACHINE,
                self.status,
                ReviewStatus::Reviewing,
            ));
        }
        self.content = content;
        self.advance(ReviewStatus::Reviewing, now)
    }

    pub fn approve(&mut self, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        self.advance(ReviewStatus::Approved, now)
    }

    pub fn reject(&mut self, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        self.advance(ReviewStatus::Rejected, now)
    }
}
