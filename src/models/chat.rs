use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::System => "system",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChatState {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Assistant reply being streamed; `Some` while a completion is in flight.
    #[serde(default)]
    pub streaming: Option<String>,
    /// Id of the user message the current stream answers.
    #[serde(default)]
    pub pending_message_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ChatState {
    pub fn is_streaming(&self) -> bool {
        self.streaming.is_some()
    }

    pub fn has_message(&self, id: &str) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }
}
