use chrono::{DateTime, Utc};

use super::Outcome;
use crate::models::{ChatMessage, ChatRole, ChatState};

pub(super) fn send(chat: &mut ChatState, id: &str, content: &str, now: DateTime<Utc>) -> Outcome {
    if chat.is_streaming() {
        return Err("Wait for the current reply to finish".to_string());
    }
    if content.trim().is_empty() {
        return Err("Message is empty".to_string());
    }
    if chat.has_message(id) {
        return Err(format!("Message {id} already exists"));
    }
    chat.messages.push(ChatMessage {
        id: id.to_string(),
        role: ChatRole::User,
        content: content.to_string(),
        timestamp: now,
    });
    chat.streaming = Some(String::new());
    chat.pending_message_id = Some(id.to_string());
    chat.error = None;
    Ok(())
}

/// Chunks with no reply in flight are dropped.
pub(super) fn append(chat: &mut ChatState, chunk: &str) {
    if let Some(buffer) = chat.streaming.as_mut() {
        buffer.push_str(chunk);
    }
}

/// Commits the streamed reply as an assistant message with id `<pending>-reply`.
pub(super) fn complete(chat: &mut ChatState, now: DateTime<Utc>) -> Outcome {
    let Some(buffer) = chat.streaming.take() else {
        return Ok(());
    };
    let pending = chat.pending_message_id.take().unwrap_or_default();
    if buffer.trim().is_empty() {
        return Err("The assistant returned an empty reply".to_string());
    }
    chat.messages.push(ChatMessage {
        id: format!("{pending}-reply"),
        role: ChatRole::Assistant,
        content: buffer,
        timestamp: now,
    });
    Ok(())
}

pub(super) fn failed(chat: &mut ChatState, error: &str) -> Outcome {
    if chat.streaming.take().is_none() {
        return Ok(());
    }
    chat.pending_message_id = None;
    Err(error.to_string())
}

pub(super) fn clear(chat: &mut ChatState) {
    *chat = ChatState::default();
}
