//! Append-only chat transcript kept alongside a session.
//!
//! The assistant conversation runs next to the ranking screens. The engine
//! stores it so hosts have one place to persist it, but no engine operation
//! ever reads it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who sent a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    /// The respondent.
    User,
    /// The assistant panel.
    Assistant,
}

/// A single transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message id.
    pub id: Uuid,
    /// Sender.
    pub role: ChatRole,
    /// Message body as typed or generated.
    pub text: String,
    /// When the message was appended.
    pub sent_at: DateTime<Utc>,
}

/// Messages in the order they were sent. Entries are never edited or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatTranscript {
    messages: Vec<ChatMessage>,
}

impl ChatTranscript {
    /// Creates an empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message and returns its id.
    pub fn push(&mut self, role: ChatRole, text: impl Into<String>) -> Uuid {
        let id = Uuid::new_v4();
        self.messages.push(ChatMessage {
            id,
            role,
            text: text.into(),
            sent_at: Utc::now(),
        });
        id
    }

    /// Appends a respondent message.
    pub fn push_user(&mut self, text: impl Into<String>) -> Uuid {
        self.push(ChatRole::User, text)
    }

    /// Appends an assistant message.
    pub fn push_assistant(&mut self, text: impl Into<String>) -> Uuid {
        self.push(ChatRole::Assistant, text)
    }

    /// All messages, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if nothing has been sent yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_in_order_with_unique_ids() {
        let mut chat = ChatTranscript::new();
        let a = chat.push_user("which option is sweeter?");
        let b = chat.push_assistant("Option C has the highest sweetness.");
        assert_ne!(a, b);
        assert_eq!(chat.len(), 2);
        assert_eq!(chat.messages()[0].role, ChatRole::User);
        assert_eq!(chat.messages()[1].id, b);
    }

    #[test]
    fn serializes_as_plain_list() {
        let mut chat = ChatTranscript::new();
        chat.push_user("hi");
        let json = serde_json::to_value(&chat).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["role"], "user");
    }
}
