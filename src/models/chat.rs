// src/models/chat.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One entry in a conversation transcript.
///
/// An assistant message is mutated in place while its reply is streaming and
/// becomes immutable once the turn ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::User,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Assistant,
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// Append-only ordered sequence of chat messages.
///
/// Insertion order is significant. The only in-place mutation allowed is
/// updating the text of the assistant message that is currently streaming.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Replaces the text of the message with the given id, preserving its
    /// identifier and position. Returns false when no such message exists.
    pub fn set_text(&mut self, id: Uuid, text: &str) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.text.clear();
                message.text.push_str(text);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_text_preserves_identity_and_position() {
        let mut transcript = Transcript::new();
        transcript.push(ChatMessage::user("hi"));
        let reply = ChatMessage::assistant("Ol");
        let id = reply.id;
        transcript.push(reply);

        assert!(transcript.set_text(id, "Olá!"));
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.messages()[1].id, id);
        assert_eq!(transcript.messages()[1].text, "Olá!");
    }

    #[test]
    fn set_text_on_unknown_id_is_rejected() {
        let mut transcript = Transcript::new();
        transcript.push(ChatMessage::user("hi"));
        assert!(!transcript.set_text(Uuid::new_v4(), "nope"));
    }
}
