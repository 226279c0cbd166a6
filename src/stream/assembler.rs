// src/stream/assembler.rs
use uuid::Uuid;

use crate::models::chat::{ChatMessage, Transcript};

/// Lifecycle of one assistant turn.
///
/// Idle -> Streaming on the first delta, Streaming -> Terminal when the
/// stream ends. A turn that terminates before any delta goes straight to
/// Terminal and never creates an assistant message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Streaming,
    Terminal,
}

/// Applies text deltas to the transcript for a single assistant turn.
///
/// The first non-empty delta mints the assistant message and appends it to
/// the transcript; every later delta rewrites that same entry's text with
/// the running accumulation, which is what produces the typewriter effect:
/// observers see one message growing, never a sequence of messages.
#[derive(Debug)]
pub struct MessageAssembler {
    message_id: Option<Uuid>,
    accumulated: String,
    phase: TurnPhase,
}

impl MessageAssembler {
    pub fn new() -> Self {
        Self {
            message_id: None,
            accumulated: String::new(),
            phase: TurnPhase::Idle,
        }
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Id of the in-flight assistant message, once one exists.
    pub fn message_id(&self) -> Option<Uuid> {
        self.message_id
    }

    pub fn text(&self) -> &str {
        &self.accumulated
    }

    /// Applies one delta, returning the id of the message it updated.
    ///
    /// An empty delta changes nothing: the running text stays as it is and
    /// no message is created. Panics if called after the turn terminated,
    /// which would violate the single-writer discipline of the read loop.
    pub fn apply(&mut self, transcript: &mut Transcript, delta: &str) -> Option<Uuid> {
        assert!(
            self.phase != TurnPhase::Terminal,
            "delta applied after the turn terminated"
        );
        if delta.is_empty() {
            return self.message_id;
        }

        self.accumulated.push_str(delta);
        match self.message_id {
            None => {
                let message = ChatMessage::assistant(self.accumulated.clone());
                let id = message.id;
                self.message_id = Some(id);
                self.phase = TurnPhase::Streaming;
                transcript.push(message);
                Some(id)
            }
            Some(id) => {
                transcript.set_text(id, &self.accumulated);
                Some(id)
            }
        }
    }

    /// Marks the turn terminal; the message (if any) stops growing.
    pub fn finish(&mut self) {
        self.phase = TurnPhase::Terminal;
    }
}

impl Default for MessageAssembler {
    fn default() -> Self {
        Self::new()
    }
}
