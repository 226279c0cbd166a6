// src/agent.rs
//! Drives one assistant turn: builds the upstream request from the session
//! snapshot, relays the streamed reply into the transcript and republishes
//! each update to the browser.

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::RelayError;
use crate::models::chat::ChatMessage;
use crate::prompt;
use crate::session::{SharedSession, TurnInput};
use crate::stream::{MessageAssembler, RelayConfig, TurnRelay};
use crate::upstream::{CompletionClient, WireMessage};

/// Events emitted to the browser over the turn's event stream.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// Which session this turn belongs to; always the first event.
    Session { session_id: Uuid },
    /// One text fragment appended to the in-flight assistant message.
    Delta { text: String },
    /// The turn completed; `message` is the final assistant message, absent
    /// when the stream ended before any delta arrived.
    Done { message: Option<ChatMessage> },
    /// The turn failed mid-stream. Any partial text already assembled stays
    /// in the transcript but stops growing.
    Error { category: String, notice: String },
}

/// The wire messages for one turn: system prompt with the embedded
/// datasets, then the conversation history ending in the new user message.
pub fn wire_messages(input: &TurnInput) -> Vec<WireMessage> {
    let mut messages = Vec::with_capacity(input.history.len() + 1);
    messages.push(WireMessage::system(prompt::build_system_prompt(
        &input.datasets,
    )));
    messages.extend(input.history.iter().cloned());
    messages
}

/// Opens the upstream stream for a turn that was already begun.
///
/// A request-phase failure (rate limit, exhausted quota, any other non-2xx,
/// connection error) ends the turn immediately: the in-flight flag is
/// cleared, no assistant message exists and the error maps to an HTTP
/// status on the chat request itself.
pub async fn start_turn(
    client: &CompletionClient,
    session: &SharedSession,
    input: &TurnInput,
) -> Result<reqwest::Response, RelayError> {
    match client.stream_chat(wire_messages(input)).await {
        Ok(response) => Ok(response),
        Err(err) => {
            session.lock().await.end_turn();
            Err(err)
        }
    }
}

/// Relays the streamed reply to completion and always clears the in-flight
/// flag.
///
/// Cancellation is cooperative: the token is checked before every transcript
/// mutation, and the browser walking away (the event channel closing)
/// cancels the turn.
pub async fn relay_turn(
    response: reqwest::Response,
    relay_config: RelayConfig,
    session: SharedSession,
    events: mpsc::Sender<TurnEvent>,
    cancel: CancellationToken,
) {
    let result = stream_reply(response, &relay_config, &session, &events, &cancel).await;

    session.lock().await.end_turn();

    match result {
        Ok(message) => {
            let _ = events.send(TurnEvent::Done { message }).await;
        }
        Err(RelayError::Cancelled) => {
            tracing::debug!("turn cancelled, discarding the read loop result");
        }
        Err(err) => {
            tracing::warn!("turn failed mid-stream: {}", err);
            let _ = events
                .send(TurnEvent::Error {
                    category: err.category().to_string(),
                    notice: err.notice().to_string(),
                })
                .await;
        }
    }
}

async fn stream_reply(
    response: reqwest::Response,
    relay_config: &RelayConfig,
    session: &SharedSession,
    events: &mpsc::Sender<TurnEvent>,
    cancel: &CancellationToken,
) -> Result<Option<ChatMessage>, RelayError> {
    let mut relay = TurnRelay::new(response.bytes_stream(), cancel.clone(), relay_config);
    let mut assembler = MessageAssembler::new();

    while let Some(delta) = relay.next_delta().await? {
        if cancel.is_cancelled() {
            return Err(RelayError::Cancelled);
        }
        {
            let mut session = session.lock().await;
            assembler.apply(&mut session.transcript, &delta);
        }
        if events.send(TurnEvent::Delta { text: delta }).await.is_err() {
            // Nobody is listening any more; stop reading and make sure no
            // later step can touch the transcript.
            cancel.cancel();
            return Err(RelayError::Cancelled);
        }
    }
    assembler.finish();

    let message = match assembler.message_id() {
        Some(id) => session.lock().await.transcript.get(id).cloned(),
        None => None,
    };
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStore;

    #[tokio::test]
    async fn wire_messages_lead_with_the_system_prompt() {
        let store = SessionStore::new();
        let (_, session) = store.get_or_create(None).await;
        let input = session.lock().await.begin_turn("how many rows?").unwrap();

        let messages = wire_messages(&input);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[1].content, "how many rows?");
    }
}
