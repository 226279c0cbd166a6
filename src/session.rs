// src/session.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::chat::{ChatMessage, Transcript};
use crate::models::dataset::TabularDataset;
use crate::upstream::WireMessage;

/// One browser conversation: transcript, active datasets and the in-flight
/// flag. Nothing is persisted; a restart clears all sessions.
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub transcript: Transcript,
    pub datasets: Vec<TabularDataset>,
    in_flight: bool,
    pub created_at: DateTime<Utc>,
}

/// Snapshot handed to the turn driver when a turn starts, so the session
/// lock is not held across the upstream request.
#[derive(Debug)]
pub struct TurnInput {
    pub history: Vec<WireMessage>,
    pub datasets: Vec<TabularDataset>,
}

impl Session {
    fn new(id: Uuid) -> Self {
        Self {
            id,
            transcript: Transcript::new(),
            datasets: Vec::new(),
            in_flight: false,
            created_at: Utc::now(),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Starts a turn: records the user message and raises the in-flight
    /// flag. At most one assistant reply may be streaming per session, so a
    /// second turn is rejected until the current one terminates.
    pub fn begin_turn(&mut self, user_text: &str) -> Result<TurnInput, ServiceError> {
        if self.in_flight {
            return Err(ServiceError::TurnInFlight);
        }
        self.in_flight = true;
        self.transcript.push(ChatMessage::user(user_text));

        let history = self
            .transcript
            .messages()
            .iter()
            .map(|m| WireMessage::new(m.role.as_str(), m.text.clone()))
            .collect();
        Ok(TurnInput {
            history,
            datasets: self.datasets.clone(),
        })
    }

    /// Ends the turn regardless of how it terminated.
    pub fn end_turn(&mut self) {
        self.in_flight = false;
    }

    pub fn add_dataset(&mut self, dataset: TabularDataset) {
        self.datasets.push(dataset);
    }

    /// Removes a dataset on explicit user request, returning it for the
    /// confirmation notice.
    pub fn remove_dataset(&mut self, index: usize) -> Result<TabularDataset, ServiceError> {
        if index >= self.datasets.len() {
            return Err(ServiceError::DatasetNotFound(index));
        }
        Ok(self.datasets.remove(index))
    }
}

pub type SharedSession = Arc<Mutex<Session>>;

/// In-memory registry of live sessions, keyed by UUID.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, SharedSession>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session with the given id, creating it when absent. A
    /// None id always creates a fresh session.
    pub async fn get_or_create(&self, id: Option<Uuid>) -> (Uuid, SharedSession) {
        let id = id.unwrap_or_else(Uuid::new_v4);
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(id)
            .or_insert_with(|| {
                tracing::info!("starting chat session {}", id);
                Arc::new(Mutex::new(Session::new(id)))
            })
            .clone();
        (id, session)
    }

    pub async fn get(&self, id: Uuid) -> Result<SharedSession, ServiceError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(ServiceError::SessionNotFound(id))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
