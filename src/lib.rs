// lib.rs - chat analysis service for uploaded spreadsheets
pub mod agent;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod prompt;
pub mod session;
pub mod sheets;
pub mod stream;
pub mod upstream;

use session::SessionStore;
use stream::RelayConfig;
use upstream::CompletionClient;

/// Shared state: the upstream completion client, the live sessions and the
/// relay tunables.
pub struct AppState {
    pub completions: Option<CompletionClient>,
    pub sessions: SessionStore,
    pub relay: RelayConfig,
}
