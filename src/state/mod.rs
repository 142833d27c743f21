pub mod clock;
pub mod registry;
pub mod session;
pub mod state_machine;

use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tracing::warn;

use crate::{
    bank::Question, config::AppConfig, dto::ws::ServerMessage, state::registry::SessionRegistry,
};

/// Shared handle to the central application state.
pub type SharedState = Arc<AppState>;

#[derive(Clone, Debug)]
/// Handle used to push events to a connected player.
///
/// Sends enqueue onto the connection's writer task and never block; a closed
/// channel simply drops the event, the disconnect path cleans up the player.
pub struct PlayerConnection {
    /// Outbound frame queue drained by the socket writer task.
    pub tx: mpsc::UnboundedSender<Message>,
}

impl PlayerConnection {
    /// Whether the writer side of this connection is still alive.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Serialize and enqueue a single event, best effort.
    pub fn send(&self, message: &ServerMessage) {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "failed to serialize outbound event");
                return;
            }
        };
        let _ = self.tx.send(Message::Text(payload.into()));
    }
}

/// Central application state owning the session registry and the question
/// bank loaded at startup.
pub struct AppState {
    config: AppConfig,
    questions: Arc<[Question]>,
    sessions: SessionRegistry,
}

impl AppState {
    /// Construct the shared state and seed the reserved default session.
    pub fn new(config: AppConfig, questions: Arc<[Question]>) -> SharedState {
        let sessions = SessionRegistry::new();
        sessions.create_default(Arc::clone(&questions));

        Arc::new(Self {
            config,
            questions,
            sessions,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The immutable question bank shared by every session.
    pub fn questions(&self) -> Arc<[Question]> {
        Arc::clone(&self.questions)
    }

    /// The process-wide session registry.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }
}
