use serde::Serialize;
use utoipa::ToSchema;

use crate::state::registry::SessionSummary;

/// Joinable session entry returned by discovery requests.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameSummary {
    /// Stable session id used by `joinSpecificGame`.
    pub id: String,
    /// Human-readable session name.
    pub name: String,
    /// Whether a game is currently running in the session.
    pub in_progress: bool,
    /// Number of players currently in the session.
    pub player_count: usize,
}

impl From<SessionSummary> for GameSummary {
    fn from(value: SessionSummary) -> Self {
        Self {
            id: value.id,
            name: value.name,
            in_progress: value.in_progress,
            player_count: value.player_count,
        }
    }
}
