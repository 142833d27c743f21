use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{dto::game::GameSummary, error::EngineError};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Actions accepted from player WebSocket clients.
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ClientAction {
    /// Join the reserved default session.
    Join {
        /// Display name the player wants to use.
        name: String,
    },
    /// Join an existing session by id.
    #[serde(rename_all = "camelCase")]
    JoinSpecificGame {
        /// Id of the session to join.
        game_id: String,
        /// Display name the player wants to use.
        name: String,
    },
    /// Create a fresh session and join it in one step.
    #[serde(rename_all = "camelCase")]
    CreateNewGame {
        /// Display name the player wants to use.
        name: String,
        /// Human-readable name for the new session.
        game_name: String,
    },
    /// Ask for the list of joinable sessions.
    GetAvailableGames,
    /// Start the game in the caller's current session.
    StartGame,
    /// Submit an answer to the open question.
    Answer {
        /// The chosen option, echoed verbatim.
        answer: String,
    },
    /// Catch-all for unrecognized action tags.
    #[serde(other)]
    Unknown,
}

impl ClientAction {
    /// Decode a raw text frame into an action.
    pub fn from_json_str(raw: &str) -> Result<Self, EngineError> {
        serde_json::from_str(raw).map_err(|err| EngineError::MalformedMessage(err.to_string()))
    }
}

/// Lobby status reported to a joining player.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum GameStatus {
    /// The session is gathering players.
    Waiting,
    /// A game is already running.
    InProgress,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Events pushed to one or many player connections.
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Tells a joining player whether its session is waiting or running.
    #[serde(rename_all = "camelCase")]
    GameStatus {
        /// Current lobby status.
        status: GameStatus,
        /// Session id, included while waiting so the client can share it.
        #[serde(skip_serializing_if = "Option::is_none")]
        game_id: Option<String>,
        /// Session name, included while waiting.
        #[serde(skip_serializing_if = "Option::is_none")]
        game_name: Option<String>,
    },
    /// Tells the first joiner it may start the game.
    #[serde(rename_all = "camelCase")]
    HostStatus {
        /// Whether the receiving player is the host.
        is_host: bool,
    },
    /// Current roster of display names, broadcast on every join/leave.
    PlayerList {
        /// Display names in join order.
        players: Vec<String>,
    },
    /// Confirmation that a new session was created for the requester.
    #[serde(rename_all = "camelCase")]
    GameCreated {
        /// Id of the freshly created session.
        game_id: String,
        /// Name of the freshly created session.
        game_name: String,
    },
    /// Reply to a session discovery request.
    AvailableGames {
        /// Joinable sessions known to the registry.
        games: Vec<GameSummary>,
    },
    /// The game left the lobby; questions follow.
    GameStarted,
    /// An open question, never carrying the correct option.
    #[serde(rename_all = "camelCase")]
    Question {
        /// 1-based position of the question.
        question_number: usize,
        /// Total number of questions in this game.
        total_questions: usize,
        /// The question text.
        question: String,
        /// Answer options in bank order.
        answers: Vec<String>,
        /// Seconds the players have to answer.
        time_limit: u64,
    },
    /// Unicast verdict for a submitted answer.
    AnswerResult {
        /// Whether the submitted option was the correct one.
        correct: bool,
        /// Whether this was the first correct answer for the question.
        fastest: bool,
        /// The submitter's score after resolution.
        score: u32,
    },
    /// Aggregate scores, broadcast after every submission.
    ScoreUpdate {
        /// Display name to score, in join order.
        scores: IndexMap<String, u32>,
    },
    /// The question closed; the correct answer is disclosed.
    #[serde(rename_all = "camelCase")]
    RevealAnswer {
        /// The correct option text.
        correct_answer: String,
        /// 1-based position of the resolved question.
        question_number: usize,
        /// Display name of the fastest correct answerer, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        fastest_player: Option<String>,
    },
    /// Final scores and the winner once the question sequence is exhausted.
    #[serde(rename_all = "camelCase")]
    GameOver {
        /// Display name to final score, in join order.
        scores: IndexMap<String, u32>,
        /// Display name of the winning player, omitted when no players remain.
        #[serde(skip_serializing_if = "Option::is_none")]
        winner: Option<String>,
        /// The winner's score.
        #[serde(skip_serializing_if = "Option::is_none")]
        winner_score: Option<u32>,
    },
    /// Something the client asked for could not be done.
    Error {
        /// Human-readable description.
        message: String,
    },
}
