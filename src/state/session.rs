use std::{
    collections::HashMap,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::extract::ws::{Message, Utf8Bytes};
use indexmap::IndexMap;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::{
    bank::Question,
    dto::ws::{GameStatus, ServerMessage},
    error::EngineError,
    state::{
        PlayerConnection,
        clock::QuestionClock,
        registry::DEFAULT_SESSION_ID,
        state_machine::{RoundPhase, SessionEvent, SessionPhase, SessionStateMachine},
    },
};

/// Stable identifier of a session; `"default"` is reserved.
pub type SessionId = String;
/// Stable identifier of a player within its session.
pub type PlayerId = Uuid;

/// Points awarded to the first correct answer of a question.
const FIRST_CORRECT_POINTS: u32 = 1;
/// Points awarded to any later correct answer. The current policy rewards
/// speed only.
const LATE_CORRECT_POINTS: u32 = 0;

/// A player registered in a session.
#[derive(Debug)]
pub struct Player {
    /// Unique id allocated at join time.
    pub id: PlayerId,
    /// Name exactly as submitted by the client.
    pub name: String,
    /// Name shown to other players, suffixed when `name` collides.
    pub display_name: String,
    /// Points accumulated in the running game.
    pub score: u32,
    /// Whether this player already answered the open question.
    pub answered: bool,
    /// Outbound channel towards the player's socket.
    pub connection: PlayerConnection,
}

/// What a join produced, reported back to the connection handler.
#[derive(Debug)]
pub struct JoinOutcome {
    /// Id allocated for the new player.
    pub player_id: PlayerId,
    /// Display name after duplicate handling.
    pub display_name: String,
    /// Whether the player is the session host (first present player).
    pub is_host: bool,
}

/// Aftermath of a submission.
#[derive(Debug)]
pub struct SubmitOutcome {
    /// Round the answer counted towards; used to resolve the question.
    pub round: u64,
    /// Whether every present player has now answered.
    pub all_answered: bool,
}

/// Aftermath of a player leaving.
#[derive(Debug)]
pub struct LeaveOutcome {
    /// Whether the player was actually part of the session.
    pub removed: bool,
    /// Whether the session is now empty.
    pub now_empty: bool,
}

/// Mutable session state, only ever touched under the session lock.
///
/// `round` increments every time a question is posed; timer callbacks carry
/// the round they were armed for and no-op on a mismatch. `resolved` is the
/// single source of truth for exactly-once question resolution: both the
/// deadline clock and the all-answered path flip it under the same lock.
#[derive(Debug)]
struct SessionInner {
    machine: SessionStateMachine,
    current_index: usize,
    round: u64,
    resolved: bool,
    first_correct: Option<PlayerId>,
    players: IndexMap<PlayerId, Player>,
    /// Total joins seen per base name; monotonic so display-name suffixes are
    /// never reissued after a departure.
    name_counts: HashMap<String, u32>,
    clock: Option<QuestionClock>,
}

impl SessionInner {
    fn new() -> Self {
        Self {
            machine: SessionStateMachine::new(),
            current_index: 0,
            round: 0,
            resolved: false,
            first_correct: None,
            players: IndexMap::new(),
            name_counts: HashMap::new(),
            clock: None,
        }
    }

    /// Allocate the display name for a joiner called `base`.
    ///
    /// The second holder of a name retroactively tags the first one with
    /// `(1)`, the n-th joiner gets `(n)`. Suffixes are never re-packed when
    /// players leave.
    fn register_display_name(&mut self, base: &str) -> String {
        let count = self.name_counts.entry(base.to_string()).or_insert(0);
        *count += 1;
        let seq = *count;

        match seq {
            1 => base.to_string(),
            2 => {
                if let Some(first) = self
                    .players
                    .values_mut()
                    .find(|p| p.name == base && p.display_name == base)
                {
                    first.display_name = format!("{base} (1)");
                }
                format!("{base} (2)")
            }
            n => format!("{base} ({n})"),
        }
    }

    fn display_names(&self) -> Vec<String> {
        self.players
            .values()
            .map(|p| p.display_name.clone())
            .collect()
    }

    /// Display name to score, in join order.
    fn score_board(&self) -> IndexMap<String, u32> {
        self.players
            .values()
            .map(|p| (p.display_name.clone(), p.score))
            .collect()
    }

    /// True only when at least one player is present and everyone answered.
    fn all_answered(&self) -> bool {
        !self.players.is_empty() && self.players.values().all(|p| p.answered)
    }

    /// Highest score wins; ties go to the earliest joiner.
    fn winner(&self) -> Option<(String, u32)> {
        let mut best: Option<&Player> = None;
        for player in self.players.values() {
            if best.is_none_or(|current| player.score > current.score) {
                best = Some(player);
            }
        }
        best.map(|p| (p.display_name.clone(), p.score))
    }

    fn cancel_clock(&mut self) {
        if let Some(clock) = self.clock.take() {
            clock.cancel();
        }
    }

    /// Deliver `message` to every open connection, skipping closed ones.
    fn broadcast(&self, message: &ServerMessage) {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "failed to serialize broadcast payload");
                return;
            }
        };
        let text: Utf8Bytes = payload.into();

        for player in self.players.values() {
            if !player.connection.is_open() {
                continue;
            }
            let _ = player.connection.tx.send(Message::Text(text.clone()));
        }
    }

    /// Deliver `message` to a single player, best effort.
    fn send_to(&self, player_id: PlayerId, message: &ServerMessage) {
        if let Some(player) = self.players.get(&player_id) {
            player.connection.send(message);
        }
    }
}

/// One independently running trivia session.
///
/// All mutable state sits behind a single [`Mutex`], giving the per-session
/// single-writer discipline: client submissions, clock expiries, and delayed
/// advances all serialize through it. The summary counters are mirrored into
/// atomics so discovery listings never take the lock.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    name: String,
    questions: Arc<[Question]>,
    player_count: AtomicUsize,
    in_progress: AtomicBool,
    inner: Mutex<SessionInner>,
}

impl Session {
    /// Create a session in the lobby with no players.
    pub fn new(id: SessionId, name: String, questions: Arc<[Question]>) -> Self {
        Self {
            id,
            name,
            questions,
            player_count: AtomicUsize::new(0),
            in_progress: AtomicBool::new(false),
            inner: Mutex::new(SessionInner::new()),
        }
    }

    /// Stable id of this session.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human-readable name of this session.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is the reserved default session.
    pub fn is_default(&self) -> bool {
        self.id == DEFAULT_SESSION_ID
    }

    /// Lock-free player count for discovery listings.
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    /// Lock-free in-progress flag for discovery listings.
    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Relaxed)
    }

    /// Register a new player and push the join notifications.
    ///
    /// A joiner into a waiting session receives the lobby status (and the
    /// host flag when it is alone), and the roster is re-broadcast. A joiner
    /// into a running game only learns that the game is in progress.
    pub async fn join(&self, name: String, connection: PlayerConnection) -> JoinOutcome {
        let mut inner = self.inner.lock().await;

        let player_id = Uuid::new_v4();
        let display_name = inner.register_display_name(&name);
        let is_host = inner.players.is_empty();

        inner.players.insert(
            player_id,
            Player {
                id: player_id,
                name,
                display_name: display_name.clone(),
                score: 0,
                answered: false,
                connection,
            },
        );
        self.player_count
            .store(inner.players.len(), Ordering::Relaxed);

        if inner.machine.is_in_progress() {
            inner.send_to(
                player_id,
                &ServerMessage::GameStatus {
                    status: GameStatus::InProgress,
                    game_id: None,
                    game_name: None,
                },
            );
        } else {
            inner.send_to(
                player_id,
                &ServerMessage::GameStatus {
                    status: GameStatus::Waiting,
                    game_id: Some(self.id.clone()),
                    game_name: Some(self.name.clone()),
                },
            );
            if is_host {
                inner.send_to(player_id, &ServerMessage::HostStatus { is_host: true });
            }
            let players = inner.display_names();
            inner.broadcast(&ServerMessage::PlayerList { players });
        }

        JoinOutcome {
            player_id,
            display_name,
            is_host,
        }
    }

    /// Leave the lobby and pose the first question.
    ///
    /// Resets every score, broadcasts `gameStarted`, and arms the deadline
    /// clock. `on_expire` receives the posed round and is invoked if the
    /// deadline elapses before everyone answered.
    pub async fn start<F, Fut>(
        &self,
        question_secs: u64,
        question_duration: Duration,
        on_expire: F,
    ) -> Result<(), EngineError>
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut inner = self.inner.lock().await;

        inner.machine.apply(SessionEvent::Start)?;
        self.in_progress.store(true, Ordering::Relaxed);

        inner.current_index = 0;
        for player in inner.players.values_mut() {
            player.score = 0;
            player.answered = false;
        }

        inner.broadcast(&ServerMessage::GameStarted);
        self.pose_current(&mut inner, question_secs, question_duration, on_expire);
        Ok(())
    }

    /// Arbitrate one answer submission.
    ///
    /// The first correct answer of a round is recorded atomically under the
    /// session lock, so concurrent submissions yield exactly one `fastest`.
    /// The submitter gets its verdict unicast and the aggregate scores are
    /// re-broadcast regardless of correctness.
    pub async fn submit(
        &self,
        player_id: PlayerId,
        answer: &str,
    ) -> Result<SubmitOutcome, EngineError> {
        let mut inner = self.inner.lock().await;

        if !matches!(
            inner.machine.phase(),
            SessionPhase::InProgress(RoundPhase::Asking)
        ) || inner.resolved
        {
            return Err(EngineError::NoActiveQuestion);
        }
        let Some(question) = self.questions.get(inner.current_index) else {
            return Err(EngineError::NoActiveQuestion);
        };

        // Exact, case-sensitive match against the bank's correct option.
        let correct = answer == question.correct;

        let inner_ref = &mut *inner;
        let player = inner_ref
            .players
            .get_mut(&player_id)
            .ok_or(EngineError::UnknownPlayer(player_id))?;
        if player.answered {
            return Err(EngineError::AlreadyAnswered);
        }
        player.answered = true;

        let fastest = correct && inner_ref.first_correct.is_none();
        player.score += if fastest {
            FIRST_CORRECT_POINTS
        } else if correct {
            LATE_CORRECT_POINTS
        } else {
            0
        };
        let score = player.score;
        if fastest {
            inner_ref.first_correct = Some(player.id);
        }

        inner.send_to(
            player_id,
            &ServerMessage::AnswerResult {
                correct,
                fastest,
                score,
            },
        );
        let scores = inner.score_board();
        inner.broadcast(&ServerMessage::ScoreUpdate { scores });

        Ok(SubmitOutcome {
            round: inner.round,
            all_answered: inner.all_answered(),
        })
    }

    /// Close the question posed in `round` and broadcast the reveal.
    ///
    /// Exactly-once: whichever of the deadline clock or the all-answered path
    /// arrives second sees `resolved` already set (or a newer round) and
    /// becomes a no-op. Returns whether the reveal actually ran, in which case
    /// the caller schedules the delayed advance for the same round.
    pub async fn resolve(&self, round: u64) -> bool {
        let mut inner = self.inner.lock().await;

        if inner.round != round || inner.resolved {
            return false;
        }
        if !matches!(
            inner.machine.phase(),
            SessionPhase::InProgress(RoundPhase::Asking)
        ) {
            return false;
        }

        inner.resolved = true;
        inner.cancel_clock();

        let Some(question) = self.questions.get(inner.current_index) else {
            return false;
        };
        let fastest_player = inner
            .first_correct
            .and_then(|id| inner.players.get(&id))
            .map(|p| p.display_name.clone());

        if let Err(err) = inner.machine.apply(SessionEvent::Resolve) {
            warn!(session_id = %self.id, error = %err, "resolve rejected by state machine");
            return false;
        }

        inner.broadcast(&ServerMessage::RevealAnswer {
            correct_answer: question.correct.clone(),
            question_number: inner.current_index + 1,
            fastest_player,
        });
        true
    }

    /// Move past the reveal posed in `round`: pose the next question or
    /// finish the game when the sequence is exhausted.
    ///
    /// Stale invocations (round moved on, session abandoned) are no-ops.
    pub async fn advance<F, Fut>(
        &self,
        round: u64,
        question_secs: u64,
        question_duration: Duration,
        on_expire: F,
    ) -> bool
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut inner = self.inner.lock().await;

        if inner.round != round {
            return false;
        }
        if !matches!(
            inner.machine.phase(),
            SessionPhase::InProgress(RoundPhase::Reveal)
        ) {
            return false;
        }

        inner.current_index += 1;
        if inner.current_index >= self.questions.len() {
            self.finish(&mut inner);
        } else {
            if let Err(err) = inner.machine.apply(SessionEvent::Advance) {
                warn!(session_id = %self.id, error = %err, "advance rejected by state machine");
                return false;
            }
            self.pose_current(&mut inner, question_secs, question_duration, on_expire);
        }
        true
    }

    /// Remove a player, broadcast the new roster, and wind the session down
    /// when it drains.
    ///
    /// The last player leaving a running game forces `GameOver` so no armed
    /// clock outlives its audience. A drained default session resets to the
    /// lobby for later joiners.
    pub async fn handle_leave(&self, player_id: PlayerId) -> LeaveOutcome {
        let mut inner = self.inner.lock().await;

        if inner.players.shift_remove(&player_id).is_none() {
            return LeaveOutcome {
                removed: false,
                now_empty: inner.players.is_empty(),
            };
        }
        self.player_count
            .store(inner.players.len(), Ordering::Relaxed);

        let players = inner.display_names();
        inner.broadcast(&ServerMessage::PlayerList { players });

        let now_empty = inner.players.is_empty();
        if now_empty {
            if inner.machine.is_in_progress() {
                inner.cancel_clock();
                inner.first_correct = None;
                if let Err(err) = inner.machine.apply(SessionEvent::Abandon) {
                    warn!(session_id = %self.id, error = %err, "abandon rejected by state machine");
                }
                self.in_progress.store(false, Ordering::Relaxed);
            }

            if self.is_default() && matches!(inner.machine.phase(), SessionPhase::GameOver) {
                // Fresh lifecycle for backward-compatible joins; bumping the
                // round turns any stale timer callback into a no-op.
                if inner.machine.apply(SessionEvent::Reset).is_ok() {
                    inner.current_index = 0;
                    inner.round += 1;
                    inner.resolved = false;
                    inner.first_correct = None;
                    inner.name_counts.clear();
                }
            }
        }

        LeaveOutcome {
            removed: true,
            now_empty,
        }
    }

    /// Cancel any armed clock; called when the registry discards the session.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        inner.cancel_clock();
    }

    /// Broadcast the question at the current cursor and arm its deadline.
    fn pose_current<F, Fut>(
        &self,
        inner: &mut SessionInner,
        question_secs: u64,
        question_duration: Duration,
        on_expire: F,
    ) where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Some(question) = self.questions.get(inner.current_index) else {
            self.finish(inner);
            return;
        };

        inner.round += 1;
        inner.resolved = false;
        inner.first_correct = None;
        for player in inner.players.values_mut() {
            player.answered = false;
        }

        inner.broadcast(&ServerMessage::Question {
            question_number: inner.current_index + 1,
            total_questions: self.questions.len(),
            question: question.text.clone(),
            answers: question.options.clone(),
            time_limit: question_secs,
        });

        let round = inner.round;
        inner.cancel_clock();
        inner.clock = Some(QuestionClock::arm(question_duration, on_expire(round)));
    }

    /// Announce final scores and the winner, then seal the session.
    fn finish(&self, inner: &mut SessionInner) {
        inner.cancel_clock();
        inner.first_correct = None;

        let scores = inner.score_board();
        let winner = inner.winner();

        if let Err(err) = inner.machine.apply(SessionEvent::Finish) {
            warn!(session_id = %self.id, error = %err, "finish rejected by state machine");
        }
        self.in_progress.store(false, Ordering::Relaxed);

        inner.broadcast(&ServerMessage::GameOver {
            winner: winner.as_ref().map(|(name, _)| name.clone()),
            winner_score: winner.map(|(_, score)| score),
            scores,
        });
    }

    #[cfg(test)]
    async fn phase(&self) -> SessionPhase {
        self.inner.lock().await.machine.phase()
    }
}
