use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, info};

use crate::{
    dto::game::GameSummary,
    error::EngineError,
    state::{
        PlayerConnection, SharedState,
        session::{JoinOutcome, PlayerId, Session},
    },
};

/// Look up a session or report it missing.
fn require_session(state: &SharedState, session_id: &str) -> Result<Arc<Session>, EngineError> {
    state
        .sessions()
        .get(session_id)
        .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))
}

/// Create a new session backed by the default question bank.
pub fn create_session(state: &SharedState, game_name: String) -> Arc<Session> {
    state.sessions().create(state.questions(), Some(game_name))
}

/// Join a player into an existing session.
pub async fn join_session(
    state: &SharedState,
    session_id: &str,
    name: String,
    connection: PlayerConnection,
) -> Result<(Arc<Session>, JoinOutcome), EngineError> {
    let session = require_session(state, session_id)?;
    let outcome = session.join(name, connection).await;
    info!(
        session_id = %session.id(),
        player = %outcome.display_name,
        is_host = outcome.is_host,
        "player joined"
    );
    Ok((session, outcome))
}

/// Start the game in `session_id` and arm the first question's deadline.
pub async fn start_game(state: &SharedState, session_id: &str) -> Result<(), EngineError> {
    let session = require_session(state, session_id)?;

    let timer_state = Arc::clone(state);
    let timer_id = session.id().to_string();
    session
        .start(
            state.config().question_secs(),
            state.config().question_duration(),
            move |round| async move {
                resolve_question(&timer_state, &timer_id, round).await;
            },
        )
        .await?;

    info!(session_id = %session_id, "game started");
    Ok(())
}

/// Arbitrate one answer and close the question when everyone has answered.
pub async fn submit_answer(
    state: &SharedState,
    session_id: &str,
    player_id: PlayerId,
    answer: &str,
) -> Result<(), EngineError> {
    let session = require_session(state, session_id)?;
    let outcome = session.submit(player_id, answer).await?;

    if outcome.all_answered {
        // Everyone answered early: the deadline clock loses the race.
        if session.resolve(outcome.round).await {
            schedule_advance(state, session_id, outcome.round);
        }
    }
    Ok(())
}

/// Close the question posed in `round`, typically from a deadline expiry.
///
/// The session is re-resolved through the registry because the timer may
/// outlive it; a missing session or a stale round is a clean no-op.
pub async fn resolve_question(state: &SharedState, session_id: &str, round: u64) {
    let Some(session) = state.sessions().get(session_id) else {
        debug!(session_id = %session_id, "deadline fired for a removed session");
        return;
    };

    if session.resolve(round).await {
        schedule_advance(state, session_id, round);
    }
}

/// After the reveal pause, move the session past the question of `round`.
fn schedule_advance(state: &SharedState, session_id: &str, round: u64) {
    let state = Arc::clone(state);
    let session_id = session_id.to_string();
    let delay = state.config().reveal_delay();

    tokio::spawn(async move {
        sleep(delay).await;
        advance_question(&state, &session_id, round).await;
    });
}

/// Pose the next question or finish the game. No-op when the session is gone
/// or moved on since the reveal was scheduled.
pub async fn advance_question(state: &SharedState, session_id: &str, round: u64) {
    let Some(session) = state.sessions().get(session_id) else {
        debug!(session_id = %session_id, "advance fired for a removed session");
        return;
    };

    let timer_state = Arc::clone(state);
    let timer_id = session.id().to_string();
    session
        .advance(
            round,
            state.config().question_secs(),
            state.config().question_duration(),
            move |next_round| async move {
                resolve_question(&timer_state, &timer_id, next_round).await;
            },
        )
        .await;
}

/// Detach a player from its session, evicting drained non-default sessions.
pub async fn leave_session(state: &SharedState, session_id: &str, player_id: PlayerId) {
    let Some(session) = state.sessions().get(session_id) else {
        return;
    };

    let outcome = session.handle_leave(player_id).await;
    if outcome.removed {
        info!(session_id = %session_id, player_id = %player_id, "player left");
    }
    if outcome.now_empty && !session.is_default() {
        state.sessions().remove(session_id).await;
    }
}

/// Discovery listing for `getAvailableGames` and the REST surface.
pub fn available_games(state: &SharedState) -> Vec<GameSummary> {
    state
        .sessions()
        .summaries()
        .into_iter()
        .map(Into::into)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::extract::ws::Message;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        bank::Question,
        config::AppConfig,
        state::{AppState, registry::DEFAULT_SESSION_ID},
    };

    fn questions() -> Arc<[Question]> {
        vec![
            Question {
                text: "2+2?".into(),
                options: vec!["3".into(), "4".into(), "5".into()],
                correct: "4".into(),
            },
            Question {
                text: "3*3?".into(),
                options: vec!["6".into(), "9".into()],
                correct: "9".into(),
            },
        ]
        .into()
    }

    fn app_state() -> SharedState {
        AppState::new(AppConfig::default(), questions())
    }

    fn connection() -> (PlayerConnection, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (PlayerConnection { tx }, rx)
    }

    fn drain_actions(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<serde_json::Value> {
        let mut actions = Vec::new();
        while let Ok(message) = rx.try_recv() {
            if let Message::Text(text) = message {
                actions.push(serde_json::from_str(text.as_str()).unwrap());
            }
        }
        actions
    }

    fn count_action(actions: &[serde_json::Value], action: &str) -> usize {
        actions.iter().filter(|v| v["action"] == action).count()
    }

    /// Let spawned timer tasks observe the paused clock advancing.
    async fn advance_time(duration: Duration) {
        sleep(duration).await;
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn deadline_resolves_an_unanswered_question_exactly_once() {
        let state = app_state();
        let (conn, mut rx) = connection();
        join_session(&state, DEFAULT_SESSION_ID, "Al".into(), conn)
            .await
            .unwrap();
        start_game(&state, DEFAULT_SESSION_ID).await.unwrap();

        // Nobody answers; the 30s clock closes the question on its own.
        advance_time(Duration::from_secs(31)).await;

        let actions = drain_actions(&mut rx);
        assert_eq!(count_action(&actions, "revealAnswer"), 1);
        let reveal = actions
            .iter()
            .find(|v| v["action"] == "revealAnswer")
            .unwrap();
        assert_eq!(reveal["correctAnswer"], "4");
        assert!(reveal.get("fastestPlayer").is_none());
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn early_answer_cancels_the_clock_and_never_rescores() {
        let state = app_state();
        let (conn, mut rx) = connection();
        let (_, joined) = join_session(&state, DEFAULT_SESSION_ID, "Al".into(), conn)
            .await
            .unwrap();
        start_game(&state, DEFAULT_SESSION_ID).await.unwrap();

        submit_answer(&state, DEFAULT_SESSION_ID, joined.player_id, "4")
            .await
            .unwrap();

        // Run far past the original deadline: the cancelled clock must not
        // produce a second reveal, and the score must stay at one.
        advance_time(Duration::from_secs(2)).await;
        let actions = drain_actions(&mut rx);
        assert_eq!(count_action(&actions, "revealAnswer"), 1);

        advance_time(Duration::from_secs(30)).await;
        let later = drain_actions(&mut rx);
        // The reveal pause elapsed, so question two is out; no extra reveal
        // for question one though.
        assert_eq!(count_action(&later, "revealAnswer"), 0);
        assert_eq!(count_action(&later, "question"), 1);

        let question = later.iter().find(|v| v["action"] == "question").unwrap();
        assert_eq!(question["questionNumber"], 2);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn racing_triggers_produce_a_single_reveal() {
        let state = app_state();
        let (conn, mut rx) = connection();
        let (_, joined) = join_session(&state, DEFAULT_SESSION_ID, "Al".into(), conn)
            .await
            .unwrap();
        start_game(&state, DEFAULT_SESSION_ID).await.unwrap();

        // Simulate the deadline and the all-answered path hitting the same
        // round back to back; the second trigger must lose cleanly.
        submit_answer(&state, DEFAULT_SESSION_ID, joined.player_id, "4")
            .await
            .unwrap();
        resolve_question(&state, DEFAULT_SESSION_ID, 1).await;
        resolve_question(&state, DEFAULT_SESSION_ID, 1).await;

        advance_time(Duration::from_secs(1)).await;
        let actions = drain_actions(&mut rx);
        assert_eq!(count_action(&actions, "revealAnswer"), 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn two_question_game_completes_with_cumulative_winner() {
        let state = app_state();
        let (conn, mut rx) = connection();
        let (_, joined) = join_session(&state, DEFAULT_SESSION_ID, "Al".into(), conn)
            .await
            .unwrap();
        start_game(&state, DEFAULT_SESSION_ID).await.unwrap();

        submit_answer(&state, DEFAULT_SESSION_ID, joined.player_id, "4")
            .await
            .unwrap();
        advance_time(Duration::from_secs(6)).await;

        submit_answer(&state, DEFAULT_SESSION_ID, joined.player_id, "9")
            .await
            .unwrap();
        advance_time(Duration::from_secs(6)).await;

        let actions = drain_actions(&mut rx);
        assert_eq!(count_action(&actions, "gameOver"), 1);
        let game_over = actions.iter().find(|v| v["action"] == "gameOver").unwrap();
        assert_eq!(game_over["winner"], "Al");
        assert_eq!(game_over["winnerScore"], 2);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn two_players_race_for_the_bonus() {
        let state = app_state();
        let session = create_session(&state, "Race".into());
        let id = session.id().to_string();

        let (conn, mut rx_a) = connection();
        let (_, a) = join_session(&state, &id, "A".into(), conn).await.unwrap();
        let (conn, mut rx_b) = connection();
        let (_, b) = join_session(&state, &id, "B".into(), conn).await.unwrap();
        start_game(&state, &id).await.unwrap();

        let state_a = Arc::clone(&state);
        let state_b = Arc::clone(&state);
        let (id_a, id_b) = (id.clone(), id.clone());
        let task_a = tokio::spawn(async move {
            submit_answer(&state_a, &id_a, a.player_id, "4").await
        });
        let task_b = tokio::spawn(async move {
            submit_answer(&state_b, &id_b, b.player_id, "4").await
        });
        task_a.await.unwrap().unwrap();
        task_b.await.unwrap().unwrap();

        advance_time(Duration::from_secs(1)).await;

        let result_a = drain_actions(&mut rx_a)
            .into_iter()
            .find(|v| v["action"] == "answerResult")
            .unwrap();
        let result_b = drain_actions(&mut rx_b)
            .into_iter()
            .find(|v| v["action"] == "answerResult")
            .unwrap();

        let fastest_flags = [result_a["fastest"] == true, result_b["fastest"] == true];
        assert_eq!(fastest_flags.iter().filter(|f| **f).count(), 1);

        let scores = [
            result_a["score"].as_u64().unwrap(),
            result_b["score"].as_u64().unwrap(),
        ];
        let mut sorted = scores;
        sorted.sort_unstable();
        assert_eq!(sorted, [0, 1]);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn pending_advance_becomes_a_no_op_when_the_session_is_removed() {
        let state = app_state();
        let session = create_session(&state, "Short Lived".into());
        let id = session.id().to_string();

        let (conn, _rx) = connection();
        let (_, joined) = join_session(&state, &id, "Al".into(), conn).await.unwrap();
        start_game(&state, &id).await.unwrap();
        submit_answer(&state, &id, joined.player_id, "4")
            .await
            .unwrap();

        // The reveal is out and the delayed advance is pending; the player
        // disconnecting drains the session and evicts it.
        leave_session(&state, &id, joined.player_id).await;
        assert!(state.sessions().get(&id).is_none());

        // The pending advance fires against a missing session.
        advance_time(Duration::from_secs(10)).await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn unknown_session_is_reported() {
        let state = app_state();
        let (conn, _rx) = connection();
        let err = join_session(&state, "missing", "Al".into(), conn)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SessionNotFound(_)));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn discovery_lists_created_sessions() {
        let state = app_state();
        create_session(&state, "Open Table".into());

        let games = available_games(&state);
        assert_eq!(games.len(), 2);
        assert!(games.iter().any(|g| g.id == DEFAULT_SESSION_ID));
        assert!(games.iter().any(|g| g.name == "Open Table"));
    }
}
