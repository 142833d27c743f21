use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    dto::{
        validation::{validate_game_name, validate_player_name},
        ws::{ClientAction, ServerMessage},
    },
    error::EngineError,
    services::game_service,
    state::{
        PlayerConnection, SharedState,
        registry::DEFAULT_SESSION_ID,
        session::{PlayerId, SessionId},
    },
};

/// Identity of the player bound to a socket once it joined a session.
struct SocketIdentity {
    session_id: SessionId,
    player_id: PlayerId,
}

/// Handle the full lifecycle for an individual player WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we
    // await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    info!("player connected");

    let mut identity: Option<SocketIdentity> = None;

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientAction::from_json_str(&text) {
                Ok(action) => handle_action(&state, &outbound_tx, &mut identity, action).await,
                Err(err) => {
                    // Malformed messages are dropped without touching state.
                    warn!(error = %err, "dropping malformed client message");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(error = %err, "websocket error");
                break;
            }
        }
    }

    if let Some(SocketIdentity {
        session_id,
        player_id,
    }) = identity.take()
    {
        game_service::leave_session(&state, &session_id, player_id).await;
    }
    info!("player disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Dispatch one decoded client action.
async fn handle_action(
    state: &SharedState,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    identity: &mut Option<SocketIdentity>,
    action: ClientAction,
) {
    match action {
        ClientAction::Join { name } => {
            join(state, outbound_tx, identity, DEFAULT_SESSION_ID, name).await;
        }
        ClientAction::JoinSpecificGame { game_id, name } => {
            join(state, outbound_tx, identity, &game_id, name).await;
        }
        ClientAction::CreateNewGame { name, game_name } => {
            if let Err(err) = validate_game_name(&game_name) {
                send_error(outbound_tx, &format!("invalid game name: {err}"));
                return;
            }

            let session = game_service::create_session(state, game_name.clone());
            send_message(
                outbound_tx,
                &ServerMessage::GameCreated {
                    game_id: session.id().to_string(),
                    game_name,
                },
            );
            join(state, outbound_tx, identity, session.id(), name).await;
        }
        ClientAction::GetAvailableGames => {
            send_message(
                outbound_tx,
                &ServerMessage::AvailableGames {
                    games: game_service::available_games(state),
                },
            );
        }
        ClientAction::StartGame => {
            let Some(current) = identity.as_ref() else {
                return;
            };
            match game_service::start_game(state, &current.session_id).await {
                Ok(()) => {}
                Err(EngineError::SessionNotFound(_)) => {
                    send_error(outbound_tx, "Game session not found");
                }
                Err(err) => {
                    // A duplicate start is ignored, not punished.
                    debug!(error = %err, "startGame ignored");
                }
            }
        }
        ClientAction::Answer { answer } => {
            let Some(current) = identity.as_ref() else {
                return;
            };
            match game_service::submit_answer(
                state,
                &current.session_id,
                current.player_id,
                &answer,
            )
            .await
            {
                Ok(()) => {}
                Err(EngineError::SessionNotFound(_)) => {
                    send_error(outbound_tx, "Game session not found");
                }
                Err(err) => {
                    debug!(error = %err, "answer ignored");
                }
            }
        }
        ClientAction::Unknown => {
            debug!("ignoring unrecognized client action");
        }
    }
}

/// Join a session, detaching the socket from its previous one first.
async fn join(
    state: &SharedState,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    identity: &mut Option<SocketIdentity>,
    session_id: &str,
    name: String,
) {
    if let Err(err) = validate_player_name(&name) {
        send_error(outbound_tx, &format!("invalid player name: {err}"));
        return;
    }

    if let Some(previous) = identity.take() {
        game_service::leave_session(state, &previous.session_id, previous.player_id).await;
    }

    let connection = PlayerConnection {
        tx: outbound_tx.clone(),
    };
    match game_service::join_session(state, session_id, name, connection).await {
        Ok((session, outcome)) => {
            *identity = Some(SocketIdentity {
                session_id: session.id().to_string(),
                player_id: outcome.player_id,
            });
        }
        Err(EngineError::SessionNotFound(_)) => {
            send_error(outbound_tx, "Game session not found");
        }
        Err(err) => {
            warn!(error = %err, "join failed");
        }
    }
}

/// Serialize a payload and push it onto the socket's writer queue.
fn send_message(tx: &mpsc::UnboundedSender<Message>, message: &ServerMessage) {
    match serde_json::to_string(message) {
        Ok(payload) => {
            let _ = tx.send(Message::Text(payload.into()));
        }
        Err(err) => {
            warn!(error = %err, "failed to serialize server message");
        }
    }
}

/// Notify the offending connection without touching any session state.
fn send_error(tx: &mpsc::UnboundedSender<Message>, message: &str) {
    send_message(
        tx,
        &ServerMessage::Error {
            message: message.to_string(),
        },
    );
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
