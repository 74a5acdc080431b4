use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    auth::Identity,
    dto::ws::{ClientMessage, ServerMessage},
    error::ServiceError,
    services::command_service,
    state::{
        SharedState,
        broadcast::Observer,
        clock::{Snapshot, now_ms},
        tournament::TournamentId,
    },
};

/// Close code sent when the access token is missing or invalid.
pub const CLOSE_UNAUTHORIZED: u16 = 4001;
/// Close code sent when the tournament is not loaded.
pub const CLOSE_NOT_FOUND: u16 = 4004;

/// Handle the full lifecycle of one clock observer connected to `tournament_id`.
pub async fn handle_socket(
    state: SharedState,
    socket: WebSocket,
    tournament_id: TournamentId,
    token: Option<String>,
) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let (identity, snapshot) = match admit(&state, tournament_id, token.as_deref()).await {
        Ok(admitted) => admitted,
        Err((code, reason)) => {
            close(&outbound_tx, code, reason);
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let observer_id = Uuid::new_v4();
    state.hub().join(
        tournament_id,
        Observer {
            id: observer_id,
            tx: outbound_tx.clone(),
        },
    );
    info!(
        tournament_id,
        username = %identity.username,
        role = ?identity.role,
        "clock observer connected"
    );

    send(&outbound_tx, &ServerMessage::Snapshot(snapshot));

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let keep_open =
                    handle_text(&state, tournament_id, &identity, text.as_str(), &outbound_tx)
                        .await;
                if !keep_open {
                    break;
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(tournament_id, error = %err, "websocket error");
                break;
            }
        }
    }

    state.hub().leave(tournament_id, observer_id);
    info!(tournament_id, username = %identity.username, "clock observer disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Verify the token and read the first snapshot; `Err` carries the close code and reason.
async fn admit(
    state: &SharedState,
    tournament_id: TournamentId,
    token: Option<&str>,
) -> Result<(Identity, Snapshot), (u16, &'static str)> {
    let Some(identity) = token.and_then(|token| state.verifier().verify(token)) else {
        warn!(tournament_id, "rejecting clock connection without a valid token");
        return Err((CLOSE_UNAUTHORIZED, "unauthorized"));
    };

    match state.clocks().read_snapshot(tournament_id, now_ms()).await {
        Ok(snapshot) => Ok((identity, snapshot)),
        Err(_) => {
            info!(
                tournament_id,
                username = %identity.username,
                "clock connection to unknown tournament"
            );
            Err((CLOSE_NOT_FOUND, "tournament not found"))
        }
    }
}

/// Process one text frame; returns `false` when the connection must end.
async fn handle_text(
    state: &SharedState,
    tournament_id: TournamentId,
    identity: &Identity,
    text: &str,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) -> bool {
    let message = match ClientMessage::from_json_str(text) {
        Ok(message) => message,
        Err(err) => {
            debug!(tournament_id, error = %err, "ignoring unparseable clock message");
            return true;
        }
    };

    match command_service::handle_message(state, tournament_id, identity, message).await {
        Ok(Some(reply)) => send(outbound_tx, &reply),
        Ok(None) => true,
        Err(ServiceError::NotFound(_)) => {
            close(outbound_tx, CLOSE_NOT_FOUND, "tournament not found");
            false
        }
        Err(err) => {
            debug!(
                tournament_id,
                username = %identity.username,
                error = %err,
                "clock message rejected"
            );
            send(
                outbound_tx,
                &ServerMessage::ErrorMsg {
                    message: err.to_string(),
                },
            )
        }
    }
}

/// Queue `message` for the writer; `false` once the writer is gone.
fn send(tx: &mpsc::UnboundedSender<Message>, message: &ServerMessage) -> bool {
    match serde_json::to_string(message) {
        Ok(payload) => tx.send(Message::Text(payload.into())).is_ok(),
        Err(err) => {
            warn!(error = %err, "failed to serialize clock message");
            true
        }
    }
}

fn close(tx: &mpsc::UnboundedSender<Message>, code: u16, reason: &str) {
    let _ = tx.send(Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    })));
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use serde_json::Value;
    use uuid::Uuid;

    use super::*;
    use crate::{
        auth::{JwtVerifier, Role},
        config::AppConfig,
        state::AppState,
    };

    const SECRET: &str = "ws-secret";

    async fn fixture() -> (SharedState, mpsc::UnboundedReceiver<Message>) {
        let state = AppState::new(AppConfig::default(), Arc::new(JwtVerifier::new(SECRET)));
        state.clocks().initialize(1, None, now_ms()).await;
        let (tx, rx) = mpsc::unbounded_channel();
        state.hub().join(1, Observer { id: Uuid::new_v4(), tx });
        (state, rx)
    }

    fn identity(role: Role) -> Identity {
        Identity {
            username: "kari".into(),
            role,
        }
    }

    fn token(role: Role) -> String {
        JwtVerifier::new(SECRET)
            .issue("kari", role, Duration::from_secs(60))
            .unwrap()
    }

    fn close_code(message: Message) -> Option<u16> {
        match message {
            Message::Close(Some(frame)) => Some(frame.code),
            _ => None,
        }
    }

    #[tokio::test]
    async fn connections_need_a_valid_token() {
        let (state, _hub_rx) = fixture().await;
        let rejected = admit(&state, 1, None).await.unwrap_err();
        assert_eq!(rejected.0, CLOSE_UNAUTHORIZED);
        let rejected = admit(&state, 1, Some("not-a-jwt")).await.unwrap_err();
        assert_eq!(rejected.0, CLOSE_UNAUTHORIZED);

        let foreign = JwtVerifier::new("other")
            .issue("kari", Role::Admin, Duration::from_secs(60))
            .unwrap();
        let rejected = admit(&state, 1, Some(&foreign)).await.unwrap_err();
        assert_eq!(rejected.0, CLOSE_UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_tournament_closes_with_not_found() {
        let (state, _hub_rx) = fixture().await;
        let rejected = admit(&state, 42, Some(&token(Role::Viewer))).await.unwrap_err();
        assert_eq!(rejected.0, CLOSE_NOT_FOUND);

        let (identity, snapshot) = admit(&state, 1, Some(&token(Role::Viewer))).await.unwrap();
        assert_eq!(identity.role, Role::Viewer);
        assert_eq!(snapshot.current_index, 0);
    }

    #[tokio::test]
    async fn rejected_admin_message_answers_the_caller_only() {
        let (state, mut hub_rx) = fixture().await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        let keep_open =
            handle_text(&state, 1, &identity(Role::Viewer), r#"{"type":"admin_next"}"#, &tx).await;
        assert!(keep_open);

        let Ok(Message::Text(text)) = rx.try_recv() else {
            panic!("expected an error message for the caller");
        };
        let reply: Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(reply["type"], "error_msg");
        assert!(hub_rx.try_recv().is_err());
        assert_eq!(state.clocks().read_copy(1).await.unwrap().current_index, 0);
    }

    #[tokio::test]
    async fn unparseable_frames_are_ignored() {
        let (state, _hub_rx) = fixture().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(handle_text(&state, 1, &identity(Role::Admin), "not json", &tx).await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unloaded_tournament_closes_the_session() {
        let (state, _hub_rx) = fixture().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        state.clocks().remove(1).await;

        let keep_open =
            handle_text(&state, 1, &identity(Role::Viewer), r#"{"type":"get_snapshot"}"#, &tx)
                .await;
        assert!(!keep_open);
        assert_eq!(close_code(rx.try_recv().unwrap()), Some(CLOSE_NOT_FOUND));
    }
}
