//! WS upgrade endpoints — the room channel and the tournament control channel. Framing
//! and connection lifecycle live in `crate::ws::hub`; this module only resolves the
//! `RoomHandle`/`TournamentHandle` from the Registry and performs the upgrade.

use axum::extract::ws::{Message, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RoomWsQuery {
    pub participant_id: uuid::Uuid,
}

/// `GET /ws/rooms/{roomId}?participantId=...`
pub async fn room_ws_handler(
    State(state): State<crate::AppState>,
    Path(room_id): Path<uuid::Uuid>,
    Query(q): Query<RoomWsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let Some(handle) = state.registry.get_room(room_id) else {
        return (axum::http::StatusCode::NOT_FOUND, "room not found").into_response();
    };
    if !handle.snapshot().participants.contains_key(&q.participant_id) {
        return (axum::http::StatusCode::NOT_FOUND, "participant not found").into_response();
    }
    let claims = state.ws_claims.clone();
    ws.on_upgrade(move |socket| async move {
        crate::ws::run_room_connection(socket, handle, q.participant_id, claims).await
    })
    .into_response()
}

/// `GET /ws/tournaments/{id}/control` — a lighter read-mostly channel than the room one: no
/// client commands beyond `ping`, just periodic bracket/status pushes.
pub async fn tournament_ws_handler(
    State(state): State<crate::AppState>,
    Path(tournament_id): Path<uuid::Uuid>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let Some(handle) = state.registry.get_tournament(tournament_id) else {
        return (axum::http::StatusCode::NOT_FOUND, "tournament not found").into_response();
    };
    ws.on_upgrade(move |socket| async move { run_tournament_control(socket, handle).await })
        .into_response()
}

async fn run_tournament_control(
    mut socket: axum::extract::ws::WebSocket,
    handle: crate::tournament::TournamentHandle,
) {
    use crate::ws::messages::TournamentMessage;
    use futures_util::{SinkExt, StreamExt};

    let mut poll = tokio::time::interval(std::time::Duration::from_secs(2));
    let mut last_status = None;
    loop {
        tokio::select! {
            _ = poll.tick() => {
                let snapshot = handle.snapshot();
                if last_status != Some(snapshot.status) {
                    last_status = Some(snapshot.status);
                    if snapshot.status == crate::models::TournamentStatus::Ended {
                        let msg = TournamentMessage::TournamentEnded { aggregate_leaderboard: Vec::new() };
                        let Ok(text) = serde_json::to_string(&msg) else { continue };
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                }
                for bracket in handle.brackets().await {
                    let msg = TournamentMessage::BracketUpdate {
                        bracket_index: bracket.bracket_index,
                        status: bracket.status,
                        participant_count: bracket.participant_count,
                    };
                    let Ok(text) = serde_json::to_string(&msg) else { continue };
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        return;
                    }
                }
            }
            frame = socket.next() => {
                match frame {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }
}
