//! `POST /api/mp/rooms`, `/join`, `/{roomCode}/start`.

use crate::auth::ResolvedPrincipal;
use crate::error::AppError;
use crate::models::{Conversion, GoalType, GoalValue, Mode, RoomConfig, Visibility};
use crate::room::JoinInput;
use axum::extract::{Path, State};
use axum::Json;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub mode: Mode,
    pub conv: Conversion,
    pub goal_type: GoalType,
    pub goal_value: GoalValue,
    pub visibility: Visibility,
    pub password: Option<String>,
    pub max_players: u32,
    pub show_leaderboard: bool,
    pub show_power_table: bool,
    pub display_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    pub room_code: String,
    pub room_id: crate::models::RoomId,
    pub participant_id: crate::models::ParticipantId,
}

pub async fn create_room(
    State(state): State<crate::AppState>,
    ResolvedPrincipal(principal): ResolvedPrincipal,
    Json(req): Json<CreateRoomRequest>,
) -> Result<Json<CreateRoomResponse>, AppError> {
    if req.visibility == Visibility::PublicPassword && req.password.is_none() {
        return Err(AppError::InvalidArgument("password required for public-password rooms".into()));
    }
    if req.max_players == 0 || req.max_players > 32 {
        return Err(AppError::InvalidArgument("maxPlayers".into()));
    }
    if state.registry.room_count() >= state.config.max_rooms {
        return Err(AppError::Conflict("max rooms reached".into()));
    }
    let password_hash = req.password.as_deref().map(crate::utils::hash_password);

    let config = RoomConfig {
        mode: req.mode,
        conv: req.conv,
        goal_type: req.goal_type,
        goal_value: req.goal_value,
        visibility: req.visibility,
        password_hash,
        max_players: req.max_players,
        show_leaderboard: req.show_leaderboard,
        show_power_table: req.show_power_table,
    };

    let room_id = uuid::Uuid::new_v4();
    let mut rng = rand::thread_rng();
    let room_code = crate::utils::generate_room_code(&mut rng);
    let host_id = uuid::Uuid::new_v4();
    let host = crate::models::Participant {
        participant_id: host_id,
        display_name: req.display_name,
        role: crate::models::ParticipantRole::Player,
        is_host: true,
        score: 0,
        lives: None,
        best_streak_this_session: 0,
        connected: true,
        eliminated: false,
        guest_tag: None,
        user_id: principal.user_id(),
        last_scored_at: None,
        sync_round: 0,
    };
    let room = crate::room::state::new_room(room_id, room_code.clone(), config, host_id, host);
    let seed: u64 = rng.gen();
    let handle = crate::room::spawn(room, seed, None);
    state.registry.register_room(room_code.clone(), handle);

    Ok(Json(CreateRoomResponse {
        room_code,
        room_id,
        participant_id: host_id,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    pub room_code: String,
    pub password: Option<String>,
    pub display_name: String,
    pub as_spectator: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomResponse {
    pub room_id: crate::models::RoomId,
    pub participant_id: crate::models::ParticipantId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bracket_index: Option<u32>,
}

pub async fn join_room(
    State(state): State<crate::AppState>,
    Json(req): Json<JoinRoomRequest>,
) -> Result<Json<JoinRoomResponse>, AppError> {
    let handle = state
        .registry
        .get_room_by_code(&req.room_code)
        .ok_or(AppError::NotFound)?;
    let out = handle
        .join(JoinInput {
            display_name: req.display_name,
            as_spectator: req.as_spectator,
            password: req.password,
        })
        .await?;
    Ok(Json(JoinRoomResponse {
        room_id: handle.room_id(),
        participant_id: out.participant_id,
        bracket_index: None,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRoomRequest {
    pub participant_id: crate::models::ParticipantId,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

pub async fn start_room(
    State(state): State<crate::AppState>,
    Path(room_code): Path<String>,
    Json(req): Json<StartRoomRequest>,
) -> Result<Json<OkResponse>, AppError> {
    let handle = state
        .registry
        .get_room_by_code(&room_code)
        .ok_or(AppError::NotFound)?;
    handle
        .start_game(crate::room::StartBy::Host(req.participant_id))
        .await?;
    Ok(Json(OkResponse { ok: true }))
}
