//! `POST /api/tournaments`, `GET /{code}`, `/join`, `/start`, `/brackets`.

use super::rooms::OkResponse;
use crate::auth::ResolvedPrincipal;
use crate::error::AppError;
use crate::models::{Conversion, GoalType, GoalValue, Mode, TournamentConfig, Visibility};
use axum::extract::{Path, State};
use axum::Json;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentConfigRequest {
    pub mode: Mode,
    pub conv: Conversion,
    pub goal_type: GoalType,
    pub goal_value: GoalValue,
    pub visibility: Visibility,
    pub show_leaderboard: bool,
    pub show_power_table: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTournamentRequest {
    pub name: String,
    pub config: TournamentConfigRequest,
    pub bracket_size: u32,
    pub max_players: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTournamentResponse {
    pub tournament_id: crate::models::TournamentId,
    pub tournament_code: String,
}

pub async fn create_tournament(
    State(state): State<crate::AppState>,
    ResolvedPrincipal(principal): ResolvedPrincipal,
    Json(req): Json<CreateTournamentRequest>,
) -> Result<Json<CreateTournamentResponse>, AppError> {
    if !principal.is_admin() {
        return Err(AppError::Forbidden);
    }
    let creator_user_id = principal.user_id().ok_or(AppError::Forbidden)?;

    if !(2..=32).contains(&req.bracket_size) {
        return Err(AppError::InvalidArgument("bracketSize".into()));
    }
    if req.max_players == 0 || req.max_players > 10_000 {
        return Err(AppError::InvalidArgument("maxPlayers".into()));
    }

    let config = TournamentConfig {
        mode: req.config.mode,
        conv: req.config.conv,
        goal_type: req.config.goal_type,
        goal_value: req.config.goal_value,
        visibility: req.config.visibility,
        max_players: req.max_players,
        show_leaderboard: req.config.show_leaderboard,
        show_power_table: req.config.show_power_table,
    };

    let tournament_id = crate::tournament::new_tournament_id();
    let mut rng = rand::thread_rng();
    let tournament_code = crate::utils::generate_tournament_code(&mut rng);
    let registry = state.registry.clone();
    let bracket_size = req.bracket_size;
    let bracket_config = config.clone();

    let room_factory = move |bracket_index: u32| {
        let room_id = uuid::Uuid::new_v4();
        let mut rng = rand::thread_rng();
        let room_code = format!("T{}-{}", &tournament_code_suffix(tournament_id), bracket_index);
        let host_id = uuid::Uuid::new_v4();
        let host = crate::models::Participant {
            participant_id: host_id,
            display_name: "Tournament Host".into(),
            role: crate::models::ParticipantRole::Spectator,
            is_host: true,
            score: 0,
            lives: None,
            best_streak_this_session: 0,
            connected: true,
            eliminated: false,
            guest_tag: None,
            user_id: None,
            last_scored_at: None,
            sync_round: 0,
        };
        let room_config = crate::models::RoomConfig {
            mode: bracket_config.mode,
            conv: bracket_config.conv,
            goal_type: bracket_config.goal_type,
            goal_value: bracket_config.goal_value,
            visibility: bracket_config.visibility,
            password_hash: None,
            max_players: bracket_size,
            show_leaderboard: bracket_config.show_leaderboard,
            show_power_table: bracket_config.show_power_table,
        };
        let mut room =
            crate::room::state::new_room(room_id, room_code.clone(), room_config, host_id, host);
        room.tournament_ref = Some(crate::models::TournamentRef {
            tournament_id,
            bracket_index,
        });
        let seed: u64 = rng.gen();
        let registry = registry.clone();
        let handle = crate::room::spawn(
            room,
            seed,
            Some(Box::new(move || {
                let registry = registry.clone();
                tokio::spawn(async move {
                    if let Some(t) = registry.get_tournament(tournament_id) {
                        t.bracket_ended(bracket_index).await;
                    }
                });
            })),
        );
        registry.register_room(room_code, handle.clone());
        (room_id, handle)
    };

    let handle = crate::tournament::spawn(
        tournament_id,
        tournament_code.clone(),
        req.name,
        config,
        req.bracket_size,
        req.max_players,
        creator_user_id,
        room_factory,
    );
    state.registry.register_tournament(tournament_code.clone(), handle);

    Ok(Json(CreateTournamentResponse {
        tournament_id,
        tournament_code,
    }))
}

fn tournament_code_suffix(id: crate::models::TournamentId) -> String {
    id.simple().to_string()[..6].to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentView {
    pub id: crate::models::TournamentId,
    pub name: String,
    pub config: TournamentConfigRequest,
    pub bracket_size: u32,
    pub max_players: u32,
    pub status: crate::models::TournamentStatus,
    pub participant_count: u32,
    pub can_start: bool,
}

pub async fn get_tournament(
    State(state): State<crate::AppState>,
    ResolvedPrincipal(principal): ResolvedPrincipal,
    Path(code): Path<String>,
) -> Result<Json<TournamentView>, AppError> {
    let handle = state
        .registry
        .get_tournament_by_code(&code)
        .ok_or(AppError::NotFound)?;
    let snapshot = handle.snapshot();
    let brackets = handle.brackets().await;
    let participant_count = brackets.iter().map(|b| b.participant_count).sum();

    Ok(Json(TournamentView {
        id: snapshot.tournament_id,
        name: snapshot.name,
        config: TournamentConfigRequest {
            mode: snapshot.config.mode,
            conv: snapshot.config.conv,
            goal_type: snapshot.config.goal_type,
            goal_value: snapshot.config.goal_value,
            visibility: snapshot.config.visibility,
            show_leaderboard: snapshot.config.show_leaderboard,
            show_power_table: snapshot.config.show_power_table,
        },
        bracket_size: snapshot.bracket_size,
        max_players: snapshot.max_players,
        status: snapshot.status,
        participant_count,
        can_start: principal.is_admin(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinTournamentRequest {
    pub display_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinTournamentResponse {
    pub tournament_id: crate::models::TournamentId,
    pub participant_id: crate::models::ParticipantId,
    pub bracket_index: u32,
}

pub async fn join_tournament(
    State(state): State<crate::AppState>,
    Path(code): Path<String>,
    Json(req): Json<JoinTournamentRequest>,
) -> Result<Json<JoinTournamentResponse>, AppError> {
    let handle = state
        .registry
        .get_tournament_by_code(&code)
        .ok_or(AppError::NotFound)?;
    let out = handle.join(req.display_name).await?;
    Ok(Json(JoinTournamentResponse {
        tournament_id: handle.tournament_id(),
        participant_id: out.participant_id,
        bracket_index: out.bracket_index,
    }))
}

pub async fn start_tournament(
    State(state): State<crate::AppState>,
    ResolvedPrincipal(principal): ResolvedPrincipal,
    Path(code): Path<String>,
) -> Result<Json<OkResponse>, AppError> {
    let handle = state
        .registry
        .get_tournament_by_code(&code)
        .ok_or(AppError::NotFound)?;
    handle.start(principal.is_admin()).await?;
    Ok(Json(OkResponse { ok: true }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketsResponse {
    pub brackets: Vec<BracketJson>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketJson {
    pub bracket_index: u32,
    pub status: crate::models::RoomStatus,
    pub participant_count: u32,
}

pub async fn list_brackets(
    State(state): State<crate::AppState>,
    Path(code): Path<String>,
) -> Result<Json<BracketsResponse>, AppError> {
    let handle = state
        .registry
        .get_tournament_by_code(&code)
        .ok_or(AppError::NotFound)?;
    let brackets = handle
        .brackets()
        .await
        .into_iter()
        .map(|b| BracketJson {
            bracket_index: b.bracket_index,
            status: b.status,
            participant_count: b.participant_count,
        })
        .collect();
    Ok(Json(BracketsResponse { brackets }))
}
