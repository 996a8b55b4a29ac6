//! `/api/conversion/*`, backed by `crate::leaderboard`.

use crate::auth::ResolvedPrincipal;
use crate::error::AppError;
use crate::leaderboard;
use crate::models::{Conversion, Mode};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub mode: Mode,
    pub conv: Conversion,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: uuid::Uuid,
}

pub async fn create_session(
    State(state): State<crate::AppState>,
    ResolvedPrincipal(principal): ResolvedPrincipal,
    Json(req): Json<SessionRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let user_id = principal.user_id().ok_or(AppError::Forbidden)?;
    let token =
        crate::auth::issue_game_session_token(&state.store, user_id, None, req.mode, req.conv)
            .await?;
    Ok(Json(SessionResponse {
        session_id: token.session_id,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitScoreRequest {
    pub session_id: uuid::Uuid,
    pub mode: Mode,
    pub conv: Conversion,
    pub score: u32,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

pub async fn submit_score(
    State(state): State<crate::AppState>,
    ResolvedPrincipal(principal): ResolvedPrincipal,
    Json(req): Json<SubmitScoreRequest>,
) -> Result<Json<super::rooms::OkResponse>, AppError> {
    let user_id = principal.user_id().ok_or(AppError::Forbidden)?;
    leaderboard::submit_score(
        &state.store,
        leaderboard::SubmitScoreInput {
            session_id: req.session_id,
            user_id,
            mode: req.mode,
            conv: req.conv,
            score: req.score,
            metadata: req.metadata,
        },
    )
    .await?;
    Ok(Json(super::rooms::OkResponse { ok: true }))
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub mode: Mode,
    #[serde(default)]
    pub conv: Option<Conversion>,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    20
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub leaderboard: Vec<leaderboard::ScoreLeaderboardRow>,
}

pub async fn get_leaderboard(
    State(state): State<crate::AppState>,
    Query(q): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let rows = leaderboard::get_score_leaderboard(&state.store, q.mode, q.conv, q.limit).await?;
    Ok(Json(LeaderboardResponse { leaderboard: rows }))
}

#[derive(Debug, Deserialize)]
pub struct XpLeaderboardQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Serialize)]
pub struct XpLeaderboardResponse {
    pub leaderboard: Vec<leaderboard::XpLeaderboardRow>,
}

pub async fn get_xp_leaderboard(
    State(state): State<crate::AppState>,
    Query(q): Query<XpLeaderboardQuery>,
) -> Result<Json<XpLeaderboardResponse>, AppError> {
    let rows = leaderboard::get_xp_leaderboard(&state.store, q.limit).await?;
    Ok(Json(XpLeaderboardResponse { leaderboard: rows }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub total_xp: i64,
    pub level: i64,
    pub best_streak: u32,
    pub best_classic_streak: u32,
    pub daily_streak: u32,
    pub best_speed_round: u32,
    pub best_survival: u32,
    pub best_nibble_sprint: u32,
}

impl From<crate::models::ConversionProgress> for ProgressResponse {
    fn from(p: crate::models::ConversionProgress) -> Self {
        ProgressResponse {
            total_xp: p.total_xp,
            level: p.level,
            best_streak: p.best_streak,
            best_classic_streak: p.best_classic_streak,
            daily_streak: p.daily_streak,
            best_speed_round: p.best_speed_round,
            best_survival: p.best_survival,
            best_nibble_sprint: p.best_nibble_sprint,
        }
    }
}

pub async fn get_progress(
    State(state): State<crate::AppState>,
    ResolvedPrincipal(principal): ResolvedPrincipal,
) -> Result<Json<ProgressResponse>, AppError> {
    let user_id = principal.user_id().ok_or(AppError::Forbidden)?;
    let progress = leaderboard::get_progress(&state.store, user_id).await?;
    Ok(Json(progress.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProgressRequest {
    pub xp_earned: Option<i64>,
    pub best_streak: Option<u32>,
    pub best_classic_streak: Option<u32>,
    pub record_played: Option<bool>,
}

pub async fn post_progress(
    State(state): State<crate::AppState>,
    ResolvedPrincipal(principal): ResolvedPrincipal,
    Json(req): Json<UpdateProgressRequest>,
) -> Result<Json<ProgressResponse>, AppError> {
    let user_id = principal.user_id().ok_or(AppError::Forbidden)?;
    let progress = leaderboard::update_progress(
        &state.store,
        user_id,
        leaderboard::UpdateProgressInput {
            xp_earned: req.xp_earned,
            best_streak: req.best_streak,
            best_classic_streak: req.best_classic_streak,
            record_played: req.record_played,
        },
    )
    .await?;
    Ok(Json(progress.into()))
}

#[derive(Debug, Serialize)]
pub struct UnlockResponse {
    pub unlocked: bool,
}

pub async fn unlock_achievement(
    State(state): State<crate::AppState>,
    ResolvedPrincipal(principal): ResolvedPrincipal,
    Path(achievement_id): Path<String>,
) -> Result<Json<UnlockResponse>, AppError> {
    let user_id = principal.user_id().ok_or(AppError::Forbidden)?;
    let unlocked = leaderboard::unlock_achievement(&state.store, user_id, &achievement_id).await?;
    Ok(Json(UnlockResponse { unlocked }))
}
