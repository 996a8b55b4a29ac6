//! Leaderboard & Progress Service. A thin policy layer over `Store`: every method
//! here is a read-modify-write against one or two `Store` calls, with the monotonic-max and
//! daily-streak rules living in this module rather than in `Store` itself
//! (`Store` stays a narrow persistence contract per its own doc comment).

use crate::error::AppError;
use crate::models::{Conversion, ConversionProgress, ConversionScore, Mode, UserId};
use crate::store::{ProgressDelta, Store};
use std::sync::Arc;
use uuid::Uuid;

pub struct SubmitScoreInput {
    pub session_id: Uuid,
    pub user_id: UserId,
    pub mode: Mode,
    pub conv: Conversion,
    pub score: u32,
    pub metadata: serde_json::Value,
}

/// Consumes the session token, writes the score row, and folds the result into the user's
/// best-in-mode progress fields using monotonic-max semantics.
pub async fn submit_score(
    store: &Arc<dyn Store>,
    input: SubmitScoreInput,
) -> Result<ConversionProgress, AppError> {
    let status = crate::auth::consume_game_session_token(
        store,
        input.session_id,
        input.user_id,
        input.mode,
        input.conv,
    )
    .await?;
    match status {
        crate::models::TokenConsumeStatus::Ok => {}
        crate::models::TokenConsumeStatus::AlreadyUsed => {
            return Err(AppError::Conflict("session token already used".into()))
        }
        _ => return Err(AppError::Forbidden),
    }

    let score = ConversionScore {
        id: Uuid::new_v4(),
        user_id: input.user_id,
        mode: input.mode,
        conv: input.conv,
        score: input.score,
        metadata: input.metadata,
        session_id: input.session_id,
        created_at: chrono::Utc::now(),
    };
    if store.insert_score(score).await?.is_none() {
        return Err(AppError::Conflict("score already recorded for this session".into()));
    }

    let delta = best_in_mode_delta(input.mode, input.score);
    Ok(store.upsert_progress_atomic(input.user_id, delta).await?)
}

fn best_in_mode_delta(mode: Mode, score: u32) -> ProgressDelta {
    let mut delta = ProgressDelta {
        xp_earned: 0,
        best_streak: None,
        best_classic_streak: None,
        best_speed_round: None,
        best_survival: None,
        best_nibble_sprint: None,
        record_played: false,
    };
    match mode {
        Mode::Classic => delta.best_classic_streak = Some(score),
        Mode::StreakChallenge => delta.best_streak = Some(score),
        Mode::SpeedRound => delta.best_speed_round = Some(score),
        Mode::Survival => delta.best_survival = Some(score),
        Mode::NibbleSprint => delta.best_nibble_sprint = Some(score),
    }
    delta
}

pub struct UpdateProgressInput {
    pub xp_earned: Option<i64>,
    pub best_streak: Option<u32>,
    pub best_classic_streak: Option<u32>,
    pub record_played: Option<bool>,
}

/// `totalXp` accumulates (clamped ≥ 0), best-streak fields monotonic-max, `dailyStreak` advances
/// only when `recordPlayed` is set and today follows `lastPlayedDate` by exactly one day (user-local
/// day boundary derived from UTC — see DESIGN.md Open Question decision).
pub async fn update_progress(
    store: &Arc<dyn Store>,
    user_id: UserId,
    input: UpdateProgressInput,
) -> Result<ConversionProgress, AppError> {
    let delta = ProgressDelta {
        xp_earned: input.xp_earned.unwrap_or(0),
        best_streak: input.best_streak,
        best_classic_streak: input.best_classic_streak,
        best_speed_round: None,
        best_survival: None,
        best_nibble_sprint: None,
        record_played: input.record_played.unwrap_or(false),
    };
    Ok(store.upsert_progress_atomic(user_id, delta).await?)
}

pub async fn get_progress(
    store: &Arc<dyn Store>,
    user_id: UserId,
) -> Result<ConversionProgress, AppError> {
    store
        .get_progress(user_id)
        .await?
        .ok_or(AppError::NotFound)
}

/// Idempotent: returns `true` only the first time this achievement is unlocked for this user.
pub async fn unlock_achievement(
    store: &Arc<dyn Store>,
    user_id: UserId,
    achievement_id: &str,
) -> Result<bool, AppError> {
    Ok(store.insert_achievement_if_absent(user_id, achievement_id).await?)
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ScoreLeaderboardRow {
    pub user_name: String,
    pub score: u32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub async fn get_score_leaderboard(
    store: &Arc<dyn Store>,
    mode: Mode,
    conv: Option<Conversion>,
    limit: u32,
) -> Result<Vec<ScoreLeaderboardRow>, AppError> {
    let limit = limit.min(100);
    let rows = store.leaderboard_top(mode, conv, limit).await?;
    Ok(rows
        .into_iter()
        .map(|(user_name, score, created_at)| ScoreLeaderboardRow {
            user_name,
            score,
            created_at,
        })
        .collect())
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct XpLeaderboardRow {
    pub user_name: String,
    pub total_xp: i64,
    pub level: i64,
}

pub async fn get_xp_leaderboard(
    store: &Arc<dyn Store>,
    limit: u32,
) -> Result<Vec<XpLeaderboardRow>, AppError> {
    let limit = limit.min(100);
    let rows = store.xp_top(limit).await?;
    Ok(rows
        .into_iter()
        .map(|(user_name, total_xp, level)| XpLeaderboardRow {
            user_name,
            total_xp,
            level,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, UserRecord};

    async fn store_with_user() -> (Arc<dyn Store>, UserId) {
        let user_id = Uuid::new_v4();
        let mem = InMemoryStore::new();
        mem.seed_user(UserRecord {
            user_id,
            name: "Ada".into(),
            email: "ada@example.com".into(),
            is_admin: false,
        })
        .await;
        (Arc::new(mem), user_id)
    }

    /// A session token presented twice against `submit_score` is the end-to-end anti-cheat path:
    /// the second attempt must fail even though the first one fully succeeded and folded into
    /// progress.
    #[tokio::test]
    async fn replaying_a_session_token_is_rejected() {
        let (store, user_id) = store_with_user().await;
        let token = crate::auth::issue_game_session_token(
            &store,
            user_id,
            None,
            Mode::Classic,
            Conversion::BinaryStandalone,
        )
        .await
        .unwrap();

        let progress = submit_score(
            &store,
            SubmitScoreInput {
                session_id: token.session_id,
                user_id,
                mode: Mode::Classic,
                conv: Conversion::BinaryStandalone,
                score: 7,
                metadata: serde_json::Value::Null,
            },
        )
        .await
        .unwrap();
        assert_eq!(progress.best_classic_streak, 7);

        let replay = submit_score(
            &store,
            SubmitScoreInput {
                session_id: token.session_id,
                user_id,
                mode: Mode::Classic,
                conv: Conversion::BinaryStandalone,
                score: 99,
                metadata: serde_json::Value::Null,
            },
        )
        .await;
        assert!(matches!(replay, Err(AppError::Conflict(_))));

        let final_progress = get_progress(&store, user_id).await.unwrap();
        assert_eq!(final_progress.best_classic_streak, 7);
    }

    #[tokio::test]
    async fn best_in_mode_delta_only_sets_the_field_for_its_own_mode() {
        let speed = best_in_mode_delta(Mode::SpeedRound, 12);
        assert_eq!(speed.best_speed_round, Some(12));
        assert_eq!(speed.best_classic_streak, None);
        assert_eq!(speed.best_streak, None);
    }
}
