//! The narrow persistence contract everything else in this crate is built against.
//!
//! `Store` is the only component permitted external mutations. Two implementations exist:
//! `PgStore` for production (backed by `sqlx::PgPool`) and `InMemoryStore` for tests and for
//! running the service without a live Postgres instance. Both uphold the same two atomicity
//! requirements this crate relies on explicitly: `GameSessions::consume_atomic` is compare-and-mark
//! in one step, and `Scores::insert` is unique on `session_id`.

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

use crate::models::{
    Achievement, ConversionProgress, ConversionScore, GameSessionToken, TokenConsumeStatus, UserId,
};
use async_trait::async_trait;

/// Wraps the underlying `anyhow::Error` from whichever backend is in use. The HTTP/WS layers
/// never see backend-specific error types, only `StoreError -> AppError::StoreUnavailable`.
#[derive(Debug)]
pub struct StoreError(pub anyhow::Error);

impl<E> From<E> for StoreError
where
    E: Into<anyhow::Error>,
{
    fn from(e: E) -> Self {
        StoreError(e.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A user record as read by the Auth Adapter. The core never writes `Users`; password hashing
/// and account creation are out of scope.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressDelta {
    pub xp_earned: i64,
    pub best_streak: Option<u32>,
    pub best_classic_streak: Option<u32>,
    pub best_speed_round: Option<u32>,
    pub best_survival: Option<u32>,
    pub best_nibble_sprint: Option<u32>,
    pub record_played: bool,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_user(&self, user_id: UserId) -> StoreResult<Option<UserRecord>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>>;

    async fn insert_game_session(&self, token: GameSessionToken) -> StoreResult<()>;

    /// Atomic compare-and-mark: the session is consumed at most once, never replayed.
    async fn consume_game_session(
        &self,
        session_id: uuid::Uuid,
        user_id: UserId,
        mode: crate::models::Mode,
        conv: crate::models::Conversion,
    ) -> StoreResult<TokenConsumeStatus>;

    /// `Ok(None)` means a row with this `session_id` already existed (`sessionId` is unique).
    async fn insert_score(&self, score: ConversionScore) -> StoreResult<Option<()>>;

    async fn upsert_progress_atomic(
        &self,
        user_id: UserId,
        delta: ProgressDelta,
    ) -> StoreResult<ConversionProgress>;

    async fn get_progress(&self, user_id: UserId) -> StoreResult<Option<ConversionProgress>>;

    async fn insert_achievement_if_absent(
        &self,
        user_id: UserId,
        achievement_id: &str,
    ) -> StoreResult<bool>;

    async fn has_achievement(&self, user_id: UserId, achievement_id: &str) -> StoreResult<bool>;

    async fn leaderboard_top(
        &self,
        mode: crate::models::Mode,
        conv: Option<crate::models::Conversion>,
        limit: u32,
    ) -> StoreResult<Vec<(String, u32, chrono::DateTime<chrono::Utc>)>>;

    async fn daily_streak_top(
        &self,
        limit: u32,
    ) -> StoreResult<Vec<(String, u32, chrono::DateTime<chrono::Utc>)>>;

    async fn xp_top(&self, limit: u32) -> StoreResult<Vec<(String, i64, i64)>>;
}
