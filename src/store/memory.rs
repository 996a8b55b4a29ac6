//! `tokio::sync::Mutex`-guarded in-process `Store`. Used by `cargo run` when `STORE_URL` is
//! unset and by every integration test — it upholds the same atomicity guarantees as `PgStore`
//! since every mutating method takes the lock for its whole critical section.

use super::{ProgressDelta, Store, StoreResult, UserRecord};
use crate::models::{
    Achievement, Conversion, ConversionProgress, ConversionScore, GameSessionToken, Mode,
    TokenConsumeStatus, UserId,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionState {
    Issued,
    Consumed,
}

struct Inner {
    users: HashMap<UserId, UserRecord>,
    sessions: HashMap<Uuid, (GameSessionToken, SessionState)>,
    scores: HashMap<Uuid, ConversionScore>,
    score_session_ids: std::collections::HashSet<Uuid>,
    progress: HashMap<UserId, ConversionProgress>,
    achievements: HashMap<(UserId, String), Achievement>,
}

pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                users: HashMap::new(),
                sessions: HashMap::new(),
                scores: HashMap::new(),
                score_session_ids: std::collections::HashSet::new(),
                progress: HashMap::new(),
                achievements: HashMap::new(),
            }),
        }
    }

    /// Test/seed helper — not part of the `Store` contract.
    pub async fn seed_user(&self, user: UserRecord) {
        self.inner.lock().await.users.insert(user.user_id, user);
    }

    fn empty_progress(user_id: UserId) -> ConversionProgress {
        ConversionProgress {
            user_id,
            total_xp: 0,
            level: 0,
            best_streak: 0,
            best_classic_streak: 0,
            daily_streak: 0,
            last_played_date: None,
            best_speed_round: 0,
            best_survival: 0,
            best_nibble_sprint: 0,
        }
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_user(&self, user_id: UserId) -> StoreResult<Option<UserRecord>> {
        Ok(self.inner.lock().await.users.get(&user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        Ok(self
            .inner
            .lock()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn insert_game_session(&self, token: GameSessionToken) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner
            .sessions
            .insert(token.session_id, (token, SessionState::Issued));
        Ok(())
    }

    async fn consume_game_session(
        &self,
        session_id: Uuid,
        user_id: UserId,
        mode: Mode,
        conv: Conversion,
    ) -> StoreResult<TokenConsumeStatus> {
        let mut inner = self.inner.lock().await;
        let Some((token, state)) = inner.sessions.get_mut(&session_id) else {
            return Ok(TokenConsumeStatus::NotFound);
        };
        if *state == SessionState::Consumed {
            return Ok(TokenConsumeStatus::AlreadyUsed);
        }
        if token.user_id != user_id || token.mode != mode || token.conv != conv {
            return Ok(TokenConsumeStatus::Mismatch);
        }
        if token.expires_at < Utc::now() {
            return Ok(TokenConsumeStatus::Expired);
        }
        *state = SessionState::Consumed;
        Ok(TokenConsumeStatus::Ok)
    }

    async fn insert_score(&self, score: ConversionScore) -> StoreResult<Option<()>> {
        let mut inner = self.inner.lock().await;
        if !inner.score_session_ids.insert(score.session_id) {
            return Ok(None);
        }
        inner.scores.insert(score.id, score);
        Ok(Some(()))
    }

    async fn upsert_progress_atomic(
        &self,
        user_id: UserId,
        delta: ProgressDelta,
    ) -> StoreResult<ConversionProgress> {
        let mut inner = self.inner.lock().await;
        let mut progress = inner
            .progress
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| Self::empty_progress(user_id));

        progress.total_xp = (progress.total_xp + delta.xp_earned).max(0);
        progress.recompute_level();
        if let Some(s) = delta.best_streak {
            progress.best_streak = progress.best_streak.max(s);
        }
        if let Some(s) = delta.best_classic_streak {
            progress.best_classic_streak = progress.best_classic_streak.max(s);
        }
        if let Some(s) = delta.best_speed_round {
            progress.best_speed_round = progress.best_speed_round.max(s);
        }
        if let Some(s) = delta.best_survival {
            progress.best_survival = progress.best_survival.max(s);
        }
        if let Some(s) = delta.best_nibble_sprint {
            progress.best_nibble_sprint = progress.best_nibble_sprint.max(s);
        }

        if delta.record_played {
            let today = Utc::now().date_naive();
            progress.daily_streak = match progress.last_played_date {
                Some(last) if last == today => progress.daily_streak.max(1),
                Some(last) if last.succ_opt() == Some(today) => progress.daily_streak + 1,
                _ => 1,
            };
            progress.last_played_date = Some(today);
        }

        inner.progress.insert(user_id, progress.clone());
        Ok(progress)
    }

    async fn get_progress(&self, user_id: UserId) -> StoreResult<Option<ConversionProgress>> {
        Ok(self.inner.lock().await.progress.get(&user_id).cloned())
    }

    async fn insert_achievement_if_absent(
        &self,
        user_id: UserId,
        achievement_id: &str,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let key = (user_id, achievement_id.to_string());
        if inner.achievements.contains_key(&key) {
            return Ok(false);
        }
        inner.achievements.insert(
            key,
            Achievement {
                user_id,
                achievement_id: achievement_id.to_string(),
                unlocked_at: Utc::now(),
            },
        );
        Ok(true)
    }

    async fn has_achievement(&self, user_id: UserId, achievement_id: &str) -> StoreResult<bool> {
        let inner = self.inner.lock().await;
        Ok(inner
            .achievements
            .contains_key(&(user_id, achievement_id.to_string())))
    }

    async fn leaderboard_top(
        &self,
        mode: Mode,
        conv: Option<Conversion>,
        limit: u32,
    ) -> StoreResult<Vec<(String, u32, chrono::DateTime<chrono::Utc>)>> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<_> = inner
            .scores
            .values()
            .filter(|s| s.mode == mode && conv.map(|c| c == s.conv).unwrap_or(true))
            .map(|s| {
                let name = inner
                    .users
                    .get(&s.user_id)
                    .map(|u| u.name.clone())
                    .unwrap_or_else(|| "unknown".to_string());
                (name, s.score, s.created_at)
            })
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn daily_streak_top(
        &self,
        limit: u32,
    ) -> StoreResult<Vec<(String, u32, chrono::DateTime<chrono::Utc>)>> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<_> = inner
            .progress
            .values()
            .map(|p| {
                let name = inner
                    .users
                    .get(&p.user_id)
                    .map(|u| u.name.clone())
                    .unwrap_or_else(|| "unknown".to_string());
                (name, p.daily_streak, Utc::now())
            })
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn xp_top(&self, limit: u32) -> StoreResult<Vec<(String, i64, i64)>> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<_> = inner
            .progress
            .values()
            .map(|p| {
                let name = inner
                    .users
                    .get(&p.user_id)
                    .map(|u| u.name.clone())
                    .unwrap_or_else(|| "unknown".to_string());
                (name, p.total_xp, p.level)
            })
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1));
        rows.truncate(limit as usize);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(session_id: Uuid, user_id: UserId) -> GameSessionToken {
        GameSessionToken {
            session_id,
            user_id,
            room_id: None,
            mode: Mode::Classic,
            conv: Conversion::BinaryStandalone,
            issued_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::hours(2),
        }
    }

    #[tokio::test]
    async fn consume_session_is_single_use() {
        let store = InMemoryStore::new();
        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();
        store.insert_game_session(token(session_id, user_id)).await.unwrap();

        let first = store
            .consume_game_session(session_id, user_id, Mode::Classic, Conversion::BinaryStandalone)
            .await
            .unwrap();
        assert_eq!(first, TokenConsumeStatus::Ok);

        let second = store
            .consume_game_session(session_id, user_id, Mode::Classic, Conversion::BinaryStandalone)
            .await
            .unwrap();
        assert_eq!(second, TokenConsumeStatus::AlreadyUsed);
    }

    #[tokio::test]
    async fn insert_score_rejects_duplicate_session_id() {
        let store = InMemoryStore::new();
        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();
        let score = ConversionScore {
            id: Uuid::new_v4(),
            user_id,
            mode: Mode::Classic,
            conv: Conversion::BinaryStandalone,
            score: 10,
            metadata: serde_json::json!({}),
            session_id,
            created_at: Utc::now(),
        };
        assert!(store.insert_score(score.clone()).await.unwrap().is_some());
        let mut dup = score;
        dup.id = Uuid::new_v4();
        assert!(store.insert_score(dup).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn daily_streak_advances_only_on_consecutive_day() {
        let store = InMemoryStore::new();
        let user_id = Uuid::new_v4();
        let progress = store
            .upsert_progress_atomic(
                user_id,
                ProgressDelta {
                    xp_earned: 10,
                    best_streak: None,
                    best_classic_streak: None,
                    best_speed_round: None,
                    best_survival: None,
                    best_nibble_sprint: None,
                    record_played: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(progress.daily_streak, 1);

        // Playing again the same day does not advance the streak.
        let progress = store
            .upsert_progress_atomic(
                user_id,
                ProgressDelta {
                    xp_earned: 5,
                    best_streak: None,
                    best_classic_streak: None,
                    best_speed_round: None,
                    best_survival: None,
                    best_nibble_sprint: None,
                    record_played: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(progress.daily_streak, 1);
        assert_eq!(progress.total_xp, 15);
    }
}
