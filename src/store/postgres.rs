//! Production `Store` backed by Postgres via `sqlx`. Runtime-checked queries (`sqlx::query`/
//! `query_as`) rather than the compile-time `query!` macros, so the crate builds without a live
//! `DATABASE_URL` available at compile time.

use super::{ProgressDelta, Store, StoreResult, UserRecord};
use crate::models::{
    Conversion, ConversionProgress, ConversionScore, GameSessionToken, Mode, TokenConsumeStatus,
    UserId,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use sqlx::Row;
use uuid::Uuid;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("connected to Postgres store");
        Ok(Self { pool })
    }

    fn mode_str(mode: Mode) -> &'static str {
        match mode {
            Mode::Classic => "classic",
            Mode::StreakChallenge => "streak-challenge",
            Mode::Survival => "survival",
            Mode::SpeedRound => "speed-round",
            Mode::NibbleSprint => "nibble-sprint",
        }
    }

    fn conv_str(conv: Conversion) -> &'static str {
        match conv {
            Conversion::BinaryStandalone => "binary-standalone",
            Conversion::BinaryNibbleSprint => "binary-nibble-sprint",
            Conversion::HexStandalone => "hex-standalone",
            Conversion::HexNibbleSprint => "hex-nibble-sprint",
            Conversion::Ipv4Full => "ipv4-full",
            Conversion::Ipv6Hextet => "ipv6-hextet",
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn get_user(&self, user_id: UserId) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query(
            "SELECT user_id, name, email, role FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| UserRecord {
            user_id: r.get("user_id"),
            name: r.get("name"),
            email: r.get("email"),
            is_admin: r.get::<String, _>("role") == "admin",
        }))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query(
            "SELECT user_id, name, email, role FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| UserRecord {
            user_id: r.get("user_id"),
            name: r.get("name"),
            email: r.get("email"),
            is_admin: r.get::<String, _>("role") == "admin",
        }))
    }

    async fn insert_game_session(&self, token: GameSessionToken) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO game_sessions (session_id, user_id, room_id, mode, conv, issued_at, expires_at, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'issued')",
        )
        .bind(token.session_id)
        .bind(token.user_id)
        .bind(token.room_id)
        .bind(Self::mode_str(token.mode))
        .bind(Self::conv_str(token.conv))
        .bind(token.issued_at)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn consume_game_session(
        &self,
        session_id: Uuid,
        user_id: UserId,
        mode: Mode,
        conv: Conversion,
    ) -> StoreResult<TokenConsumeStatus> {
        // One statement does the compare-and-mark: only a row still `issued`, unexpired, and
        // matching (user, mode, conv) gets flipped to `consumed`. We then disambiguate why it
        // didn't flip with a follow-up read — the flip itself is the only part that must be
        // atomic.
        let updated = sqlx::query(
            "UPDATE game_sessions SET status = 'consumed'
             WHERE session_id = $1 AND status = 'issued' AND user_id = $2
               AND mode = $3 AND conv = $4 AND expires_at > now()
             RETURNING session_id",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(Self::mode_str(mode))
        .bind(Self::conv_str(conv))
        .fetch_optional(&self.pool)
        .await?;

        if updated.is_some() {
            return Ok(TokenConsumeStatus::Ok);
        }

        let existing = sqlx::query(
            "SELECT user_id, mode, conv, status, expires_at FROM game_sessions WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = existing else {
            return Ok(TokenConsumeStatus::NotFound);
        };
        if row.get::<String, _>("status") == "consumed" {
            return Ok(TokenConsumeStatus::AlreadyUsed);
        }
        if row.get::<chrono::DateTime<Utc>, _>("expires_at") < Utc::now() {
            return Ok(TokenConsumeStatus::Expired);
        }
        Ok(TokenConsumeStatus::Mismatch)
    }

    async fn insert_score(&self, score: ConversionScore) -> StoreResult<Option<()>> {
        let row = sqlx::query(
            "INSERT INTO conversion_scores (id, user_id, mode, conv, score, metadata, session_id, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (session_id) DO NOTHING
             RETURNING id",
        )
        .bind(score.id)
        .bind(score.user_id)
        .bind(Self::mode_str(score.mode))
        .bind(Self::conv_str(score.conv))
        .bind(score.score as i32)
        .bind(score.metadata)
        .bind(score.session_id)
        .bind(score.created_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|_| ()))
    }

    async fn upsert_progress_atomic(
        &self,
        user_id: UserId,
        delta: ProgressDelta,
    ) -> StoreResult<ConversionProgress> {
        // monotonic-max semantics applied server-side, in one statement.
        let today = Utc::now().date_naive();
        let row = sqlx::query(
            "INSERT INTO conversion_progress
                (user_id, total_xp, best_streak, best_classic_streak, daily_streak,
                 last_played_date, best_speed_round, best_survival, best_nibble_sprint)
             VALUES ($1, GREATEST($2, 0), COALESCE($3, 0), COALESCE($4, 0),
                     CASE WHEN $7 THEN 1 ELSE 0 END,
                     CASE WHEN $7 THEN $8::date ELSE NULL END,
                     COALESCE($5, 0), COALESCE($6, 0), COALESCE($9, 0))
             ON CONFLICT (user_id) DO UPDATE SET
                total_xp = GREATEST(conversion_progress.total_xp + $2, 0),
                best_streak = GREATEST(conversion_progress.best_streak, COALESCE($3, 0)),
                best_classic_streak = GREATEST(conversion_progress.best_classic_streak, COALESCE($4, 0)),
                best_speed_round = GREATEST(conversion_progress.best_speed_round, COALESCE($5, 0)),
                best_survival = GREATEST(conversion_progress.best_survival, COALESCE($6, 0)),
                best_nibble_sprint = GREATEST(conversion_progress.best_nibble_sprint, COALESCE($9, 0)),
                daily_streak = CASE
                    WHEN NOT $7 THEN conversion_progress.daily_streak
                    WHEN conversion_progress.last_played_date = $8::date THEN GREATEST(conversion_progress.daily_streak, 1)
                    WHEN conversion_progress.last_played_date = ($8::date - INTERVAL '1 day') THEN conversion_progress.daily_streak + 1
                    ELSE 1
                END,
                last_played_date = CASE WHEN $7 THEN $8::date ELSE conversion_progress.last_played_date END
             RETURNING user_id, total_xp, best_streak, best_classic_streak, daily_streak,
                       last_played_date, best_speed_round, best_survival, best_nibble_sprint",
        )
        .bind(user_id)
        .bind(delta.xp_earned)
        .bind(delta.best_streak.map(|v| v as i64))
        .bind(delta.best_classic_streak.map(|v| v as i64))
        .bind(delta.best_speed_round.map(|v| v as i64))
        .bind(delta.best_survival.map(|v| v as i64))
        .bind(delta.record_played)
        .bind(today)
        .bind(delta.best_nibble_sprint.map(|v| v as i64))
        .fetch_one(&self.pool)
        .await?;

        let mut progress = ConversionProgress {
            user_id: row.get("user_id"),
            total_xp: row.get("total_xp"),
            level: 0,
            best_streak: row.get::<i64, _>("best_streak") as u32,
            best_classic_streak: row.get::<i64, _>("best_classic_streak") as u32,
            daily_streak: row.get::<i64, _>("daily_streak") as u32,
            last_played_date: row.get("last_played_date"),
            best_speed_round: row.get::<i64, _>("best_speed_round") as u32,
            best_survival: row.get::<i64, _>("best_survival") as u32,
            best_nibble_sprint: row.get::<i64, _>("best_nibble_sprint") as u32,
        };
        progress.recompute_level();
        Ok(progress)
    }

    async fn get_progress(&self, user_id: UserId) -> StoreResult<Option<ConversionProgress>> {
        let row = sqlx::query(
            "SELECT user_id, total_xp, best_streak, best_classic_streak, daily_streak,
                    last_played_date, best_speed_round, best_survival, best_nibble_sprint
             FROM conversion_progress WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| {
            let mut progress = ConversionProgress {
                user_id: row.get("user_id"),
                total_xp: row.get("total_xp"),
                level: 0,
                best_streak: row.get::<i64, _>("best_streak") as u32,
                best_classic_streak: row.get::<i64, _>("best_classic_streak") as u32,
                daily_streak: row.get::<i64, _>("daily_streak") as u32,
                last_played_date: row.get("last_played_date"),
                best_speed_round: row.get::<i64, _>("best_speed_round") as u32,
                best_survival: row.get::<i64, _>("best_survival") as u32,
                best_nibble_sprint: row.get::<i64, _>("best_nibble_sprint") as u32,
            };
            progress.recompute_level();
            progress
        }))
    }

    async fn insert_achievement_if_absent(
        &self,
        user_id: UserId,
        achievement_id: &str,
    ) -> StoreResult<bool> {
        let row = sqlx::query(
            "INSERT INTO achievements (user_id, achievement_id, unlocked_at)
             VALUES ($1, $2, now())
             ON CONFLICT (user_id, achievement_id) DO NOTHING
             RETURNING user_id",
        )
        .bind(user_id)
        .bind(achievement_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn has_achievement(&self, user_id: UserId, achievement_id: &str) -> StoreResult<bool> {
        let row = sqlx::query(
            "SELECT 1 as present FROM achievements WHERE user_id = $1 AND achievement_id = $2",
        )
        .bind(user_id)
        .bind(achievement_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn leaderboard_top(
        &self,
        mode: Mode,
        conv: Option<Conversion>,
        limit: u32,
    ) -> StoreResult<Vec<(String, u32, chrono::DateTime<Utc>)>> {
        let rows = sqlx::query(
            "SELECT u.name as user_name, s.score, s.created_at
             FROM conversion_scores s
             JOIN users u ON u.user_id = s.user_id
             WHERE s.mode = $1 AND ($2::text IS NULL OR s.conv = $2)
             ORDER BY s.score DESC, s.created_at ASC
             LIMIT $3",
        )
        .bind(Self::mode_str(mode))
        .bind(conv.map(Self::conv_str))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| (r.get("user_name"), r.get::<i32, _>("score") as u32, r.get("created_at")))
            .collect())
    }

    async fn daily_streak_top(
        &self,
        limit: u32,
    ) -> StoreResult<Vec<(String, u32, chrono::DateTime<Utc>)>> {
        let rows = sqlx::query(
            "SELECT u.name as user_name, p.daily_streak, now() as created_at
             FROM conversion_progress p
             JOIN users u ON u.user_id = p.user_id
             ORDER BY p.daily_streak DESC
             LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| (r.get("user_name"), r.get::<i64, _>("daily_streak") as u32, r.get("created_at")))
            .collect())
    }

    async fn xp_top(&self, limit: u32) -> StoreResult<Vec<(String, i64, i64)>> {
        let rows = sqlx::query(
            "SELECT u.name as user_name, p.total_xp, (p.total_xp / 100) as level
             FROM conversion_progress p
             JOIN users u ON u.user_id = p.user_id
             ORDER BY p.total_xp DESC
             LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| (r.get("user_name"), r.get("total_xp"), r.get("level")))
            .collect())
    }
}
