//! Domain entities shared across every component.
//!
//! These are plain serde structs/enums with no behavior of their own — the state machines and
//! scoring rules that operate on them live in `crate::room`, `crate::tournament` and
//! `crate::leaderboard`. Keeping them behavior-free lets the WS and HTTP layers serialize them
//! directly without leaking internal mutation APIs to clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub type RoomId = Uuid;
pub type TournamentId = Uuid;
pub type ParticipantId = Uuid;
pub type UserId = Uuid;

/// Resolved per-request identity. A missing session cookie, or one the Store can't find,
/// resolves to `Guest` rather than failing the request — guests may spectate and play
/// unscored multiplayer rounds, just never obtain a `GameSessionToken`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Principal {
    Guest,
    User { user_id: UserId },
    Admin { user_id: UserId },
}

impl Principal {
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Principal::Guest => None,
            Principal::User { user_id } | Principal::Admin { user_id } => Some(*user_id),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Principal::Admin { .. })
    }
}

/// A single conversion question kind. `nibble-sprint` pairs with the nibble-width variants of
/// `binary`/`hex` (4 bits instead of 8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Conversion {
    BinaryStandalone,
    BinaryNibbleSprint,
    HexStandalone,
    HexNibbleSprint,
    Ipv4Full,
    Ipv6Hextet,
}

/// Selects the pacing/timer family a room plays under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    Classic,
    StreakChallenge,
    Survival,
    SpeedRound,
    NibbleSprint,
}

impl Mode {
    /// Shared-pace modes broadcast one `currentQuestion` to the whole room; per-player pace
    /// modes keep an independent question per player.
    pub fn is_shared_pace(&self) -> bool {
        matches!(self, Mode::SpeedRound | Mode::NibbleSprint)
    }

    /// Fixed countdown for the shared-pace timed modes; `None` for modes whose end condition
    /// isn't wall-clock (those use `GoalType` instead).
    pub fn fixed_timer(&self) -> Option<std::time::Duration> {
        match self {
            Mode::SpeedRound => Some(std::time::Duration::from_secs(60)),
            Mode::NibbleSprint => Some(std::time::Duration::from_secs(30)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    FirstTo,
    MostInTime,
    Timed,
    Streak,
    Survival,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalValue {
    pub first_to: Option<u32>,
    pub seconds: Option<u32>,
    pub lives: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Private,
    Public,
    PublicPassword,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    pub mode: Mode,
    pub conv: Conversion,
    pub goal_type: GoalType,
    pub goal_value: GoalValue,
    pub visibility: Visibility,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    pub max_players: u32,
    pub show_leaderboard: bool,
    pub show_power_table: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Lobby,
    Syncing,
    Playing,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    GoalReached,
    TimeUp,
    HostEnded,
    AllLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Player,
    Spectator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub participant_id: ParticipantId,
    pub display_name: String,
    pub role: ParticipantRole,
    pub is_host: bool,
    pub score: u32,
    pub lives: Option<u32>,
    pub best_streak_this_session: u32,
    pub connected: bool,
    pub eliminated: bool,
    pub guest_tag: Option<String>,
    pub user_id: Option<UserId>,
    /// When this participant's score last increased, used for `first_to`/tie-break ordering.
    pub last_scored_at: Option<DateTime<Utc>>,
    pub sync_round: u8,
}

impl Participant {
    pub fn is_scorable(&self) -> bool {
        self.role == ParticipantRole::Player && !self.eliminated
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub index: u32,
    pub value: String,
    #[serde(skip)]
    pub answer: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TournamentRef {
    pub tournament_id: TournamentId,
    pub bracket_index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub room_id: RoomId,
    pub room_code: String,
    pub config: RoomConfig,
    pub status: RoomStatus,
    pub host_participant_id: ParticipantId,
    pub participants: BTreeMap<ParticipantId, Participant>,
    /// Insertion order, since `BTreeMap` orders by `ParticipantId` not join order.
    pub participant_order: Vec<ParticipantId>,
    pub sync_round: u8,
    /// Present only in `playing` with shared pacing; per-player pacing keeps
    /// `per_player_questions` instead.
    pub current_question: Option<Question>,
    pub per_player_questions: BTreeMap<ParticipantId, Question>,
    pub next_question_index: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub end_reason: Option<EndReason>,
    pub tournament_ref: Option<TournamentRef>,
    pub chat_log: Vec<ChatMessage>,
    pub last_activity_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub participant_id: ParticipantId,
    pub display_name: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    Lobby,
    Running,
    Ended,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentConfig {
    pub mode: Mode,
    pub conv: Conversion,
    pub goal_type: GoalType,
    pub goal_value: GoalValue,
    pub visibility: Visibility,
    pub max_players: u32,
    pub show_leaderboard: bool,
    pub show_power_table: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    pub tournament_id: TournamentId,
    pub tournament_code: String,
    pub name: String,
    pub config: TournamentConfig,
    pub bracket_size: u32,
    pub max_players: u32,
    pub status: TournamentStatus,
    pub bracket_room_ids: Vec<RoomId>,
    pub creator_user_id: UserId,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GameSessionToken {
    pub session_id: Uuid,
    pub user_id: UserId,
    pub room_id: Option<RoomId>,
    pub mode: Mode,
    pub conv: Conversion,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenConsumeStatus {
    Ok,
    NotFound,
    Mismatch,
    Expired,
    AlreadyUsed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionScore {
    pub id: Uuid,
    pub user_id: UserId,
    pub mode: Mode,
    pub conv: Conversion,
    pub score: u32,
    pub metadata: serde_json::Value,
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionProgress {
    pub user_id: UserId,
    pub total_xp: i64,
    pub level: i64,
    pub best_streak: u32,
    pub best_classic_streak: u32,
    pub daily_streak: u32,
    pub last_played_date: Option<chrono::NaiveDate>,
    pub best_speed_round: u32,
    pub best_survival: u32,
    pub best_nibble_sprint: u32,
}

impl ConversionProgress {
    pub fn recompute_level(&mut self) {
        self.level = self.total_xp / 100;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub user_id: UserId,
    pub achievement_id: String,
    pub unlocked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub display_name: String,
    pub score: u32,
    pub is_guest: bool,
}
