//! Wire schema for both WS channels — `/ws/rooms/{id}` and
//! (`/ws/tournaments/{id}/control`). Every message is a tagged `{ "type": "<tag>", ... }` object;
//! unknown tags deserialize as `ClientMessage::Unknown` rather than failing, per the
//! "unknown tags are ignored with a `protocol_error`".

use crate::models::{ChatMessage, EndReason, LeaderboardEntry, Question, RoomConfig, RoomStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    SyncAck { round: u8 },
    AnswerSubmit { answer: String },
    Chat { message: String },
    EndGameRequest,
    Ping,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    RoomState {
        participants: Vec<ParticipantView>,
        status: RoomStatus,
        config: RoomConfig,
        show_leaderboard: bool,
        sync_round: u8,
    },
    SyncRoundComplete {
        round: u8,
        all_ready: bool,
    },
    GameStarted,
    Question {
        value: String,
        index: u32,
    },
    AnswerResult {
        correct: bool,
    },
    Leaderboard(Vec<LeaderboardEntry>),
    ChatMessage {
        participant_id: uuid::Uuid,
        display_name: String,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    GameEnded {
        leaderboard: Vec<LeaderboardEntry>,
        reason: EndReason,
    },
    ProtocolError {
        code: String,
    },
    Pong,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantView {
    pub participant_id: uuid::Uuid,
    pub display_name: String,
    pub role: crate::models::ParticipantRole,
    pub is_host: bool,
    pub score: u32,
    pub connected: bool,
    pub eliminated: bool,
}

impl From<&crate::models::Participant> for ParticipantView {
    fn from(p: &crate::models::Participant) -> Self {
        ParticipantView {
            participant_id: p.participant_id,
            display_name: p.display_name.clone(),
            role: p.role,
            is_host: p.is_host,
            score: p.score,
            connected: p.connected,
            eliminated: p.eliminated,
        }
    }
}

pub fn room_state_message(room: &crate::models::Room) -> ServerMessage {
    ServerMessage::RoomState {
        participants: room.participants.values().map(ParticipantView::from).collect(),
        status: room.status,
        config: room.config.clone(),
        show_leaderboard: room.config.show_leaderboard,
        sync_round: room.sync_round,
    }
}

/// Maps a Room Core `ServerEvent` (connection-agnostic) to the wire `ServerMessage` the Hub
/// actually serializes.
pub fn from_room_event(event: &crate::room::ServerEvent) -> ServerMessage {
    use crate::room::ServerEvent as E;
    match event {
        E::RoomState(snapshot) => ServerMessage::RoomState {
            participants: Vec::new(),
            status: snapshot.status,
            config: snapshot.config.clone(),
            show_leaderboard: snapshot.config.show_leaderboard,
            sync_round: snapshot.sync_round,
        },
        E::SyncRoundComplete { round, all_ready } => ServerMessage::SyncRoundComplete {
            round: *round,
            all_ready: *all_ready,
        },
        E::GameStarted => ServerMessage::GameStarted,
        E::Question(q) => ServerMessage::Question {
            value: q.value.clone(),
            index: q.index,
        },
        E::AnswerResult { correct } => ServerMessage::AnswerResult { correct: *correct },
        E::Leaderboard(rows) => ServerMessage::Leaderboard(rows.clone()),
        E::ChatMessage(ChatMessage {
            participant_id,
            display_name,
            message,
            timestamp,
        }) => ServerMessage::ChatMessage {
            participant_id: *participant_id,
            display_name: display_name.clone(),
            message: message.clone(),
            timestamp: *timestamp,
        },
        E::GameEnded { leaderboard, reason } => ServerMessage::GameEnded {
            leaderboard: leaderboard.clone(),
            reason: *reason,
        },
        E::ProtocolError { code } => ServerMessage::ProtocolError { code: code.clone() },
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TournamentMessage {
    BracketUpdate {
        bracket_index: u32,
        status: RoomStatus,
        participant_count: u32,
    },
    TournamentEnded {
        aggregate_leaderboard: Vec<LeaderboardEntry>,
    },
}
