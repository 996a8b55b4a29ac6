//! Outbound events a Room Core operation can produce. The WS Hub (`crate::ws`) turns these into
//! the wire `ServerMessage`s sent over the room WS channel — this module stays free of anything connection- or
//! JSON-shaped so Room Core can be exercised without a Hub in tests.

use crate::models::{
    ChatMessage, EndReason, LeaderboardEntry, ParticipantId, Question, RoomConfig, RoomStatus,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct RoomStateSnapshot {
    pub status: RoomStatus,
    pub config: RoomConfig,
    pub sync_round: u8,
}

/// One event, plus who it's addressed to. `Broadcast` fans out to every connection in the room;
/// `Private` is delivered only to the named participant's live connection(s) — used for
/// `answer_result` (never broadcast) and per-player `question`s.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    Broadcast(ServerEvent),
    Private(ParticipantId, ServerEvent),
}

#[derive(Debug, Clone)]
pub enum ServerEvent {
    RoomState(RoomStateSnapshot),
    SyncRoundComplete { round: u8, all_ready: bool },
    GameStarted,
    Question(Question),
    AnswerResult { correct: bool },
    Leaderboard(Vec<LeaderboardEntry>),
    ChatMessage(ChatMessage),
    GameEnded {
        leaderboard: Vec<LeaderboardEntry>,
        reason: EndReason,
    },
    ProtocolError { code: String },
}

/// Builds the `leaderboard` event payload from the current roster, applying the tie-break
/// ordering (tie-broken by first-to-reach-that-score, then participant id). In-progress leaderboards always rank by score; use
/// `build_final_leaderboard` for the `game_ended` payload, which ranks `streak` mode by
/// best-streak-this-session instead.
pub fn build_leaderboard(
    participants: &BTreeMap<ParticipantId, crate::models::Participant>,
) -> Vec<LeaderboardEntry> {
    rank(participants, super::scoring::compare_for_ranking)
}

pub fn build_final_leaderboard(
    room: &crate::models::Room,
) -> Vec<LeaderboardEntry> {
    if room.config.goal_type == crate::models::GoalType::Streak {
        rank(&room.participants, super::scoring::compare_for_streak_ranking)
    } else {
        rank(&room.participants, super::scoring::compare_for_ranking)
    }
}

fn rank(
    participants: &BTreeMap<ParticipantId, crate::models::Participant>,
    compare: impl Fn(&crate::models::Participant, &crate::models::Participant) -> std::cmp::Ordering,
) -> Vec<LeaderboardEntry> {
    let mut rows: Vec<_> = participants
        .values()
        .filter(|p| p.role == crate::models::ParticipantRole::Player)
        .collect();
    rows.sort_by(|a, b| compare(a, b));
    rows.into_iter()
        .enumerate()
        .map(|(i, p)| LeaderboardEntry {
            rank: i as u32 + 1,
            display_name: p.display_name.clone(),
            score: p.score,
            is_guest: p.user_id.is_none(),
        })
        .collect()
}
