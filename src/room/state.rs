//! State machine entry actions. Each function here is the
//! "entry action" for the named state and is only ever called once, by `commands`/`actor`, at
//! the moment of transition.

use crate::models::{EndReason, Participant, ParticipantRole, Question, Room, RoomStatus};
use chrono::Utc;

/// `lobby → syncing`. Resets round counters and per-session scoring state for every participant.
pub fn enter_syncing(room: &mut Room) {
    room.status = RoomStatus::Syncing;
    room.sync_round = 0;
    for p in room.participants.values_mut() {
        p.score = 0;
        p.best_streak_this_session = 0;
        p.eliminated = false;
        p.last_scored_at = None;
        p.sync_round = 0;
        if room.config.goal_type == crate::models::GoalType::Survival {
            p.lives = room.config.goal_value.lives;
        }
    }
}

/// `syncing → playing`. Issues the first question(s) and starts any mode timer. Returns the
/// initial per-connection question events the actor must emit (shared pace emits one broadcast
/// question; per-player pace emits one private question per player).
pub fn enter_playing(room: &mut Room, first: crate::question::Generated) {
    room.status = RoomStatus::Playing;
    room.started_at = Some(Utc::now());
    room.next_question_index = 1;

    if room.config.mode.is_shared_pace() {
        room.current_question = Some(Question {
            index: 0,
            value: first.value,
            answer: first.answer,
        });
    } else {
        // Per-player pace: caller supplies the first player's question; subsequent players get
        // their own freshly generated question via `commands::ensure_question_for`.
        room.per_player_questions.clear();
    }
}

/// `* → ended`. Records the reason and timestamp; callers are responsible for computing and
/// emitting the final leaderboard.
pub fn enter_ended(room: &mut Room, reason: EndReason) {
    room.status = RoomStatus::Ended;
    room.end_reason = Some(reason);
    room.ended_at = Some(Utc::now());
    room.current_question = None;
    room.per_player_questions.clear();
}

pub fn new_room(
    room_id: crate::models::RoomId,
    room_code: String,
    config: crate::models::RoomConfig,
    host_participant_id: crate::models::ParticipantId,
    host: Participant,
) -> Room {
    let mut participants = std::collections::BTreeMap::new();
    participants.insert(host_participant_id, host);
    Room {
        room_id,
        room_code,
        config,
        status: RoomStatus::Lobby,
        host_participant_id,
        participants,
        participant_order: vec![host_participant_id],
        sync_round: 0,
        current_question: None,
        per_player_questions: std::collections::BTreeMap::new(),
        next_question_index: 0,
        started_at: None,
        ended_at: None,
        end_reason: None,
        tournament_ref: None,
        chat_log: Vec::new(),
        last_activity_at: Utc::now(),
    }
}

/// The oldest-connected remaining player, used for host transfer (see DESIGN.md Open
/// Question "Host transfer on disconnect" — this crate transfers once the departing host's
/// grace window actually expires, not immediately; see `room::actor`).
pub fn oldest_connected_player(room: &Room) -> Option<crate::models::ParticipantId> {
    room.participant_order
        .iter()
        .filter_map(|id| room.participants.get(id))
        .find(|p| p.role == ParticipantRole::Player && p.connected)
        .map(|p| p.participant_id)
}
