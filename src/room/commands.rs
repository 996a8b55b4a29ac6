//! The six public Room Core operations. Every function here is a plain,
//! synchronous transformation of `&mut Room` — the actor (`room::actor`) is what serializes calls
//! onto these and turns the returned `RoomEvent`s into WS traffic.

use super::events::{build_final_leaderboard, build_leaderboard, RoomEvent, ServerEvent};
use super::scoring;
use super::state;
use crate::error::AppError;
use crate::models::{
    EndReason, GoalType, Participant, ParticipantId, ParticipantRole, Question, Room, RoomStatus,
};
use crate::question::{self, Generated};
use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

pub struct JoinInput {
    pub display_name: String,
    pub as_spectator: bool,
    pub password: Option<String>,
}

pub struct JoinOutput {
    pub participant_id: ParticipantId,
    pub events: Vec<RoomEvent>,
}

fn validate_name(name: &str) -> Result<String, AppError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().count() > 40 {
        return Err(AppError::InvalidArgument("displayName".into()));
    }
    Ok(trimmed.to_string())
}

pub fn join(room: &mut Room, input: JoinInput) -> Result<JoinOutput, AppError> {
    let display_name = validate_name(&input.display_name)?;
    let role = if input.as_spectator {
        ParticipantRole::Spectator
    } else {
        ParticipantRole::Player
    };

    if role == ParticipantRole::Player && room.status != RoomStatus::Lobby {
        return Err(AppError::RoomStarted);
    }
    if room.status == RoomStatus::Ended {
        return Err(AppError::RoomStarted);
    }

    if role == ParticipantRole::Player {
        let player_count = room
            .participants
            .values()
            .filter(|p| p.role == ParticipantRole::Player)
            .count();
        if player_count as u32 >= room.config.max_players {
            return Err(AppError::RoomFull);
        }
    }

    if let Some(hash) = &room.config.password_hash {
        match &input.password {
            None => return Err(AppError::PasswordRequired),
            Some(candidate) if !crate::utils::verify_password(hash, candidate) => {
                return Err(AppError::PasswordInvalid)
            }
            Some(_) => {}
        }
    }

    let participant_id = Uuid::new_v4();
    let participant = Participant {
        participant_id,
        display_name: display_name.clone(),
        role,
        is_host: false,
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
    room.participants.insert(participant_id, participant);
    room.participant_order.push(participant_id);
    room.last_activity_at = Utc::now();

    let events = vec![RoomEvent::Broadcast(ServerEvent::RoomState(
        super::events::RoomStateSnapshot {
            status: room.status,
            config: room.config.clone(),
            sync_round: room.sync_round,
        },
    ))];

    Ok(JoinOutput {
        participant_id,
        events,
    })
}

/// Marks a connection closed without removing the roster entry — the actor starts a 30 s grace
/// timer and only calls `leave` for real if no reconnect arrives before it fires.
pub fn mark_disconnected(room: &mut Room, participant_id: ParticipantId) {
    if let Some(p) = room.participants.get_mut(&participant_id) {
        p.connected = false;
    }
}

pub fn mark_reconnected(room: &mut Room, participant_id: ParticipantId) -> bool {
    if let Some(p) = room.participants.get_mut(&participant_id) {
        p.connected = true;
        true
    } else {
        false
    }
}

/// Full roster removal: explicit `Leave`, or the grace window expiring on a disconnected
/// participant. Transfers host if the departing participant was host and a player remains.
pub fn leave(room: &mut Room, participant_id: ParticipantId) -> Vec<RoomEvent> {
    let Some(removed) = room.participants.remove(&participant_id) else {
        return Vec::new();
    };
    room.participant_order.retain(|id| *id != participant_id);
    room.per_player_questions.remove(&participant_id);
    room.last_activity_at = Utc::now();

    let mut events = Vec::new();

    if removed.is_host {
        if let Some(next_host) = state::oldest_connected_player(room) {
            if let Some(p) = room.participants.get_mut(&next_host) {
                p.is_host = true;
            }
            room.host_participant_id = next_host;
        }
    }

    if matches!(room.status, RoomStatus::Playing | RoomStatus::Syncing)
        && scoring::roster_empty(room)
    {
        state::enter_ended(room, EndReason::AllLeft);
        events.push(RoomEvent::Broadcast(ServerEvent::GameEnded {
            leaderboard: build_final_leaderboard(room),
            reason: EndReason::AllLeft,
        }));
        return events;
    }

    events.push(RoomEvent::Broadcast(ServerEvent::RoomState(
        super::events::RoomStateSnapshot {
            status: room.status,
            config: room.config.clone(),
            sync_round: room.sync_round,
        },
    )));
    events
}

/// `syncing` only; monotonic per participant. Returns events once every connected player has
/// acked the current round; transitions to `playing` on round 3.
pub fn sync_ack(
    room: &mut Room,
    participant_id: ParticipantId,
    round: u8,
    rng: &mut impl Rng,
) -> Result<Vec<RoomEvent>, AppError> {
    if room.status != RoomStatus::Syncing {
        return Err(AppError::ProtocolError("sync_ack outside syncing".into()));
    }
    let Some(p) = room.participants.get_mut(&participant_id) else {
        return Err(AppError::NotFound);
    };
    if round > p.sync_round {
        p.sync_round = round;
    }

    Ok(finish_round_check(room, round, rng))
}

/// Shared by `sync_ack` (once the acking participant's round has been recorded) and the sync
/// watchdog (once stragglers have been force-advanced) — both need the same "is everyone at this
/// round, and if so transition to `playing`" check.
fn finish_round_check(room: &mut Room, round: u8, rng: &mut impl Rng) -> Vec<RoomEvent> {
    let players: Vec<_> = room
        .participants
        .values()
        .filter(|p| p.role == ParticipantRole::Player)
        .collect();
    let all_ready = !players.is_empty() && players.iter().all(|p| p.sync_round >= round);

    if all_ready {
        room.sync_round = round;
    }

    let mut events = vec![RoomEvent::Broadcast(ServerEvent::SyncRoundComplete {
        round,
        all_ready,
    })];

    if all_ready && round >= 3 {
        let first = question::generate(room.config.conv, rng);
        state::enter_playing(room, first.clone());
        events.push(RoomEvent::Broadcast(ServerEvent::GameStarted));
        if room.config.mode.is_shared_pace() {
            if let Some(q) = &room.current_question {
                events.push(RoomEvent::Broadcast(ServerEvent::Question(q.clone())));
            }
        } else {
            let player_ids: Vec<_> = room
                .participant_order
                .iter()
                .copied()
                .filter(|id| {
                    room.participants
                        .get(id)
                        .map(|p| p.is_scorable())
                        .unwrap_or(false)
                })
                .collect();
            for (i, pid) in player_ids.iter().enumerate() {
                let g = if i == 0 {
                    first.clone()
                } else {
                    question::generate(room.config.conv, rng)
                };
                let q = Question {
                    index: room.next_question_index,
                    value: g.value,
                    answer: g.answer,
                };
                room.next_question_index += 1;
                room.per_player_questions.insert(*pid, q.clone());
                events.push(RoomEvent::Private(*pid, ServerEvent::Question(q)));
            }
        }
    }

    events
}

/// Force-advances every player still behind `round` and re-runs the completion check — used by
/// the per-round watchdog (5 s per round) so a single slow client can't stall
/// `syncing` forever.
pub fn force_round_complete(room: &mut Room, round: u8, rng: &mut impl Rng) -> Vec<RoomEvent> {
    for p in room.participants.values_mut() {
        if p.role == ParticipantRole::Player && p.sync_round < round {
            p.sync_round = round;
        }
    }
    finish_round_check(room, round, rng)
}

/// `lobby → syncing`, reached via `StartGame` called by the host or by a Tournament. A bare
/// Room requires the caller to be host; a Room that belongs to a Tournament bracket is started by
/// the orchestrator instead, which bypasses the host check via `start_game_forced`.
pub fn start_game(room: &mut Room, participant_id: ParticipantId) -> Result<Vec<RoomEvent>, AppError> {
    if participant_id != room.host_participant_id {
        return Err(AppError::Forbidden);
    }
    start_game_forced(room)
}

pub fn start_game_forced(room: &mut Room) -> Result<Vec<RoomEvent>, AppError> {
    if room.status != RoomStatus::Lobby {
        return Err(AppError::RoomStarted);
    }
    state::enter_syncing(room);
    Ok(vec![RoomEvent::Broadcast(ServerEvent::SyncRoundComplete {
        round: 0,
        all_ready: false,
    })])
}

fn issue_shared_question(room: &mut Room, rng: &mut impl Rng) -> RoomEvent {
    let g = question::generate(room.config.conv, rng);
    let q = Question {
        index: room.next_question_index,
        value: g.value,
        answer: g.answer,
    };
    room.next_question_index += 1;
    room.current_question = Some(q.clone());
    RoomEvent::Broadcast(ServerEvent::Question(q))
}

fn issue_private_question(room: &mut Room, participant_id: ParticipantId, g: Generated) -> RoomEvent {
    let q = Question {
        index: room.next_question_index,
        value: g.value,
        answer: g.answer,
    };
    room.next_question_index += 1;
    room.per_player_questions.insert(participant_id, q.clone());
    RoomEvent::Private(participant_id, ServerEvent::Question(q))
}

/// `playing` only, `role=player` only.
pub fn submit_answer(
    room: &mut Room,
    participant_id: ParticipantId,
    raw: &str,
    rng: &mut impl Rng,
) -> Result<Vec<RoomEvent>, AppError> {
    if room.status != RoomStatus::Playing {
        return Err(AppError::ProtocolError("submit_answer outside playing".into()));
    }
    let is_shared = room.config.mode.is_shared_pace();
    let answer = if is_shared {
        room.current_question.as_ref().map(|q| q.answer.clone())
    } else {
        room.per_player_questions.get(&participant_id).map(|q| q.answer.clone())
    };
    let Some(answer) = answer else {
        return Err(AppError::ProtocolError("no active question".into()));
    };

    let participant_exists = room
        .participants
        .get(&participant_id)
        .map(|p| p.is_scorable())
        .unwrap_or(false);
    if !participant_exists {
        return Err(AppError::ProtocolError("not an active player".into()));
    }

    let correct = question::is_correct(raw, &answer, room.config.conv);
    let mut events = Vec::new();

    if correct {
        let p = room.participants.get_mut(&participant_id).unwrap();
        p.score += scoring::score_delta(room.config.mode, p.best_streak_this_session);
        p.best_streak_this_session += 1;
        p.last_scored_at = Some(Utc::now());

        events.push(RoomEvent::Private(
            participant_id,
            ServerEvent::AnswerResult { correct: true },
        ));
        events.push(RoomEvent::Broadcast(ServerEvent::Leaderboard(
            build_leaderboard(&room.participants),
        )));

        if scoring::goal_reached(room).is_some() {
            state::enter_ended(room, EndReason::GoalReached);
            events.push(RoomEvent::Broadcast(ServerEvent::GameEnded {
                leaderboard: build_final_leaderboard(room),
                reason: EndReason::GoalReached,
            }));
            return Ok(events);
        }

        if is_shared {
            events.push(issue_shared_question(room, rng));
        } else {
            let g = question::generate(room.config.conv, rng);
            events.push(issue_private_question(room, participant_id, g));
        }
    } else {
        events.push(RoomEvent::Private(
            participant_id,
            ServerEvent::AnswerResult { correct: false },
        ));

        if room.config.goal_type == GoalType::Survival {
            let eliminated_now = {
                let p = room.participants.get_mut(&participant_id).unwrap();
                if let Some(lives) = p.lives.as_mut() {
                    *lives = lives.saturating_sub(1);
                    if *lives == 0 {
                        p.eliminated = true;
                    }
                }
                p.eliminated
            };
            if eliminated_now && scoring::survival_exhausted(room) {
                state::enter_ended(room, EndReason::GoalReached);
                events.push(RoomEvent::Broadcast(ServerEvent::GameEnded {
                    leaderboard: build_final_leaderboard(room),
                    reason: EndReason::GoalReached,
                }));
            }
        }
    }

    Ok(events)
}

/// Length/Unicode-safe normalization and a 100-message ring buffer.
pub fn chat(
    room: &mut Room,
    participant_id: ParticipantId,
    message: &str,
) -> Result<RoomEvent, AppError> {
    let Some(p) = room.participants.get(&participant_id) else {
        return Err(AppError::NotFound);
    };
    let trimmed: String = message.trim().chars().take(500).collect();
    if trimmed.is_empty() {
        return Err(AppError::InvalidArgument("message".into()));
    }
    let entry = crate::models::ChatMessage {
        participant_id,
        display_name: p.display_name.clone(),
        message: trimmed,
        timestamp: Utc::now(),
    };
    room.chat_log.push(entry.clone());
    if room.chat_log.len() > 100 {
        room.chat_log.remove(0);
    }
    Ok(RoomEvent::Broadcast(ServerEvent::ChatMessage(entry)))
}

/// Only the current host may end the game early.
pub fn host_end(room: &mut Room, participant_id: ParticipantId) -> Result<Vec<RoomEvent>, AppError> {
    if participant_id != room.host_participant_id {
        return Err(AppError::Forbidden);
    }
    state::enter_ended(room, EndReason::HostEnded);
    Ok(vec![RoomEvent::Broadcast(ServerEvent::GameEnded {
        leaderboard: build_final_leaderboard(room),
        reason: EndReason::HostEnded,
    })])
}

/// Fixed-timer modes (speed-round, nibble-sprint, most_in_time, timed) and the syncing watchdog
/// both funnel through here on expiry.
pub fn time_up(room: &mut Room) -> Vec<RoomEvent> {
    if room.status != RoomStatus::Playing {
        return Vec::new();
    }
    state::enter_ended(room, EndReason::TimeUp);
    vec![RoomEvent::Broadcast(ServerEvent::GameEnded {
        leaderboard: build_final_leaderboard(room),
        reason: EndReason::TimeUp,
    })]
}
