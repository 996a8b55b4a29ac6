//! Scoring and end-condition policy.

use crate::models::{GoalType, Mode, Participant, ParticipantId, ParticipantRole, Room};

/// Score awarded for one correct answer. Uniform across modes by design (see DESIGN.md open question
/// "Scoring uniformity") — difficulty differences are routed into XP at the Leaderboard &
/// Progress Service instead of into per-mode score weights.
pub fn score_delta(_mode: Mode, _streak: u32) -> u32 {
    1
}

/// `true` once the room's configured goal has been reached by at least one scorable participant.
/// Does not itself end the room — callers combine this with timer/roster checks.
pub fn goal_reached(room: &Room) -> Option<ParticipantId> {
    let GoalType::FirstTo = room.config.goal_type else {
        return None;
    };
    let target = room.config.goal_value.first_to?;
    room.participant_order
        .iter()
        .filter_map(|id| room.participants.get(id))
        .find(|p| p.is_scorable() && p.score >= target)
        .map(|p| p.participant_id)
}

/// `survival` ends once every player is eliminated, or once elimination has narrowed the field
/// down to a single player still standing (that player wins uncontested; no further answers can
/// change the outcome).
pub fn survival_exhausted(room: &Room) -> bool {
    if room.config.goal_type != GoalType::Survival {
        return false;
    }
    let players = room
        .participants
        .values()
        .filter(|p| p.role == ParticipantRole::Player);
    let remaining = players.clone().filter(|p| !p.eliminated).count();
    remaining == 0 || (remaining == 1 && players.count() > 1)
}

/// `true` when fewer than one scorable player remains connected and roster is not merely empty
/// pending the reconnect grace window (that case is handled by the actor's grace timer instead).
pub fn roster_empty(room: &Room) -> bool {
    room.participants
        .values()
        .all(|p| p.role != ParticipantRole::Player)
}

/// Deterministic leaderboard ordering: score desc, first-to-reach-that-score timestamp asc,
/// participant id asc.
pub fn compare_for_ranking(a: &Participant, b: &Participant) -> std::cmp::Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.last_scored_at.cmp(&b.last_scored_at))
        .then_with(|| a.participant_id.cmp(&b.participant_id))
}

/// `false` for a streak mode's best-of-session ranking, which sorts by `bestStreakThisSession`
/// instead of `score`.
pub fn compare_for_streak_ranking(a: &Participant, b: &Participant) -> std::cmp::Ordering {
    b.best_streak_this_session
        .cmp(&a.best_streak_this_session)
        .then_with(|| a.participant_id.cmp(&b.participant_id))
}

