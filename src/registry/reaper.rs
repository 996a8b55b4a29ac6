//! Background GC for idle lobbies — `ROOM_IDLE_TTL` (default 1 h of no activity in
//! `lobby`). Rooms that reach `ended` retire themselves (their actor exits after the retention
//! window in `room::actor`); this task only has to chase rooms that never left `lobby`.

use super::Registry;
use std::sync::Arc;
use std::time::Duration;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub fn spawn(registry: Arc<Registry>, idle_ttl: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            sweep_once(&registry, idle_ttl);
        }
    });
}

fn sweep_once(registry: &Registry, idle_ttl: Duration) {
    let now = chrono::Utc::now();
    for room_id in registry.all_room_ids() {
        let Some(handle) = registry.get_room(room_id) else {
            continue;
        };
        let room = handle.snapshot();
        if room.status != crate::models::RoomStatus::Lobby {
            continue;
        }
        let idle_for = now.signed_duration_since(room.last_activity_at);
        if idle_for
            > chrono::Duration::from_std(idle_ttl).unwrap_or(chrono::Duration::seconds(3600))
        {
            tracing::info!(room_id = %room_id, "reaping idle lobby room");
            registry.deregister_room(room_id, &room.room_code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Conversion, GoalType, GoalValue, Mode, RoomConfig, Visibility};

    fn test_config() -> RoomConfig {
        RoomConfig {
            mode: Mode::Classic,
            conv: Conversion::BinaryStandalone,
            goal_type: GoalType::FirstTo,
            goal_value: GoalValue {
                first_to: Some(3),
                seconds: None,
                lives: None,
            },
            visibility: Visibility::Public,
            password_hash: None,
            max_players: 8,
            show_leaderboard: true,
            show_power_table: true,
        }
    }

    #[tokio::test]
    async fn sweep_removes_only_stale_lobby_rooms() {
        let registry = Registry::new();
        let host_id = uuid::Uuid::new_v4();
        let host = crate::models::Participant {
            participant_id: host_id,
            display_name: "Host".into(),
            role: crate::models::ParticipantRole::Player,
            is_host: true,
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
        let mut room = crate::room::state::new_room(
            uuid::Uuid::new_v4(),
            "STALE1".into(),
            test_config(),
            host_id,
            host,
        );
        room.last_activity_at = chrono::Utc::now() - chrono::Duration::hours(2);
        let handle = crate::room::spawn(room, 1, None);
        registry.register_room("STALE1".into(), handle);

        assert_eq!(registry.room_count(), 1);
        sweep_once(&registry, Duration::from_secs(3600));
        assert_eq!(registry.room_count(), 0);
    }
}
