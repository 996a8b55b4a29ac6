//! Tournament Orchestrator. Owns many Rooms under one `tournamentId`; bracket
//! allocation is the one piece of shared mutable state here, so it's serialized the same way Room
//! Core serializes its own mutations: one writer task per Tournament, reached only through a
//! `TournamentHandle`.

use crate::error::AppError;
use crate::models::{
    ParticipantId, Room, RoomId, Tournament, TournamentConfig, TournamentId, TournamentStatus,
    UserId,
};
use crate::room::{RoomHandle, StartBy};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

pub struct JoinOutput {
    pub participant_id: ParticipantId,
    pub bracket_index: u32,
    pub room_id: RoomId,
}

pub struct BracketView {
    pub bracket_index: u32,
    pub status: crate::models::RoomStatus,
    pub participant_count: u32,
}

enum Command {
    Join {
        display_name: String,
        reply: oneshot::Sender<Result<JoinOutput, AppError>>,
    },
    Start {
        is_admin: bool,
        reply: oneshot::Sender<Result<(), AppError>>,
    },
    BracketEnded {
        bracket_index: u32,
    },
    Brackets {
        reply: oneshot::Sender<Vec<BracketView>>,
    },
}

#[derive(Clone)]
pub struct TournamentHandle {
    tournament_id: TournamentId,
    tx: mpsc::Sender<Command>,
    snapshot: watch::Receiver<Tournament>,
}

impl TournamentHandle {
    pub fn tournament_id(&self) -> TournamentId {
        self.tournament_id
    }

    pub fn snapshot(&self) -> Tournament {
        self.snapshot.borrow().clone()
    }

    async fn call<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, AppError> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(build(tx)).await.map_err(|_| AppError::NotFound)?;
        rx.await.map_err(|_| AppError::Internal)
    }

    pub async fn join(&self, display_name: String) -> Result<JoinOutput, AppError> {
        self.call(|reply| Command::Join { display_name, reply }).await?
    }

    pub async fn start(&self, is_admin: bool) -> Result<(), AppError> {
        self.call(|reply| Command::Start { is_admin, reply }).await?
    }

    pub async fn brackets(&self) -> Vec<BracketView> {
        self.call(|reply| Command::Brackets { reply }).await.unwrap_or_default()
    }

    pub async fn bracket_ended(&self, bracket_index: u32) {
        let _ = self.tx.send(Command::BracketEnded { bracket_index }).await;
    }
}

struct Bracket {
    room_id: RoomId,
    handle: RoomHandle,
    participant_count: u32,
    ended: bool,
}

struct Actor {
    tournament: Tournament,
    brackets: Vec<Bracket>,
    rx: mpsc::Receiver<Command>,
    snapshot_tx: watch::Sender<Tournament>,
}

/// `room_factory` builds and spawns a fresh Room (bracket) given its index; the Tournament
/// Orchestrator never constructs `Room`s itself so it stays agnostic of Room Core internals.
pub fn spawn(
    tournament_id: TournamentId,
    tournament_code: String,
    name: String,
    config: TournamentConfig,
    bracket_size: u32,
    max_players: u32,
    creator_user_id: UserId,
    room_factory: impl Fn(u32) -> (RoomId, RoomHandle),
) -> TournamentHandle {
    let bracket_count = max_players.div_ceil(bracket_size).max(1);
    let mut brackets = Vec::with_capacity(bracket_count as usize);
    let mut bracket_room_ids = Vec::with_capacity(bracket_count as usize);
    for i in 0..bracket_count {
        let (room_id, handle) = room_factory(i);
        bracket_room_ids.push(room_id);
        brackets.push(Bracket {
            room_id,
            handle,
            participant_count: 0,
            ended: false,
        });
    }

    let tournament = Tournament {
        tournament_id,
        tournament_code,
        name,
        config,
        bracket_size,
        max_players,
        status: TournamentStatus::Lobby,
        bracket_room_ids,
        creator_user_id,
    };

    let (tx, rx) = mpsc::channel(256);
    let (snapshot_tx, snapshot_rx) = watch::channel(tournament.clone());
    let handle = TournamentHandle {
        tournament_id,
        tx,
        snapshot: snapshot_rx,
    };

    let mut actor = Actor {
        tournament,
        brackets,
        rx,
        snapshot_tx,
    };
    tokio::spawn(async move { actor.run().await });
    handle
}

impl Actor {
    async fn run(&mut self) {
        while let Some(cmd) = self.rx.recv().await {
            self.handle(cmd).await;
            let _ = self.snapshot_tx.send(self.tournament.clone());
        }
    }

    /// Bracket selection: first bracket with spare capacity, in index order — the single serial
    /// region so no two joins land in the same slot on a capacity boundary.
    /// `maxPlayers` is a hard tournament-wide cap independent of `brackets.len() * bracketSize`,
    /// so a join past it is rejected even if the last bracket still has per-bracket headroom.
    fn pick_bracket(&mut self) -> Option<usize> {
        let total: u32 = self.brackets.iter().map(|b| b.participant_count).sum();
        if total >= self.tournament.max_players {
            return None;
        }
        self.brackets
            .iter()
            .position(|b| b.participant_count < self.tournament.bracket_size)
    }

    async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Join { display_name, reply } => {
                let Some(index) = self.pick_bracket() else {
                    let _ = reply.send(Err(AppError::RoomFull));
                    return;
                };
                let bracket = &mut self.brackets[index];
                let join_input = crate::room::JoinInput {
                    display_name,
                    as_spectator: false,
                    password: None,
                };
                match bracket.handle.join(join_input).await {
                    Ok(out) => {
                        bracket.participant_count += 1;
                        let _ = reply.send(Ok(JoinOutput {
                            participant_id: out.participant_id,
                            bracket_index: index as u32,
                            room_id: bracket.room_id,
                        }));
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }
            Command::Start { is_admin, reply } => {
                if !is_admin {
                    let _ = reply.send(Err(AppError::Forbidden));
                    return;
                }
                let total_participants: u32 = self.brackets.iter().map(|b| b.participant_count).sum();
                if total_participants == 0 {
                    let _ = reply.send(Err(AppError::InvalidArgument("no participants".into())));
                    return;
                }
                for bracket in &self.brackets {
                    if bracket.participant_count > 0 {
                        let _ = bracket.handle.start_game(StartBy::Tournament).await;
                    }
                }
                self.tournament.status = TournamentStatus::Running;
                let _ = reply.send(Ok(()));
            }
            Command::BracketEnded { bracket_index } => {
                if let Some(bracket) = self.brackets.get_mut(bracket_index as usize) {
                    bracket.ended = true;
                }
                let all_ended = self
                    .brackets
                    .iter()
                    .all(|b| b.ended || b.participant_count == 0);
                if all_ended {
                    self.tournament.status = TournamentStatus::Ended;
                }
            }
            Command::Brackets { reply } => {
                let views = self
                    .brackets
                    .iter()
                    .enumerate()
                    .map(|(i, b)| BracketView {
                        bracket_index: i as u32,
                        status: b.handle.snapshot().status,
                        participant_count: b.participant_count,
                    })
                    .collect();
                let _ = reply.send(views);
            }
        }
    }
}

pub fn new_tournament_id() -> TournamentId {
    Uuid::new_v4()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Conversion, GoalType, GoalValue, Mode, Visibility};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_config() -> TournamentConfig {
        TournamentConfig {
            mode: Mode::Classic,
            conv: Conversion::BinaryStandalone,
            goal_type: GoalType::FirstTo,
            goal_value: GoalValue { first_to: Some(5), seconds: None, lives: None },
            visibility: Visibility::Public,
            max_players: 9,
            show_leaderboard: true,
            show_power_table: true,
        }
    }

    /// One fresh Room per bracket, `bracket_size` players each, no tournament callback wired —
    /// bracket allocation is exercised independently of Room Core's own lifecycle here.
    fn spawn_counting_bracket(counter: std::sync::Arc<AtomicU32>) -> impl Fn(u32) -> (RoomId, RoomHandle) {
        move |_bracket_index: u32| {
            counter.fetch_add(1, Ordering::SeqCst);
            let room_id = Uuid::new_v4();
            let host_id = Uuid::new_v4();
            let host = crate::models::Participant {
                participant_id: host_id,
                display_name: "Tournament Host".into(),
                role: crate::models::ParticipantRole::Spectator,
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
            let room_config = crate::models::RoomConfig {
                mode: Mode::Classic,
                conv: Conversion::BinaryStandalone,
                goal_type: GoalType::FirstTo,
                goal_value: GoalValue { first_to: Some(5), seconds: None, lives: None },
                visibility: Visibility::Public,
                password_hash: None,
                max_players: 4,
                show_leaderboard: true,
                show_power_table: true,
            };
            let room = crate::room::state::new_room(room_id, format!("T-{room_id}"), room_config, host_id, host);
            let handle = crate::room::spawn(room, 1, None);
            (room_id, handle)
        }
    }

    /// 9 max players, bracket size 4 → ceil(9/4) = 3 brackets. First 4 joins fill bracket 0, next
    /// 4 fill bracket 1, the 9th lands alone in bracket 2 — `[4, 4, 1]`.
    #[tokio::test]
    async fn bracket_allocation_fills_in_index_order_then_spills_into_a_new_bracket() {
        let counter = std::sync::Arc::new(AtomicU32::new(0));
        let handle = spawn(
            new_tournament_id(),
            "ABCDEF".into(),
            "Test Cup".into(),
            test_config(),
            4,
            9,
            Uuid::new_v4(),
            spawn_counting_bracket(counter.clone()),
        );
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        for i in 0..9 {
            let out = handle.join(format!("player-{i}")).await.unwrap();
            let expected_bracket = i / 4;
            assert_eq!(out.bracket_index, expected_bracket as u32);
        }

        let brackets = handle.brackets().await;
        assert_eq!(brackets.len(), 3);
        assert_eq!(brackets[0].participant_count, 4);
        assert_eq!(brackets[1].participant_count, 4);
        assert_eq!(brackets[2].participant_count, 1);
    }

    /// `bracketSize=4, maxPlayers=10`: nine joins give `[4,4,1]`, the tenth fills bracket 2 to
    /// `[4,4,2]`, and the eleventh is rejected `FULL` even though every bracket still has
    /// per-bracket headroom up to `bracketSize` — `maxPlayers` is the binding cap.
    #[tokio::test]
    async fn eleventh_join_is_rejected_once_max_players_is_reached() {
        let counter = std::sync::Arc::new(AtomicU32::new(0));
        let handle = spawn(
            new_tournament_id(),
            "FULL01".into(),
            "Small Cup".into(),
            test_config(),
            4,
            10,
            Uuid::new_v4(),
            spawn_counting_bracket(counter),
        );
        for i in 0..9 {
            handle.join(format!("player-{i}")).await.unwrap();
        }
        let brackets = handle.brackets().await;
        assert_eq!(
            brackets.iter().map(|b| b.participant_count).collect::<Vec<_>>(),
            vec![4, 4, 1]
        );

        let tenth = handle.join("player-9".into()).await.unwrap();
        assert_eq!(tenth.bracket_index, 2);
        let brackets = handle.brackets().await;
        assert_eq!(
            brackets.iter().map(|b| b.participant_count).collect::<Vec<_>>(),
            vec![4, 4, 2]
        );

        let result = handle.join("one-too-many".into()).await;
        assert!(matches!(result, Err(crate::error::AppError::RoomFull)));
    }
}
