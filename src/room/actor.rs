//! The single-writer Room task. `RoomActor` owns the `Room` value exclusively; every
//! other component only ever talks to it through a `RoomHandle`'s bounded command queue. This is
//! the same "one owned resource behind a cloneable handle" shape used elsewhere in this crate
//! for a background client, generalized here from a stateless query service into a stateful
//! actor with its own timers.

use super::commands::{self, JoinInput, JoinOutput};
use super::events::RoomEvent;
use crate::error::AppError;
use crate::models::{ParticipantId, Room};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Duration, Instant};

/// Outbound queue depth for the per-Room command channel (bounded, size 1024).
pub const COMMAND_QUEUE_DEPTH: usize = 1024;
/// Disconnect → roster-removal grace window.
const RECONNECT_GRACE: Duration = Duration::from_secs(30);
/// `all_left` grace window before a room with an emptied roster is actually ended.
const ALL_LEFT_GRACE: Duration = Duration::from_secs(30);
/// Per-round watchdog while `syncing`.
const SYNC_WATCHDOG: Duration = Duration::from_secs(5);
/// How long an `ended` room's actor stays alive answering snapshot reads after the game ends.
const RETENTION_WINDOW: Duration = Duration::from_secs(60);

pub enum StartBy {
    Host(ParticipantId),
    Tournament,
}

pub enum RoomCommand {
    Join {
        input: JoinInput,
        reply: oneshot::Sender<Result<JoinOutput, AppError>>,
    },
    StartGame {
        by: StartBy,
        reply: oneshot::Sender<Result<(), AppError>>,
    },
    Disconnect {
        participant_id: ParticipantId,
    },
    Reconnect {
        participant_id: ParticipantId,
        reply: oneshot::Sender<bool>,
    },
    Leave {
        participant_id: ParticipantId,
    },
    SyncAck {
        participant_id: ParticipantId,
        round: u8,
        reply: oneshot::Sender<Result<(), AppError>>,
    },
    SubmitAnswer {
        participant_id: ParticipantId,
        raw: String,
        reply: oneshot::Sender<Result<(), AppError>>,
    },
    Chat {
        participant_id: ParticipantId,
        message: String,
        reply: oneshot::Sender<Result<(), AppError>>,
    },
    HostEnd {
        participant_id: ParticipantId,
        reply: oneshot::Sender<Result<(), AppError>>,
    },
}

#[derive(Clone, Copy)]
enum TimerEvent {
    SyncWatchdog(u8),
    GameTimeout,
    DisconnectGrace(ParticipantId),
    AllLeftGrace,
    Retire,
}

#[derive(Clone)]
pub struct RoomHandle {
    room_id: crate::models::RoomId,
    tx: mpsc::Sender<RoomCommand>,
    events: broadcast::Sender<RoomEvent>,
    snapshot: watch::Receiver<Room>,
}

impl RoomHandle {
    pub fn room_id(&self) -> crate::models::RoomId {
        self.room_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> Room {
        self.snapshot.borrow().clone()
    }

    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, AppError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(build(tx))
            .await
            .map_err(|_| AppError::NotFound)?;
        rx.await.map_err(|_| AppError::Internal)
    }

    pub async fn join(&self, input: JoinInput) -> Result<JoinOutput, AppError> {
        self.call(|reply| RoomCommand::Join { input, reply }).await?
    }

    pub async fn start_game(&self, by: StartBy) -> Result<(), AppError> {
        self.call(|reply| RoomCommand::StartGame { by, reply }).await?
    }

    pub async fn sync_ack(&self, participant_id: ParticipantId, round: u8) -> Result<(), AppError> {
        self.call(|reply| RoomCommand::SyncAck {
            participant_id,
            round,
            reply,
        })
        .await?
    }

    pub async fn submit_answer(&self, participant_id: ParticipantId, raw: String) -> Result<(), AppError> {
        self.call(|reply| RoomCommand::SubmitAnswer {
            participant_id,
            raw,
            reply,
        })
        .await?
    }

    pub async fn chat(&self, participant_id: ParticipantId, message: String) -> Result<(), AppError> {
        self.call(|reply| RoomCommand::Chat {
            participant_id,
            message,
            reply,
        })
        .await?
    }

    pub async fn host_end(&self, participant_id: ParticipantId) -> Result<(), AppError> {
        self.call(|reply| RoomCommand::HostEnd {
            participant_id,
            reply,
        })
        .await?
    }

    pub async fn reconnect(&self, participant_id: ParticipantId) -> bool {
        self.call(|reply| RoomCommand::Reconnect {
            participant_id,
            reply,
        })
        .await
        .unwrap_or(false)
    }

    pub async fn disconnect(&self, participant_id: ParticipantId) {
        let _ = self.tx.send(RoomCommand::Disconnect { participant_id }).await;
    }

    pub async fn leave(&self, participant_id: ParticipantId) {
        let _ = self.tx.send(RoomCommand::Leave { participant_id }).await;
    }
}

struct RoomActor {
    room: Room,
    rng: StdRng,
    rx: mpsc::Receiver<RoomCommand>,
    events: broadcast::Sender<RoomEvent>,
    snapshot_tx: watch::Sender<Room>,
    timers: Vec<(Instant, TimerEvent)>,
    on_ended: Option<Box<dyn Fn() + Send + Sync>>,
    notified_ended: bool,
}

/// Spawns the actor task and returns the handle everything else uses. `seed` lets tests pin the
/// question sequence; production callers pass a value derived from `rand::random()`. `on_ended`
/// fires exactly once, the moment the room transitions into `ended` — the Tournament Orchestrator
/// uses it to learn a bracket has ended without Room Core depending on Tournament types.
pub fn spawn(room: Room, seed: u64, on_ended: Option<Box<dyn Fn() + Send + Sync>>) -> RoomHandle {
    let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    let (events, _) = broadcast::channel(256);
    let (snapshot_tx, snapshot_rx) = watch::channel(room.clone());
    let room_id = room.room_id;
    let handle = RoomHandle {
        room_id,
        tx,
        events: events.clone(),
        snapshot: snapshot_rx,
    };

    let mut actor = RoomActor {
        room,
        rng: StdRng::seed_from_u64(seed),
        rx,
        events,
        snapshot_tx,
        timers: Vec::new(),
        on_ended,
        notified_ended: false,
    };
    tokio::spawn(async move { actor.run().await });
    handle
}

impl RoomActor {
    async fn run(&mut self) {
        loop {
            let sleep_until_next = self.timers.iter().map(|(t, _)| *t).min();
            let next_timer = async {
                match sleep_until_next {
                    Some(deadline) => {
                        tokio::time::sleep_until(deadline).await;
                    }
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                cmd = self.rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle(cmd),
                        None => break,
                    }
                }
                _ = next_timer => {
                    self.fire_due_timers();
                }
            }
            self.publish_snapshot();
            if self.room.status == crate::models::RoomStatus::Ended {
                if !self.notified_ended {
                    self.notified_ended = true;
                    if let Some(cb) = &self.on_ended {
                        cb();
                    }
                }
                if !self.timers.iter().any(|(_, e)| matches!(e, TimerEvent::Retire)) {
                    self.schedule(RETENTION_WINDOW, TimerEvent::Retire);
                }
            }
        }
    }

    fn schedule(&mut self, delay: Duration, event: TimerEvent) {
        self.timers.push((Instant::now() + delay, event));
    }

    fn fire_due_timers(&mut self) {
        let now = Instant::now();
        let due: Vec<TimerEvent> = {
            let mut due = Vec::new();
            self.timers.retain(|(deadline, event)| {
                if *deadline <= now {
                    due.push(*event);
                    false
                } else {
                    true
                }
            });
            due
        };
        for event in due {
            self.handle_timer(event);
        }
    }

    fn handle_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::SyncWatchdog(round) => {
                if self.room.status == crate::models::RoomStatus::Syncing {
                    let events = commands::force_round_complete(&mut self.room, round, &mut self.rng);
                    self.publish_all(events);
                    if self.room.status == crate::models::RoomStatus::Syncing {
                        self.schedule(SYNC_WATCHDOG, TimerEvent::SyncWatchdog(round + 1));
                    } else if self.room.status == crate::models::RoomStatus::Playing {
                        self.arm_game_timer();
                    }
                }
            }
            TimerEvent::GameTimeout => {
                let events = commands::time_up(&mut self.room);
                self.publish_all(events);
            }
            TimerEvent::DisconnectGrace(participant_id) => {
                let still_disconnected = self
                    .room
                    .participants
                    .get(&participant_id)
                    .map(|p| !p.connected)
                    .unwrap_or(false);
                if still_disconnected {
                    let events = commands::leave(&mut self.room, participant_id);
                    self.publish_all(events);
                }
            }
            TimerEvent::AllLeftGrace => {
                if super::scoring::roster_empty(&self.room)
                    && self.room.status != crate::models::RoomStatus::Ended
                {
                    super::state::enter_ended(&mut self.room, crate::models::EndReason::AllLeft);
                    self.publish(RoomEvent::Broadcast(super::events::ServerEvent::GameEnded {
                        leaderboard: super::events::build_final_leaderboard(&self.room),
                        reason: crate::models::EndReason::AllLeft,
                    }));
                }
            }
            TimerEvent::Retire => {
                self.rx.close();
            }
        }
    }

    fn arm_game_timer(&mut self) {
        if let Some(d) = self.room.config.mode.fixed_timer() {
            self.schedule(d, TimerEvent::GameTimeout);
        } else if let Some(seconds) = self.room.config.goal_value.seconds {
            if matches!(
                self.room.config.goal_type,
                crate::models::GoalType::MostInTime | crate::models::GoalType::Timed
            ) {
                self.schedule(Duration::from_secs(seconds as u64), TimerEvent::GameTimeout);
            }
        }
    }

    fn publish(&self, event: RoomEvent) {
        let _ = self.events.send(event);
    }

    fn publish_all(&self, events: Vec<RoomEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    fn publish_snapshot(&self) {
        let _ = self.snapshot_tx.send(self.room.clone());
    }

    fn handle(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join { input, reply } => {
                let result = commands::join(&mut self.room, input);
                if let Ok(ok) = &result {
                    self.publish_all(ok.events.clone());
                }
                let _ = reply.send(result);
            }
            RoomCommand::Disconnect { participant_id } => {
                commands::mark_disconnected(&mut self.room, participant_id);
                self.schedule(RECONNECT_GRACE, TimerEvent::DisconnectGrace(participant_id));
                if super::scoring::roster_empty(&self.room) {
                    self.schedule(ALL_LEFT_GRACE, TimerEvent::AllLeftGrace);
                }
            }
            RoomCommand::Reconnect {
                participant_id,
                reply,
            } => {
                let ok = commands::mark_reconnected(&mut self.room, participant_id);
                let _ = reply.send(ok);
            }
            RoomCommand::Leave { participant_id } => {
                let events = commands::leave(&mut self.room, participant_id);
                self.publish_all(events);
            }
            RoomCommand::StartGame { by, reply } => {
                let result = match by {
                    StartBy::Host(participant_id) => {
                        commands::start_game(&mut self.room, participant_id)
                    }
                    StartBy::Tournament => commands::start_game_forced(&mut self.room),
                };
                match result {
                    Ok(events) => {
                        self.publish_all(events);
                        self.schedule(SYNC_WATCHDOG, TimerEvent::SyncWatchdog(1));
                        let _ = reply.send(Ok(()));
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }
            RoomCommand::SyncAck {
                participant_id,
                round,
                reply,
            } => {
                let result = commands::sync_ack(&mut self.room, participant_id, round, &mut self.rng);
                match result {
                    Ok(events) => {
                        self.publish_all(events);
                        if self.room.status == crate::models::RoomStatus::Playing {
                            self.arm_game_timer();
                        }
                        let _ = reply.send(Ok(()));
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }
            RoomCommand::SubmitAnswer {
                participant_id,
                raw,
                reply,
            } => {
                let result = commands::submit_answer(&mut self.room, participant_id, &raw, &mut self.rng);
                match result {
                    Ok(events) => {
                        self.publish_all(events);
                        let _ = reply.send(Ok(()));
                    }
                    Err(e) => {
                        let e2 = e.clone();
                        self.publish(RoomEvent::Private(
                            participant_id,
                            super::events::ServerEvent::ProtocolError { code: e.code().to_string() },
                        ));
                        let _ = reply.send(Err(e2));
                    }
                }
            }
            RoomCommand::Chat {
                participant_id,
                message,
                reply,
            } => {
                let result = commands::chat(&mut self.room, participant_id, &message);
                match result {
                    Ok(event) => {
                        self.publish(event);
                        let _ = reply.send(Ok(()));
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }
            RoomCommand::HostEnd {
                participant_id,
                reply,
            } => {
                let result = commands::host_end(&mut self.room, participant_id);
                match result {
                    Ok(events) => {
                        self.publish_all(events);
                        let _ = reply.send(Ok(()));
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }
        }
    }
}
