//! WS Hub — connection lifecycle, framing, and the per-connection outbound
//! backpressure policy. One `RoomConnection` task per upgraded socket; it owns its own reader
//! loop, its own bounded outbound queue, and its own heartbeat timer. The Room Core actor
//! (`room::actor`) is never touched directly except through `RoomHandle`.

use super::messages::{from_room_event, room_state_message, ClientMessage, ServerMessage};
use crate::models::{ParticipantId, RoomId};
use crate::room::RoomHandle;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::time::{interval, Duration, Instant};

/// Outbound queue depth.
const OUTBOUND_QUEUE_DEPTH: usize = 128;
/// Heartbeat window: a missing client ping/message within this long triggers a server ping.
const HEARTBEAT_WINDOW: Duration = Duration::from_secs(30);

fn is_droppable(msg: &ServerMessage) -> bool {
    matches!(msg, ServerMessage::Leaderboard(_) | ServerMessage::ChatMessage { .. })
}

struct OutboundQueue {
    items: Mutex<VecDeque<ServerMessage>>,
    notify: Notify,
    backpressured: AtomicBool,
    timed_out: AtomicBool,
}

impl OutboundQueue {
    fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(OUTBOUND_QUEUE_DEPTH)),
            notify: Notify::new(),
            backpressured: AtomicBool::new(false),
            timed_out: AtomicBool::new(false),
        }
    }

    /// Closes the connection with `TIMEOUT` rather than `BACKPRESSURE`, reusing the same
    /// pop-returns-None signal the writer task already watches for.
    fn mark_timed_out(&self) {
        self.timed_out.store(true, Ordering::Relaxed);
        self.backpressured.store(true, Ordering::Relaxed);
        self.notify.notify_one();
    }

    /// Drop-oldest-droppable-first eviction. Sets the backpressure flag, rather
    /// than queuing, when the queue is full of critical messages and none can be evicted.
    async fn push(&self, msg: ServerMessage) {
        let mut items = self.items.lock().await;
        if items.len() >= OUTBOUND_QUEUE_DEPTH {
            match items.iter().position(is_droppable) {
                Some(i) => {
                    items.remove(i);
                }
                None => {
                    self.backpressured.store(true, Ordering::Relaxed);
                    self.notify.notify_one();
                    return;
                }
            }
        }
        items.push_back(msg);
        drop(items);
        self.notify.notify_one();
    }

    fn is_backpressured(&self) -> bool {
        self.backpressured.load(Ordering::Relaxed)
    }

    async fn pop(&self) -> Option<ServerMessage> {
        loop {
            {
                let mut items = self.items.lock().await;
                if let Some(msg) = items.pop_front() {
                    return Some(msg);
                }
            }
            if self.is_backpressured() {
                return None;
            }
            self.notify.notified().await;
        }
    }
}

/// Tracks which connection currently "owns" a `(room, participant)` pair, so a second concurrent
/// claim can close the first with `REPLACED`.
#[derive(Default)]
pub struct ConnectionClaims {
    holders: Mutex<HashMap<(RoomId, ParticipantId), mpsc::Sender<()>>>,
}

impl ConnectionClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers this connection as the current holder, kicking out whatever connection held the
    /// slot before (if any).
    async fn claim(&self, room_id: RoomId, participant_id: ParticipantId) -> mpsc::Receiver<()> {
        let (tx, rx) = mpsc::channel(1);
        let mut holders = self.holders.lock().await;
        if let Some(prev) = holders.insert((room_id, participant_id), tx) {
            let _ = prev.send(()).await;
        }
        rx
    }

    async fn release(&self, room_id: RoomId, participant_id: ParticipantId) {
        self.holders.lock().await.remove(&(room_id, participant_id));
    }
}

/// Drives one upgraded Room-channel socket end to end. Returns once the connection is closed for
/// any reason (client close, replacement, timeout, backpressure).
pub async fn run_room_connection(
    socket: WebSocket,
    handle: RoomHandle,
    participant_id: ParticipantId,
    claims: Arc<ConnectionClaims>,
) {
    let room_id = handle.room_id();
    let mut kicked = claims.claim(room_id, participant_id).await;
    handle.reconnect(participant_id).await;

    let (mut ws_tx, mut ws_rx) = socket.split();
    let outbound = Arc::new(OutboundQueue::new());

    {
        let snapshot = handle.snapshot();
        outbound.push(room_state_message(&snapshot)).await;
    }

    let mut room_events = handle.subscribe();
    let relay_outbound = outbound.clone();
    let relay_participant = participant_id;
    let relay_task = tokio::spawn(async move {
        loop {
            match room_events.recv().await {
                Ok(crate::room::RoomEvent::Broadcast(event)) => {
                    if matches!(event, crate::room::ServerEvent::RoomState(_)) {
                        // Carries no roster, so the relay re-derives it from the live handle
                        // instead of the stale partial snapshot attached to the event.
                        continue;
                    }
                    relay_outbound.push(from_room_event(&event)).await;
                }
                Ok(crate::room::RoomEvent::Private(pid, event)) if pid == relay_participant => {
                    relay_outbound.push(from_room_event(&event)).await;
                }
                Ok(crate::room::RoomEvent::Private(_, _)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Re-broadcast full room_state on every roster change (join/leave), since `RoomEvent`'s
    // embedded snapshot is deliberately thin — see `events::RoomStateSnapshot`.
    let mut room_events_for_state = handle.subscribe();
    let state_outbound = outbound.clone();
    let state_handle = handle.clone();
    let state_task = tokio::spawn(async move {
        loop {
            match room_events_for_state.recv().await {
                Ok(crate::room::RoomEvent::Broadcast(crate::room::ServerEvent::RoomState(_))) => {
                    let snapshot = state_handle.snapshot();
                    state_outbound.push(room_state_message(&snapshot)).await;
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let writer_outbound = outbound.clone();
    let writer_task = tokio::spawn(async move {
        loop {
            let Some(msg) = writer_outbound.pop().await else {
                let reason = if writer_outbound.timed_out.load(Ordering::Relaxed) {
                    "TIMEOUT"
                } else {
                    "BACKPRESSURE"
                };
                let _ = ws_tx
                    .send(Message::Close(Some(axum::extract::ws::CloseFrame {
                        code: 1008,
                        reason: reason.into(),
                    })))
                    .await;
                break;
            };
            let Ok(text) = serde_json::to_string(&msg) else {
                continue;
            };
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut last_seen = Instant::now();
    let mut missed_pings: u8 = 0;
    let mut heartbeat = interval(HEARTBEAT_WINDOW);
    heartbeat.tick().await;

    let mut protocol_errors: Vec<Instant> = Vec::new();

    loop {
        if outbound.is_backpressured() {
            break;
        }
        tokio::select! {
            _ = kicked.recv() => {
                outbound.push(ServerMessage::ProtocolError { code: "REPLACED".into() }).await;
                break;
            }
            _ = heartbeat.tick() => {
                if last_seen.elapsed() >= HEARTBEAT_WINDOW {
                    missed_pings += 1;
                    if missed_pings >= 2 {
                        outbound.mark_timed_out();
                        break;
                    }
                } else {
                    missed_pings = 0;
                }
            }
            frame = ws_rx.next() => {
                let Some(frame) = frame else { break };
                let Ok(frame) = frame else { break };
                last_seen = Instant::now();
                match frame {
                    Message::Text(text) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                handle_client_message(&handle, participant_id, client_msg, &outbound).await;
                            }
                            Err(_) => {
                                record_protocol_error(&mut protocol_errors);
                                outbound
                                    .push(ServerMessage::ProtocolError { code: "PROTOCOL_ERROR".into() })
                                    .await;
                                if protocol_errors.len() > 5 {
                                    break;
                                }
                            }
                        }
                    }
                    Message::Ping(_) | Message::Pong(_) => {}
                    Message::Close(_) => break,
                    Message::Binary(_) => {
                        record_protocol_error(&mut protocol_errors);
                        if protocol_errors.len() > 5 {
                            break;
                        }
                    }
                }
            }
        }
    }

    relay_task.abort();
    state_task.abort();
    writer_task.abort();
    claims.release(room_id, participant_id).await;
    handle.disconnect(participant_id).await;
}

/// Drops protocol-error timestamps older than 30 s before counting ("Failure
/// semantics": kill the connection only once a peer exceeds 5 errors within that window).
fn record_protocol_error(errors: &mut Vec<Instant>) {
    let now = Instant::now();
    errors.retain(|t| now.duration_since(*t) < Duration::from_secs(30));
    errors.push(now);
}

async fn handle_client_message(
    handle: &RoomHandle,
    participant_id: ParticipantId,
    msg: ClientMessage,
    outbound: &OutboundQueue,
) {
    match msg {
        ClientMessage::SyncAck { round } => {
            let _ = handle.sync_ack(participant_id, round).await;
        }
        ClientMessage::AnswerSubmit { answer } => {
            if let Err(e) = handle.submit_answer(participant_id, answer).await {
                outbound
                    .push(ServerMessage::ProtocolError { code: e.code().to_string() })
                    .await;
            }
        }
        ClientMessage::Chat { message } => {
            if let Err(e) = handle.chat(participant_id, message).await {
                outbound
                    .push(ServerMessage::ProtocolError { code: e.code().to_string() })
                    .await;
            }
        }
        ClientMessage::EndGameRequest => {
            if let Err(e) = handle.host_end(participant_id).await {
                outbound
                    .push(ServerMessage::ProtocolError { code: e.code().to_string() })
                    .await;
            }
        }
        ClientMessage::Ping => {
            outbound.push(ServerMessage::Pong).await;
        }
        ClientMessage::Unknown => {
            outbound
                .push(ServerMessage::ProtocolError { code: "PROTOCOL_ERROR".into() })
                .await;
        }
    }
}
