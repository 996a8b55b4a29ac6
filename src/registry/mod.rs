//! Process-wide Registry. Holds every live `RoomHandle` and
//! `TournamentHandle` plus the secondary code→id maps used for lobby joins. Registration and
//! deregistration are serialized behind a single `RwLock`; reads (lookups) never block each
//! other.

pub mod reaper;

use crate::models::{RoomId, TournamentId};
use crate::room::RoomHandle;
use crate::tournament::TournamentHandle;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct Inner {
    rooms: HashMap<RoomId, RoomHandle>,
    rooms_by_code: HashMap<String, RoomId>,
    tournaments: HashMap<TournamentId, TournamentHandle>,
    tournaments_by_code: HashMap<String, TournamentId>,
}

pub struct Registry {
    inner: RwLock<Inner>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn room_count(&self) -> usize {
        self.inner.read().unwrap().rooms.len()
    }

    pub fn register_room(&self, room_code: String, handle: RoomHandle) {
        let mut inner = self.inner.write().unwrap();
        inner.rooms_by_code.insert(room_code, handle.room_id());
        inner.rooms.insert(handle.room_id(), handle);
    }

    pub fn deregister_room(&self, room_id: RoomId, room_code: &str) {
        let mut inner = self.inner.write().unwrap();
        inner.rooms.remove(&room_id);
        inner.rooms_by_code.remove(room_code);
    }

    pub fn get_room(&self, room_id: RoomId) -> Option<RoomHandle> {
        self.inner.read().unwrap().rooms.get(&room_id).cloned()
    }

    pub fn get_room_by_code(&self, room_code: &str) -> Option<RoomHandle> {
        let inner = self.inner.read().unwrap();
        let room_id = inner.rooms_by_code.get(room_code)?;
        inner.rooms.get(room_id).cloned()
    }

    pub fn all_room_ids(&self) -> Vec<RoomId> {
        self.inner.read().unwrap().rooms.keys().copied().collect()
    }

    pub fn register_tournament(&self, tournament_code: String, handle: TournamentHandle) {
        let mut inner = self.inner.write().unwrap();
        inner
            .tournaments_by_code
            .insert(tournament_code, handle.tournament_id());
        inner.tournaments.insert(handle.tournament_id(), handle);
    }

    pub fn get_tournament(&self, tournament_id: TournamentId) -> Option<TournamentHandle> {
        self.inner
            .read()
            .unwrap()
            .tournaments
            .get(&tournament_id)
            .cloned()
    }

    pub fn get_tournament_by_code(&self, tournament_code: &str) -> Option<TournamentHandle> {
        let inner = self.inner.read().unwrap();
        let tournament_id = inner.tournaments_by_code.get(tournament_code)?;
        inner.tournaments.get(tournament_id).cloned()
    }
}
