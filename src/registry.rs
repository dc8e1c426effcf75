//! Room registry
//!
//! The process-wide directory of live rooms. Every create, join, and leave
//! runs under the registry lock, and touches at most two rooms (the one being
//! left and the one being entered) through their own locks. Lock order is
//! always registry first, then room.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::room::{Departure, Member, Room, RoomState, RoomSummary};
use crate::types::{RoomName, SessionId};

/// Directory of live rooms: RoomName -> Room
///
/// Shared between sessions as `Arc<Registry>`.
#[derive(Debug, Default)]
pub struct Registry {
    rooms: Mutex<HashMap<RoomName, Arc<Room>>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room with the caller as founding member
    ///
    /// The caller leaves `prior` only if creation succeeds.
    pub fn create_room(
        &self,
        name: &RoomName,
        id: SessionId,
        member: Member,
        prior: Option<&Arc<Room>>,
    ) -> Result<Arc<Room>, AppError> {
        let mut rooms = self.rooms.lock();
        if rooms.contains_key(name) {
            return Err(AppError::RoomAlreadyExists(name.to_string()));
        }

        if let Some(prior) = prior {
            Self::depart(&mut rooms, prior, id);
        }

        let room = Room::open(name.clone(), id, member);
        rooms.insert(name.clone(), Arc::clone(&room));
        info!("Room {} created by {} (total rooms: {})", name, id, rooms.len());
        Ok(room)
    }

    /// Move a session into an existing room
    ///
    /// Leaving `prior` and entering the target happen under one registry
    /// lock, so the session is never seen in two rooms.
    pub fn join_room(
        &self,
        name: &str,
        id: SessionId,
        member: Member,
        prior: Option<&Arc<Room>>,
    ) -> Result<Arc<Room>, AppError> {
        let mut rooms = self.rooms.lock();
        let Some(room) = rooms.get(name).cloned() else {
            return Err(AppError::RoomNotFound(name.to_string()));
        };

        if prior.is_some_and(|prior| Arc::ptr_eq(prior, &room)) {
            return Err(AppError::AlreadyInRoom(name.to_string()));
        }

        // Rooms are only destroyed under the registry lock, so a live target
        // stays live until the add below
        if room.state() == RoomState::Destroyed {
            error!("Registered room {} is already destroyed", name);
            return Err(AppError::RoomDestroyed(name.to_string()));
        }

        if let Some(prior) = prior {
            Self::depart(&mut rooms, prior, id);
        }

        if let Err(e) = room.add_member(id, member) {
            error!("Join of registered room {} failed: {}", name, e);
            return Err(e);
        }

        info!("Session {} joined room {}", id, name);
        Ok(room)
    }

    /// Remove a session from its room
    pub fn leave_room(&self, room: &Arc<Room>, id: SessionId) {
        let mut rooms = self.rooms.lock();
        Self::depart(&mut rooms, room, id);
        info!("Session {} left room {}", id, room.name());
    }

    /// Snapshot the live rooms for listing
    pub fn list_rooms(&self) -> RoomListing {
        let mut rooms: Vec<Arc<Room>> = self.rooms.lock().values().cloned().collect();
        rooms.sort_by(|a, b| a.name().cmp(b.name()));
        RoomListing { rooms }
    }

    /// Look up a live room by name
    pub fn room(&self, name: &str) -> Option<Arc<Room>> {
        self.rooms.lock().get(name).cloned()
    }

    /// Number of registered rooms
    pub fn len(&self) -> usize {
        self.rooms.lock().len()
    }

    /// Check if no rooms are registered
    pub fn is_empty(&self) -> bool {
        self.rooms.lock().is_empty()
    }

    /// Helper: remove a member and run the empty-check
    fn depart(rooms: &mut HashMap<RoomName, Arc<Room>>, room: &Arc<Room>, id: SessionId) {
        match room.remove_member(id) {
            Departure::NotMember => {
                warn!("Session {} was not a member of room {}", id, room.name());
            }
            Departure::Remaining => {}
            Departure::Vacated => Self::remove_room(rooms, room),
        }
    }

    /// Helper: drop a vacated room from the directory
    ///
    /// The room destroys itself only if its member count is still zero.
    fn remove_room(rooms: &mut HashMap<RoomName, Arc<Room>>, room: &Arc<Room>) {
        if !room.destroy_if_empty() {
            debug!("Room {} repopulated before removal", room.name());
            return;
        }

        let registered = rooms
            .get(room.name())
            .is_some_and(|current| Arc::ptr_eq(current, room));
        if registered {
            rooms.remove(room.name());
            info!("Room {} destroyed (empty, total rooms: {})", room.name(), rooms.len());
        }
    }
}

/// Restartable snapshot of the registry for `\listrooms`
///
/// Member counts are read lazily, each under its room's lock, when the
/// iterator reaches that room. Rooms destroyed after the snapshot was taken
/// are skipped.
#[derive(Debug, Clone)]
pub struct RoomListing {
    rooms: Vec<Arc<Room>>,
}

impl RoomListing {
    /// Iterate the rooms, sorted by name
    pub fn iter(&self) -> impl Iterator<Item = RoomSummary> + '_ {
        self.rooms.iter().filter_map(|room| room.summary())
    }
}
