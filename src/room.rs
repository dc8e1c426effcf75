//! Room definition and dispatch task
//!
//! A room is a named broadcast group. Chat lines and announcements are
//! queued on the room mailbox and fanned out by a dedicated dispatch task
//! to whoever is a member when the line is drained.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::AppError;
use crate::message::{format_announcement, Reply};
use crate::types::{RoomName, SessionId};

/// Room lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    /// Accepting members and broadcasts
    Alive,
    /// Last member left; waiting for the registry to remove it
    Draining,
    /// Removed from the registry, mailbox closed
    Destroyed,
}

/// A room's view of one member session
///
/// Holds a weak handle to the session's outbound mailbox so the room
/// never keeps a closed session's mailbox alive.
#[derive(Debug, Clone)]
pub struct Member {
    /// Display name
    pub name: String,
    outbound: mpsc::WeakSender<Reply>,
}

impl Member {
    /// Create a member handle from a session's outbound mailbox
    pub fn new(name: impl Into<String>, outbound: &mpsc::Sender<Reply>) -> Self {
        Self {
            name: name.into(),
            outbound: outbound.downgrade(),
        }
    }
}

/// Result of removing a member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// The session was not a member
    NotMember,
    /// Others remain in the room
    Remaining,
    /// That was the last member; the room is now Draining
    Vacated,
}

/// Summary row for room listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    /// Room name
    pub name: RoomName,
    /// Members at the time the row was read
    pub member_count: usize,
}

#[derive(Debug)]
struct RoomInner {
    members: HashMap<SessionId, Member>,
    state: RoomState,
    mailbox: Option<mpsc::UnboundedSender<String>>,
}

/// Named broadcast group
///
/// All membership changes go through the inner lock. The lock is never held
/// across an await point.
#[derive(Debug)]
pub struct Room {
    name: RoomName,
    inner: Mutex<RoomInner>,
}

impl Room {
    /// Open a room with its founding member and start its dispatch task
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(name: RoomName, founder: SessionId, member: Member) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        // Nothing is listening yet, so this cannot fail
        let _ = tx.send(format_announcement(&format!("{} has joined!", member.name)));
        let mut members = HashMap::new();
        members.insert(founder, member);

        let room = Arc::new(Self {
            name,
            inner: Mutex::new(RoomInner {
                members,
                state: RoomState::Alive,
                mailbox: Some(tx),
            }),
        });

        info!("Room {} opened", room.name);
        tokio::spawn(dispatch(Arc::clone(&room), rx));
        room
    }

    /// Room name
    pub fn name(&self) -> &RoomName {
        &self.name
    }

    /// Current lifecycle state
    pub fn state(&self) -> RoomState {
        self.inner.lock().state
    }

    /// Number of members right now
    pub fn member_count(&self) -> usize {
        self.inner.lock().members.len()
    }

    /// Check if a session is a member
    pub fn contains(&self, id: SessionId) -> bool {
        self.inner.lock().members.contains_key(&id)
    }

    /// Listing row, or None once the room is destroyed or vacated
    pub fn summary(&self) -> Option<RoomSummary> {
        let inner = self.inner.lock();
        if inner.state != RoomState::Alive || inner.members.is_empty() {
            return None;
        }
        Some(RoomSummary {
            name: self.name.clone(),
            member_count: inner.members.len(),
        })
    }

    /// Queue a line for every member
    pub fn broadcast(&self, line: String) -> Result<(), AppError> {
        let inner = self.inner.lock();
        Self::enqueue(&self.name, &inner, line)
    }

    /// Add a member
    ///
    /// Revives a Draining room; fails on a destroyed one. A join
    /// announcement is queued under the same lock.
    pub(crate) fn add_member(&self, id: SessionId, member: Member) -> Result<(), AppError> {
        let mut inner = self.inner.lock();
        if inner.state == RoomState::Destroyed {
            return Err(AppError::RoomDestroyed(self.name.to_string()));
        }
        inner.state = RoomState::Alive;
        let announcement = format_announcement(&format!("{} has joined!", member.name));
        inner.members.insert(id, member);
        Self::enqueue(&self.name, &inner, announcement)
    }

    /// Remove a member
    ///
    /// Announces the departure to the remaining members, or moves the room
    /// to Draining if nobody is left.
    pub(crate) fn remove_member(&self, id: SessionId) -> Departure {
        let mut inner = self.inner.lock();
        let Some(member) = inner.members.remove(&id) else {
            return Departure::NotMember;
        };

        if inner.members.is_empty() {
            inner.state = RoomState::Draining;
            debug!("Room {} drained by {}", self.name, member.name);
            return Departure::Vacated;
        }

        let announcement = format_announcement(&format!("{} has left..", member.name));
        // Alive with members, so the mailbox is open
        let _ = Self::enqueue(&self.name, &inner, announcement);
        Departure::Remaining
    }

    /// Destroy the room if it is still empty
    ///
    /// Closing the mailbox lets the dispatch task finish. Returns false if a
    /// join got in first.
    pub(crate) fn destroy_if_empty(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            RoomState::Destroyed => true,
            RoomState::Draining if inner.members.is_empty() => {
                inner.state = RoomState::Destroyed;
                inner.mailbox = None;
                inner.members.clear();
                true
            }
            _ => false,
        }
    }

    /// Members to deliver the next line to
    fn recipients(&self) -> Vec<(SessionId, Member)> {
        self.inner
            .lock()
            .members
            .iter()
            .map(|(id, member)| (*id, member.clone()))
            .collect()
    }

    fn enqueue(name: &RoomName, inner: &RoomInner, line: String) -> Result<(), AppError> {
        let Some(mailbox) = inner.mailbox.as_ref() else {
            return Err(AppError::RoomDestroyed(name.to_string()));
        };
        mailbox
            .send(line)
            .map_err(|_| AppError::RoomDestroyed(name.to_string()))
    }
}

/// Room dispatch loop
///
/// Drains the mailbox in order. Delivery never waits on a member: a full or
/// closed outbound mailbox drops the line for that member only.
async fn dispatch(room: Arc<Room>, mut mailbox: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = mailbox.recv().await {
        let recipients = room.recipients();
        debug!("Room {} dispatching to {} members", room.name, recipients.len());

        for (id, member) in recipients {
            let Some(outbound) = member.outbound.upgrade() else {
                debug!("Member {} of room {} already closed", id, room.name);
                continue;
            };
            if let Err(e) = outbound.try_send(Reply::Broadcast(line.clone())) {
                debug!(
                    "Skipping broadcast to slow member {} in room {}: {}",
                    member.name, room.name, e
                );
            }
        }
    }

    info!("Room {} dispatch stopped", room.name);
}
