//! Session state machine
//!
//! Server-side state for one connected client: identity, current room,
//! and the outbound mailbox drained by the connection's send task.

use std::sync::Arc;

use chrono::Local;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{AppError, SendError};
use crate::message::{format_chat, Reply};
use crate::registry::Registry;
use crate::room::{Member, Room};
use crate::types::{RoomName, SessionId};

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, waiting for a display name
    Naming,
    /// Accepting directives and chat
    Active,
    /// Closed; terminal
    Closing,
}

/// One connected client
///
/// Owned by its connection handler. Other sessions reach it only through
/// its outbound mailbox.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    name: Option<String>,
    state: SessionState,
    room: Option<Arc<Room>>,
    outbound: Option<mpsc::Sender<Reply>>,
    registry: Arc<Registry>,
}

impl Session {
    /// Create a session in the Naming state
    pub fn new(registry: Arc<Registry>, outbound: mpsc::Sender<Reply>) -> Self {
        Self {
            id: SessionId::new(),
            name: None,
            state: SessionState::Naming,
            room: None,
            outbound: Some(outbound),
            registry,
        }
    }

    /// Session identifier
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Get the display name for this session
    ///
    /// Returns the name if set, otherwise "Unknown".
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }

    /// Name of the room this session is in
    pub fn current_room(&self) -> Option<&RoomName> {
        self.room.as_ref().map(|room| room.name())
    }

    /// Finish the handshake: set the display name and become Active
    pub fn register_name(&mut self, name: String) -> Result<(), AppError> {
        if self.state != SessionState::Naming {
            return Err(AppError::NameAlreadySet);
        }
        info!("Session {} registered as '{}'", self.id, name);
        self.name = Some(name);
        self.state = SessionState::Active;
        Ok(())
    }

    /// Send a reply to this session's own client
    ///
    /// Waits for mailbox space; only this session's read path is held up.
    pub async fn reply(&self, reply: Reply) -> Result<(), AppError> {
        let Some(outbound) = self.outbound.as_ref() else {
            return Err(AppError::ChannelSend);
        };
        outbound
            .send(reply)
            .await
            .map_err(|_| SendError::ChannelClosed)?;
        Ok(())
    }

    /// `\help`
    pub async fn help(&self) -> Result<(), AppError> {
        self.reply(Reply::help()).await
    }

    /// `\listrooms`
    pub async fn list_rooms(&self) -> Result<(), AppError> {
        self.ensure_active()?;
        let rows: Vec<(String, String)> = self
            .registry
            .list_rooms()
            .iter()
            .map(|summary| {
                (
                    summary.name.to_string(),
                    format!("online members({})", summary.member_count),
                )
            })
            .collect();
        self.reply(Reply::Listing(rows)).await
    }

    /// `\create`: create a room and move into it
    ///
    /// The current room is left only if creation succeeds.
    pub async fn create_room(&mut self, raw_name: &str) -> Result<(), AppError> {
        self.ensure_active()?;
        let name = RoomName::parse(raw_name)?;
        let member = self.member()?;

        let room = self
            .registry
            .create_room(&name, self.id, member, self.room.as_ref())?;
        self.switch_to(room).await?;
        self.reply(Reply::notice(format!("* room {name} has been created *")))
            .await
    }

    /// `\join`: move into an existing room
    ///
    /// The current room is left only if the join succeeds.
    pub async fn join_room(&mut self, raw_name: &str) -> Result<(), AppError> {
        self.ensure_active()?;
        let name = RoomName::parse(raw_name)?;
        let member = self.member()?;

        let room = self
            .registry
            .join_room(name.as_str(), self.id, member, self.room.as_ref())?;
        self.switch_to(room).await?;
        self.reply(Reply::notice(format!(
            "{} has joined {}",
            self.display_name(),
            name
        )))
        .await
    }

    /// Chat line: timestamp it and queue it on the current room
    pub fn chat(&self, text: &str) -> Result<(), AppError> {
        self.ensure_active()?;
        let Some(room) = self.room.as_ref() else {
            return Err(AppError::NotInRoom);
        };
        debug!("Session {} chat in room {}", self.id, room.name());
        room.broadcast(format_chat(&Local::now(), self.display_name(), text))
    }

    /// Close the session
    ///
    /// Leaves the current room (announcing the departure) and releases the
    /// outbound mailbox so the send task can flush and shut the transport
    /// down. Calling it again is a no-op.
    pub fn close(&mut self) {
        if self.state == SessionState::Closing {
            return;
        }
        self.state = SessionState::Closing;

        if let Some(room) = self.room.take() {
            self.registry.leave_room(&room, self.id);
        }
        self.outbound = None;
        info!("Session {} ({}) closed", self.id, self.display_name());
    }

    /// Helper: record the new room and tell the client about the old one
    async fn switch_to(&mut self, room: Arc<Room>) -> Result<(), AppError> {
        if let Some(previous) = self.room.replace(room) {
            self.reply(Reply::notice(format!("leaving {}", previous.name())))
                .await?;
        }
        Ok(())
    }

    /// Helper: this session as seen by a room
    fn member(&self) -> Result<Member, AppError> {
        let Some(outbound) = self.outbound.as_ref() else {
            return Err(AppError::SessionInactive);
        };
        Ok(Member::new(self.display_name(), outbound))
    }

    fn ensure_active(&self) -> Result<(), AppError> {
        match self.state {
            SessionState::Active => Ok(()),
            SessionState::Naming | SessionState::Closing => Err(AppError::SessionInactive),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
