//! Error types for the chat relay
//!
//! Defines application-level errors and mailbox send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// How far an error reaches
///
/// Decides what the connection handler does with a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Read/write failure: fatal to the owning session only
    Transport,
    /// Rejected directive: reported to the client, session continues
    Protocol,
    /// Broken locking invariant: logged, only the operation fails
    Internal,
}

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and
/// protocol errors (notice sent back to the client).
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error on the client stream (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Client sent a line longer than the limit without a newline (fatal)
    #[error("Line exceeds {0} bytes")]
    LineTooLong(usize),

    /// Outbound mailbox closed (fatal - send task is gone)
    #[error("Channel send error")]
    ChannelSend,

    /// No room registered under the given name
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// A room with the given name is already registered
    #[error("Room already exists: {0}")]
    RoomAlreadyExists(String),

    /// Chat or leave attempted without being in a room
    #[error("Not in room")]
    NotInRoom,

    /// Join of the room the session is already in
    #[error("Already in room: {0}")]
    AlreadyInRoom(String),

    /// Room names must not be empty
    #[error("Invalid room name")]
    InvalidRoomName,

    /// The display name is set once per connection
    #[error("Name already set")]
    NameAlreadySet,

    /// Operation on a session that is still naming or already closing
    #[error("Session is not active")]
    SessionInactive,

    /// Mutation or broadcast on a room that was already destroyed
    #[error("Room destroyed: {0}")]
    RoomDestroyed(String),
}

impl AppError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Io(_) | AppError::LineTooLong(_) | AppError::ChannelSend => {
                ErrorKind::Transport
            },
            AppError::RoomDestroyed(_) => ErrorKind::Internal,
            AppError::RoomNotFound(_)
            | AppError::RoomAlreadyExists(_)
            | AppError::NotInRoom
            | AppError::AlreadyInRoom(_)
            | AppError::InvalidRoomName
            | AppError::NameAlreadySet
            | AppError::SessionInactive => ErrorKind::Protocol,
        }
    }

    /// True if the owning session has to be closed
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }
}

/// Message send errors
///
/// Occurs when attempting to send through a closed mailbox.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the mailbox has been closed
    #[error("Channel closed")]
    ChannelClosed,
}

impl From<SendError> for AppError {
    fn from(_: SendError) -> Self {
        AppError::ChannelSend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_are_fatal() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        assert!(AppError::Io(io).is_fatal());
        assert!(AppError::ChannelSend.is_fatal());
        assert!(AppError::from(SendError::ChannelClosed).is_fatal());
        assert!(AppError::LineTooLong(4096).is_fatal());
    }

    #[test]
    fn test_protocol_errors_are_recoverable() {
        assert_eq!(AppError::NotInRoom.kind(), ErrorKind::Protocol);
        assert_eq!(
            AppError::RoomNotFound("ghost".to_string()).kind(),
            ErrorKind::Protocol
        );
        assert!(!AppError::RoomAlreadyExists("lobby".to_string()).is_fatal());
    }

    #[test]
    fn test_destroyed_room_is_internal() {
        let err = AppError::RoomDestroyed("lobby".to_string());
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!err.is_fatal());
    }
}
