//! Multi-Room Line Chat Relay Library
//!
//! A tokio TCP chat relay: clients register a display name, then list,
//! create, and join named rooms and chat with the other members.
//!
//! # Features
//! - Line-oriented protocol with `\quit`, `\listrooms`, `\join`, `\create`, `\help`
//! - Any number of named rooms, created on demand
//! - Timestamped chat fan-out, FIFO per room
//! - Rooms destroyed as soon as their last member leaves
//! - Disconnection handling
//!
//! # Architecture
//! Shared state lives behind short, synchronous locks:
//! - `Registry` maps room names to rooms; create, join and leave run under its lock
//! - Each `Room` guards its member set and owns a mailbox drained by its dispatch task
//! - Each connection runs a `Session` read loop plus a send task draining the
//!   session's outbound mailbox
//! - Dispatch uses `try_send`, so a slow client never stalls its room
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use chat_relay::{handle_connection, Registry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8181").await.unwrap();
//!     let registry = Arc::new(Registry::new());
//!
//!     while let Ok((stream, addr)) = listener.accept().await {
//!         let registry = Arc::clone(&registry);
//!         tokio::spawn(handle_connection(stream, addr.to_string(), registry));
//!     }
//! }
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod room;
pub mod session;
pub mod types;

/// Capacity of each session's outbound mailbox
///
/// Room traffic beyond this backlog is dropped for that session.
pub const OUTBOUND_CAPACITY: usize = 32;

/// Longest accepted input line in bytes, not counting the terminator
pub const MAX_LINE_LEN: usize = 4096;

// Re-export main types for convenience
pub use command::{Command, LineReader};
pub use config::Config;
pub use error::{AppError, ErrorKind, SendError};
pub use handler::handle_connection;
pub use message::Reply;
pub use registry::{Registry, RoomListing};
pub use room::{Room, RoomState, RoomSummary};
pub use session::{Session, SessionState};
pub use types::{RoomName, SessionId};
