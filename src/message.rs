//! Outbound message definitions
//!
//! Everything a session writes to its client is a `Reply`. The variants are
//! a closed set rendered to text by pattern matching.

use chrono::{DateTime, Local};

use crate::error::AppError;

/// Marker line written before and after every notice and listing
pub const FRAME: &str = "---------------------------";

/// Handshake prompt for the display name
pub const NAME_PROMPT: &str = "Please Enter Name: ";

/// Prompt written after `\join` and `\create`
pub const ROOM_PROMPT: &str = "Please enter room name: ";

/// Chat timestamp layout, e.g. `18/10/2026 14:03:59`
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Directive help table, in display order
const HELP: [(&str, &str); 5] = [
    ("\\quit", "quit"),
    ("\\listrooms", "list all rooms and their online members"),
    ("\\create", "create a new room"),
    ("\\join", "join a room"),
    ("\\help", "prints all available commands"),
];

/// Server → Client message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Prompt text, written without a trailing newline
    Prompt(String),
    /// Single framed informational line
    Notice(String),
    /// Framed `key : value` rows
    Listing(Vec<(String, String)>),
    /// Room traffic (chat or announcement), one unframed line
    Broadcast(String),
}

impl Reply {
    /// Build a framed notice
    pub fn notice(text: impl Into<String>) -> Self {
        Reply::Notice(text.into())
    }

    /// The directive help listing
    pub fn help() -> Self {
        Reply::Listing(
            HELP.iter()
                .map(|(directive, about)| (directive.to_string(), about.to_string()))
                .collect(),
        )
    }

    /// Render to the exact bytes written on the wire
    pub fn render(&self) -> String {
        match self {
            Reply::Prompt(text) => text.clone(),
            Reply::Notice(text) => format!("{FRAME}\n{text}\n{FRAME}\n"),
            Reply::Listing(rows) => {
                let mut out = format!("{FRAME}\n");
                for (key, value) in rows {
                    out.push_str(&format!("{key} : {value}\n"));
                }
                out.push_str(FRAME);
                out.push('\n');
                out
            }
            Reply::Broadcast(line) => format!("{line}\n"),
        }
    }
}

/// Format a chat line as broadcast to the room
pub fn format_chat(at: &DateTime<Local>, from: &str, text: &str) -> String {
    format!("{} * ({}): \"{}\"", at.format(TIMESTAMP_FORMAT), from, text)
}

/// Format a room announcement (joins and departures)
pub fn format_announcement(text: &str) -> String {
    format!("* {text} *")
}

/// Convert AppError to a Reply for client notification
impl From<AppError> for Reply {
    fn from(err: AppError) -> Self {
        let text = match &err {
            AppError::RoomNotFound(room) => format!("error: could not join room \"{room}\""),
            AppError::RoomAlreadyExists(room) => {
                format!("* error: could not create room \"{room}\", it already exists *")
            }
            AppError::NotInRoom => {
                "error: you are not in a room, use \\join or \\create first".to_string()
            }
            AppError::AlreadyInRoom(room) => format!("error: already in room \"{room}\""),
            AppError::InvalidRoomName => "error: room name must not be empty".to_string(),
            AppError::NameAlreadySet => "error: name is already set".to_string(),
            AppError::SessionInactive => "error: session is not active".to_string(),
            // Fatal and internal errors carry no detail for the client
            _ => "error: internal error".to_string(),
        };
        Reply::Notice(text)
    }
}
