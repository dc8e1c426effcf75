//! Command interpreter
//!
//! Classifies each input line as a directive or chat and applies it to the
//! session. `\join` and `\create` take their room name from one extra
//! prompted line.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tracing::{debug, error};

use crate::error::{AppError, ErrorKind};
use crate::message::{Reply, ROOM_PROMPT};
use crate::session::Session;
use crate::MAX_LINE_LEN;

/// One classified input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `\quit`
    Quit,
    /// `\listrooms`
    ListRooms,
    /// `\join`, room name follows on the next line
    Join,
    /// `\create`, room name follows on the next line
    Create,
    /// `\help`
    Help,
    /// Anything else
    Chat(String),
}

impl Command {
    /// Classify a line by exact directive match
    pub fn classify(line: &str) -> Self {
        match line {
            "\\quit" => Command::Quit,
            "\\listrooms" => Command::ListRooms,
            "\\join" => Command::Join,
            "\\create" => Command::Create,
            "\\help" => Command::Help,
            _ => Command::Chat(line.to_string()),
        }
    }
}

/// Line reader over the client's read half
///
/// Reads at most `MAX_LINE_LEN` bytes (plus CR/LF) per line, so a client
/// that never sends a newline cannot grow the buffer without bound.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R> LineReader<R>
where
    R: AsyncBufRead + Unpin,
{
    /// Wrap a buffered reader
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
        }
    }

    /// Read the next line with trailing CR/LF trimmed
    ///
    /// Returns `Ok(None)` at end of stream and `LineTooLong` once a line
    /// passes the limit.
    pub async fn next_line(&mut self) -> Result<Option<String>, AppError> {
        let limit = MAX_LINE_LEN as u64 + 2;
        self.buf.clear();
        let n = (&mut self.inner)
            .take(limit)
            .read_until(b'\n', &mut self.buf)
            .await?;
        if n == 0 {
            return Ok(None);
        }

        let terminated = self.buf.last() == Some(&b'\n');
        let line = std::str::from_utf8(&self.buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?
            .trim_end_matches(['\r', '\n']);
        if line.len() > MAX_LINE_LEN || (!terminated && n as u64 == limit) {
            return Err(AppError::LineTooLong(MAX_LINE_LEN));
        }
        Ok(Some(line.to_string()))
    }
}

/// Run the interpreter until `\quit`, end of stream, or a transport error
pub async fn interpret<R>(
    session: &mut Session,
    lines: &mut LineReader<R>,
) -> Result<(), AppError>
where
    R: AsyncBufRead + Unpin,
{
    while let Some(line) = lines.next_line().await? {
        let command = Command::classify(&line);
        debug!("Session {} command {:?}", session.id(), command);

        let outcome = match command {
            Command::Quit => return Ok(()),
            Command::ListRooms => session.list_rooms().await,
            Command::Help => session.help().await,
            Command::Join => {
                session.reply(Reply::Prompt(ROOM_PROMPT.to_string())).await?;
                let Some(name) = lines.next_line().await? else {
                    return Ok(());
                };
                session.join_room(&name).await
            }
            Command::Create => {
                session.reply(Reply::Prompt(ROOM_PROMPT.to_string())).await?;
                let Some(name) = lines.next_line().await? else {
                    return Ok(());
                };
                session.create_room(&name).await
            }
            Command::Chat(text) => session.chat(&text),
        };

        if let Err(err) = outcome {
            if err.is_fatal() {
                return Err(err);
            }
            if err.kind() == ErrorKind::Internal {
                error!("Session {} invariant violation: {}", session.id(), err);
            } else {
                debug!("Session {} rejected: {}", session.id(), err);
            }
            session.reply(err.into()).await?;
        }
    }

    debug!("Session {} reached end of stream", session.id());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::io::BufReader;
    use tokio::sync::mpsc;

    use super::*;
    use crate::registry::Registry;

    #[test]
    fn test_classify_directives() {
        assert_eq!(Command::classify("\\quit"), Command::Quit);
        assert_eq!(Command::classify("\\listrooms"), Command::ListRooms);
        assert_eq!(Command::classify("\\join"), Command::Join);
        assert_eq!(Command::classify("\\create"), Command::Create);
        assert_eq!(Command::classify("\\help"), Command::Help);
    }

    #[test]
    fn test_classify_requires_exact_match() {
        assert_eq!(
            Command::classify("\\join lobby"),
            Command::Chat("\\join lobby".to_string())
        );
        assert_eq!(Command::classify("\\QUIT"), Command::Chat("\\QUIT".to_string()));
        assert_eq!(Command::classify("hello"), Command::Chat("hello".to_string()));
    }

    fn script(input: &str) -> LineReader<BufReader<&[u8]>> {
        LineReader::new(BufReader::new(input.as_bytes()))
    }

    async fn run(input: &str) -> (Session, Vec<Reply>) {
        let registry = Arc::new(Registry::new());
        let (tx, mut rx) = mpsc::channel(64);
        let mut session = Session::new(registry, tx);
        session.register_name("alice".to_string()).unwrap();

        interpret(&mut session, &mut script(input)).await.unwrap();

        let mut replies = Vec::new();
        while let Ok(reply) = rx.try_recv() {
            replies.push(reply);
        }
        (session, replies)
    }

    #[tokio::test]
    async fn test_crlf_is_trimmed() {
        let mut lines = script("\\help\r\nhello\r\nlast");
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("\\help"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("hello"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("last"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_line_at_limit_is_accepted() {
        let input = format!("{}\r\nnext\n", "a".repeat(MAX_LINE_LEN));
        let mut lines = script(&input);
        assert_eq!(lines.next_line().await.unwrap().map(|l| l.len()), Some(MAX_LINE_LEN));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("next"));
    }

    #[tokio::test]
    async fn test_overlong_line_is_fatal() {
        let input = "a".repeat(MAX_LINE_LEN * 4);
        let mut lines = script(&input);
        let err = lines.next_line().await.unwrap_err();
        assert!(matches!(err, AppError::LineTooLong(MAX_LINE_LEN)));
        assert!(err.is_fatal());

        let input = format!("{}\n", "b".repeat(MAX_LINE_LEN + 1));
        let mut lines = script(&input);
        assert!(matches!(
            lines.next_line().await,
            Err(AppError::LineTooLong(_))
        ));
    }

    #[tokio::test]
    async fn test_overlong_line_ends_interpreter() {
        let registry = Arc::new(Registry::new());
        let (tx, _rx) = mpsc::channel(64);
        let mut session = Session::new(registry, tx);
        session.register_name("alice".to_string()).unwrap();

        let input = format!("\\help\n{}\n\\help\n", "x".repeat(MAX_LINE_LEN + 10));
        let err = interpret(&mut session, &mut script(&input)).await.unwrap_err();
        assert!(matches!(err, AppError::LineTooLong(_)));
    }

    #[tokio::test]
    async fn test_closed_mailbox_ends_interpreter() {
        let registry = Arc::new(Registry::new());
        let (tx, rx) = mpsc::channel(64);
        let mut session = Session::new(registry, tx);
        session.register_name("alice".to_string()).unwrap();
        drop(rx);

        let err = interpret(&mut session, &mut script("\\listrooms\nhello\n"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ChannelSend));
    }

    #[tokio::test]
    async fn test_chat_without_room_gets_notice() {
        let (_session, replies) = run("hello\n\\quit\nnever read\n").await;
        assert_eq!(replies, vec![Reply::from(AppError::NotInRoom)]);
    }

    #[tokio::test]
    async fn test_create_prompts_for_name() {
        let (session, replies) = run("\\create\nteam\n").await;
        assert_eq!(session.current_room().map(|n| n.as_str()), Some("team"));

        let own: Vec<&Reply> = replies
            .iter()
            .filter(|r| !matches!(r, Reply::Broadcast(_)))
            .collect();
        assert_eq!(
            own,
            vec![
                &Reply::Prompt(ROOM_PROMPT.to_string()),
                &Reply::notice("* room team has been created *"),
            ]
        );
    }

    #[tokio::test]
    async fn test_join_unknown_room_gets_notice() {
        let (session, replies) = run("\\join\nghost\n").await;
        assert!(session.current_room().is_none());
        assert_eq!(
            replies,
            vec![
                Reply::Prompt(ROOM_PROMPT.to_string()),
                Reply::from(AppError::RoomNotFound("ghost".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_ending_at_prompt() {
        let (session, replies) = run("\\join\n").await;
        assert!(session.current_room().is_none());
        assert_eq!(replies, vec![Reply::Prompt(ROOM_PROMPT.to_string())]);
    }

    #[tokio::test]
    async fn test_help_and_empty_listing() {
        let (_session, replies) = run("\\help\n\\listrooms\n").await;
        assert_eq!(replies, vec![Reply::help(), Reply::Listing(vec![])]);
    }
}
