//! Connection handler
//!
//! Handles individual client connections: name handshake, the session's
//! send task, and the interpreter loop reading client lines.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, WriteHalf};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::command::{interpret, LineReader};
use crate::error::AppError;
use crate::message::{Reply, NAME_PROMPT};
use crate::registry::Registry;
use crate::session::Session;
use crate::OUTBOUND_CAPACITY;

/// How long a closing session's send task may keep flushing
///
/// A client that stopped reading would otherwise hold the connection open.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Handle a new client connection
///
/// Generic over the stream so tests can drive it with an in-memory duplex.
/// Errors end this connection only.
pub async fn handle_connection<S>(
    stream: S,
    peer_addr: String,
    registry: Arc<Registry>,
) -> Result<(), AppError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let mut lines = LineReader::new(BufReader::new(reader));

    // Create channel for session -> client messages
    let (msg_tx, msg_rx) = mpsc::channel::<Reply>(OUTBOUND_CAPACITY);
    let mut session = Session::new(registry, msg_tx);
    let session_id = session.id();
    info!("Session {} connected from {}", session_id, peer_addr);

    // Spawn write task (Reply -> stream)
    let mut write_task = tokio::spawn(write_loop(msg_rx, writer));
    let mut write_done = false;

    // Wait for either side to finish
    let result = tokio::select! {
        result = run_session(&mut session, &mut lines) => result,
        _ = &mut write_task => {
            debug!("Write task completed for {}", session_id);
            write_done = true;
            Err(AppError::ChannelSend)
        }
    };

    session.close();

    // Let the write task flush what was already queued, but not forever
    if !write_done {
        match timeout(CLOSE_FLUSH_TIMEOUT, &mut write_task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Write task for {} failed: {}", session_id, e),
            Err(_) => {
                debug!("Write task for {} stalled, aborting", session_id);
                write_task.abort();
            }
        }
    }

    match &result {
        Ok(()) => info!("Session {} disconnected", session_id),
        Err(e) => debug!("Session {} dropped: {}", session_id, e),
    }
    result
}

/// Name handshake followed by the interpreter loop
async fn run_session<R>(session: &mut Session, lines: &mut LineReader<R>) -> Result<(), AppError>
where
    R: AsyncBufRead + Unpin,
{
    let name = loop {
        session.reply(Reply::Prompt(NAME_PROMPT.to_string())).await?;
        let Some(line) = lines.next_line().await? else {
            return Ok(());
        };
        if !line.trim().is_empty() {
            break line;
        }
    };

    session.register_name(name)?;
    session
        .reply(Reply::notice(format!("Welcome {}", session.display_name())))
        .await?;
    session.help().await?;

    interpret(session, lines).await
}

/// Session send task: drain the outbound mailbox to the stream
///
/// Ends when the session releases its mailbox or a write fails, then shuts
/// the write side down.
async fn write_loop<S>(mut msg_rx: mpsc::Receiver<Reply>, mut writer: WriteHalf<S>)
where
    S: AsyncRead + AsyncWrite,
{
    while let Some(reply) = msg_rx.recv().await {
        if let Err(e) = writer.write_all(reply.render().as_bytes()).await {
            debug!("Write failed, ending write task: {}", e);
            break;
        }
    }
    debug!("Write task ended for client");

    let _ = writer.shutdown().await;
}
