//! Per-connection lifecycle: handshake, steady-state pump, teardown.
//!
//! Each accepted socket runs one reader task (this module) plus one writer
//! task draining the connection's outbox. The lifecycle is a plain state
//! machine driven by return values, never by unwinding:
//!
//! ```text
//! AwaitingHandshake -> Active -> Closing -> Closed
//! ```
//!
//! Transport faults and end-of-stream transition to Closing; a single bad
//! frame mid-session (bad ciphertext, bad JSON) only drops that frame. The
//! handshake has no retry: one failed attempt closes the connection.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use salon_shared::{FrameReader, Message, MessageKind};
use salon_store::Database;

use crate::config::ServerConfig;
use crate::registry::{ClientHandle, Registry};

/// Why the steady-state pump stopped. Every variant leads to the same
/// teardown path, exactly once.
#[derive(Debug)]
enum CloseReason {
    /// The client sent a Disconnect frame.
    ClientDisconnect,
    /// Zero-length read: the peer closed its end.
    EndOfStream,
    /// Transport-level I/O failure; never retried.
    Transport(std::io::Error),
}

/// Drive one accepted socket to completion.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    registry: Arc<Registry>,
    store: Arc<Database>,
    config: ServerConfig,
) {
    let peer = addr.to_string();
    let id = registry.allocate_id();

    let (read_half, write_half) = stream.into_split();
    let (outbox_tx, outbox_rx) = mpsc::channel(config.outbox_capacity);
    let writer = tokio::spawn(write_loop(write_half, outbox_rx, peer.clone()));

    let mut frames = FrameReader::new(read_half);

    match handshake(&mut frames, &outbox_tx, id, &peer, &registry, &store, &config).await {
        Some(handle) => {
            let reason = pump(&mut frames, &handle, &registry, &store).await;
            debug!(peer = %peer, nickname = %handle.nickname, reason = ?reason, "closing connection");

            // Exactly-once teardown: Registry::remove is a no-op for an
            // already-removed id, and it emits the departure notice plus
            // the user-list update through the same broadcaster as live
            // traffic.
            registry.remove(id);
        }
        None => {
            debug!(peer = %peer, "connection closed before registration");
        }
    }

    // Dropping the last outbox sender lets the writer drain queued frames
    // (e.g. a nickname rejection) and then shut the socket down.
    drop(outbox_tx);
    let _ = writer.await;
    info!(peer = %peer, "connection closed");
}

/// AwaitingHandshake: read frames until one decrypts into a nickname claim.
///
/// Returns the registered handle, or `None` if the connection must close
/// (malformed first frame, nickname collision, or transport failure). Any
/// decrypt/deserialize failure here is fatal: a malformed handshake cannot
/// be meaningfully recovered.
async fn handshake(
    frames: &mut FrameReader<OwnedReadHalf>,
    outbox: &mpsc::Sender<String>,
    id: u64,
    peer: &str,
    registry: &Registry,
    store: &Database,
    config: &ServerConfig,
) -> Option<Arc<ClientHandle>> {
    let token = match frames.next_frame().await {
        Ok(Some(token)) => token,
        Ok(None) => {
            debug!(peer = %peer, "client disconnected before handshake");
            return None;
        }
        Err(e) => {
            debug!(peer = %peer, error = %e, "transport error during handshake");
            return None;
        }
    };

    let claim = match Message::open(&token) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(peer = %peer, error = %e, "malformed handshake frame, closing");
            return None;
        }
    };

    let nickname = match (claim.kind, claim.sender.as_deref()) {
        (MessageKind::SystemMessage, Some(name)) if !name.trim().is_empty() => {
            name.trim().to_string()
        }
        _ => {
            warn!(peer = %peer, kind = ?claim.kind, "invalid handshake message, closing");
            return None;
        }
    };

    let handle = Arc::new(ClientHandle::new(
        id,
        peer.to_string(),
        nickname,
        outbox.clone(),
    ));

    if !registry.try_register(handle.clone()) {
        info!(peer = %peer, nickname = %handle.nickname, "nickname collision, rejecting");
        queue_to_client(outbox, &Message::system("Nickname already taken, try another!"));
        return None;
    }

    // Join notice to the peers, then a fresh user list to everyone
    // (including the newcomer), then the history replay to the newcomer
    // only -- framed and encrypted exactly like live traffic.
    registry.broadcast(
        Message::system(format!("[{}] has joined the chat.", handle.nickname)),
        Some(handle.id),
    );
    registry.send_user_list();

    match store.get_recent(config.history_limit) {
        Ok(history) => {
            debug!(peer = %peer, count = history.len(), "replaying history");
            for record in &history {
                queue_to_client(outbox, record);
            }
        }
        Err(e) => {
            // History is best-effort; the session continues without it.
            error!(peer = %peer, error = %e, "failed to load history");
        }
    }

    Some(handle)
}

/// Active: read, decrypt, dispatch until the connection transitions to
/// Closing.
async fn pump(
    frames: &mut FrameReader<OwnedReadHalf>,
    handle: &ClientHandle,
    registry: &Registry,
    store: &Database,
) -> CloseReason {
    loop {
        let token = match frames.next_frame().await {
            Ok(Some(token)) => token,
            Ok(None) => return CloseReason::EndOfStream,
            Err(e) => return CloseReason::Transport(e),
        };

        let mut msg = match Message::open(&token) {
            Ok(msg) => msg,
            Err(e) => {
                // One bad frame never ends the session.
                warn!(
                    peer = %handle.addr,
                    nickname = %handle.nickname,
                    error = %e,
                    "dropping undecodable frame"
                );
                continue;
            }
        };

        // The client-supplied sender is never trusted after the handshake.
        msg.sender = Some(handle.nickname.clone());
        msg.timestamp = Utc::now();

        debug!(
            nickname = %handle.nickname,
            kind = ?msg.kind,
            "received message"
        );

        match msg.kind {
            MessageKind::ChatMessage => {
                // Delivery over durability: a failed save is logged and
                // the broadcast still goes out.
                if let Err(e) = store.save(&msg) {
                    error!(nickname = %handle.nickname, error = %e, "failed to persist chat message");
                }
                registry.broadcast(msg, Some(handle.id));
            }

            MessageKind::Disconnect => return CloseReason::ClientDisconnect,

            // Dumb pipe: no reassembly, no chunk bookkeeping validation.
            MessageKind::FileTransferMetadata | MessageKind::FileTransferChunk => {
                registry.broadcast(msg, Some(handle.id));
            }

            MessageKind::FileTransferEnd => {
                let record = historic_file_record(&msg, &handle.nickname);
                if let Err(e) = store.save(&record) {
                    error!(nickname = %handle.nickname, error = %e, "failed to persist file record");
                }
                registry.broadcast(msg, Some(handle.id));
            }

            MessageKind::SystemMessage
            | MessageKind::UserList
            | MessageKind::PrivateMessage
            | MessageKind::HistoricFileMessage
            | MessageKind::TypingStatus => {
                debug!(nickname = %handle.nickname, kind = ?msg.kind, "ignoring client frame");
            }
        }
    }
}

/// Derive the persisted history record from a completed file transfer.
fn historic_file_record(end: &Message, nickname: &str) -> Message {
    let file_name = end.file_name.as_deref().unwrap_or("unknown");
    let mut record = Message::new(MessageKind::HistoricFileMessage);
    record.sender = Some(nickname.to_string());
    record.content = Some(format!("File '{file_name}' was sent."));
    record.file_id = end.file_id;
    record.file_name = end.file_name.clone();
    record.file_size = end.file_size;
    record.file_mime_type = end.file_mime_type.clone();
    record
}

/// Seal a message and queue it on one connection's outbox.
fn queue_to_client(outbox: &mpsc::Sender<String>, message: &Message) {
    let mut frame = match message.seal() {
        Ok(token) => token,
        Err(e) => {
            warn!(error = %e, kind = ?message.kind, "failed to seal frame, dropping");
            return;
        }
    };
    frame.push('\n');

    if outbox.try_send(frame).is_err() {
        debug!(kind = ?message.kind, "outbox unavailable, dropping frame");
    }
}

/// Writer task: drain the outbox onto the socket, then shut it down.
///
/// Ends when every sender is dropped or the transport fails; the shutdown
/// is what a departing peer observes as end-of-stream.
async fn write_loop(mut half: OwnedWriteHalf, mut outbox: mpsc::Receiver<String>, peer: String) {
    while let Some(frame) = outbox.recv().await {
        if let Err(e) = half.write_all(frame.as_bytes()).await {
            debug!(peer = %peer, error = %e, "write failed, stopping writer");
            break;
        }
    }
    let _ = half.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    use uuid::Uuid;

    #[test]
    fn test_historic_file_record_shape() {
        let file_id = Uuid::new_v4();
        let mut end = Message::new(MessageKind::FileTransferEnd);
        end.file_id = file_id;
        end.file_name = Some("report.pdf".into());
        end.file_size = 4096;
        end.file_mime_type = Some("application/pdf".into());

        let record = historic_file_record(&end, "bob");
        assert_eq!(record.kind, MessageKind::HistoricFileMessage);
        assert_eq!(record.sender.as_deref(), Some("bob"));
        assert_eq!(record.content.as_deref(), Some("File 'report.pdf' was sent."));
        assert_eq!(record.file_id, file_id);
        assert_eq!(record.file_size, 4096);
    }

    #[test]
    fn test_historic_file_record_unnamed() {
        let end = Message::new(MessageKind::FileTransferEnd);
        let record = historic_file_record(&end, "bob");
        assert_eq!(record.content.as_deref(), Some("File 'unknown' was sent."));
    }
}
