//! Registry of live, authenticated connections and the broadcast fan-out.
//!
//! The registry is the only contended shared mutable state in the server.
//! One coarse `std::sync::Mutex` covers every operation on the live set
//! (is-taken check, register, deregister, snapshot); the lock is never held
//! across an await point. Delivery itself goes through each connection's
//! bounded outbox channel, drained by that connection's writer task, so a
//! slow peer never blocks registry mutations or other peers' delivery.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use salon_shared::constants::SERVER_SENDER;
use salon_shared::Message;

/// One registered connection as the broadcaster sees it.
///
/// The nickname is bound exactly once, during the handshake, and is
/// immutable afterwards; a connection only enters the registry with its
/// final nickname.
pub struct ClientHandle {
    /// Server-assigned connection id, unique for the process lifetime.
    pub id: u64,
    /// Remote endpoint, for logs only.
    pub addr: String,
    /// Authenticated nickname.
    pub nickname: String,
    outbox: mpsc::Sender<String>,
}

impl ClientHandle {
    pub fn new(id: u64, addr: String, nickname: String, outbox: mpsc::Sender<String>) -> Self {
        Self {
            id,
            addr,
            nickname,
            outbox,
        }
    }

    /// Queue one already-framed line (token + `\n`) for this connection.
    ///
    /// Best-effort: a full or closed outbox drops the frame. Returns whether
    /// the frame was queued.
    pub fn send_frame(&self, frame: String) -> bool {
        match self.outbox.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(peer = %self.addr, nickname = %self.nickname, "outbox full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(peer = %self.addr, nickname = %self.nickname, "outbox closed, dropping frame");
                false
            }
        }
    }

    /// Whether the connection's writer is still draining the outbox.
    pub fn is_open(&self) -> bool {
        !self.outbox.is_closed()
    }
}

/// Thread-safe set of live connections plus the broadcast operations.
///
/// The raw collection is never exposed; callers only get atomic operations,
/// so lock discipline cannot drift.
pub struct Registry {
    clients: Mutex<Vec<Arc<ClientHandle>>>,
    next_id: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocate a connection id for a freshly accepted socket.
    pub fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<ClientHandle>>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Case-insensitive nickname check over the currently registered set.
    ///
    /// A nickname is free again the instant its holder is deregistered.
    pub fn is_nickname_taken(&self, nickname: &str) -> bool {
        let wanted = nickname.to_lowercase();
        self.lock()
            .iter()
            .any(|c| c.is_open() && c.nickname.to_lowercase() == wanted)
    }

    /// Atomically check nickname uniqueness and register the connection.
    ///
    /// Returns `false` (and does not register) if the nickname is already
    /// held by a live connection. The check and the insert happen under one
    /// lock acquisition so two simultaneous claims cannot both win.
    pub fn try_register(&self, handle: Arc<ClientHandle>) -> bool {
        let wanted = handle.nickname.to_lowercase();
        let mut clients = self.lock();
        if clients
            .iter()
            .any(|c| c.is_open() && c.nickname.to_lowercase() == wanted)
        {
            return false;
        }
        info!(peer = %handle.addr, nickname = %handle.nickname, "client registered");
        clients.push(handle);
        true
    }

    /// Remove a connection and announce its departure.
    ///
    /// A no-op if the id was never registered or is already removed, so
    /// racing teardown paths produce exactly one departure broadcast and
    /// one user-list update.
    pub fn remove(&self, id: u64) {
        let removed = {
            let mut clients = self.lock();
            // Vec::remove keeps registration order, which the user list
            // snapshot follows.
            clients
                .iter()
                .position(|c| c.id == id)
                .map(|index| clients.remove(index))
        };

        if let Some(handle) = removed {
            info!(peer = %handle.addr, nickname = %handle.nickname, "client deregistered");
            self.broadcast(
                Message::system(format!("[{}] has left the chat.", handle.nickname)),
                None,
            );
            self.send_user_list();
        }
    }

    /// Number of currently registered connections.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Deliver one message to every registered connection except `exclude`.
    ///
    /// Stamps `sender` to "Server" when empty and `timestamp` to now, then
    /// seals once and fans the frame out to a snapshot of the registry
    /// taken at the start of the call. A peer registered mid-broadcast may
    /// miss this message but receives all subsequent ones. Per-recipient
    /// failures are logged and swallowed; delivery is best-effort, not
    /// atomic across recipients.
    pub fn broadcast(&self, mut message: Message, exclude: Option<u64>) {
        if message.sender.as_deref().map_or(true, str::is_empty) {
            message.sender = Some(SERVER_SENDER.to_string());
        }
        message.timestamp = Utc::now();

        let mut frame = match message.seal() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, kind = ?message.kind, "failed to seal broadcast, dropping");
                return;
            }
        };
        frame.push('\n');

        let snapshot: Vec<Arc<ClientHandle>> = self.lock().clone();

        debug!(
            kind = ?message.kind,
            recipients = snapshot.len(),
            exclude = ?exclude,
            "broadcasting"
        );

        for client in snapshot {
            if Some(client.id) == exclude || !client.is_open() {
                continue;
            }
            client.send_frame(frame.clone());
        }
    }

    /// Broadcast a fresh user-list snapshot to every registered connection.
    pub fn send_user_list(&self) {
        let names = {
            let clients = self.lock();
            let mut names: Vec<String> = Vec::new();
            for client in clients.iter() {
                if client.is_open() && !names.contains(&client.nickname) {
                    names.push(client.nickname.clone());
                }
            }
            names
        };

        debug!(users = ?names, "sending user list");
        self.broadcast(Message::user_list(&names), None);
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use salon_shared::MessageKind;

    /// A registered peer plus the receiving end of its outbox.
    fn test_client(
        registry: &Registry,
        nickname: &str,
    ) -> (Arc<ClientHandle>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(64);
        let id = registry.allocate_id();
        let handle = Arc::new(ClientHandle::new(
            id,
            format!("127.0.0.1:{}", 40_000 + id),
            nickname.to_string(),
            tx,
        ));
        (handle, rx)
    }

    fn recv_message(rx: &mut mpsc::Receiver<String>) -> Message {
        let frame = rx.try_recv().expect("expected a queued frame");
        Message::open(frame.trim()).expect("frame should decrypt and parse")
    }

    #[test]
    fn test_nickname_uniqueness_case_insensitive() {
        let registry = Registry::new();
        let (alice, _rx) = test_client(&registry, "alice");
        assert!(registry.try_register(alice.clone()));

        assert!(registry.is_nickname_taken("alice"));
        assert!(registry.is_nickname_taken("Alice"));
        assert!(registry.is_nickname_taken("ALICE"));

        let (impostor, _rx2) = test_client(&registry, "Alice");
        assert!(!registry.try_register(impostor));
        assert_eq!(registry.len(), 1);

        // Freed the instant the holder is deregistered.
        registry.remove(alice.id);
        assert!(!registry.is_nickname_taken("alice"));
        let (alice2, _rx3) = test_client(&registry, "ALICE");
        assert!(registry.try_register(alice2));
    }

    #[test]
    fn test_broadcast_excludes_sender_and_stamps_server() {
        let registry = Registry::new();
        let (bob, mut bob_rx) = test_client(&registry, "bob");
        let (carol, mut carol_rx) = test_client(&registry, "carol");
        registry.try_register(bob.clone());
        registry.try_register(carol.clone());

        registry.broadcast(Message::chat("bob", "hi"), Some(bob.id));

        let got = recv_message(&mut carol_rx);
        assert_eq!(got.kind, MessageKind::ChatMessage);
        assert_eq!(got.sender.as_deref(), Some("bob"));
        assert_eq!(got.content.as_deref(), Some("hi"));

        assert!(bob_rx.try_recv().is_err(), "sender must not get an echo");

        // Empty sender is stamped to "Server".
        let mut notice = Message::new(MessageKind::SystemMessage);
        notice.content = Some("maintenance".into());
        registry.broadcast(notice, None);
        assert_eq!(recv_message(&mut bob_rx).sender.as_deref(), Some("Server"));
        assert_eq!(recv_message(&mut carol_rx).sender.as_deref(), Some("Server"));
    }

    #[test]
    fn test_user_list_content() {
        let registry = Registry::new();
        let (bob, mut bob_rx) = test_client(&registry, "bob");
        let (carol, _carol_rx) = test_client(&registry, "carol");
        registry.try_register(bob.clone());
        registry.try_register(carol);

        registry.send_user_list();

        let got = recv_message(&mut bob_rx);
        assert_eq!(got.kind, MessageKind::UserList);
        assert_eq!(got.content.as_deref(), Some("bob,carol"));
    }

    #[test]
    fn test_remove_is_idempotent_one_departure() {
        let registry = Registry::new();
        let (bob, _bob_rx) = test_client(&registry, "bob");
        let (carol, mut carol_rx) = test_client(&registry, "carol");
        registry.try_register(bob.clone());
        registry.try_register(carol);

        // Two racing teardown paths calling remove for the same id.
        registry.remove(bob.id);
        registry.remove(bob.id);

        let departure = recv_message(&mut carol_rx);
        assert_eq!(departure.kind, MessageKind::SystemMessage);
        assert_eq!(
            departure.content.as_deref(),
            Some("[bob] has left the chat.")
        );

        let user_list = recv_message(&mut carol_rx);
        assert_eq!(user_list.kind, MessageKind::UserList);
        assert_eq!(user_list.content.as_deref(), Some("carol"));

        // Exactly one departure and one user list, not two.
        assert!(carol_rx.try_recv().is_err());
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let registry = Registry::new();
        let (bob, mut bob_rx) = test_client(&registry, "bob");
        registry.try_register(bob);

        registry.remove(9999);
        assert_eq!(registry.len(), 1);
        assert!(bob_rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_outbox_peer_does_not_break_broadcast() {
        let registry = Registry::new();
        let (bob, bob_rx) = test_client(&registry, "bob");
        let (carol, mut carol_rx) = test_client(&registry, "carol");
        registry.try_register(bob);
        registry.try_register(carol);

        // bob's writer is gone; his frames are dropped, carol's still land.
        drop(bob_rx);
        registry.broadcast(Message::system("still here"), None);

        let got = recv_message(&mut carol_rx);
        assert_eq!(got.content.as_deref(), Some("still here"));
    }
}
