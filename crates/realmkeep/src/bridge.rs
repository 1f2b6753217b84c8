//! The network side of a session's socket.
//!
//! A [`SocketBridge`] is what a session holds as its `Arc<dyn Socket>`.
//! Sends are pushed onto an unbounded channel drained by the
//! connection's writer task, so a tick never waits on the network.
//! Closing flips a flag and wakes the reader and writer tasks, which then
//! wind the connection down.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use realmkeep_protocol::{Opcode, ServerMessage, SessionKey};
use realmkeep_session::Socket;
use realmkeep_transport::{ConnectionId, OpcodeHistory};
use tokio::sync::{Notify, mpsc};
use tracing::{debug, trace};

/// What the writer task receives.
#[derive(Debug)]
pub(crate) enum Outbound {
    Message(ServerMessage),
    Close,
}

/// One client connection as a session sees it.
pub struct SocketBridge {
    conn_id: ConnectionId,
    peer: SocketAddr,
    session_key: SessionKey,
    outbound: mpsc::UnboundedSender<Outbound>,
    closed: AtomicBool,
    finalized: AtomicBool,
    close_signal: Notify,
    history: OpcodeHistory,
}

impl SocketBridge {
    /// Creates a bridge and the receiver its writer task drains.
    pub(crate) fn new(
        conn_id: ConnectionId,
        peer: SocketAddr,
        session_key: SessionKey,
        history_capacity: usize,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let bridge = Arc::new(Self {
            conn_id,
            peer,
            session_key,
            outbound: tx,
            closed: AtomicBool::new(false),
            finalized: AtomicBool::new(false),
            close_signal: Notify::new(),
            history: OpcodeHistory::new(history_capacity),
        });
        (bridge, rx)
    }

    pub fn conn_id(&self) -> ConnectionId {
        self.conn_id
    }

    /// Called by the reader for every decoded envelope.
    pub(crate) fn record_opcode(&self, opcode: Opcode) {
        self.history.record(opcode.0);
    }

    /// Resolves once [`close`](Socket::close) has been called.
    pub(crate) async fn closed(&self) {
        if self.is_closed() {
            return;
        }
        self.close_signal.notified().await;
    }

    /// The session has let go of this socket for good.
    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }
}

impl Socket for SocketBridge {
    fn send(&self, message: ServerMessage) {
        if self.is_closed() {
            trace!(conn = %self.conn_id, opcode = %message.opcode(), "send on closed socket dropped");
            return;
        }
        // The writer only goes away after Close, so a failed send means
        // the socket is closing anyway.
        let _ = self.outbound.send(Outbound::Message(message));
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(conn = %self.conn_id, peer = %self.peer, "closing socket");
        let _ = self.outbound.send(Outbound::Close);
        self.close_signal.notify_one();
    }

    fn finalize_session(&self) {
        self.finalized.store(true, Ordering::Release);
        self.close();
    }

    fn session_key(&self) -> SessionKey {
        self.session_key.clone()
    }

    fn remote_address(&self) -> String {
        self.peer.to_string()
    }

    fn opcode_history(&self) -> Vec<Opcode> {
        self.history.snapshot().into_iter().map(Opcode).collect()
    }
}
