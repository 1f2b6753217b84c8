//! The session's view of a client transport.
//!
//! A session holds an `Arc<dyn Socket>` but never owns the connection:
//! the network side can close it at any moment, so the session checks
//! [`Socket::is_closed`] before every use. The socket's only way back to
//! the session is a `Weak<SessionInbox>` held by its reader, which never
//! keeps the session alive.

use realmkeep_protocol::{Opcode, ServerMessage, SessionKey};

/// Outbound side of a client connection, as seen by a session.
pub trait Socket: Send + Sync {
    /// Queues a message for the client. Dropped silently when closed.
    fn send(&self, message: ServerMessage);

    fn is_closed(&self) -> bool;

    /// Starts closing the connection. Idempotent.
    fn close(&self);

    /// Irrevocably detaches the socket from its session. After this the
    /// network side may release the connection.
    fn finalize_session(&self);

    /// The key negotiated during the handshake.
    fn session_key(&self) -> SessionKey;

    fn remote_address(&self) -> String;

    /// Most recent inbound opcodes, oldest first.
    fn opcode_history(&self) -> Vec<Opcode>;
}
