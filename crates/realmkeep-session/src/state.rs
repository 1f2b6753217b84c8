//! Session lifecycle states.

use std::fmt;

/// Where a session is in its lifecycle.
///
/// ```text
///            request_new_socket
///   ┌───────────────────────────────────────────────┐
///   ▼                                               │
/// Created ──(tick)──→ CharSelection ──set_online──→ Ready
///                        ▲    │                      │
///                 logout │    │ socket closed        │ socket closed
///                        │    ▼                      ▼
///                        │  (remove)              Offline ──grace──→ logout → (remove)
///                        └───────────────────────────┘
/// ```
///
/// Transitions are evaluated once per world tick, after the generic
/// queue has been drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Just authenticated, or a replacement socket was attached. The next
    /// tick acknowledges the client and moves to `CharSelection`.
    Created,
    /// At the character list, no character in the world.
    CharSelection,
    /// A character is in the world and the socket is open.
    Ready,
    /// The socket dropped while a character was in the world. The
    /// character stays for a grace period in case the client reconnects.
    Offline,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::CharSelection => "char-selection",
            Self::Ready => "ready",
            Self::Offline => "offline",
        };
        f.write_str(name)
    }
}

/// What the owner should do with a session after its world tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Keep,
    /// The session is finished. The owner shuts it down and drops it.
    Remove,
}
