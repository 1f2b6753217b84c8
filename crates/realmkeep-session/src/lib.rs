//! World sessions for Realmkeep.
//!
//! One [`WorldSession`] exists per authenticated account. It owns:
//!
//! 1. **Two packet queues**: a generic queue drained by the world tick
//!    and a map queue drained by the tick of the region the player is in.
//!    The network side fills them through the session's [`SessionInbox`].
//! 2. **Admission control**: every opcode has an [`AdmissionStatus`]
//!    in the [`OpcodeTable`], checked against the session's state before
//!    its handler runs.
//! 3. **The lifecycle state machine**: `Created → CharSelection → Ready
//!    → Offline` ([`SessionState`]), driven by [`WorldSession::update`].
//! 4. **Logout**: the ordered teardown that detaches a character.
//! 5. **Deferred callbacks**: a [`Messager`] for work that must run on
//!    the session's own tick.
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)   ← registry of sessions, world tick, region ticks
//!     ↕
//! Session (this crate)  ← queues, dispatch, lifecycle, logout
//!     ↕
//! Protocol (below) ← Envelope, Opcode, ServerMessage
//! ```
//!
//! [`AdmissionStatus`]: realmkeep_protocol::AdmissionStatus

mod account_data;
mod addons;
mod auth;
mod config;
mod dispatch;
mod error;
pub mod handlers;
mod inbox;
mod logout;
mod messager;
mod opcode_table;
mod persistence;
mod player;
mod queue;
mod session;
mod socket;
mod state;
mod time_sync;
mod tutorials;
mod world;

pub use account_data::{
    AccountData, GLOBAL_CACHE_MASK, NUM_ACCOUNT_DATA_TYPES, PER_CHARACTER_CACHE_MASK,
};
pub use addons::{AddonEntry, MAX_ADDON_MANIFEST_SIZE, STANDARD_ADDON_CRC, parse_addon_manifest};
pub use auth::{AuthenticatedAccount, Authenticator};
pub use config::SessionConfig;
pub use error::{PersistenceError, SessionError};
pub use inbox::SessionInbox;
pub use messager::{Callback, Messager, MessagerHandle};
pub use opcode_table::{Handler, ImmediateHandler, OpcodeDescriptor, OpcodeTable, SessionHandler};
pub use persistence::{Database, Row, SqlValue, Statement};
pub use player::{BattlegroundQueue, DeathState, GroupMembership, Player};
pub use queue::PacketQueue;
pub use session::{Services, SharedSession, WorldSession};
pub use socket::Socket;
pub use state::{SessionState, UpdateOutcome};
pub use tutorials::{NUM_TUTORIAL_FLAGS, TutorialState};
pub use world::World;
