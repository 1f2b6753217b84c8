//! # Realmkeep
//!
//! The per-connection session layer of a tick-driven game world server.
//!
//! Every authenticated account gets a
//! [`WorldSession`](realmkeep_session::WorldSession). Inbound envelopes are
//! routed at receive time into one of two queues: the generic queue drained
//! by the world tick, or the map queue drained by the tick of the region
//! the player is in. The session decides per envelope whether its current
//! state admits the opcode, advances its lifecycle once per world tick, and
//! runs the logout sequence when a character leaves the world.
//!
//! This crate wires the layers together:
//!
//! ```text
//! WebSocket ─→ reader task ─→ SessionInbox ─┬─→ generic queue ─→ world loop (SessionRegistry)
//!                                           └─→ map queue ─────→ region actors
//! world loop / region actors ─→ SocketBridge ─→ writer task ─→ WebSocket
//! ```
//!
//! The world itself (regions, players, persistence) is supplied by the
//! embedding application through the [`World`](realmkeep_session::World),
//! [`Player`](realmkeep_session::Player) and
//! [`Database`](realmkeep_session::Database) traits.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use realmkeep::prelude::*;
//!
//! // Implement World, Database, and Authenticator for your realm, then:
//! // let server = RealmServerBuilder::new()
//! //     .config(ServerConfig::from_json(&std::fs::read_to_string("realm.json")?)?)
//! //     .world(world)
//! //     .login_db(login_db)
//! //     .character_db(character_db)
//! //     .build(auth)
//! //     .await?;
//! // server.run().await
//! ```

mod bridge;
mod config;
mod error;
mod handler;
mod registry;
mod server;

pub use bridge::SocketBridge;
pub use config::ServerConfig;
pub use error::RealmkeepError;
pub use registry::SessionRegistry;
pub use server::{RealmServer, RealmServerBuilder};

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// [`DEFAULT_LOG_FILTER`].
///
/// Does nothing if a global subscriber is already installed, so tests and
/// embedding binaries may both call it.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Everything an embedding realm needs in one import.
pub mod prelude {
    pub use crate::{RealmServer, RealmServerBuilder, RealmkeepError, ServerConfig, init_tracing};
    pub use realmkeep_protocol::{
        AccountId, AccountSecurity, AdmissionStatus, Envelope, Locale, Opcode, PlayerGuid,
        ProcessingMode, RegionId, ServerMessage, SessionKey,
    };
    pub use realmkeep_region::RegionConfig;
    pub use realmkeep_session::{
        AuthenticatedAccount, Authenticator, BattlegroundQueue, Database, OpcodeTable,
        PersistenceError, Player, Row, SessionConfig, SessionError, SqlValue, Statement, World,
        WorldSession,
    };
    pub use realmkeep_tick::TickConfig;
}
