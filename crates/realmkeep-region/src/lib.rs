//! Region actors for Realmkeep.
//!
//! The world is split into regions (maps), each ticked independently of
//! the global world tick. A fixed pool of actors, each a Tokio task with
//! its own [`TickLoop`](realmkeep_tick::TickLoop), drains the map queue of
//! every session whose player is in one of its regions.
//!
//! # Key types
//!
//! - [`RegionManager`]: starts the pool and places sessions on actors
//! - [`RegionHandle`]: send commands to a running actor
//! - [`RegionConfig`]: pool size, tick settings

mod actor;
mod config;
mod error;
mod manager;

pub use actor::{RegionHandle, RegionInfo};
pub use config::RegionConfig;
pub use error::RegionError;
pub use manager::RegionManager;
