//! Error types for the region layer.

use realmkeep_protocol::{AccountId, RegionId};

/// Errors that can occur while placing sessions on region actors.
#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    /// The session is already hosted by this region.
    #[error("session {0} already hosted in region {1}")]
    AlreadyHosted(AccountId, RegionId),

    /// The session is not hosted by this region.
    #[error("session {0} not hosted in region {1}")]
    NotHosted(AccountId, RegionId),

    /// The actor's command channel is closed.
    #[error("region actor {0} is unavailable")]
    Unavailable(usize),
}
