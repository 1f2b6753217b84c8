//! Unified error type for a Realmkeep server.

use realmkeep_protocol::{PayloadError, ProtocolError};
use realmkeep_region::RegionError;
use realmkeep_session::SessionError;
use realmkeep_transport::TransportError;

/// Top-level error wrapping every layer's error.
///
/// `#[from]` on the layer variants lets `?` convert sub-crate errors
/// directly.
#[derive(Debug, thiserror::Error)]
pub enum RealmkeepError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The auth session frame was truncated.
    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Region(#[from] RegionError),

    /// The server config could not be parsed.
    #[error("invalid config: {0}")]
    Config(#[source] serde_json::Error),

    /// The builder was not given a required collaborator.
    #[error("no {0} configured")]
    MissingCollaborator(&'static str),

    /// The world loop is gone, so nothing can admit new sessions.
    #[error("world loop stopped")]
    WorldLoopStopped,
}
