//! Error types for the session layer.

use realmkeep_protocol::{Opcode, PayloadError};

/// Errors raised by the persistence collaborator.
///
/// The session never retries on these. Logout logs them and carries on.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The statement could not be executed.
    #[error("statement `{statement}` failed: {reason}")]
    Statement {
        statement: &'static str,
        reason: String,
    },

    /// A transaction could not be started or committed.
    #[error("transaction failed: {0}")]
    Transaction(String),

    /// A row column was missing or had an unexpected type.
    #[error("column {index} missing or of unexpected type")]
    Column { index: usize },

    /// The database is not reachable.
    #[error("database unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur in session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Authentication failed: the token was invalid, expired, or rejected
    /// by the [`Authenticator`](crate::Authenticator).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// A persistence call failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// An envelope payload was truncated or malformed.
    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// An opcode table entry was registered with an unusable combination
    /// of tags, or outside the opcode space.
    #[error("invalid registration for opcode {opcode}: {reason}")]
    InvalidRegistration {
        opcode: Opcode,
        reason: &'static str,
    },

    /// A reconnecting socket was offered while another one is still
    /// waiting to be activated.
    #[error("a replacement socket is already pending")]
    SocketPending,

    /// Account data types are numbered `0..NUM_ACCOUNT_DATA_TYPES`.
    #[error("invalid account data type {0}")]
    InvalidAccountDataType(usize),

    /// The compressed addon manifest could not be decoded.
    #[error("addon manifest: {0}")]
    AddonManifest(String),
}
