//! Wire-level vocabulary for Realmkeep.
//!
//! This crate defines what travels between a client and the session layer:
//!
//! - **Envelopes** ([`Envelope`]): one inbound protocol message: an
//!   [`Opcode`] plus a byte payload read through a cursor.
//! - **Opcode tags** ([`ProcessingMode`], [`AdmissionStatus`]): the static
//!   classification the session layer uses to route and admit envelopes.
//! - **Outbound messages** ([`ServerMessage`]): typed server → client
//!   messages. Their byte layout belongs to a [`Codec`].
//! - **Errors** ([`ProtocolError`], [`PayloadError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Session (queues, dispatch)
//! ```

mod codec;
mod envelope;
mod error;
mod opcode;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use envelope::Envelope;
pub use error::{PayloadError, ProtocolError};
pub use opcode::{AdmissionStatus, NUM_OPCODES, Opcode, ProcessingMode};
pub use types::{
    AccountId, AccountSecurity, AddonAck, AuthResult, Locale, PlayerGuid,
    RegionId, ServerMessage, SessionKey, TransferAbortReason,
};
