//! Opcode identifiers and the two tags every opcode carries.
//!
//! An opcode's [`ProcessingMode`] decides WHERE its handler runs (network
//! thread, global tick, or region tick). Its [`AdmissionStatus`] decides
//! WHEN it is legal (which session/player state it requires).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Size of the opcode space. Opcodes at or above this value have no
/// table entry and are treated as unknown.
pub const NUM_OPCODES: usize = 0x51F;

/// A protocol message identifier.
///
/// Serialized as the bare number so a JSON frame reads
/// `{"opcode": 1234, ...}`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Opcode(pub u16);

impl Opcode {
    // -- Client → server opcodes the session layer itself knows about --

    /// Client heartbeat while moving. Pruned from the map queue on teleport.
    pub const MSG_MOVE_HEARTBEAT: Self = Self(0x0EE);
    /// Client facing change. Pruned from the map queue on teleport.
    pub const MSG_MOVE_SET_FACING: Self = Self(0x0DA);
    /// Client logout request.
    pub const CMSG_LOGOUT_REQUEST: Self = Self(0x04B);
    /// Keep-alive ping, typically answered off-tick.
    pub const CMSG_PING: Self = Self(0x1DC);
    /// First frame of every connection: account token plus addon manifest.
    pub const CMSG_AUTH_SESSION: Self = Self(0x1ED);
    /// Reply to a time-sync request.
    pub const CMSG_TIME_SYNC_RESP: Self = Self(0x391);
    /// The one authed opcode that keeps the recent-logout grace flag.
    /// Clients send it right after logout, before any other traffic.
    pub const CMSG_SET_ACTIVE_VOICE_CHANNEL: Self = Self(0x3D3);

    // -- Server → client opcodes (used by codecs via `ServerMessage::opcode`) --

    pub const SMSG_TRANSFER_ABORTED: Self = Self(0x040);
    pub const SMSG_LOGOUT_COMPLETE: Self = Self(0x04D);
    pub const SMSG_TUTORIAL_FLAGS: Self = Self(0x0FD);
    pub const SMSG_NOTIFICATION: Self = Self(0x1CB);
    pub const SMSG_AUTH_RESPONSE: Self = Self(0x1EE);
    pub const SMSG_PLAY_SPELL_VISUAL: Self = Self(0x1F3);
    pub const SMSG_ACCOUNT_DATA_TIMES: Self = Self(0x209);
    pub const SMSG_AREA_TRIGGER_MESSAGE: Self = Self(0x2B8);
    pub const SMSG_ADDON_INFO: Self = Self(0x2EF);
    pub const SMSG_MOTD: Self = Self(0x33D);
    pub const SMSG_TIME_SYNC_REQ: Self = Self(0x390);
    pub const SMSG_SET_PHASE_SHIFT: Self = Self(0x47C);

    /// Index into a fixed-size opcode table, or `None` when the opcode is
    /// outside the known space.
    pub fn index(self) -> Option<usize> {
        let index = self.0 as usize;
        (index < NUM_OPCODES).then_some(index)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

/// Which execution context an opcode's handler must run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessingMode {
    /// Run synchronously on the network thread, bypassing both queues.
    /// Only for handlers proven safe to run off-tick.
    Immediate,
    /// Safe in any tick context; queued on the generic queue.
    InPlace,
    /// Must run on the owning region's tick; queued on the map queue.
    MapThread,
    /// Must run on the global tick; queued on the generic queue.
    ThreadUnsafe,
}

/// The session/player state an opcode requires before its handler may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdmissionStatus {
    /// Player attached and fully in world.
    LoggedIn,
    /// Player attached, or the session logged out very recently.
    LoggedInOrRecentlyLoggedOut,
    /// Player attached but not in world (mid-transfer).
    Transfer,
    /// Session authenticated and past the login queue.
    Authed,
    /// Never legal from a client. Receiving one is a protocol violation.
    Never,
    /// Acknowledged as received, intentionally never executed.
    Unhandled,
}

impl fmt::Display for AdmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LoggedIn => "LOGGEDIN",
            Self::LoggedInOrRecentlyLoggedOut => "LOGGEDIN_OR_RECENTLY_LOGGEDOUT",
            Self::Transfer => "TRANSFER",
            Self::Authed => "AUTHED",
            Self::Never => "NEVER",
            Self::Unhandled => "UNHANDLED",
        };
        f.write_str(name)
    }
}
