//! Identity types and the typed outbound message surface.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Opcode;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// An authenticated account. One session per account at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u32);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A-{}", self.0)
    }
}

/// The persisted identity of a character.
///
/// Survives the live player object: post-logout persistence is keyed by
/// this value, never by a player reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerGuid(pub u32);

impl fmt::Display for PlayerGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G-{}", self.0)
    }
}

/// An independently ticked partition of the world (a map).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(pub u32);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M-{}", self.0)
    }
}

/// The key negotiated during the auth handshake. Logged in hex when a
/// reconnecting socket takes over a session.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionKey(pub Vec<u8>);

impl SessionKey {
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02X}")).collect()
    }
}

// The key never lands in logs through `{:?}`.
impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey({} bytes)", self.0.len())
    }
}

/// Account security level, lowest to highest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum AccountSecurity {
    #[default]
    Player,
    Moderator,
    GameMaster,
    Administrator,
    Console,
}

/// Client locale, used to pick localized strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    EnUs,
    KoKr,
    FrFr,
    DeDe,
    ZhCn,
    ZhTw,
    EsEs,
    EsMx,
    RuRu,
}

// ---------------------------------------------------------------------------
// Outbound messages
// ---------------------------------------------------------------------------

/// Result code carried by the auth response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthResult {
    Ok,
    WaitQueue,
    /// The auth token was refused. The server closes the connection
    /// right after sending this.
    Rejected,
}

/// Why a transfer between regions was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferAbortReason(pub u8);

impl TransferAbortReason {
    pub const MAX_PLAYERS: Self = Self(0x01);
    pub const NOT_FOUND: Self = Self(0x02);
    pub const TOO_MANY_INSTANCES: Self = Self(0x03);
    pub const ZONE_IN_COMBAT: Self = Self(0x05);
    pub const INSUF_EXPAN_LVL: Self = Self(0x06);
    pub const DIFFICULTY: Self = Self(0x07);
    pub const UNIQUE_MESSAGE: Self = Self(0x08);

    /// Only these reasons carry an extra argument byte.
    pub fn carries_argument(self) -> bool {
        matches!(
            self,
            Self::INSUF_EXPAN_LVL | Self::DIFFICULTY | Self::UNIQUE_MESSAGE
        )
    }
}

/// Acknowledgement for one addon from the client's manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonAck {
    pub name: String,
    /// Addon state byte. Always 2 ("enabled, acknowledged").
    pub state: u8,
    /// `true` when the addon's CRC is not the standard one; the codec
    /// then appends the public key the client needs to verify it.
    pub needs_public_key: bool,
}

/// Server → client messages produced by the session layer.
///
/// Only the triggering conditions are the session layer's business;
/// the byte layout is owned by a [`Codec`](crate::Codec).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Auth accepted, or queued at `queue_position`.
    AuthResponse {
        result: AuthResult,
        queue_position: Option<u32>,
    },

    /// Logout finished; the client returns to character selection.
    LogoutComplete,

    /// Message of the day, one entry per line.
    Motd { lines: Vec<String> },

    /// Per-addon acknowledgements plus the banned-addon count.
    AddonInfo {
        addons: Vec<AddonAck>,
        banned_count: u32,
    },

    /// Time synchronization request; the client echoes `counter`.
    TimeSyncRequest { counter: u32 },

    /// Free-form notification text.
    Notification { text: String },

    /// Area-trigger text shown in the middle of the screen.
    AreaTriggerMessage { text: String },

    /// Modification times of the cached account data types in `mask`.
    AccountDataTimes {
        server_time: u32,
        mask: u32,
        times: Vec<u32>,
    },

    /// The eight tutorial flag words.
    TutorialFlags { flags: [u32; 8] },

    /// A transfer to `map_id` was refused.
    TransferAborted {
        map_id: u32,
        reason: TransferAbortReason,
        arg: Option<u8>,
    },

    /// Phase mask change.
    SetPhaseShift { phase: u32 },

    /// Play a spell visual kit on an object.
    PlaySpellVisual { guid: u64, kit: u32 },
}

impl ServerMessage {
    /// The server opcode this message is sent under.
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::AuthResponse { .. } => Opcode::SMSG_AUTH_RESPONSE,
            Self::LogoutComplete => Opcode::SMSG_LOGOUT_COMPLETE,
            Self::Motd { .. } => Opcode::SMSG_MOTD,
            Self::AddonInfo { .. } => Opcode::SMSG_ADDON_INFO,
            Self::TimeSyncRequest { .. } => Opcode::SMSG_TIME_SYNC_REQ,
            Self::Notification { .. } => Opcode::SMSG_NOTIFICATION,
            Self::AreaTriggerMessage { .. } => Opcode::SMSG_AREA_TRIGGER_MESSAGE,
            Self::AccountDataTimes { .. } => Opcode::SMSG_ACCOUNT_DATA_TIMES,
            Self::TutorialFlags { .. } => Opcode::SMSG_TUTORIAL_FLAGS,
            Self::TransferAborted { .. } => Opcode::SMSG_TRANSFER_ABORTED,
            Self::SetPhaseShift { .. } => Opcode::SMSG_SET_PHASE_SHIFT,
            Self::PlaySpellVisual { .. } => Opcode::SMSG_PLAY_SPELL_VISUAL,
        }
    }
}
