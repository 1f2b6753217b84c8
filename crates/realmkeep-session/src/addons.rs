//! The client's addon manifest.
//!
//! Sent zlib-compressed at the end of the auth frame:
//!
//! ```text
//! u32 uncompressed_size
//! zlib {
//!     u32 count
//!     count × { cstring name, u8 enabled, u32 crc, u32 reserved }
//!     u32 reserved
//! }
//! ```
//!
//! The server acknowledges every addon once, right after it acknowledges
//! the login.

use std::io::Read;

use flate2::read::ZlibDecoder;
use realmkeep_protocol::{AddonAck, Envelope, Opcode, ServerMessage};
use tracing::{debug, error};

use crate::{SessionError, WorldSession};

/// CRC of the addons shipped with the client. Anything else needs the
/// public key to verify its signature.
pub const STANDARD_ADDON_CRC: u32 = 0x4C1C_776D;

/// Largest uncompressed manifest accepted.
pub const MAX_ADDON_MANIFEST_SIZE: u32 = 0xF_FFFF;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddonEntry {
    pub name: String,
    pub enabled: u8,
    pub crc: u32,
}

/// Decodes a manifest starting at the envelope's read cursor.
///
/// A missing or zero-sized manifest decodes to no addons. A truncated
/// entry list keeps the entries read so far.
pub fn parse_addon_manifest(envelope: &mut Envelope) -> Result<Vec<AddonEntry>, SessionError> {
    if envelope.remaining() < 4 {
        return Ok(Vec::new());
    }
    let size = envelope.read_u32()?;
    if size == 0 {
        return Ok(Vec::new());
    }
    if size > MAX_ADDON_MANIFEST_SIZE {
        return Err(SessionError::AddonManifest(format!("manifest too big: {size} bytes")));
    }

    let mut inflated = Vec::with_capacity(size as usize);
    ZlibDecoder::new(envelope.unread())
        .take(u64::from(size))
        .read_to_end(&mut inflated)
        .map_err(|err| SessionError::AddonManifest(format!("decompression failed: {err}")))?;
    envelope.set_rpos(envelope.wpos());

    let mut manifest = Envelope::with_payload(Opcode::CMSG_AUTH_SESSION, inflated);
    let count = manifest.read_u32()?;
    let mut addons = Vec::new();

    for _ in 0..count {
        if manifest.remaining() < 1 {
            return Ok(addons);
        }
        let name = manifest.read_cstring()?;
        let enabled = manifest.read_u8()?;
        let crc = manifest.read_u32()?;
        let _reserved = manifest.read_u32()?;
        debug!(addon = %name, enabled, crc = format!("{crc:#X}"), "addon");
        addons.push(AddonEntry { name, enabled, crc });
    }

    if manifest.read_u32().is_err() || manifest.remaining() > 0 {
        debug!(rpos = manifest.rpos(), size = manifest.size(), "addon manifest under-read");
    }
    Ok(addons)
}

impl WorldSession {
    /// Reads the manifest from the auth frame and remembers its addons
    /// until [`send_addons_info`](Self::send_addons_info).
    pub fn read_addons_info(&mut self, envelope: &mut Envelope) -> Result<usize, SessionError> {
        match parse_addon_manifest(envelope) {
            Ok(addons) => {
                let count = addons.len();
                self.addons.extend(addons);
                Ok(count)
            }
            Err(err) => {
                error!(account = %self.account_id, %err, "failed to read addon manifest");
                Err(err)
            }
        }
    }

    pub fn addons(&self) -> &[AddonEntry] {
        &self.addons
    }

    /// Acknowledges every remembered addon, then forgets them.
    pub fn send_addons_info(&mut self) {
        let addons = std::mem::take(&mut self.addons)
            .into_iter()
            .map(|addon| AddonAck {
                name: addon.name,
                state: 2,
                needs_public_key: addon.crc != STANDARD_ADDON_CRC,
            })
            .collect();
        self.send(ServerMessage::AddonInfo {
            addons,
            banned_count: 0,
        });
    }
}
