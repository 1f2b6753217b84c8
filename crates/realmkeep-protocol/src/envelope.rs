//! The inbound message envelope: an opcode plus a cursor-addressed payload.
//!
//! Handlers read an envelope front to back. Every read checks the bytes
//! left and returns [`PayloadError`] instead of panicking, so a truncated
//! or hostile payload becomes a per-envelope fault the dispatcher can catch.
//!
//! Envelopes are moved between queues, never copied, so there is no `Clone`.

use serde::{Deserialize, Serialize};

use crate::{Opcode, PayloadError};

/// One parsed protocol message.
///
/// - `rpos`: the read cursor, advanced by the `read_*` methods.
/// - `wpos`: the write position, always the end of the payload.
///
/// On the wire (JSON codec) only `opcode` and `payload` are carried; the
/// read cursor always starts at zero after decoding.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    opcode: Opcode,
    payload: Vec<u8>,
    #[serde(skip)]
    rpos: usize,
}

impl Envelope {
    /// Creates an envelope with an empty payload.
    pub fn new(opcode: Opcode) -> Self {
        Self::with_payload(opcode, Vec::new())
    }

    /// Creates an envelope over an existing payload.
    pub fn with_payload(opcode: Opcode, payload: Vec<u8>) -> Self {
        Self {
            opcode,
            payload,
            rpos: 0,
        }
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Total payload size in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    /// Current read position.
    pub fn rpos(&self) -> usize {
        self.rpos
    }

    /// Current write position (end of the payload).
    pub fn wpos(&self) -> usize {
        self.payload.len()
    }

    /// Bytes not yet consumed by a reader.
    pub fn remaining(&self) -> usize {
        self.payload.len().saturating_sub(self.rpos)
    }

    /// Moves the read cursor. Positions past the end are clamped.
    pub fn set_rpos(&mut self, pos: usize) {
        self.rpos = pos.min(self.payload.len());
    }

    /// The full payload, independent of the read cursor.
    pub fn contents(&self) -> &[u8] {
        &self.payload
    }

    /// The payload from the read cursor onwards.
    pub fn unread(&self) -> &[u8] {
        &self.payload[self.rpos..]
    }

    // -----------------------------------------------------------------------
    // Reads (little-endian)
    // -----------------------------------------------------------------------

    /// Reads `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&[u8], PayloadError> {
        if self.remaining() < len {
            return Err(PayloadError::OutOfBounds {
                pos: self.rpos,
                wanted: len,
                size: self.payload.len(),
            });
        }
        let start = self.rpos;
        self.rpos += len;
        Ok(&self.payload[start..start + len])
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], PayloadError> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, PayloadError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, PayloadError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, PayloadError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, PayloadError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, PayloadError> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    /// Reads a NUL-terminated string. Invalid UTF-8 is replaced, not
    /// rejected: client strings are frequently in legacy encodings.
    pub fn read_cstring(&mut self) -> Result<String, PayloadError> {
        let start = self.rpos;
        let Some(len) = self.payload[start..].iter().position(|&b| b == 0) else {
            return Err(PayloadError::UnterminatedString { pos: start });
        };
        let text = String::from_utf8_lossy(&self.payload[start..start + len]).into_owned();
        self.rpos = start + len + 1;
        Ok(text)
    }

    /// Advances the read cursor without looking at the bytes.
    pub fn skip(&mut self, len: usize) -> Result<(), PayloadError> {
        self.read_bytes(len).map(|_| ())
    }

    // -----------------------------------------------------------------------
    // Writes (little-endian, appended at wpos)
    // -----------------------------------------------------------------------

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.payload.push(value);
        self
    }

    pub fn write_u16(&mut self, value: u16) -> &mut Self {
        self.payload.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.payload.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.payload.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_f32(&mut self, value: f32) -> &mut Self {
        self.payload.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_cstring(&mut self, value: &str) -> &mut Self {
        self.payload.extend_from_slice(value.as_bytes());
        self.payload.push(0);
        self
    }

    pub fn write_bytes(&mut self, value: &[u8]) -> &mut Self {
        self.payload.extend_from_slice(value);
        self
    }

    /// Hex dump of the payload for debug logging of faulty envelopes.
    pub fn hex_dump(&self) -> String {
        self.payload
            .chunks(16)
            .map(|row| {
                row.iter()
                    .map(|b| format!("{b:02X}"))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
