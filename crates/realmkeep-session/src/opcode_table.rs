//! The opcode table: opcode → handler, processing mode, admission status.
//!
//! Built once at startup, then shared read-only behind an `Arc`. Every
//! slot in the opcode space has an entry; unregistered slots point at
//! [`handle_null`](crate::handlers::handle_null) with status `Never`, so
//! a client sending an unknown opcode is logged as a violation rather
//! than crashing anything.

use std::fmt;

use realmkeep_protocol::{AdmissionStatus, Envelope, NUM_OPCODES, Opcode, PayloadError, ProcessingMode};

use crate::{SessionError, SessionInbox, WorldSession, handlers};

/// A handler run from tick context with the session locked.
pub type SessionHandler = fn(&mut WorldSession, &mut Envelope) -> Result<(), PayloadError>;

/// A handler run on the network thread, with access to the inbox only.
pub type ImmediateHandler = fn(&SessionInbox, &mut Envelope) -> Result<(), PayloadError>;

#[derive(Clone, Copy)]
pub enum Handler {
    Session(SessionHandler),
    Immediate(ImmediateHandler),
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session(_) => f.write_str("Handler::Session"),
            Self::Immediate(_) => f.write_str("Handler::Immediate"),
        }
    }
}

/// One opcode table entry.
#[derive(Debug, Clone, Copy)]
pub struct OpcodeDescriptor {
    pub name: &'static str,
    pub status: AdmissionStatus,
    pub processing: ProcessingMode,
    pub handler: Handler,
}

impl OpcodeDescriptor {
    /// The entry every unregistered opcode gets.
    pub const UNKNOWN: Self = Self {
        name: "UNKNOWN",
        status: AdmissionStatus::Never,
        processing: ProcessingMode::InPlace,
        handler: Handler::Session(handlers::handle_null),
    };
}

pub struct OpcodeTable {
    entries: Vec<OpcodeDescriptor>,
}

impl Default for OpcodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl OpcodeTable {
    /// A table with every opcode unregistered.
    pub fn new() -> Self {
        Self {
            entries: vec![OpcodeDescriptor::UNKNOWN; NUM_OPCODES],
        }
    }

    /// A table with the opcodes the session layer handles itself.
    pub fn with_core_handlers() -> Result<Self, SessionError> {
        let mut table = Self::new();
        handlers::register_core(&mut table)?;
        Ok(table)
    }

    /// Registers a handler that runs from tick context.
    ///
    /// `processing` must not be `Immediate`: immediate handlers run
    /// without the session and are registered with
    /// [`register_immediate`](Self::register_immediate). `MapThread`
    /// handlers only ever run for a player in the world, so their status
    /// must be `LoggedIn`.
    pub fn register(
        &mut self,
        opcode: Opcode,
        name: &'static str,
        status: AdmissionStatus,
        processing: ProcessingMode,
        handler: SessionHandler,
    ) -> Result<(), SessionError> {
        if processing == ProcessingMode::Immediate {
            return Err(SessionError::InvalidRegistration {
                opcode,
                reason: "immediate handlers cannot take the session",
            });
        }
        if processing == ProcessingMode::MapThread && status != AdmissionStatus::LoggedIn {
            return Err(SessionError::InvalidRegistration {
                opcode,
                reason: "map thread handlers must require a logged in player",
            });
        }
        self.set(
            opcode,
            OpcodeDescriptor {
                name,
                status,
                processing,
                handler: Handler::Session(handler),
            },
        )
    }

    /// Registers a handler that runs on the network thread.
    pub fn register_immediate(
        &mut self,
        opcode: Opcode,
        name: &'static str,
        status: AdmissionStatus,
        handler: ImmediateHandler,
    ) -> Result<(), SessionError> {
        self.set(
            opcode,
            OpcodeDescriptor {
                name,
                status,
                processing: ProcessingMode::Immediate,
                handler: Handler::Immediate(handler),
            },
        )
    }

    fn set(&mut self, opcode: Opcode, descriptor: OpcodeDescriptor) -> Result<(), SessionError> {
        let slot = opcode
            .index()
            .and_then(|index| self.entries.get_mut(index))
            .ok_or(SessionError::InvalidRegistration {
                opcode,
                reason: "outside the opcode space",
            })?;
        *slot = descriptor;
        Ok(())
    }

    /// The entry for `opcode`. Opcodes outside the table get
    /// [`OpcodeDescriptor::UNKNOWN`].
    pub fn get(&self, opcode: Opcode) -> &OpcodeDescriptor {
        opcode
            .index()
            .and_then(|index| self.entries.get(index))
            .unwrap_or(&OpcodeDescriptor::UNKNOWN)
    }
}
