//! Handlers the session layer owns itself.
//!
//! The four `handle_*` placeholders fill table slots that must never run
//! real logic; each only logs. The rest handle the few opcodes that are
//! about the session rather than gameplay: logout requests, time-sync
//! replies, and pings.

use realmkeep_protocol::{AdmissionStatus, Envelope, Opcode, PayloadError, ProcessingMode};
use tracing::{debug, error};

use crate::{OpcodeTable, SessionError, SessionInbox, WorldSession};

/// Registers the session-level handlers.
pub(crate) fn register_core(table: &mut OpcodeTable) -> Result<(), SessionError> {
    table.register(
        Opcode::CMSG_AUTH_SESSION,
        "CMSG_AUTH_SESSION",
        AdmissionStatus::Never,
        ProcessingMode::InPlace,
        handle_early_process,
    )?;
    table.register(
        Opcode::CMSG_LOGOUT_REQUEST,
        "CMSG_LOGOUT_REQUEST",
        AdmissionStatus::LoggedIn,
        ProcessingMode::ThreadUnsafe,
        handle_logout_request,
    )?;
    table.register(
        Opcode::CMSG_TIME_SYNC_RESP,
        "CMSG_TIME_SYNC_RESP",
        AdmissionStatus::LoggedIn,
        ProcessingMode::InPlace,
        handle_time_sync_response,
    )?;
    table.register(
        Opcode::CMSG_SET_ACTIVE_VOICE_CHANNEL,
        "CMSG_SET_ACTIVE_VOICE_CHANNEL",
        AdmissionStatus::Authed,
        ProcessingMode::ThreadUnsafe,
        handle_null,
    )?;
    table.register_immediate(
        Opcode::CMSG_PING,
        "CMSG_PING",
        AdmissionStatus::Never,
        handle_ping,
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Placeholders
// ---------------------------------------------------------------------------

/// Opcode with no implementation yet.
pub fn handle_null(session: &mut WorldSession, envelope: &mut Envelope) -> Result<(), PayloadError> {
    debug!(
        account = %session.account_id(),
        opcode = %envelope.opcode(),
        name = session.services().opcodes.get(envelope.opcode()).name,
        "received unimplemented opcode"
    );
    Ok(())
}

/// Opcode that belongs to the connection handshake and should never
/// reach a session.
pub fn handle_early_process(
    session: &mut WorldSession,
    envelope: &mut Envelope,
) -> Result<(), PayloadError> {
    error!(
        account = %session.account_id(),
        opcode = %envelope.opcode(),
        "received opcode that must be processed during the handshake"
    );
    Ok(())
}

/// Server → client opcode sent by a client.
pub fn handle_server_side(
    session: &mut WorldSession,
    envelope: &mut Envelope,
) -> Result<(), PayloadError> {
    error!(
        account = %session.account_id(),
        opcode = %envelope.opcode(),
        "received server-side opcode"
    );
    Ok(())
}

pub fn handle_deprecated(
    session: &mut WorldSession,
    envelope: &mut Envelope,
) -> Result<(), PayloadError> {
    error!(
        account = %session.account_id(),
        opcode = %envelope.opcode(),
        "received deprecated opcode"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Session-level opcodes
// ---------------------------------------------------------------------------

/// Schedules a logout after the configured delay.
pub fn handle_logout_request(
    session: &mut WorldSession,
    _envelope: &mut Envelope,
) -> Result<(), PayloadError> {
    let now = session.now();
    debug!(account = %session.account_id(), player = %session.player_name(), "logout requested");
    session.logout_request(Some(now));
    Ok(())
}

/// `u32 counter, u32 client_ticks`
pub fn handle_time_sync_response(
    session: &mut WorldSession,
    envelope: &mut Envelope,
) -> Result<(), PayloadError> {
    let counter = envelope.read_u32()?;
    let client_ticks = envelope.read_u32()?;
    session.handle_time_sync_response(counter, client_ticks);
    Ok(())
}

/// `u32 sequence, u32 latency`. Runs on the network thread, so the
/// latency is handed to the session through its messager.
pub fn handle_ping(inbox: &SessionInbox, envelope: &mut Envelope) -> Result<(), PayloadError> {
    let _sequence = envelope.read_u32()?;
    let latency = envelope.read_u32()?;
    inbox.post(move |session| session.set_latency(latency));
    Ok(())
}
