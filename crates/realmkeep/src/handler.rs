//! Per-connection handler: auth handshake, then the reader and writer
//! tasks that bridge the connection to a session.
//!
//! 1. Receive the first frame. It must be a `CMSG_AUTH_SESSION` envelope
//!    whose payload is the auth token as a C string, optionally followed
//!    by the compressed addon manifest.
//! 2. Authenticate the token. On failure, answer `Rejected` and close.
//! 3. Start the writer task and ask the world loop to admit the
//!    connection. The world loop answers with the session's inbox.
//! 4. Read frames until the peer leaves or the session closes the
//!    socket, feeding each decoded envelope to the inbox.

use std::sync::{Arc, Weak};

use realmkeep_protocol::{
    AuthResult, Codec, Envelope, Opcode, ProtocolError, ServerMessage,
};
use realmkeep_session::{Authenticator, SessionInbox, Socket};
use realmkeep_transport::{Connection, WebSocketConnection};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use crate::RealmkeepError;
use crate::bridge::{Outbound, SocketBridge};
use crate::server::{Admission, ServerState};

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, C>>,
) -> Result<(), RealmkeepError>
where
    A: Authenticator,
    C: Codec,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let mut auth = receive_auth_session(&conn, &state).await?;
    let token = auth.read_cstring()?;

    let account = match state.auth.authenticate(&token).await {
        Ok(account) => account,
        Err(err) => {
            reject(&conn, &state.codec).await;
            return Err(err.into());
        }
    };
    let account_id = account.account_id;
    info!(%conn_id, account = %account_id, "account authenticated");

    let (bridge, outbound) = SocketBridge::new(
        conn_id,
        conn.peer_addr(),
        account.session_key.clone(),
        state.opcode_history,
    );
    let writer = tokio::spawn(write_loop(
        Arc::clone(&conn),
        outbound,
        Arc::clone(&bridge),
        Arc::clone(&state),
    ));

    let (reply_tx, reply_rx) = oneshot::channel();
    let admission = Admission {
        account,
        socket: Arc::clone(&bridge),
        auth,
        reply: reply_tx,
    };
    if state.admissions.send(admission).await.is_err() {
        bridge.close();
        let _ = writer.await;
        return Err(RealmkeepError::WorldLoopStopped);
    }

    let Ok(inbox) = reply_rx.await else {
        debug!(%conn_id, account = %account_id, "admission refused");
        bridge.close();
        let _ = writer.await;
        return Ok(());
    };

    read_loop(&conn, &bridge, inbox, &state.codec).await;

    bridge.close();
    let _ = writer.await;
    debug!(%conn_id, account = %account_id, "connection finished");
    Ok(())
}

async fn receive_auth_session<A, C>(
    conn: &WebSocketConnection,
    state: &ServerState<A, C>,
) -> Result<Envelope, RealmkeepError>
where
    A: Authenticator,
    C: Codec,
{
    let frame = match tokio::time::timeout(state.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(frame))) => frame,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before auth session".into(),
            )
            .into());
        }
        Ok(Err(err)) => return Err(err.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("auth session timed out".into()).into());
        }
    };

    let envelope: Envelope = state.codec.decode(&frame)?;
    if envelope.opcode() != Opcode::CMSG_AUTH_SESSION {
        return Err(ProtocolError::InvalidMessage(format!(
            "expected CMSG_AUTH_SESSION, got {}",
            envelope.opcode()
        ))
        .into());
    }
    Ok(envelope)
}

async fn reject(conn: &WebSocketConnection, codec: &impl Codec) {
    let response = ServerMessage::AuthResponse {
        result: AuthResult::Rejected,
        queue_position: None,
    };
    match codec.encode(&response) {
        Ok(bytes) => {
            if let Err(err) = conn.send(&bytes).await {
                debug!(conn = %conn.id(), %err, "could not send auth rejection");
            }
        }
        Err(err) => warn!(%err, "could not encode auth rejection"),
    }
    let _ = conn.close().await;
}

/// Feeds decoded envelopes to the session until the peer leaves, the
/// session closes the socket, or the session is gone.
async fn read_loop(
    conn: &WebSocketConnection,
    bridge: &SocketBridge,
    inbox: Weak<SessionInbox>,
    codec: &impl Codec,
) {
    let conn_id = conn.id();
    loop {
        let frame = tokio::select! {
            frame = conn.recv() => frame,
            () = bridge.closed() => break,
        };
        let data = match frame {
            Ok(Some(data)) => data,
            Ok(None) => {
                info!(%conn_id, "connection closed by peer");
                break;
            }
            Err(err) => {
                debug!(%conn_id, %err, "recv error");
                break;
            }
        };

        let envelope: Envelope = match codec.decode(&data) {
            Ok(envelope) => envelope,
            Err(err) => {
                debug!(%conn_id, %err, "failed to decode envelope");
                continue;
            }
        };
        bridge.record_opcode(envelope.opcode());
        trace!(%conn_id, opcode = %envelope.opcode(), size = envelope.size(), "envelope received");

        let Some(inbox) = inbox.upgrade() else {
            debug!(%conn_id, "session gone, stopping reader");
            break;
        };
        inbox.enqueue(envelope);
    }
}

/// Encodes and writes outbound messages in order until the socket is
/// closed. Messages queued before the close are still written.
async fn write_loop<A, C>(
    conn: Arc<WebSocketConnection>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    bridge: Arc<SocketBridge>,
    state: Arc<ServerState<A, C>>,
) where
    A: Authenticator,
    C: Codec,
{
    while let Some(item) = outbound.recv().await {
        let message = match item {
            Outbound::Message(message) => message,
            Outbound::Close => break,
        };
        let bytes = match state.codec.encode(&message) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(conn = %conn.id(), opcode = %message.opcode(), %err, "could not encode message");
                continue;
            }
        };
        if let Err(err) = conn.send(&bytes).await {
            debug!(conn = %conn.id(), %err, "send failed, closing socket");
            bridge.close();
            break;
        }
    }
    if let Err(err) = conn.close().await {
        trace!(conn = %conn.id(), %err, "close after writer finished");
    }
}
