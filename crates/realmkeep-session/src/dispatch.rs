//! Tick entry points: queue draining, admission control, and the
//! lifecycle state machine.
//!
//! [`WorldSession::update`] runs on the world tick and
//! [`WorldSession::update_map`] on the tick of the region the player is
//! in. Both take the whole backlog of their queue in one swap, then run
//! it with the queue unlocked, so producers never wait on a handler.

use std::time::Instant;

use realmkeep_protocol::{AdmissionStatus, Envelope, Opcode, PayloadError};
use tracing::{debug, error, info, trace};

use crate::{Handler, OpcodeDescriptor, SessionState, UpdateOutcome, WorldSession};

impl WorldSession {
    /// Runs one world tick for this session.
    ///
    /// 1. Deferred callbacks posted since the last tick.
    /// 2. The generic queue, while the socket stays open.
    /// 3. The lifecycle state machine.
    ///
    /// Returns [`UpdateOutcome::Remove`] when the owner should shut the
    /// session down and drop it.
    pub fn update(&mut self, now: Instant) -> UpdateOutcome {
        self.now = now;

        for callback in self.messager.drain() {
            callback(self);
        }

        let mut backlog = self.inbox.generic().take_all();
        while self.is_socket_open() {
            let Some(mut envelope) = backlog.pop_front() else {
                break;
            };
            self.dispatch_generic(&mut envelope);
        }
        if !backlog.is_empty() {
            debug!(
                account = %self.account_id,
                dropped = backlog.len(),
                "socket closed, dropping queued envelopes"
            );
        }

        self.advance_state(now)
    }

    /// Runs one region tick for this session: drains the map queue,
    /// executing only envelopes whose opcode requires a logged-in player.
    pub fn update_map(&mut self, now: Instant) {
        self.now = now;

        let mut backlog = self.inbox.map().take_all();
        while self.is_socket_open() {
            let Some(mut envelope) = backlog.pop_front() else {
                break;
            };
            let descriptor = *self.services.opcodes.get(envelope.opcode());

            if descriptor.status != AdmissionStatus::LoggedIn {
                error!(
                    account = %self.account_id,
                    opcode = %envelope.opcode(),
                    status = %descriptor.status,
                    "map-queued opcode without logged-in status, skipped"
                );
                continue;
            }
            if !self.player.as_ref().is_some_and(|p| p.is_in_world()) {
                trace!(account = %self.account_id, opcode = %envelope.opcode(), "player left the world, skipped");
                continue;
            }
            if let Err(fault) = self.execute_opcode(&descriptor, &mut envelope) {
                self.process_payload_fault(&envelope, fault);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Admission control
    // -----------------------------------------------------------------------

    fn dispatch_generic(&mut self, envelope: &mut Envelope) {
        let descriptor = *self.services.opcodes.get(envelope.opcode());
        trace!(account = %self.account_id, opcode = %envelope.opcode(), name = descriptor.name, "dispatch");

        let result = match descriptor.status {
            AdmissionStatus::LoggedIn => match &self.player {
                None => {
                    // Late traffic from a client that just logged out.
                    if !self.recently_logged_out {
                        self.log_unexpected_opcode(envelope, "the player has not logged in yet");
                    }
                    Ok(())
                }
                Some(player) if player.is_in_world() => self.execute_opcode(&descriptor, envelope),
                Some(_) => {
                    debug!(
                        account = %self.account_id,
                        opcode = %envelope.opcode(),
                        "player is between regions, skipped"
                    );
                    Ok(())
                }
            },
            AdmissionStatus::LoggedInOrRecentlyLoggedOut => {
                if self.player.is_none() && !self.recently_logged_out {
                    self.log_unexpected_opcode(
                        envelope,
                        "the player has not logged in yet and not recently logged out",
                    );
                    Ok(())
                } else {
                    self.execute_opcode(&descriptor, envelope)
                }
            }
            AdmissionStatus::Transfer => match &self.player {
                None => {
                    self.log_unexpected_opcode(envelope, "the player has not logged in yet");
                    Ok(())
                }
                Some(player) if player.is_in_world() => {
                    self.log_unexpected_opcode(envelope, "the player is still in world");
                    Ok(())
                }
                Some(_) => self.execute_opcode(&descriptor, envelope),
            },
            AdmissionStatus::Authed => {
                if self.is_in_queue() {
                    self.log_unexpected_opcode(envelope, "the player has not passed the queue yet");
                    Ok(())
                } else {
                    // The voice channel opcode arrives right after logout,
                    // ahead of the traffic the grace flag exists for.
                    if envelope.opcode() != Opcode::CMSG_SET_ACTIVE_VOICE_CHANNEL {
                        self.recently_logged_out = false;
                    }
                    self.execute_opcode(&descriptor, envelope)
                }
            }
            AdmissionStatus::Never => {
                error!(
                    account = %self.account_id,
                    address = %self.remote_address(),
                    opcode = %envelope.opcode(),
                    name = descriptor.name,
                    "received not allowed opcode"
                );
                Ok(())
            }
            AdmissionStatus::Unhandled => {
                debug!(
                    account = %self.account_id,
                    opcode = %envelope.opcode(),
                    name = descriptor.name,
                    "received not handled opcode"
                );
                Ok(())
            }
        };

        if let Err(fault) = result {
            self.process_payload_fault(envelope, fault);
        }
    }

    /// Runs a handler with relocation deferred for its whole duration,
    /// then performs any relocation it requested.
    fn execute_opcode(
        &mut self,
        descriptor: &OpcodeDescriptor,
        envelope: &mut Envelope,
    ) -> Result<(), PayloadError> {
        let Handler::Session(handler) = descriptor.handler else {
            error!(
                account = %self.account_id,
                opcode = %envelope.opcode(),
                "immediate handler reached a tick queue"
            );
            return Ok(());
        };

        if let Some(player) = self.player.as_mut() {
            player.set_can_delay_teleport(true);
        }

        let result = handler(self, envelope);

        if let Some(player) = self.player.as_mut() {
            player.set_can_delay_teleport(false);
            if player.has_delayed_teleport() {
                player.execute_delayed_teleport();
            }
        }

        if result.is_ok() && envelope.remaining() > 0 {
            self.log_unprocessed_tail(envelope);
        }
        result
    }

    /// Logs a payload fault and, when configured, schedules a kick on the
    /// next tick. Never kicks inline: the faulting handler's caller is
    /// still running.
    fn process_payload_fault(&self, envelope: &Envelope, fault: PayloadError) {
        error!(
            account = %self.account_id,
            address = %self.remote_address(),
            opcode = %envelope.opcode(),
            %fault,
            "payload fault while parsing envelope"
        );
        debug!(dump = %envelope.hex_dump(), history = ?self.opcode_history(), "faulty envelope");

        if !self.services.config.kick_on_bad_packet {
            return;
        }

        info!(account = %self.account_id, "disconnecting session for badly formatted envelope");
        match self.player_guid() {
            Some(guid) => {
                self.inbox.post(move |session| {
                    if session.player_guid() == Some(guid) {
                        session.kick_player(true, false);
                    }
                });
            }
            None => {
                self.inbox.post(|session| session.close_socket());
            }
        }
    }

    // -----------------------------------------------------------------------
    // State machine
    // -----------------------------------------------------------------------

    fn advance_state(&mut self, now: Instant) -> UpdateOutcome {
        match self.state {
            SessionState::Created => {
                if let Some(pending) = self.pending_socket.take() {
                    if self.socket.is_some() {
                        self.set_offline();
                    }
                    info!(
                        account = %self.account_id,
                        key = %pending.session_key().to_hex(),
                        "replacement socket activated"
                    );
                    self.socket = Some(pending);
                    self.send_auth_ok();
                } else if self.is_in_queue() {
                    self.send_auth_queued();
                } else {
                    self.send_auth_ok();
                }
                if !self.addons.is_empty() {
                    self.send_addons_info();
                }
                self.set_in_char_selection();
                UpdateOutcome::Keep
            }

            SessionState::CharSelection => {
                if !self.is_socket_open() {
                    return UpdateOutcome::Remove;
                }
                if self.should_log_out(now) && !self.player_loading {
                    self.logout_player();
                }
                if self.should_disconnect(now) {
                    info!(account = %self.account_id, "idle at character selection, disconnecting");
                    self.kick_player(true, true);
                    self.close_socket();
                }
                UpdateOutcome::Keep
            }

            SessionState::Ready => {
                if self.socket.as_ref().is_some_and(|s| s.is_closed()) {
                    if self.player.is_none() {
                        return UpdateOutcome::Remove;
                    }
                    self.set_offline();
                } else if self.should_log_out(now) && !self.player_loading {
                    self.logout_player();
                } else {
                    self.update_time_sync();
                }
                UpdateOutcome::Keep
            }

            SessionState::Offline => {
                if self.should_disconnect(now) {
                    self.logout_player();
                    if self.pending_socket.is_none() && !self.is_socket_open() {
                        return UpdateOutcome::Remove;
                    }
                }
                UpdateOutcome::Keep
            }
        }
    }
}
