//! The network-facing half of a session.
//!
//! The socket reader holds a `Weak<SessionInbox>` and calls
//! [`SessionInbox::enqueue`] for every parsed envelope. Nothing here
//! touches the session's tick-owned state: the inbox owns only the two
//! packet queues and a handle for posting deferred callbacks.

use std::sync::Arc;

use realmkeep_protocol::{AccountId, Envelope, Opcode, ProcessingMode};
use tracing::{debug, trace, warn};

use crate::{Handler, MessagerHandle, OpcodeTable, PacketQueue, World, WorldSession};

pub struct SessionInbox {
    account_id: AccountId,
    /// Drained by the world tick.
    generic: PacketQueue,
    /// Drained by the tick of the region the player is in.
    map: PacketQueue,
    messager: MessagerHandle<WorldSession>,
    opcodes: Arc<OpcodeTable>,
    world: Arc<dyn World>,
}

impl SessionInbox {
    pub(crate) fn new(
        account_id: AccountId,
        messager: MessagerHandle<WorldSession>,
        opcodes: Arc<OpcodeTable>,
        world: Arc<dyn World>,
    ) -> Self {
        Self {
            account_id,
            generic: PacketQueue::new(),
            map: PacketQueue::new(),
            messager,
            opcodes,
            world,
        }
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    /// Routes one inbound envelope by its opcode's processing mode.
    ///
    /// - `Immediate`: the handler runs here, on the caller's thread.
    /// - `MapThread`: appended to the map queue.
    /// - anything else: appended to the generic queue.
    ///
    /// Never blocks beyond the queue lock.
    pub fn enqueue(&self, mut envelope: Envelope) {
        let opcode = envelope.opcode();
        self.world.count_opcode(opcode);
        let descriptor = self.opcodes.get(opcode);

        match (descriptor.processing, descriptor.handler) {
            (ProcessingMode::Immediate, Handler::Immediate(handler)) => {
                trace!(account = %self.account_id, %opcode, "immediate handler");
                match handler(self, &mut envelope) {
                    Ok(()) if envelope.remaining() > 0 => debug!(
                        account = %self.account_id,
                        %opcode,
                        rpos = envelope.rpos(),
                        wpos = envelope.wpos(),
                        "handler left unprocessed tail data"
                    ),
                    Ok(()) => {}
                    Err(fault) => warn!(
                        account = %self.account_id,
                        %opcode,
                        %fault,
                        "payload fault in immediate handler"
                    ),
                }
            }
            (ProcessingMode::MapThread, _) => self.map.push(envelope),
            _ => self.generic.push(envelope),
        }
    }

    /// Schedules `callback` on the session's next world tick.
    pub fn post(&self, callback: impl FnOnce(&mut WorldSession) + Send + 'static) -> bool {
        self.messager.post(callback)
    }

    /// Drops queued movement heartbeats and facing updates from the map
    /// queue. Used when the player is relocated and the old positions
    /// are meaningless.
    pub fn delete_movement_packets(&self) {
        self.map.retain(|envelope| {
            !matches!(
                envelope.opcode(),
                Opcode::MSG_MOVE_HEARTBEAT | Opcode::MSG_MOVE_SET_FACING
            )
        });
    }

    pub fn generic_len(&self) -> usize {
        self.generic.len()
    }

    pub fn map_len(&self) -> usize {
        self.map.len()
    }

    pub(crate) fn generic(&self) -> &PacketQueue {
        &self.generic
    }

    pub(crate) fn map(&self) -> &PacketQueue {
        &self.map
    }
}

impl std::fmt::Debug for SessionInbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionInbox")
            .field("account_id", &self.account_id)
            .field("generic", &self.generic)
            .field("map", &self.map)
            .finish_non_exhaustive()
    }
}
