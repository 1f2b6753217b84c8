//! Realm-wide services a session calls into.

use realmkeep_protocol::{Opcode, PlayerGuid, RegionId};

use crate::BattlegroundQueue;

/// The world and the realm-wide managers around it.
///
/// Called from tick context. Implementations own their own locking.
pub trait World: Send + Sync {
    /// Removes an in-world character through its region's removal path.
    fn remove_player(&self, guid: PlayerGuid, save_first: bool);

    /// Removes a character that is not placed in any region from the
    /// world registry.
    fn delete_from_world(&self, guid: PlayerGuid);

    /// The region the world has the character registered in.
    fn current_region_of(&self, guid: PlayerGuid) -> Option<RegionId>;

    /// Tells the character's friends it went offline.
    fn send_friend_offline(&self, guid: PlayerGuid);

    fn remove_player_social(&self, guid: PlayerGuid);

    /// Updates the guild roster and broadcasts the sign-off.
    fn guild_member_logged_out(&self, guild_id: u32, guid: PlayerGuid, name: &str);

    fn leave_battleground_queue(&self, guid: PlayerGuid, queue: BattlegroundQueue);

    fn leave_lfg(&self, guid: PlayerGuid);

    /// GM ticket system online-state hook.
    fn ticket_online_state(&self, guid: PlayerGuid, online: bool);

    /// Per-opcode receive counter. Called once per enqueued envelope.
    fn count_opcode(&self, _opcode: Opcode) {}
}
