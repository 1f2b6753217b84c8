//! The in-world character a session owns while logged in.
//!
//! Gameplay lives elsewhere. The session only needs the handful of hooks
//! its dispatcher and logout sequence call, so this trait is that surface
//! and nothing more.

use realmkeep_protocol::{PlayerGuid, RegionId};

/// Death-related state that logout must resolve before the character is
/// removed from the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeathState {
    #[default]
    Alive,
    /// Dead, waiting to release to a graveyard.
    AwaitingRespawn,
    /// Kept alive by an effect that ends in death.
    DelayedDeath,
}

/// The group a character belongs to, as far as logout cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupMembership {
    pub is_raid: bool,
}

/// A battleground queue slot the character is waiting in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BattlegroundQueue(pub u32);

/// A logged-in character.
///
/// Only ever touched from one tick context at a time: the session that
/// owns it is behind a lock held by whichever tick is running it.
pub trait Player: Send {
    fn guid(&self) -> PlayerGuid;

    fn name(&self) -> &str;

    /// Fully placed in a region.
    fn is_in_world(&self) -> bool;

    /// The region the character is placed in, if any.
    fn region(&self) -> Option<RegionId>;

    // -- Relocation --

    /// A cross-region teleport has started and not yet completed.
    fn is_being_teleported_far(&self) -> bool;

    /// Finishes a pending cross-region teleport (the client's world-port
    /// acknowledgement, processed server-side).
    fn complete_far_teleport(&mut self);

    /// While set, relocations requested by handlers are recorded instead
    /// of performed.
    fn set_can_delay_teleport(&mut self, delay: bool);

    fn has_delayed_teleport(&self) -> bool;

    /// Performs the relocation recorded while delaying was enabled.
    fn execute_delayed_teleport(&mut self);

    fn teleport_to_homebind(&mut self);

    // -- Teardown hooks used by logout --

    fn release_loot(&mut self);

    fn death_state(&self) -> DeathState;

    fn repop_at_graveyard(&mut self);

    fn kill(&mut self);

    fn is_in_combat(&self) -> bool;

    fn leave_combat(&mut self);

    /// Tells an active battleground the character left.
    fn notify_battleground_logout(&mut self);

    /// The character's instance binding is still valid.
    fn has_valid_instance(&self) -> bool;

    fn is_game_master(&self) -> bool;

    /// Removes and returns every battleground queue slot.
    fn take_battleground_queues(&mut self) -> Vec<BattlegroundQueue>;

    fn guild_id(&self) -> Option<u32>;

    fn uninvite_from_group(&mut self);

    fn group(&self) -> Option<GroupMembership>;

    fn remove_from_group(&mut self);

    fn update_group_online_status(&mut self, online: bool);

    /// Social data has been loaded for this character.
    fn has_social(&self) -> bool;

    fn remove_pet(&mut self);

    fn save_to_db(&mut self) -> Result<(), crate::PersistenceError>;

    fn cleanup_channels(&mut self);

    /// Cleanup for a character that is not in any region and will be
    /// deleted without a region removal.
    fn cleanup_before_delete(&mut self);

    /// The account's expansion level changed.
    fn on_expansion_change(&mut self, expansion: u8);
}
