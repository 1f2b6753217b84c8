//! Tutorial progress flags, stored per account.

use realmkeep_protocol::ServerMessage;

use crate::{PersistenceError, Statement, WorldSession};

pub const NUM_TUTORIAL_FLAGS: usize = 8;

/// How the cached flags relate to the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TutorialState {
    #[default]
    Unchanged,
    Changed,
    /// No row exists yet; saving inserts one.
    New,
}

#[derive(Debug, Default)]
pub(crate) struct Tutorials {
    flags: [u32; NUM_TUTORIAL_FLAGS],
    state: TutorialState,
}

impl WorldSession {
    pub fn load_tutorials(&mut self) -> Result<(), PersistenceError> {
        self.tutorials.flags = [0; NUM_TUTORIAL_FLAGS];

        let rows = self
            .services
            .character_db
            .query(Statement::select_tutorials(self.account_id))?;

        let Some(rows) = rows.filter(|rows| !rows.is_empty()) else {
            self.tutorials.state = TutorialState::New;
            return Ok(());
        };

        for row in &rows {
            for (i, flag) in self.tutorials.flags.iter_mut().enumerate() {
                *flag = row.get_u32(i)?;
            }
        }
        self.tutorials.state = TutorialState::Unchanged;
        Ok(())
    }

    pub fn tutorial_flag(&self, index: usize) -> Option<u32> {
        self.tutorials.flags.get(index).copied()
    }

    pub fn tutorial_state(&self) -> TutorialState {
        self.tutorials.state
    }

    /// Updates one flag word. Out-of-range indexes are ignored.
    pub fn set_tutorial_flag(&mut self, index: usize, value: u32) {
        let Some(flag) = self.tutorials.flags.get_mut(index) else {
            return;
        };
        if *flag != value {
            *flag = value;
            if self.tutorials.state == TutorialState::Unchanged {
                self.tutorials.state = TutorialState::Changed;
            }
        }
    }

    pub fn send_tutorials(&self) {
        self.send(ServerMessage::TutorialFlags {
            flags: self.tutorials.flags,
        });
    }

    /// Writes the flags back: an update when changed, an insert when new.
    pub fn save_tutorials(&mut self) -> Result<(), PersistenceError> {
        let statement = match self.tutorials.state {
            TutorialState::Changed => Statement::update_tutorials(self.account_id, &self.tutorials.flags),
            TutorialState::New => Statement::insert_tutorials(self.account_id, &self.tutorials.flags),
            TutorialState::Unchanged => return Ok(()),
        };
        self.services.character_db.execute(statement)?;
        self.tutorials.state = TutorialState::Unchanged;
        Ok(())
    }
}
