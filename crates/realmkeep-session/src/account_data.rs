//! Client account data blobs (UI layout, macros, key bindings).
//!
//! Eight typed slots. Global types are stored per account, the rest per
//! character; the masks below say which is which.

use std::time::{SystemTime, UNIX_EPOCH};

use realmkeep_protocol::ServerMessage;
use tracing::{error, warn};

use crate::{PersistenceError, Row, SessionError, Statement, WorldSession};

pub const NUM_ACCOUNT_DATA_TYPES: usize = 8;
/// Types stored per account.
pub const GLOBAL_CACHE_MASK: u32 = 0x15;
/// Types stored per character.
pub const PER_CHARACTER_CACHE_MASK: u32 = 0xEA;

/// One cached blob and the unix time it was last written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountData {
    pub time: u64,
    pub data: String,
}

pub(crate) type AccountDataCache = [AccountData; NUM_ACCOUNT_DATA_TYPES];

fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as u32)
}

fn parse_row(row: &Row) -> Result<(u32, u64, String), PersistenceError> {
    Ok((row.get_u32(0)?, row.get_u64(1)?, row.get_string(2)?))
}

impl WorldSession {
    /// Loads the account-wide types.
    pub fn load_global_account_data(&mut self) -> Result<(), PersistenceError> {
        let rows = self
            .services
            .character_db
            .query(Statement::select_account_data(self.account_id))?;
        self.load_account_data(rows, GLOBAL_CACHE_MASK);
        Ok(())
    }

    /// Loads the per-character types for the attached character.
    pub fn load_character_account_data(&mut self) -> Result<(), PersistenceError> {
        let Some(guid) = self.character_guid else {
            return Ok(());
        };
        let rows = self
            .services
            .character_db
            .query(Statement::select_character_account_data(guid))?;
        self.load_account_data(rows, PER_CHARACTER_CACHE_MASK);
        Ok(())
    }

    /// Resets the slots in `mask`, then fills them from `(type, time,
    /// data)` rows. Rows with an unknown type, or a type outside `mask`,
    /// are logged and skipped.
    pub fn load_account_data(&mut self, rows: Option<Vec<Row>>, mask: u32) {
        for (i, slot) in self.account_data.iter_mut().enumerate() {
            if mask & (1u32 << i) != 0 {
                *slot = AccountData::default();
            }
        }

        let table = if mask == GLOBAL_CACHE_MASK {
            "account_data"
        } else {
            "character_account_data"
        };

        for row in rows.into_iter().flatten() {
            let (data_type, time, data) = match parse_row(&row) {
                Ok(fields) => fields,
                Err(err) => {
                    error!(table, %err, "unreadable account data row, ignored");
                    continue;
                }
            };

            if data_type as usize >= NUM_ACCOUNT_DATA_TYPES {
                error!(table, data_type, "invalid account data type, ignored");
                continue;
            }
            if mask & (1u32 << data_type) == 0 {
                error!(table, data_type, "account data type does not belong in this table, ignored");
                continue;
            }

            self.account_data[data_type as usize] = AccountData { time, data };
        }
    }

    pub fn account_data(&self, data_type: usize) -> Option<&AccountData> {
        self.account_data.get(data_type)
    }

    /// Stores one blob and persists it in a transaction.
    ///
    /// Per-character types need a known character. Without one the write
    /// is skipped.
    pub fn set_account_data(
        &mut self,
        data_type: usize,
        time: u64,
        data: String,
    ) -> Result<(), SessionError> {
        if data_type >= NUM_ACCOUNT_DATA_TYPES {
            return Err(SessionError::InvalidAccountDataType(data_type));
        }
        let type_id = data_type as u32;
        let db = &self.services.character_db;

        let (delete, insert) = if GLOBAL_CACHE_MASK & (1u32 << type_id) != 0 {
            (
                Statement::delete_account_data(self.account_id, type_id),
                Statement::insert_account_data(self.account_id, type_id, time, &data),
            )
        } else {
            let Some(guid) = self.character_guid else {
                warn!(account = %self.account_id, data_type, "no character for per-character account data, skipped");
                return Ok(());
            };
            (
                Statement::delete_character_account_data(guid, type_id),
                Statement::insert_character_account_data(guid, type_id, time, &data),
            )
        };

        self.account_data[data_type] = AccountData { time, data };

        db.begin_transaction()?;
        match db.execute(delete).and_then(|()| db.execute(insert)) {
            Ok(()) => db.commit_transaction()?,
            Err(err) => {
                if let Err(rollback) = db.rollback_transaction() {
                    warn!(account = %self.account_id, %rollback, "account data rollback failed");
                }
                return Err(err.into());
            }
        }
        Ok(())
    }

    /// Sends the write times of the types in `mask`.
    pub fn send_account_data_times(&self, mask: u32) {
        let times = self
            .account_data
            .iter()
            .enumerate()
            .filter(|&(i, _)| mask & (1u32 << i) != 0)
            .map(|(_, slot)| slot.time as u32)
            .collect();
        self.send(ServerMessage::AccountDataTimes {
            server_time: unix_now(),
            mask,
            times,
        });
    }
}
