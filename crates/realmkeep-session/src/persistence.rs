//! The persistence collaborator and the statements the session issues.
//!
//! The session never builds SQL from strings at runtime: every statement
//! it runs is one of the named constructors on [`Statement`], with
//! positional [`SqlValue`] parameters. A [`Database`] implementation is
//! free to execute them synchronously or hand them to a worker, as long
//! as statements from one session run in the order they were issued.

use std::fmt;

use realmkeep_protocol::{AccountId, PlayerGuid};

use crate::PersistenceError;

// ---------------------------------------------------------------------------
// Values and rows
// ---------------------------------------------------------------------------

/// A positional statement parameter or a result column.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    U32(u32),
    U64(u64),
    Text(String),
    Null,
}

impl From<u32> for SqlValue {
    fn from(value: u32) -> Self {
        Self::U32(value)
    }
}

impl From<u64> for SqlValue {
    fn from(value: u64) -> Self {
        Self::U64(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// One result row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row(pub Vec<SqlValue>);

impl Row {
    pub fn get_u32(&self, index: usize) -> Result<u32, PersistenceError> {
        match self.0.get(index) {
            Some(SqlValue::U32(v)) => Ok(*v),
            Some(SqlValue::U64(v)) => u32::try_from(*v).map_err(|_| PersistenceError::Column { index }),
            _ => Err(PersistenceError::Column { index }),
        }
    }

    pub fn get_u64(&self, index: usize) -> Result<u64, PersistenceError> {
        match self.0.get(index) {
            Some(SqlValue::U64(v)) => Ok(*v),
            Some(SqlValue::U32(v)) => Ok(u64::from(*v)),
            _ => Err(PersistenceError::Column { index }),
        }
    }

    pub fn get_string(&self, index: usize) -> Result<String, PersistenceError> {
        match self.0.get(index) {
            Some(SqlValue::Text(v)) => Ok(v.clone()),
            Some(SqlValue::Null) => Ok(String::new()),
            _ => Err(PersistenceError::Column { index }),
        }
    }
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

/// A prepared statement with its positional parameters bound.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Stable name, used by implementations to cache the prepared form
    /// and by tests to assert on what ran.
    pub name: &'static str,
    pub sql: &'static str,
    pub params: Vec<SqlValue>,
}

impl Statement {
    fn new(name: &'static str, sql: &'static str, params: Vec<SqlValue>) -> Self {
        Self { name, sql, params }
    }

    /// Clears the account's "online on this realm" marker (login database).
    pub fn account_inactive(account: AccountId) -> Self {
        Self::new(
            "account_inactive",
            "UPDATE account SET active_realm_id = ? WHERE id = ?",
            vec![0u32.into(), account.0.into()],
        )
    }

    /// Marks one character offline (character database).
    pub fn character_offline(guid: PlayerGuid) -> Self {
        Self::new(
            "character_offline",
            "UPDATE characters SET online = 0 WHERE guid = ?",
            vec![guid.0.into()],
        )
    }

    pub fn select_account_data(account: AccountId) -> Self {
        Self::new(
            "select_account_data",
            "SELECT type, time, data FROM account_data WHERE account = ?",
            vec![account.0.into()],
        )
    }

    pub fn select_character_account_data(guid: PlayerGuid) -> Self {
        Self::new(
            "select_character_account_data",
            "SELECT type, time, data FROM character_account_data WHERE guid = ?",
            vec![guid.0.into()],
        )
    }

    pub fn delete_account_data(account: AccountId, data_type: u32) -> Self {
        Self::new(
            "delete_account_data",
            "DELETE FROM account_data WHERE account = ? AND type = ?",
            vec![account.0.into(), data_type.into()],
        )
    }

    pub fn insert_account_data(account: AccountId, data_type: u32, time: u64, data: &str) -> Self {
        Self::new(
            "insert_account_data",
            "INSERT INTO account_data VALUES (?, ?, ?, ?)",
            vec![account.0.into(), data_type.into(), time.into(), data.into()],
        )
    }

    pub fn delete_character_account_data(guid: PlayerGuid, data_type: u32) -> Self {
        Self::new(
            "delete_character_account_data",
            "DELETE FROM character_account_data WHERE guid = ? AND type = ?",
            vec![guid.0.into(), data_type.into()],
        )
    }

    pub fn insert_character_account_data(
        guid: PlayerGuid,
        data_type: u32,
        time: u64,
        data: &str,
    ) -> Self {
        Self::new(
            "insert_character_account_data",
            "INSERT INTO character_account_data VALUES (?, ?, ?, ?)",
            vec![guid.0.into(), data_type.into(), time.into(), data.into()],
        )
    }

    pub fn select_tutorials(account: AccountId) -> Self {
        Self::new(
            "select_tutorials",
            "SELECT tut0, tut1, tut2, tut3, tut4, tut5, tut6, tut7 FROM character_tutorial WHERE account = ?",
            vec![account.0.into()],
        )
    }

    pub fn update_tutorials(account: AccountId, flags: &[u32; 8]) -> Self {
        let mut params: Vec<SqlValue> = flags.iter().map(|&f| f.into()).collect();
        params.push(account.0.into());
        Self::new(
            "update_tutorials",
            "UPDATE character_tutorial SET tut0 = ?, tut1 = ?, tut2 = ?, tut3 = ?, tut4 = ?, tut5 = ?, tut6 = ?, tut7 = ? WHERE account = ?",
            params,
        )
    }

    pub fn insert_tutorials(account: AccountId, flags: &[u32; 8]) -> Self {
        let mut params: Vec<SqlValue> = vec![account.0.into()];
        params.extend(flags.iter().map(|&f| SqlValue::from(f)));
        Self::new(
            "insert_tutorials",
            "INSERT INTO character_tutorial (account, tut0, tut1, tut2, tut3, tut4, tut5, tut6, tut7) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params,
        )
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// Statement execution against one logical database (login or character).
pub trait Database: Send + Sync {
    /// Runs a statement that returns no rows.
    fn execute(&self, statement: Statement) -> Result<(), PersistenceError>;

    /// Runs a query. `Ok(None)` means the query matched no rows.
    fn query(&self, statement: Statement) -> Result<Option<Vec<Row>>, PersistenceError>;

    fn begin_transaction(&self) -> Result<(), PersistenceError>;

    fn commit_transaction(&self) -> Result<(), PersistenceError>;

    /// Discards the open transaction.
    fn rollback_transaction(&self) -> Result<(), PersistenceError>;
}
