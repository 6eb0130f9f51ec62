#[cfg(test)]
mod tests;

pub mod result;

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, io, path::PathBuf};
use thiserror::Error;
use types::Value;

/// Identifier of a block within one relation's heap file.
/// 1-based and dense: block ids are assigned monotonically and never recycled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

/// Identifier of a record within one block. 1-based; id 0 is the block header.
pub type RecordId = u16;

/// Stable identity of a logical row within one table.
///
/// A handle is a value, not a reference: it does not pin the row, and it
/// becomes invalid once the row is deleted. Record ids are never reused
/// within a block, so a later insert cannot alias a deleted handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle {
    pub block_id: BlockId,
    pub record_id: RecordId,
}

impl Handle {
    pub fn new(block_id: BlockId, record_id: RecordId) -> Self {
        Self {
            block_id,
            record_id,
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.block_id.0, self.record_id)
    }
}

/// A row keyed by column name.
///
/// Insertion order is irrelevant: the physical order of marshalled values is
/// always the table's declared column list.
pub type Row = HashMap<String, Value>;

/// Canonical error type shared across the engine.
#[derive(Error, Debug)]
pub enum DbError {
    /// A block cannot fit a new or grown record.
    #[error("no room: {0}")]
    NoRoom(String),
    /// Schema mismatch: missing or unknown column, unsupported type,
    /// attempt to drop a schema relation.
    #[error("relation: {0}")]
    Relation(String),
    /// Statement dispatch problem in the DDL executor.
    #[error("exec: {0}")]
    Exec(String),
    /// Page-manager or heap-file fault.
    #[error("storage: {0}")]
    Storage(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result alias that carries a `DbError`.
pub type DbResult<T> = Result<T, DbError>;

/// Runtime configuration for the storage engine.
///
/// # Example
/// ```
/// use common::Config;
/// use std::path::PathBuf;
///
/// let config = Config::builder().data_dir(PathBuf::from("./my_db")).build();
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, bon::Builder)]
pub struct Config {
    /// Directory heap files live under; a relation `t` is stored at
    /// `<data_dir>/t.db`.
    #[builder(default = PathBuf::from("./db_data"))]
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./db_data"),
        }
    }
}

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::result::QueryResult;
    pub use crate::{BlockId, Config, DbError, DbResult, Handle, RecordId, Row};
    pub use types::{SqlType, Value};
}
