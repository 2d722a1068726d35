//! Tape storage capability and store construction.

use std::path::PathBuf;
use std::sync::Arc;

use rcommon::ErrorPayload;

use crate::backends::sqlite::default_sqlite_path;
use crate::{InMemoryTapeStore, SqliteTapeStore, TapeEntry, TapeQuery};

/// Append-only storage for named tapes.
///
/// Stores assign entry ids on append, starting at 1 per tape; `reset`
/// removes a tape and restarts its numbering.
pub trait TapeStore: Send + Sync {
    /// Tape names in ascending order.
    fn list_tapes(&self) -> Result<Vec<String>, ErrorPayload>;

    /// Copies of every entry of `tape`, or `None` when the tape does not exist.
    fn read(&self, tape: &str) -> Result<Option<Vec<TapeEntry>>, ErrorPayload>;

    fn reset(&self, tape: &str) -> Result<(), ErrorPayload>;

    /// Stores `entry` and returns it with its assigned id.
    fn append(&self, tape: &str, entry: TapeEntry) -> Result<TapeEntry, ErrorPayload>;

    fn fetch_all(&self, query: &TapeQuery) -> Result<Vec<TapeEntry>, ErrorPayload> {
        let entries = self.read(query.tape())?.unwrap_or_default();
        query.apply(entries)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapeStoreConfig {
    Sqlite { path: PathBuf },
    InMemory,
}

impl Default for TapeStoreConfig {
    fn default() -> Self {
        Self::InMemory
    }
}

impl TapeStoreConfig {
    /// SQLite store at `REPUBLIC_TAPE_PATH`, or under the home directory.
    pub fn default_sqlite() -> Self {
        Self::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

pub fn create_tape_store(config: TapeStoreConfig) -> Result<Arc<dyn TapeStore>, ErrorPayload> {
    match config {
        TapeStoreConfig::Sqlite { path } => Ok(Arc::new(SqliteTapeStore::new(path)?)),
        TapeStoreConfig::InMemory => Ok(Arc::new(InMemoryTapeStore::new())),
    }
}
