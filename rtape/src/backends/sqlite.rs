use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rcommon::{ErrorPayload, JsonMap};
use rusqlite::{Connection, params};

use crate::{TapeEntry, TapeEntryKind, TapeStore};

/// Tape store persisted to a single SQLite database file.
#[derive(Debug)]
pub struct SqliteTapeStore {
    connection: Mutex<Connection>,
}

impl SqliteTapeStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, ErrorPayload> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|error| {
                ErrorPayload::unknown(format!("failed to create sqlite parent directory: {error}"))
            })?;
        }

        let connection = Connection::open(path).map_err(|error| {
            ErrorPayload::unknown(format!("failed to open sqlite database: {error}"))
        })?;
        Self::from_connection(connection)
    }

    pub fn new_in_memory() -> Result<Self, ErrorPayload> {
        let connection = Connection::open_in_memory().map_err(|error| {
            ErrorPayload::unknown(format!("failed to open in-memory sqlite database: {error}"))
        })?;
        Self::from_connection(connection)
    }

    fn from_connection(connection: Connection) -> Result<Self, ErrorPayload> {
        connection
            .busy_timeout(Duration::from_secs(5))
            .map_err(|error| {
                ErrorPayload::unknown(format!("failed to configure sqlite busy timeout: {error}"))
            })?;
        let store = Self {
            connection: Mutex::new(connection),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, ErrorPayload> {
        self.connection
            .lock()
            .map_err(|_| ErrorPayload::unknown("sqlite tape store lock poisoned"))
    }

    fn initialize_schema(&self) -> Result<(), ErrorPayload> {
        let conn = self.connection()?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS tape_entries (
                tape TEXT NOT NULL,
                entry_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                meta_json TEXT NOT NULL,
                PRIMARY KEY (tape, entry_id)
            );
            ",
        )
        .map_err(|error| {
            ErrorPayload::unknown(format!("failed to initialize sqlite schema: {error}"))
        })?;

        Ok(())
    }
}

impl TapeStore for SqliteTapeStore {
    fn list_tapes(&self) -> Result<Vec<String>, ErrorPayload> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT tape FROM tape_entries ORDER BY tape ASC")
            .map_err(|error| {
                ErrorPayload::unknown(format!("failed to prepare tape list query: {error}"))
            })?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|error| ErrorPayload::unknown(format!("failed to query tapes: {error}")))?;

        let mut tapes = Vec::new();
        for row in rows {
            tapes.push(row.map_err(|error| {
                ErrorPayload::unknown(format!("failed to read tape row: {error}"))
            })?);
        }
        Ok(tapes)
    }

    fn read(&self, tape: &str) -> Result<Option<Vec<TapeEntry>>, ErrorPayload> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "
                SELECT entry_id, kind, payload_json, meta_json
                FROM tape_entries
                WHERE tape = ?1
                ORDER BY entry_id ASC
                ",
            )
            .map_err(|error| {
                ErrorPayload::unknown(format!("failed to prepare tape entry query: {error}"))
            })?;
        let rows = stmt
            .query_map(params![tape], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(|error| {
                ErrorPayload::unknown(format!("failed to query tape entries: {error}"))
            })?;

        let mut entries = Vec::new();
        for row in rows {
            let (entry_id, kind, payload_json, meta_json) = row.map_err(|error| {
                ErrorPayload::unknown(format!("failed to read tape entry row: {error}"))
            })?;
            entries.push(TapeEntry {
                id: entry_id as u64,
                kind: kind.parse::<TapeEntryKind>()?,
                payload: decode_object(&payload_json, "payload")?,
                meta: decode_object(&meta_json, "meta")?,
            });
        }

        if entries.is_empty() {
            return Ok(None);
        }
        Ok(Some(entries))
    }

    fn reset(&self, tape: &str) -> Result<(), ErrorPayload> {
        let conn = self.connection()?;
        conn.execute("DELETE FROM tape_entries WHERE tape = ?1", params![tape])
            .map_err(|error| ErrorPayload::unknown(format!("failed to reset tape: {error}")))?;
        Ok(())
    }

    fn append(&self, tape: &str, entry: TapeEntry) -> Result<TapeEntry, ErrorPayload> {
        let payload_json = encode_object(&entry.payload, "payload")?;
        let meta_json = encode_object(&entry.meta, "meta")?;

        let mut conn = self.connection()?;
        let tx = conn.transaction().map_err(|error| {
            ErrorPayload::unknown(format!("failed to begin append transaction: {error}"))
        })?;
        let next_id = tx
            .query_row(
                "SELECT COALESCE(MAX(entry_id), 0) + 1 FROM tape_entries WHERE tape = ?1",
                params![tape],
                |row| row.get::<_, i64>(0),
            )
            .map_err(|error| {
                ErrorPayload::unknown(format!("failed to allocate tape entry id: {error}"))
            })?;
        tx.execute(
            "
            INSERT INTO tape_entries (tape, entry_id, kind, payload_json, meta_json)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![tape, next_id, entry.kind.as_str(), payload_json, meta_json],
        )
        .map_err(|error| ErrorPayload::unknown(format!("failed to append tape entry: {error}")))?;
        tx.commit().map_err(|error| {
            ErrorPayload::unknown(format!("failed to commit tape entry: {error}"))
        })?;

        Ok(entry.with_id(next_id as u64))
    }
}

fn encode_object(value: &JsonMap, field: &str) -> Result<String, ErrorPayload> {
    serde_json::to_string(value).map_err(|error| {
        ErrorPayload::unknown(format!("failed to serialize tape entry {field}: {error}"))
    })
}

fn decode_object(raw: &str, field: &str) -> Result<JsonMap, ErrorPayload> {
    serde_json::from_str(raw).map_err(|error| {
        ErrorPayload::unknown(format!("failed to decode tape entry {field} JSON: {error}"))
    })
}

pub(crate) fn default_sqlite_path() -> PathBuf {
    if let Some(explicit) = std::env::var_os("REPUBLIC_TAPE_PATH") {
        return PathBuf::from(explicit);
    }

    if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        return PathBuf::from(home).join(".republic").join("tapes.sqlite3");
    }

    PathBuf::from("tapes.sqlite3")
}
