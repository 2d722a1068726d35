use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use rcommon::ErrorPayload;

use crate::{TapeEntry, TapeStore};

#[derive(Debug, Default)]
struct Tapes {
    entries: HashMap<String, Vec<TapeEntry>>,
    next_ids: HashMap<String, u64>,
}

/// Process-local tape store. Reads return copies.
#[derive(Debug, Default)]
pub struct InMemoryTapeStore {
    tapes: Mutex<Tapes>,
}

impl InMemoryTapeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tapes(&self) -> Result<MutexGuard<'_, Tapes>, ErrorPayload> {
        self.tapes
            .lock()
            .map_err(|_| ErrorPayload::unknown("in-memory tape store lock poisoned"))
    }
}

impl TapeStore for InMemoryTapeStore {
    fn list_tapes(&self) -> Result<Vec<String>, ErrorPayload> {
        let mut names = self.tapes()?.entries.keys().cloned().collect::<Vec<_>>();
        names.sort();
        Ok(names)
    }

    fn read(&self, tape: &str) -> Result<Option<Vec<TapeEntry>>, ErrorPayload> {
        Ok(self.tapes()?.entries.get(tape).cloned())
    }

    fn reset(&self, tape: &str) -> Result<(), ErrorPayload> {
        let mut tapes = self.tapes()?;
        tapes.entries.remove(tape);
        tapes.next_ids.remove(tape);
        Ok(())
    }

    fn append(&self, tape: &str, entry: TapeEntry) -> Result<TapeEntry, ErrorPayload> {
        let mut tapes = self.tapes()?;
        let next_id = tapes.next_ids.entry(tape.to_string()).or_insert(1);
        let stored = entry.with_id(*next_id);
        *next_id += 1;
        tapes
            .entries
            .entry(tape.to_string())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }
}
