//! Immutable query builder over a single tape.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use rtape::{InMemoryTapeStore, TapeEntry, TapeEntryKind, TapeQuery, TapeStore};
//!
//! let store = Arc::new(InMemoryTapeStore::new());
//! store.append("ops", TapeEntry::anchor("start", None)).expect("append");
//! store
//!     .append("ops", TapeEntry::message(serde_json::json!({"role": "user", "content": "a"})))
//!     .expect("append");
//!
//! let base = TapeQuery::new("ops", store);
//! let scoped = base.after_anchor("start").kinds([TapeEntryKind::Message]);
//! assert_eq!(scoped.all().expect("query should run").len(), 1);
//! assert_eq!(base.all().expect("base query unchanged").len(), 2);
//! ```

use std::sync::Arc;

use rcommon::ErrorPayload;

use crate::{TapeEntry, TapeEntryKind, TapeStore};

#[derive(Clone)]
pub struct TapeQuery {
    tape: String,
    store: Arc<dyn TapeStore>,
    after_anchor: Option<String>,
    after_last: bool,
    between: Option<(String, String)>,
    kinds: Vec<TapeEntryKind>,
    limit: Option<usize>,
}

impl std::fmt::Debug for TapeQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapeQuery")
            .field("tape", &self.tape)
            .field("after_anchor", &self.after_anchor)
            .field("after_last", &self.after_last)
            .field("between", &self.between)
            .field("kinds", &self.kinds)
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

impl TapeQuery {
    pub fn new(tape: impl Into<String>, store: Arc<dyn TapeStore>) -> Self {
        Self {
            tape: tape.into(),
            store,
            after_anchor: None,
            after_last: false,
            between: None,
            kinds: Vec::new(),
            limit: None,
        }
    }

    /// Entries after the nearest anchor called `name`. An empty name clears
    /// any anchor restriction.
    pub fn after_anchor(&self, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            after_anchor: (!name.is_empty()).then_some(name),
            after_last: false,
            ..self.clone()
        }
    }

    /// Entries after the most recent anchor of any name.
    pub fn last_anchor(&self) -> Self {
        Self {
            after_anchor: None,
            after_last: true,
            ..self.clone()
        }
    }

    pub fn between_anchors(&self, start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            between: Some((start.into(), end.into())),
            ..self.clone()
        }
    }

    pub fn kinds(&self, kinds: impl IntoIterator<Item = TapeEntryKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
            ..self.clone()
        }
    }

    pub fn limit(&self, limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..self.clone()
        }
    }

    pub fn tape(&self) -> &str {
        &self.tape
    }

    pub fn store(&self) -> Arc<dyn TapeStore> {
        Arc::clone(&self.store)
    }

    pub fn all(&self) -> Result<Vec<TapeEntry>, ErrorPayload> {
        self.store.fetch_all(self)
    }

    /// Slices an already-read entry list: anchor window, then kinds, then limit.
    pub fn apply(&self, entries: Vec<TapeEntry>) -> Result<Vec<TapeEntry>, ErrorPayload> {
        let (start, end) = self.window(&entries)?;
        let mut selected = entries
            .into_iter()
            .skip(start)
            .take(end.saturating_sub(start))
            .filter(|entry| self.kinds.is_empty() || self.kinds.contains(&entry.kind))
            .collect::<Vec<_>>();
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        Ok(selected)
    }

    fn window(&self, entries: &[TapeEntry]) -> Result<(usize, usize), ErrorPayload> {
        let len = entries.len();

        if let Some((start_name, end_name)) = &self.between {
            let start = find_anchor_backward(entries, Some(start_name.as_str()))
                .ok_or_else(|| anchor_not_found(start_name))?;
            let end = entries[start + 1..]
                .iter()
                .position(|entry| entry.anchor_name() == Some(end_name.as_str()))
                .map(|offset| start + 1 + offset)
                .ok_or_else(|| anchor_not_found(end_name))?;
            return Ok((start + 1, end));
        }

        if self.after_last {
            let anchor = find_anchor_backward(entries, None)
                .ok_or_else(|| ErrorPayload::not_found("No anchors found in tape."))?;
            return Ok((anchor + 1, len));
        }

        if let Some(name) = &self.after_anchor {
            let anchor = find_anchor_backward(entries, Some(name.as_str()))
                .ok_or_else(|| anchor_not_found(name))?;
            return Ok((anchor + 1, len));
        }

        Ok((0, len))
    }
}

/// Index of the nearest anchor scanning from the end; any anchor when `name`
/// is `None`.
pub(crate) fn find_anchor_backward(entries: &[TapeEntry], name: Option<&str>) -> Option<usize> {
    entries.iter().rposition(|entry| {
        entry.is_anchor() && name.is_none_or(|wanted| entry.anchor_name() == Some(wanted))
    })
}

pub(crate) fn anchor_not_found(name: &str) -> ErrorPayload {
    ErrorPayload::not_found(format!("Anchor '{name}' was not found."))
}
