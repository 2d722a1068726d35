//! Rules for turning tape entries into prompt messages.
//!
//! ```rust
//! use rtape::{AnchorSelector, TapeContext, TapeEntry};
//!
//! let entries = vec![
//!     TapeEntry::message(serde_json::json!({"role": "user", "content": "old"})),
//!     TapeEntry::anchor("phase-2", None),
//!     TapeEntry::message(serde_json::json!({"role": "user", "content": "new"})),
//! ];
//!
//! let recent = TapeContext::default().messages(&entries).expect("slice");
//! assert_eq!(recent.len(), 1);
//!
//! let whole = TapeContext::default().with_anchor(AnchorSelector::WholeTape);
//! assert_eq!(whole.messages(&entries).expect("slice").len(), 2);
//! ```

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use rcommon::ErrorPayload;
use serde_json::Value;

use crate::query::{anchor_not_found, find_anchor_backward};
use crate::{TapeEntry, TapeEntryKind, TapeQuery};

/// Turns sliced entries into outbound messages.
pub type MessageSelector = Arc<dyn Fn(&[TapeEntry]) -> Vec<Value> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AnchorSelector {
    /// Entries after the most recent anchor of any name.
    #[default]
    LastAnchor,
    WholeTape,
    Named(String),
}

impl From<&str> for AnchorSelector {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for AnchorSelector {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

#[derive(Clone, Default)]
pub struct TapeContext {
    pub anchor: AnchorSelector,
    pub select: Option<MessageSelector>,
}

impl Debug for TapeContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapeContext")
            .field("anchor", &self.anchor)
            .field("select", &self.select.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl TapeContext {
    pub fn new(anchor: impl Into<AnchorSelector>) -> Self {
        Self {
            anchor: anchor.into(),
            select: None,
        }
    }

    pub fn with_anchor(&self, anchor: impl Into<AnchorSelector>) -> Self {
        Self {
            anchor: anchor.into(),
            select: self.select.clone(),
        }
    }

    pub fn with_select<F>(&self, select: F) -> Self
    where
        F: Fn(&[TapeEntry]) -> Vec<Value> + Send + Sync + 'static,
    {
        Self {
            anchor: self.anchor.clone(),
            select: Some(Arc::new(select)),
        }
    }

    /// Scopes `query` to this context's anchor.
    pub fn build_query(&self, query: &TapeQuery) -> TapeQuery {
        match &self.anchor {
            AnchorSelector::LastAnchor => query.last_anchor(),
            AnchorSelector::WholeTape => query.clone(),
            AnchorSelector::Named(name) => query.after_anchor(name.clone()),
        }
    }

    /// Window of `entries` after the selected anchor.
    ///
    /// A tape without anchors gives an empty window for `LastAnchor`; a
    /// missing named anchor is `NotFound`.
    pub fn slice<'a>(&self, entries: &'a [TapeEntry]) -> Result<&'a [TapeEntry], ErrorPayload> {
        match &self.anchor {
            AnchorSelector::WholeTape => Ok(entries),
            AnchorSelector::LastAnchor => Ok(match find_anchor_backward(entries, None) {
                Some(index) => &entries[index + 1..],
                None => &[],
            }),
            AnchorSelector::Named(name) => find_anchor_backward(entries, Some(name.as_str()))
                .map(|index| &entries[index + 1..])
                .ok_or_else(|| anchor_not_found(name)),
        }
    }

    pub fn build_messages(&self, entries: &[TapeEntry]) -> Vec<Value> {
        match &self.select {
            Some(select) => select(entries),
            None => default_messages(entries),
        }
    }

    /// `slice` followed by `build_messages`.
    pub fn messages(&self, entries: &[TapeEntry]) -> Result<Vec<Value>, ErrorPayload> {
        Ok(self.build_messages(self.slice(entries)?))
    }
}

/// Payloads of `message` entries, in order.
pub fn default_messages(entries: &[TapeEntry]) -> Vec<Value> {
    entries
        .iter()
        .filter(|entry| entry.kind == TapeEntryKind::Message)
        .map(|entry| Value::Object(entry.payload.clone()))
        .collect()
}
