//! Append-only tape entries.
//!
//! ```rust
//! use rtape::{TapeEntry, TapeEntryKind};
//!
//! let entry = TapeEntry::anchor("intake", None).with_meta_value("run_id", "r1");
//! assert_eq!(entry.kind, TapeEntryKind::Anchor);
//! assert_eq!(entry.anchor_name(), Some("intake"));
//! assert_eq!(entry.id, 0);
//! ```

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rcommon::{ErrorPayload, JsonMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TapeEntryKind {
    Message,
    System,
    Anchor,
    ToolCall,
    ToolResult,
    Error,
    Event,
}

impl TapeEntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::System => "system",
            Self::Anchor => "anchor",
            Self::ToolCall => "tool_call",
            Self::ToolResult => "tool_result",
            Self::Error => "error",
            Self::Event => "event",
        }
    }
}

impl Display for TapeEntryKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TapeEntryKind {
    type Err = ErrorPayload;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "message" => Ok(Self::Message),
            "system" => Ok(Self::System),
            "anchor" => Ok(Self::Anchor),
            "tool_call" => Ok(Self::ToolCall),
            "tool_result" => Ok(Self::ToolResult),
            "error" => Ok(Self::Error),
            "event" => Ok(Self::Event),
            other => Err(ErrorPayload::invalid_input(format!(
                "Unknown tape entry kind: {other}."
            ))),
        }
    }
}

/// `id` is zero until a store appends the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TapeEntry {
    pub id: u64,
    pub kind: TapeEntryKind,
    pub payload: JsonMap,
    #[serde(default)]
    pub meta: JsonMap,
}

impl TapeEntry {
    pub fn new(kind: TapeEntryKind, payload: JsonMap) -> Self {
        Self {
            id: 0,
            kind,
            payload,
            meta: JsonMap::new(),
        }
    }

    /// Non-object messages are stored as an empty payload.
    pub fn message(message: Value) -> Self {
        let payload = match message {
            Value::Object(map) => map,
            _ => JsonMap::new(),
        };
        Self::new(TapeEntryKind::Message, payload)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(TapeEntryKind::System, object([("content", Value::from(content.into()))]))
    }

    pub fn anchor(name: impl Into<String>, state: Option<JsonMap>) -> Self {
        let mut payload = object([("name", Value::from(name.into()))]);
        if let Some(state) = state {
            payload.insert("state".to_string(), Value::Object(state));
        }
        Self::new(TapeEntryKind::Anchor, payload)
    }

    pub fn tool_call(calls: Vec<Value>) -> Self {
        Self::new(TapeEntryKind::ToolCall, object([("calls", Value::Array(calls))]))
    }

    pub fn tool_result(results: Vec<Value>) -> Self {
        Self::new(TapeEntryKind::ToolResult, object([("results", Value::Array(results))]))
    }

    pub fn error(error: &ErrorPayload) -> Self {
        let payload = match error.as_value() {
            Value::Object(map) => map,
            _ => JsonMap::new(),
        };
        Self::new(TapeEntryKind::Error, payload)
    }

    pub fn event(name: impl Into<String>, data: Value) -> Self {
        Self::new(
            TapeEntryKind::Event,
            object([("name", Value::from(name.into())), ("data", data)]),
        )
    }

    pub fn with_meta(mut self, meta: JsonMap) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_meta_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub(crate) fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    pub fn is_anchor(&self) -> bool {
        self.kind == TapeEntryKind::Anchor
    }

    pub fn anchor_name(&self) -> Option<&str> {
        if !self.is_anchor() {
            return None;
        }
        self.payload.get("name").and_then(Value::as_str)
    }

    /// Event name for `event` entries.
    pub fn event_name(&self) -> Option<&str> {
        if self.kind != TapeEntryKind::Event {
            return None;
        }
        self.payload.get("name").and_then(Value::as_str)
    }
}

fn object<const N: usize>(fields: [(&str, Value); N]) -> JsonMap {
    fields
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}
