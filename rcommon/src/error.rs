//! Closed error taxonomy shared by every republic crate.
//!
//! ```rust
//! use rcommon::{ErrorKind, ErrorPayload};
//!
//! let error = ErrorPayload::not_found("Anchor 'intro' was not found.");
//! assert_eq!(error.kind, ErrorKind::NotFound);
//! assert!(!error.kind.is_retryable());
//! assert_eq!(error.as_value()["kind"], "not_found");
//! ```

use std::error::Error;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::JsonMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    Config,
    Provider,
    Tool,
    Temporary,
    NotFound,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::Config => "config",
            Self::Provider => "provider",
            Self::Tool => "tool",
            Self::Temporary => "temporary",
            Self::NotFound => "not_found",
            Self::Unknown => "unknown",
        }
    }

    /// Only temporary failures are worth another attempt.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Temporary)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonMap>,
}

impl ErrorPayload {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: JsonMap) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(JsonMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Provider, message)
    }

    pub fn tool(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Tool, message)
    }

    pub fn temporary(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Temporary, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// JSON rendering used for tool result slots and tape error entries.
    pub fn as_value(&self) -> Value {
        let mut payload = JsonMap::new();
        payload.insert("kind".to_string(), Value::from(self.kind.as_str()));
        payload.insert("message".to_string(), Value::from(self.message.clone()));
        if let Some(details) = self.details.as_ref().filter(|details| !details.is_empty()) {
            payload.insert("details".to_string(), Value::Object(details.clone()));
        }
        Value::Object(payload)
    }
}

impl Display for ErrorPayload {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for ErrorPayload {}
