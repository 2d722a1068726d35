//! Faults raised by tool handlers and their mapping onto the shared taxonomy.
//!
//! ```rust
//! use rcommon::ErrorKind;
//! use rtooling::ToolError;
//!
//! let error = ToolError::execution("disk full").into_payload("save");
//! assert_eq!(error.kind, ErrorKind::Tool);
//! assert_eq!(error.message, "Tool 'save' execution failed.");
//! ```

use std::error::Error;
use std::fmt::{Display, Formatter};

use rcommon::ErrorPayload;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorKind {
    /// Arguments did not satisfy the tool's declared parameter schema.
    InvalidArguments,
    Execution,
    /// The handler already produced a classified error.
    Payload,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
    pub field_errors: Vec<Value>,
    payload: Option<ErrorPayload>,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field_errors: Vec::new(),
            payload: None,
        }
    }

    /// Validation failure with per-field entries shaped `{loc, msg, type}`.
    pub fn invalid_arguments(field_errors: Vec<Value>) -> Self {
        let message = field_errors
            .iter()
            .filter_map(|entry| entry.get("msg").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("; ");
        Self {
            field_errors,
            ..Self::new(ToolErrorKind::InvalidArguments, message)
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Execution, message)
    }

    pub fn payload(&self) -> Option<&ErrorPayload> {
        self.payload.as_ref()
    }

    /// Converts the fault into the error surfaced for a call to `tool_name`.
    pub fn into_payload(self, tool_name: &str) -> ErrorPayload {
        match self.kind {
            ToolErrorKind::InvalidArguments => ErrorPayload::invalid_input(format!(
                "Tool '{tool_name}' argument validation failed."
            ))
            .with_detail("errors", Value::Array(self.field_errors)),
            ToolErrorKind::Execution => {
                ErrorPayload::tool(format!("Tool '{tool_name}' execution failed."))
                    .with_detail("error", self.message)
            }
            ToolErrorKind::Payload => self.payload.unwrap_or_else(|| {
                ErrorPayload::tool(format!("Tool '{tool_name}' execution failed."))
                    .with_detail("error", self.message)
            }),
        }
    }
}

impl From<ErrorPayload> for ToolError {
    fn from(payload: ErrorPayload) -> Self {
        Self {
            kind: ToolErrorKind::Payload,
            message: payload.message.clone(),
            field_errors: Vec::new(),
            payload: Some(payload),
        }
    }
}

impl Display for ToolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for ToolError {}
