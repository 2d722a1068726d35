//! Structured results returned by chat operations.
//!
//! ```rust
//! use rchat::{StructuredOutput, ToolAutoResult, ToolAutoResultKind};
//! use rcommon::ErrorPayload;
//!
//! let output = StructuredOutput::from(Ok::<_, ErrorPayload>("hi".to_string()));
//! assert!(output.ok());
//! assert_eq!(output.value.as_deref(), Some("hi"));
//!
//! let failed = ToolAutoResult::error_result(ErrorPayload::tool("boom"), Vec::new(), Vec::new());
//! assert_eq!(failed.kind, ToolAutoResultKind::Error);
//! ```

use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};

use rcommon::ErrorPayload;
use rprovider::{ToolCall, Usage};
use serde_json::{Value, json};

/// A value or the error that prevented it.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredOutput<T> {
    pub value: Option<T>,
    pub error: Option<ErrorPayload>,
}

impl<T> StructuredOutput<T> {
    pub fn success(value: T) -> Self {
        Self {
            value: Some(value),
            error: None,
        }
    }

    pub fn failure(error: ErrorPayload) -> Self {
        Self {
            value: None,
            error: Some(error),
        }
    }

    pub fn ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<T, ErrorPayload> {
        match (self.value, self.error) {
            (_, Some(error)) => Err(error),
            (Some(value), None) => Ok(value),
            (None, None) => Err(ErrorPayload::unknown("structured output carried no value")),
        }
    }
}

impl<T> From<Result<T, ErrorPayload>> for StructuredOutput<T> {
    fn from(result: Result<T, ErrorPayload>) -> Self {
        match result {
            Ok(value) => Self::success(value),
            Err(error) => Self::failure(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolAutoResultKind {
    Text,
    Tools,
    Error,
}

impl ToolAutoResultKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Tools => "tools",
            Self::Error => "error",
        }
    }
}

impl Display for ToolAutoResultKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of `run_tools`: plain text, executed tools, or an error that may
/// still carry the calls and per-call results.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolAutoResult {
    pub kind: ToolAutoResultKind,
    pub text: Option<String>,
    pub tool_calls: Vec<Value>,
    pub tool_results: Vec<Value>,
    pub error: Option<ErrorPayload>,
}

impl ToolAutoResult {
    pub fn text_result(text: impl Into<String>) -> Self {
        Self {
            kind: ToolAutoResultKind::Text,
            text: Some(text.into()),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            error: None,
        }
    }

    pub fn tools_result(tool_calls: Vec<Value>, tool_results: Vec<Value>) -> Self {
        Self {
            kind: ToolAutoResultKind::Tools,
            text: None,
            tool_calls,
            tool_results,
            error: None,
        }
    }

    pub fn error_result(
        error: ErrorPayload,
        tool_calls: Vec<Value>,
        tool_results: Vec<Value>,
    ) -> Self {
        Self {
            kind: ToolAutoResultKind::Error,
            text: None,
            tool_calls,
            tool_results,
            error: Some(error),
        }
    }

    /// Text the model sent alongside its tool calls.
    pub fn with_text(mut self, text: Option<String>) -> Self {
        if text.is_some() {
            self.text = text;
        }
        self
    }

    pub fn ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of a stream, readable once it has been drained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamState {
    pub error: Option<ErrorPayload>,
    pub usage: Option<Usage>,
}

pub(crate) type SharedStreamState = Arc<Mutex<StreamState>>;

pub(crate) fn read_state(state: &SharedStreamState) -> StreamState {
    state
        .lock()
        .map(|guard| guard.clone())
        .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
}

pub(crate) fn write_state(state: &SharedStreamState, error: Option<ErrorPayload>, usage: Option<Usage>) {
    let mut guard = state
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.error = error;
    guard.usage = usage;
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Text {
        delta: String,
    },
    ToolCall {
        index: usize,
        call: ToolCall,
    },
    ToolResult {
        index: usize,
        result: Value,
    },
    Usage(Usage),
    Error(ErrorPayload),
    /// Always the last event of a stream.
    Final {
        text: Option<String>,
        tool_calls: Vec<Value>,
        tool_results: Vec<Value>,
        usage: Option<Usage>,
        ok: bool,
    },
}

impl StreamEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Usage(_) => "usage",
            Self::Error(_) => "error",
            Self::Final { .. } => "final",
        }
    }

    /// Event body in the wire shape consumers log or forward.
    pub fn data(&self) -> Value {
        match self {
            Self::Text { delta } => json!({"delta": delta}),
            Self::ToolCall { index, call } => json!({"index": index, "call": call.to_value()}),
            Self::ToolResult { index, result } => json!({"index": index, "result": result}),
            Self::Usage(usage) => usage.to_value(),
            Self::Error(error) => error.as_value(),
            Self::Final {
                text,
                tool_calls,
                tool_results,
                usage,
                ok,
            } => json!({
                "text": text,
                "tool_calls": tool_calls,
                "tool_results": tool_results,
                "usage": usage.map(Usage::to_value),
                "ok": ok,
            }),
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::Final { .. })
    }
}

#[cfg(test)]
mod tests {
    use rcommon::ErrorKind;

    use super::*;

    #[test]
    fn structured_output_reports_error_first() {
        let failed: StructuredOutput<String> =
            StructuredOutput::from(Err(ErrorPayload::temporary("busy")));
        assert!(!failed.ok());
        let error = failed.into_result().expect_err("error should surface");
        assert_eq!(error.kind, ErrorKind::Temporary);
    }

    #[test]
    fn tool_auto_result_constructors_set_kind() {
        let text = ToolAutoResult::text_result("done");
        assert_eq!(text.kind.as_str(), "text");
        assert!(text.tool_calls.is_empty());

        let tools = ToolAutoResult::tools_result(vec![json!({"id": "1"})], vec![json!("ok")]);
        assert_eq!(tools.kind, ToolAutoResultKind::Tools);
        assert!(tools.ok());
        assert!(tools.text.is_none());
    }

    #[test]
    fn stream_event_data_matches_wire_shape() {
        let call = StreamEvent::ToolCall {
            index: 0,
            call: ToolCall::new(Some("call_1".to_string()), "echo", "{}"),
        };
        assert_eq!(call.kind(), "tool_call");
        assert_eq!(call.data()["call"]["function"]["name"], "echo");

        let done = StreamEvent::Final {
            text: None,
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            usage: None,
            ok: false,
        };
        assert!(done.is_final());
        assert_eq!(done.data()["ok"], false);
        assert_eq!(done.data()["usage"], Value::Null);
    }
}
