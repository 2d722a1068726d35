//! Runtime hooks for tool execution lifecycle events.
//!
//! ```rust
//! use rtooling::{NoopToolRuntimeHooks, ToolRuntimeHooks};
//!
//! fn assert_hooks_trait(_hooks: &dyn ToolRuntimeHooks) {}
//!
//! let hooks = NoopToolRuntimeHooks;
//! assert_hooks_trait(&hooks);
//! ```

use std::time::Duration;

use rcommon::ErrorPayload;
use serde_json::Value;

use crate::ToolContext;

/// `call` is the raw tool call object as received from the model.
pub trait ToolRuntimeHooks: Send + Sync {
    fn on_execution_start(&self, _tool_name: &str, _call: &Value, _context: Option<&ToolContext>) {}

    fn on_execution_success(
        &self,
        _tool_name: &str,
        _call: &Value,
        _result: &Value,
        _elapsed: Duration,
    ) {
    }

    fn on_execution_failure(
        &self,
        _tool_name: &str,
        _call: &Value,
        _error: &ErrorPayload,
        _elapsed: Duration,
    ) {
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopToolRuntimeHooks;

impl ToolRuntimeHooks for NoopToolRuntimeHooks {}
