//! Tracing-based hooks for provider attempts and tool execution.
//!
//! ```rust
//! use robserve::TracingObservabilityHooks;
//! use rtooling::ToolRuntimeHooks;
//!
//! fn accepts_tool_hooks(_hooks: &dyn ToolRuntimeHooks) {}
//!
//! let hooks = TracingObservabilityHooks;
//! accepts_tool_hooks(&hooks);
//! ```

use std::time::Duration;

use rcommon::ErrorPayload;
use rprovider::ProviderOperationHooks;
use rtooling::{ToolContext, ToolRuntimeHooks};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObservabilityHooks;

impl ProviderOperationHooks for TracingObservabilityHooks {
    fn on_attempt_start(&self, provider: &str, model: &str, attempt: u32) {
        tracing::info!(
            phase = "provider",
            event = "attempt_start",
            provider,
            model,
            attempt
        );
    }

    fn on_retry_scheduled(&self, provider: &str, model: &str, attempt: u32, error: &ErrorPayload) {
        tracing::warn!(
            phase = "provider",
            event = "retry_scheduled",
            provider,
            model,
            attempt,
            error_kind = %error.kind,
            retryable = error.is_retryable(),
            error = %error
        );
    }

    fn on_success(&self, provider: &str, model: &str, attempts: u32) {
        tracing::info!(
            phase = "provider",
            event = "success",
            provider,
            model,
            attempts
        );
    }

    fn on_failure(&self, provider: &str, model: &str, attempts: u32, error: &ErrorPayload) {
        tracing::error!(
            phase = "provider",
            event = "failure",
            provider,
            model,
            attempts,
            error_kind = %error.kind,
            retryable = error.is_retryable(),
            error = %error
        );
    }
}

impl ToolRuntimeHooks for TracingObservabilityHooks {
    fn on_execution_start(&self, tool_name: &str, call: &Value, context: Option<&ToolContext>) {
        tracing::info!(
            phase = "tool",
            event = "execution_start",
            tool_name,
            call_id = call_id(call),
            run_id = context.map(|context| context.run_id.as_str()),
            tape = context.and_then(|context| context.tape.as_deref())
        );
    }

    fn on_execution_success(&self, tool_name: &str, call: &Value, _result: &Value, elapsed: Duration) {
        tracing::info!(
            phase = "tool",
            event = "execution_success",
            tool_name,
            call_id = call_id(call),
            elapsed_ms = elapsed.as_millis() as u64
        );
    }

    fn on_execution_failure(
        &self,
        tool_name: &str,
        call: &Value,
        error: &ErrorPayload,
        elapsed: Duration,
    ) {
        tracing::error!(
            phase = "tool",
            event = "execution_failure",
            tool_name,
            call_id = call_id(call),
            elapsed_ms = elapsed.as_millis() as u64,
            error_kind = %error.kind,
            error = %error
        );
    }
}

fn call_id(call: &Value) -> Option<&str> {
    call.get("id").and_then(Value::as_str)
}
