//! Metrics-based hooks for provider attempts and tool execution.
//!
//! ```rust
//! use robserve::MetricsObservabilityHooks;
//! use rprovider::ProviderOperationHooks;
//!
//! fn accepts_provider_hooks(_hooks: &dyn ProviderOperationHooks) {}
//!
//! let hooks = MetricsObservabilityHooks;
//! accepts_provider_hooks(&hooks);
//! ```

use std::time::Duration;

use rcommon::ErrorPayload;
use rprovider::ProviderOperationHooks;
use rtooling::{ToolContext, ToolRuntimeHooks};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObservabilityHooks;

impl ProviderOperationHooks for MetricsObservabilityHooks {
    fn on_attempt_start(&self, provider: &str, model: &str, _attempt: u32) {
        metrics::counter!(
            "republic_provider_attempt_start_total",
            "provider" => provider.to_string(),
            "model" => model.to_string()
        )
        .increment(1);
    }

    fn on_retry_scheduled(&self, provider: &str, model: &str, _attempt: u32, error: &ErrorPayload) {
        metrics::counter!(
            "republic_provider_retry_scheduled_total",
            "provider" => provider.to_string(),
            "model" => model.to_string(),
            "error_kind" => error.kind.as_str()
        )
        .increment(1);
    }

    fn on_success(&self, provider: &str, model: &str, attempts: u32) {
        metrics::counter!(
            "republic_provider_success_total",
            "provider" => provider.to_string(),
            "model" => model.to_string()
        )
        .increment(1);
        metrics::histogram!(
            "republic_provider_attempts",
            "provider" => provider.to_string(),
            "model" => model.to_string(),
            "outcome" => "success"
        )
        .record(f64::from(attempts));
    }

    fn on_failure(&self, provider: &str, model: &str, attempts: u32, error: &ErrorPayload) {
        metrics::counter!(
            "republic_provider_failure_total",
            "provider" => provider.to_string(),
            "model" => model.to_string(),
            "error_kind" => error.kind.as_str()
        )
        .increment(1);
        metrics::histogram!(
            "republic_provider_attempts",
            "provider" => provider.to_string(),
            "model" => model.to_string(),
            "outcome" => "failure"
        )
        .record(f64::from(attempts));
    }
}

impl ToolRuntimeHooks for MetricsObservabilityHooks {
    fn on_execution_start(&self, tool_name: &str, _call: &Value, _context: Option<&ToolContext>) {
        metrics::counter!(
            "republic_tool_execution_start_total",
            "tool_name" => tool_name.to_string()
        )
        .increment(1);
    }

    fn on_execution_success(&self, tool_name: &str, _call: &Value, _result: &Value, elapsed: Duration) {
        metrics::counter!(
            "republic_tool_execution_success_total",
            "tool_name" => tool_name.to_string()
        )
        .increment(1);
        metrics::histogram!(
            "republic_tool_execution_latency_seconds",
            "tool_name" => tool_name.to_string(),
            "outcome" => "success"
        )
        .record(elapsed.as_secs_f64());
    }

    fn on_execution_failure(
        &self,
        tool_name: &str,
        _call: &Value,
        error: &ErrorPayload,
        elapsed: Duration,
    ) {
        metrics::counter!(
            "republic_tool_execution_failure_total",
            "tool_name" => tool_name.to_string(),
            "error_kind" => error.kind.as_str()
        )
        .increment(1);
        metrics::histogram!(
            "republic_tool_execution_latency_seconds",
            "tool_name" => tool_name.to_string(),
            "outcome" => "failure"
        )
        .record(elapsed.as_secs_f64());
    }
}
