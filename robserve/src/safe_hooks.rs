//! Panic-isolating wrappers; a misbehaving hook never aborts a chat or tool run.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use rcommon::ErrorPayload;
use rprovider::ProviderOperationHooks;
use rtooling::{ToolContext, ToolRuntimeHooks};
use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct SafeProviderHooks<H> {
    inner: H,
}

impl<H> SafeProviderHooks<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }
}

impl<H> ProviderOperationHooks for SafeProviderHooks<H>
where
    H: ProviderOperationHooks,
{
    fn on_attempt_start(&self, provider: &str, model: &str, attempt: u32) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_attempt_start(provider, model, attempt)
        }));
    }

    fn on_retry_scheduled(&self, provider: &str, model: &str, attempt: u32, error: &ErrorPayload) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_retry_scheduled(provider, model, attempt, error)
        }));
    }

    fn on_success(&self, provider: &str, model: &str, attempts: u32) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_success(provider, model, attempts)
        }));
    }

    fn on_failure(&self, provider: &str, model: &str, attempts: u32, error: &ErrorPayload) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_failure(provider, model, attempts, error)
        }));
    }
}

#[derive(Debug, Clone, Default)]
pub struct SafeToolHooks<H> {
    inner: H,
}

impl<H> SafeToolHooks<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }
}

impl<H> ToolRuntimeHooks for SafeToolHooks<H>
where
    H: ToolRuntimeHooks,
{
    fn on_execution_start(&self, tool_name: &str, call: &Value, context: Option<&ToolContext>) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_execution_start(tool_name, call, context)
        }));
    }

    fn on_execution_success(&self, tool_name: &str, call: &Value, result: &Value, elapsed: Duration) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner
                .on_execution_success(tool_name, call, result, elapsed)
        }));
    }

    fn on_execution_failure(
        &self,
        tool_name: &str,
        call: &Value,
        error: &ErrorPayload,
        elapsed: Duration,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner
                .on_execution_failure(tool_name, call, error, elapsed)
        }));
    }
}
