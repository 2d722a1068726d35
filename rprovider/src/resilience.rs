//! Attempt bookkeeping and operational hook contracts for the retry loop.

use rcommon::ErrorPayload;

/// Position of one attempt inside the candidate/attempt loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptInfo {
    pub provider: String,
    pub model: String,
    /// 1-based attempt number within the current candidate.
    pub attempt: u32,
    pub max_attempts: u32,
}

impl AttemptInfo {
    pub fn label(&self) -> String {
        format!("{}:{}", self.provider, self.model)
    }
}

/// What a response handler decided about one transport response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome<T> {
    Done(T),
    /// Consume this attempt and try the same candidate again.
    Retry,
}

pub trait ProviderOperationHooks: Send + Sync {
    fn on_attempt_start(&self, _provider: &str, _model: &str, _attempt: u32) {}

    fn on_retry_scheduled(
        &self,
        _provider: &str,
        _model: &str,
        _attempt: u32,
        _error: &ErrorPayload,
    ) {
    }

    fn on_success(&self, _provider: &str, _model: &str, _attempts: u32) {}

    fn on_failure(&self, _provider: &str, _model: &str, _attempts: u32, _error: &ErrorPayload) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOperationHooks;

impl ProviderOperationHooks for NoopOperationHooks {}
