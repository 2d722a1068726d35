//! Provider seam and execution orchestrator for republic.
//!
//! Transports are injected through [`ProviderClientFactory`]; [`LLMCore`]
//! resolves `provider:model` candidates, caches clients, and runs the
//! sequential retry/fallback loop.

mod classify;
mod credentials;
mod error;
mod model;
mod orchestrator;
mod provider;
mod registry;
mod resilience;
mod stream;

pub mod prelude;

pub use classify::{ErrorClassifier, classify_transport_error, default_error_kind};
pub use credentials::CredentialSetting;
pub use error::{TransportError, TransportErrorKind};
pub use model::{
    ChatChunk, ChatResponse, CompletionRequest, FunctionCall, ToolCall, ToolCallDelta, Usage,
};
pub use orchestrator::{CallParams, LLMCore};
pub use provider::{
    AsyncCompletionOutput, ClientSettings, CompletionOutput, ProviderClient,
    ProviderClientFactory, ProviderFuture,
};
pub use registry::ProviderClientRegistry;
pub use resilience::{AttemptInfo, AttemptOutcome, NoopOperationHooks, ProviderOperationHooks};
pub use stream::{BoxedChunkStream, ChunkIter, ChunkStream, VecChunkStream};
