//! Common `rprovider` imports for downstream crates.

pub use crate::{
    AsyncCompletionOutput, AttemptInfo, AttemptOutcome, BoxedChunkStream, CallParams, ChatChunk,
    ChatResponse, ChunkIter, ClientSettings, CompletionOutput, CompletionRequest,
    CredentialSetting, ErrorClassifier, LLMCore, NoopOperationHooks, ProviderClient,
    ProviderClientFactory, ProviderClientRegistry, ProviderFuture, ProviderOperationHooks,
    ToolCall, ToolCallDelta, TransportError, TransportErrorKind, Usage, VecChunkStream,
};
pub use rcommon::{BoxFuture, ErrorKind, ErrorPayload, JsonMap};
