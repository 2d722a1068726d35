//! Tape-first LLM client.
//!
//! This crate is the single dependency for most applications. It wires the
//! orchestrator, tool runtime, tape store, and chat client behind [`LLM`],
//! and re-exports the workspace crates.

mod builder;
mod llm;
mod macros;

pub mod prelude;

pub use rchat;
pub use rcommon;
pub use robserve;
pub use rprovider;
pub use rtape;
pub use rtooling;
pub use serde_json;

pub use builder::{DEFAULT_MODEL, LLMBuilder};
pub use llm::LLM;

pub use rchat::{
    AsyncStreamEvents, AsyncTextStream, ChatClient, ChatRequest, StreamEvent, StreamEvents,
    StreamState, StructuredOutput, Tape, TextStream, ToolAutoResult, ToolAutoResultKind,
    ToolCallAssembler,
};
pub use rcommon::{BoxFuture, ErrorKind, ErrorPayload, JsonMap};
pub use robserve::{
    MetricsObservabilityHooks, SafeProviderHooks, SafeToolHooks, TracingObservabilityHooks,
};
pub use rprovider::{
    AsyncCompletionOutput, ChatChunk, ChatResponse, ClientSettings, CompletionOutput,
    CompletionRequest, CredentialSetting, ErrorClassifier, NoopOperationHooks, ProviderClient,
    ProviderClientFactory, ProviderClientRegistry, ProviderFuture, ProviderOperationHooks,
    ToolCall, ToolCallDelta, TransportError, TransportErrorKind, Usage,
};
pub use rtape::{
    AnchorSelector, HandoffHandler, HandoffPolicy, InMemoryTapeStore, SqliteTapeStore,
    TapeContext, TapeEntry, TapeEntryKind, TapeManager, TapeQuery, TapeStore, TapeStoreConfig,
};
pub use rtooling::{
    NoopToolRuntimeHooks, ParamType, Tool, ToolContext, ToolError, ToolErrorKind, ToolExecution,
    ToolExecutor, ToolParams, ToolRuntimeHooks, ToolSet, ToolSpec, required_string,
};
