//! Common imports for most republic applications.

pub use crate::{DEFAULT_MODEL, LLM, LLMBuilder, republic_messages, republic_msg};
pub use crate::{
    AnchorSelector, AsyncStreamEvents, AsyncTextStream, ChatClient, ChatRequest, ErrorKind,
    ErrorPayload, ParamType, ProviderClient, ProviderClientFactory, ProviderClientRegistry,
    StreamEvent, StreamEvents, StructuredOutput, Tape, TapeContext, TapeEntry, TapeEntryKind,
    TextStream, Tool, ToolAutoResult, ToolAutoResultKind, ToolCall, ToolContext, ToolParams,
    ToolSet,
};
