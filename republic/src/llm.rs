//! The `LLM` facade: one configured client with tape sessions and tools.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use republic::LLM;
//! use republic::rprovider::ProviderClientRegistry;
//!
//! let llm = LLM::builder(Arc::new(ProviderClientRegistry::new()))
//!     .with_model("openai:gpt-4o-mini")
//!     .build()
//!     .expect("llm should build");
//!
//! assert_eq!(llm.provider(), "openai");
//! assert_eq!(llm.model(), "gpt-4o-mini");
//! assert!(llm.tapes().expect("tapes").is_empty());
//! ```

use std::sync::Arc;

use rchat::{
    AsyncStreamEvents, AsyncTextStream, ChatClient, ChatRequest, StreamEvents, StructuredOutput,
    Tape, TextStream, ToolAutoResult,
};
use rcommon::ErrorPayload;
use rprovider::{ProviderClientFactory, ToolCall};
use rtape::{TapeContext, TapeManager};
use rtooling::ToolExecutor;

use crate::LLMBuilder;

#[derive(Debug, Clone)]
pub struct LLM {
    chat: ChatClient,
}

impl LLM {
    pub fn builder(factory: Arc<dyn ProviderClientFactory>) -> LLMBuilder {
        LLMBuilder::new(factory)
    }

    pub(crate) fn from_client(chat: ChatClient) -> Self {
        Self { chat }
    }

    pub fn model(&self) -> &str {
        self.chat.core().model()
    }

    pub fn provider(&self) -> &str {
        self.chat.core().provider()
    }

    pub fn fallback_models(&self) -> &[String] {
        self.chat.core().fallback_models()
    }

    pub fn context(&self) -> TapeContext {
        self.chat.default_context()
    }

    /// Replaces the default context for every tape handle without its own.
    pub fn set_context(&self, context: TapeContext) {
        self.chat.set_default_context(context);
    }

    pub fn tape(&self, name: impl Into<String>) -> Tape {
        self.chat.tape(name)
    }

    pub fn tape_with_context(&self, name: impl Into<String>, context: TapeContext) -> Tape {
        self.chat.tape(name).with_context(context)
    }

    /// Names of every tape in the store.
    pub fn tapes(&self) -> Result<Vec<String>, ErrorPayload> {
        self.chat.list_tapes()
    }

    pub fn tape_manager(&self) -> &Arc<TapeManager> {
        self.chat.tapes()
    }

    pub fn tools(&self) -> &ToolExecutor {
        self.chat.executor()
    }

    pub fn chat_client(&self) -> &ChatClient {
        &self.chat
    }

    pub fn chat(&self, request: impl Into<ChatRequest>) -> StructuredOutput<String> {
        self.chat.chat(request)
    }

    pub async fn chat_async(&self, request: impl Into<ChatRequest>) -> StructuredOutput<String> {
        self.chat.chat_async(request).await
    }

    pub fn tool_calls(&self, request: impl Into<ChatRequest>) -> StructuredOutput<Vec<ToolCall>> {
        self.chat.tool_calls(request)
    }

    pub async fn tool_calls_async(
        &self,
        request: impl Into<ChatRequest>,
    ) -> StructuredOutput<Vec<ToolCall>> {
        self.chat.tool_calls_async(request).await
    }

    pub fn run_tools(&self, request: impl Into<ChatRequest>) -> ToolAutoResult {
        self.chat.run_tools(request)
    }

    pub async fn run_tools_async(&self, request: impl Into<ChatRequest>) -> ToolAutoResult {
        self.chat.run_tools_async(request).await
    }

    pub fn stream(&self, request: impl Into<ChatRequest>) -> TextStream {
        self.chat.stream(request)
    }

    pub async fn stream_async(&self, request: impl Into<ChatRequest>) -> AsyncTextStream {
        self.chat.stream_async(request).await
    }

    pub fn stream_events(&self, request: impl Into<ChatRequest>) -> StreamEvents {
        self.chat.stream_events(request)
    }

    pub async fn stream_events_async(&self, request: impl Into<ChatRequest>) -> AsyncStreamEvents {
        self.chat.stream_events_async(request).await
    }

    /// Asks the model a yes/no `question` about `input`.
    pub fn if_(&self, input: &str, question: &str) -> Result<bool, ErrorPayload> {
        self.chat.if_(input, question)
    }

    pub async fn if_async(&self, input: &str, question: &str) -> Result<bool, ErrorPayload> {
        self.chat.if_async(input, question).await
    }

    /// Labels `input` with one of `choices`.
    pub fn classify<S: AsRef<str>>(&self, input: &str, choices: &[S]) -> Result<String, ErrorPayload> {
        self.chat.classify(input, choices)
    }

    pub async fn classify_async<S: AsRef<str>>(
        &self,
        input: &str,
        choices: &[S],
    ) -> Result<String, ErrorPayload> {
        self.chat.classify_async(input, choices).await
    }
}
