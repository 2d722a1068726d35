//! Name-bound tape session handle.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use rchat::ChatClient;
//! use rprovider::{ClientSettings, LLMCore, ProviderClient, TransportError};
//! use rtape::{TapeEntry, TapeManager};
//! use rtooling::ToolExecutor;
//!
//! let factory = |_provider: &str, _settings: &ClientSettings| {
//!     Err::<Arc<dyn ProviderClient>, _>(TransportError::missing_api_key("no key"))
//! };
//! let core = Arc::new(LLMCore::new("openai", "gpt-4o-mini", Arc::new(factory)));
//! let client = ChatClient::new(core, ToolExecutor::new(), Arc::new(TapeManager::in_memory()));
//!
//! let tape = client.tape("notes");
//! tape.handoff("start", None).expect("handoff");
//! tape.append(TapeEntry::system("keep it short")).expect("append");
//! assert_eq!(tape.entries().expect("entries").len(), 3);
//! ```

use rcommon::{ErrorPayload, JsonMap};
use rprovider::ToolCall;
use rtape::{TapeContext, TapeEntry, TapeQuery};
use serde_json::Value;

use crate::text::{classify_request, if_request};
use crate::{
    AsyncStreamEvents, AsyncTextStream, ChatClient, ChatRequest, StreamEvents, StructuredOutput,
    TextStream, ToolAutoResult,
};

/// Every chat operation issued through a `Tape` reads history from and
/// records into the named tape.
#[derive(Debug, Clone)]
pub struct Tape {
    name: String,
    client: ChatClient,
    context: Option<TapeContext>,
}

impl Tape {
    pub(crate) fn new(name: impl Into<String>, client: ChatClient) -> Self {
        Self {
            name: name.into(),
            client,
            context: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Context used by this handle: its own override, else the client default.
    pub fn context(&self) -> TapeContext {
        self.context
            .clone()
            .unwrap_or_else(|| self.client.default_context())
    }

    pub fn with_context(mut self, context: TapeContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn entries(&self) -> Result<Vec<TapeEntry>, ErrorPayload> {
        self.client.tapes().read_entries(&self.name)
    }

    pub fn messages(&self) -> Result<Vec<Value>, ErrorPayload> {
        self.client
            .tapes()
            .read_messages(&self.name, Some(&self.context()))
    }

    pub fn append(&self, entry: TapeEntry) -> Result<TapeEntry, ErrorPayload> {
        self.client.tapes().append_entry(&self.name, entry)
    }

    pub fn query(&self) -> TapeQuery {
        self.client.tapes().query_tape(&self.name)
    }

    pub fn reset(&self) -> Result<(), ErrorPayload> {
        self.client.tapes().reset_tape(&self.name)
    }

    pub fn handoff(
        &self,
        name: &str,
        state: Option<JsonMap>,
    ) -> Result<Vec<TapeEntry>, ErrorPayload> {
        self.handoff_with_meta(name, state, JsonMap::new())
    }

    pub fn handoff_with_meta(
        &self,
        name: &str,
        state: Option<JsonMap>,
        meta: JsonMap,
    ) -> Result<Vec<TapeEntry>, ErrorPayload> {
        self.client.tapes().handoff(&self.name, name, state, meta)
    }

    pub fn chat(&self, request: impl Into<ChatRequest>) -> StructuredOutput<String> {
        self.client.chat(self.bind(request))
    }

    pub async fn chat_async(&self, request: impl Into<ChatRequest>) -> StructuredOutput<String> {
        self.client.chat_async(self.bind(request)).await
    }

    pub fn tool_calls(&self, request: impl Into<ChatRequest>) -> StructuredOutput<Vec<ToolCall>> {
        self.client.tool_calls(self.bind(request))
    }

    pub async fn tool_calls_async(
        &self,
        request: impl Into<ChatRequest>,
    ) -> StructuredOutput<Vec<ToolCall>> {
        self.client.tool_calls_async(self.bind(request)).await
    }

    pub fn run_tools(&self, request: impl Into<ChatRequest>) -> ToolAutoResult {
        self.client.run_tools(self.bind(request))
    }

    pub async fn run_tools_async(&self, request: impl Into<ChatRequest>) -> ToolAutoResult {
        self.client.run_tools_async(self.bind(request)).await
    }

    pub fn stream(&self, request: impl Into<ChatRequest>) -> TextStream {
        self.client.stream(self.bind(request))
    }

    pub async fn stream_async(&self, request: impl Into<ChatRequest>) -> AsyncTextStream {
        self.client.stream_async(self.bind(request)).await
    }

    pub fn stream_events(&self, request: impl Into<ChatRequest>) -> StreamEvents {
        self.client.stream_events(self.bind(request))
    }

    pub async fn stream_events_async(&self, request: impl Into<ChatRequest>) -> AsyncStreamEvents {
        self.client.stream_events_async(self.bind(request)).await
    }

    pub fn if_(&self, input: &str, question: &str) -> Result<bool, ErrorPayload> {
        self.client.decide(self.bind(if_request(input, question)))
    }

    pub async fn if_async(&self, input: &str, question: &str) -> Result<bool, ErrorPayload> {
        self.client
            .decide_async(self.bind(if_request(input, question)))
            .await
    }

    pub fn classify<S: AsRef<str>>(&self, input: &str, choices: &[S]) -> Result<String, ErrorPayload> {
        let (request, choices) = classify_request(input, choices)?;
        self.client.pick_label(self.bind(request), &choices)
    }

    pub async fn classify_async<S: AsRef<str>>(
        &self,
        input: &str,
        choices: &[S],
    ) -> Result<String, ErrorPayload> {
        let (request, choices) = classify_request(input, choices)?;
        self.client
            .pick_label_async(self.bind(request), &choices)
            .await
    }

    fn bind(&self, request: impl Into<ChatRequest>) -> ChatRequest {
        let mut request = request.into().with_tape(self.name.clone());
        if request.context.is_none()
            && let Some(context) = &self.context
        {
            request = request.with_context(context.clone());
        }
        request
    }
}
