//! Chat client: validation, the orchestrated attempt loop, tool execution,
//! streaming, and tape recording.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use rchat::{ChatClient, ChatRequest};
//! use rprovider::{ClientSettings, LLMCore, ProviderClient, TransportError};
//! use rtape::TapeManager;
//! use rtooling::ToolExecutor;
//!
//! let factory = |_provider: &str, _settings: &ClientSettings| {
//!     Err::<Arc<dyn ProviderClient>, _>(TransportError::missing_api_key("no key"))
//! };
//! let core = Arc::new(LLMCore::new("openai", "gpt-4o-mini", Arc::new(factory)));
//! let client = ChatClient::new(core, ToolExecutor::new(), Arc::new(TapeManager::in_memory()));
//!
//! let output = client.chat(ChatRequest::prompt("hi"));
//! assert_eq!(output.error.expect("no transport").kind, rcommon::ErrorKind::Config);
//! ```

use std::sync::Arc;

use futures_util::StreamExt;
use rcommon::ErrorPayload;
use rprovider::{
    AsyncCompletionOutput, AttemptInfo, AttemptOutcome, ChatChunk, ChatResponse,
    CompletionOutput, LLMCore, ToolCall, TransportError, Usage,
};
use rtape::{RecordChat, TapeContext, TapeManager};
use rtooling::{ToolExecution, ToolExecutor};
use serde_json::Value;

use crate::prepare::{PreparedChat, ToolRequirement, commit_record, prepare_chat};
use crate::stream::{EventMachine, async_chunks, sync_chunks};
use crate::{
    AsyncStreamEvents, AsyncTextStream, ChatRequest, StreamEvents, StructuredOutput, Tape,
    TextStream, ToolAutoResult, ToolCallAssembler,
};

/// Which responses end the attempt loop; anything else is retried as an
/// empty response.
#[derive(Debug, Clone, Copy)]
enum Accept {
    Text,
    Any,
    TextOrCalls,
}

impl Accept {
    fn accepts(self, response: &ChatResponse) -> bool {
        let has_text = !response.text_or_empty().is_empty();
        match self {
            Self::Text => has_text,
            Self::Any => true,
            Self::TextOrCalls => has_text || !response.tool_calls.is_empty(),
        }
    }
}

/// A response accepted by the attempt loop, with the candidate that produced it.
struct Completed {
    response: ChatResponse,
    provider: String,
    model: String,
}

impl Completed {
    fn usage(&self) -> Option<Usage> {
        self.response.usage
    }
}

#[derive(Default)]
struct ResponseAccumulator {
    text: String,
    assembler: ToolCallAssembler,
    usage: Option<Usage>,
}

impl ResponseAccumulator {
    fn push(&mut self, chunk: ChatChunk) {
        if let Some(text) = chunk.text {
            self.text.push_str(&text);
        }
        if !chunk.tool_calls.is_empty() {
            self.assembler.add_deltas(&chunk.tool_calls);
        }
        if chunk.usage.is_some() {
            self.usage = chunk.usage;
        }
    }

    fn finish(self) -> ChatResponse {
        ChatResponse {
            text: (!self.text.is_empty()).then_some(self.text),
            tool_calls: self.assembler.finish(),
            usage: self.usage,
        }
    }
}

fn collect_sync(output: CompletionOutput) -> Result<ChatResponse, TransportError> {
    match output {
        CompletionOutput::Response(response) => Ok(response),
        CompletionOutput::Chunks(chunks) => {
            let mut accumulator = ResponseAccumulator::default();
            for chunk in chunks {
                accumulator.push(chunk?);
            }
            Ok(accumulator.finish())
        }
    }
}

async fn collect_async(output: AsyncCompletionOutput) -> Result<ChatResponse, TransportError> {
    match output {
        AsyncCompletionOutput::Response(response) => Ok(response),
        AsyncCompletionOutput::Chunks(mut chunks) => {
            let mut accumulator = ResponseAccumulator::default();
            while let Some(chunk) = chunks.next().await {
                accumulator.push(chunk?);
            }
            Ok(accumulator.finish())
        }
    }
}

/// Shared decision step for both attempt loops.
fn settle(
    core: &LLMCore,
    collected: Result<ChatResponse, TransportError>,
    info: &AttemptInfo,
    accept: Accept,
) -> Result<AttemptOutcome<Completed>, ErrorPayload> {
    let response = match collected {
        Ok(response) => response,
        Err(error) => {
            core.handle_attempt_error(&error, info)?;
            return Ok(AttemptOutcome::Retry);
        }
    };
    if !accept.accepts(&response) {
        let empty = ErrorPayload::temporary(format!("{}: empty response", info.label()));
        core.report_retry(&empty, info);
        return Ok(AttemptOutcome::Retry);
    }
    Ok(AttemptOutcome::Done(Completed {
        response,
        provider: info.provider.clone(),
        model: info.model.clone(),
    }))
}

#[derive(Clone)]
pub struct ChatClient {
    core: Arc<LLMCore>,
    executor: ToolExecutor,
    tapes: Arc<TapeManager>,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("core", &self.core)
            .field("tapes", &self.tapes)
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    pub fn new(core: Arc<LLMCore>, executor: ToolExecutor, tapes: Arc<TapeManager>) -> Self {
        Self {
            core,
            executor,
            tapes,
        }
    }

    pub fn core(&self) -> &Arc<LLMCore> {
        &self.core
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    pub fn tapes(&self) -> &Arc<TapeManager> {
        &self.tapes
    }

    /// Session handle bound to `name`.
    pub fn tape(&self, name: impl Into<String>) -> Tape {
        Tape::new(name, self.clone())
    }

    pub fn list_tapes(&self) -> Result<Vec<String>, ErrorPayload> {
        self.tapes.list_tapes()
    }

    pub fn default_context(&self) -> TapeContext {
        self.tapes.default_context()
    }

    pub fn set_default_context(&self, context: TapeContext) {
        self.tapes.set_default_context(context);
    }

    pub fn chat(&self, request: impl Into<ChatRequest>) -> StructuredOutput<String> {
        let prepared = match self.prepare(request.into(), ToolRequirement::NONE) {
            Ok(prepared) => prepared,
            Err(error) => return StructuredOutput::failure(error),
        };
        let outcome = self.complete_sync(&prepared, Accept::Text);
        self.finish_text(&prepared, outcome)
    }

    pub async fn chat_async(&self, request: impl Into<ChatRequest>) -> StructuredOutput<String> {
        let prepared = match self.prepare(request.into(), ToolRequirement::NONE) {
            Ok(prepared) => prepared,
            Err(error) => return StructuredOutput::failure(error),
        };
        let outcome = self.complete_async(&prepared, Accept::Text).await;
        self.finish_text(&prepared, outcome)
    }

    /// Returns the model's tool calls without running them.
    pub fn tool_calls(&self, request: impl Into<ChatRequest>) -> StructuredOutput<Vec<ToolCall>> {
        let prepared = match self.prepare(request.into(), ToolRequirement::TOOLS) {
            Ok(prepared) => prepared,
            Err(error) => return StructuredOutput::failure(error),
        };
        let outcome = self.complete_sync(&prepared, Accept::Any);
        self.finish_calls(&prepared, outcome)
    }

    pub async fn tool_calls_async(
        &self,
        request: impl Into<ChatRequest>,
    ) -> StructuredOutput<Vec<ToolCall>> {
        let prepared = match self.prepare(request.into(), ToolRequirement::TOOLS) {
            Ok(prepared) => prepared,
            Err(error) => return StructuredOutput::failure(error),
        };
        let outcome = self.complete_async(&prepared, Accept::Any).await;
        self.finish_calls(&prepared, outcome)
    }

    /// Runs the model's tool calls with the request's runnable tools, or
    /// returns its text when it answers directly.
    pub fn run_tools(&self, request: impl Into<ChatRequest>) -> ToolAutoResult {
        let prepared = match self.prepare(request.into(), ToolRequirement::RUNNABLE) {
            Ok(prepared) => prepared,
            Err(error) => return ToolAutoResult::error_result(error, Vec::new(), Vec::new()),
        };
        let completed = match self.complete_sync(&prepared, Accept::TextOrCalls) {
            Ok(completed) => completed,
            Err(error) => return self.finish_auto(&prepared, None, Err(error)),
        };
        let execution = (!completed.response.tool_calls.is_empty()).then(|| {
            self.executor.execute(
                completed.response.tool_calls.clone(),
                Some(&prepared.toolset),
                Some(&prepared.tool_context()),
            )
        });
        self.finish_auto(&prepared, execution, Ok(completed))
    }

    pub async fn run_tools_async(&self, request: impl Into<ChatRequest>) -> ToolAutoResult {
        let prepared = match self.prepare(request.into(), ToolRequirement::RUNNABLE) {
            Ok(prepared) => prepared,
            Err(error) => return ToolAutoResult::error_result(error, Vec::new(), Vec::new()),
        };
        let completed = match self.complete_async(&prepared, Accept::TextOrCalls).await {
            Ok(completed) => completed,
            Err(error) => return self.finish_auto(&prepared, None, Err(error)),
        };
        let execution = if completed.response.tool_calls.is_empty() {
            None
        } else {
            Some(
                self.executor
                    .execute_async(
                        completed.response.tool_calls.clone(),
                        Some(&prepared.toolset),
                        Some(&prepared.tool_context()),
                    )
                    .await,
            )
        };
        self.finish_auto(&prepared, execution, Ok(completed))
    }

    pub fn stream(&self, request: impl Into<ChatRequest>) -> TextStream {
        TextStream::new(self.stream_events(request))
    }

    pub async fn stream_async(&self, request: impl Into<ChatRequest>) -> AsyncTextStream {
        AsyncTextStream::new(self.stream_events_async(request).await)
    }

    /// Opens the transport eagerly; events are produced as the caller pulls.
    pub fn stream_events(&self, request: impl Into<ChatRequest>) -> StreamEvents {
        let prepared = match self.prepare(request.into(), ToolRequirement::NONE) {
            Ok(prepared) => prepared,
            Err(error) => {
                let machine = self.machine(PreparedChat::default(), None).failed(error);
                return StreamEvents::new(machine, None, self.executor.clone());
            }
        };
        if let Some(error) = prepared.context_error.clone() {
            let machine = self.machine(prepared, None).failed(error);
            return StreamEvents::new(machine, None, self.executor.clone());
        }

        let params = prepared.call_params(true);
        let opened = self.core.run_chat_sync(&params, |output, info| {
            Ok(AttemptOutcome::Done((sync_chunks(output), info.clone())))
        });
        match opened {
            Ok((chunks, info)) => {
                let machine = self.machine(prepared, Some(&info));
                StreamEvents::new(machine, Some(chunks), self.executor.clone())
            }
            Err(error) => {
                let machine = self.machine(prepared, None).failed(error);
                StreamEvents::new(machine, None, self.executor.clone())
            }
        }
    }

    pub async fn stream_events_async(&self, request: impl Into<ChatRequest>) -> AsyncStreamEvents {
        let prepared = match self.prepare(request.into(), ToolRequirement::NONE) {
            Ok(prepared) => prepared,
            Err(error) => {
                let machine = self.machine(PreparedChat::default(), None).failed(error);
                return AsyncStreamEvents::new(machine, None, self.executor.clone());
            }
        };
        if let Some(error) = prepared.context_error.clone() {
            let machine = self.machine(prepared, None).failed(error);
            return AsyncStreamEvents::new(machine, None, self.executor.clone());
        }

        let params = prepared.call_params(true);
        let opened = self
            .core
            .run_chat_async(&params, |output, info| async move {
                Ok(AttemptOutcome::Done((async_chunks(output), info)))
            })
            .await;
        match opened {
            Ok((chunks, info)) => {
                let machine = self.machine(prepared, Some(&info));
                AsyncStreamEvents::new(machine, Some(chunks), self.executor.clone())
            }
            Err(error) => {
                let machine = self.machine(prepared, None).failed(error);
                AsyncStreamEvents::new(machine, None, self.executor.clone())
            }
        }
    }

    fn prepare(
        &self,
        request: ChatRequest,
        requirement: ToolRequirement,
    ) -> Result<PreparedChat, ErrorPayload> {
        prepare_chat(request, &self.tapes, requirement)
    }

    fn machine(&self, prepared: PreparedChat, info: Option<&AttemptInfo>) -> EventMachine {
        let (provider, model) = match info {
            Some(info) => (info.provider.clone(), info.model.clone()),
            None => self.primary_target(&prepared),
        };
        EventMachine::new(
            Arc::clone(&self.core),
            Arc::clone(&self.tapes),
            prepared,
            provider,
            model,
        )
    }

    /// First candidate the call would have tried.
    fn primary_target(&self, prepared: &PreparedChat) -> (String, String) {
        let params = prepared.call_params(false);
        self.core
            .model_candidates(params.model.as_deref(), params.provider.as_deref())
            .ok()
            .and_then(|candidates| candidates.into_iter().next())
            .unwrap_or_else(|| (self.core.provider().to_string(), self.core.model().to_string()))
    }

    fn complete_sync(&self, prepared: &PreparedChat, accept: Accept) -> Result<Completed, ErrorPayload> {
        if let Some(error) = &prepared.context_error {
            return Err(error.clone());
        }
        let params = prepared.call_params(false);
        self.core.run_chat_sync(&params, |output, info| {
            settle(&self.core, collect_sync(output), info, accept)
        })
    }

    async fn complete_async(
        &self,
        prepared: &PreparedChat,
        accept: Accept,
    ) -> Result<Completed, ErrorPayload> {
        if let Some(error) = &prepared.context_error {
            return Err(error.clone());
        }
        let params = prepared.call_params(false);
        let core = &self.core;
        core.run_chat_async(&params, |output, info| async move {
            let collected = collect_async(output).await;
            settle(core, collected, &info, accept)
        })
        .await
    }

    fn record(
        &self,
        prepared: &PreparedChat,
        completed: Option<&Completed>,
        build: impl FnOnce(RecordChat) -> RecordChat,
    ) {
        let record = prepared.record().map(|record| {
            let record = build(record);
            match completed {
                Some(completed) => record
                    .with_target(Some(completed.provider.clone()), Some(completed.model.clone()))
                    .with_usage(completed.usage().map(Usage::to_value)),
                None => record,
            }
        });
        commit_record(&self.tapes, record);
    }

    fn finish_text(
        &self,
        prepared: &PreparedChat,
        outcome: Result<Completed, ErrorPayload>,
    ) -> StructuredOutput<String> {
        match outcome {
            Ok(completed) => {
                let text = completed.response.text_or_empty().to_string();
                self.record(prepared, Some(&completed), |record| {
                    record.with_response_text(text.clone())
                });
                StructuredOutput::success(text)
            }
            Err(error) => {
                self.record(prepared, None, |record| record.with_error(Some(error.clone())));
                StructuredOutput::failure(error)
            }
        }
    }

    fn finish_calls(
        &self,
        prepared: &PreparedChat,
        outcome: Result<Completed, ErrorPayload>,
    ) -> StructuredOutput<Vec<ToolCall>> {
        match outcome {
            Ok(completed) => {
                let calls = completed.response.tool_calls.clone();
                let text = completed.response.text.clone().filter(|text| !text.is_empty());
                self.record(prepared, Some(&completed), |record| {
                    let record =
                        record.with_tool_calls(calls.iter().map(ToolCall::to_value).collect());
                    match text {
                        Some(text) => record.with_response_text(text),
                        None => record,
                    }
                });
                StructuredOutput::success(calls)
            }
            Err(error) => {
                self.record(prepared, None, |record| record.with_error(Some(error.clone())));
                StructuredOutput::failure(error)
            }
        }
    }

    fn finish_auto(
        &self,
        prepared: &PreparedChat,
        execution: Option<Result<ToolExecution, ErrorPayload>>,
        outcome: Result<Completed, ErrorPayload>,
    ) -> ToolAutoResult {
        let completed = match outcome {
            Ok(completed) => completed,
            Err(error) => {
                self.record(prepared, None, |record| record.with_error(Some(error.clone())));
                return ToolAutoResult::error_result(error, Vec::new(), Vec::new());
            }
        };

        let call_values = completed
            .response
            .tool_calls
            .iter()
            .map(ToolCall::to_value)
            .collect::<Vec<_>>();
        let response_text = completed
            .response
            .text
            .clone()
            .filter(|text| !text.is_empty());
        let (result, executed) = match execution {
            None => {
                let result = ToolAutoResult::text_result(completed.response.text_or_empty());
                self.record(prepared, Some(&completed), |record| {
                    record.with_response_text(completed.response.text_or_empty())
                });
                return result;
            }
            Some(Ok(execution)) => {
                let result = match execution.error {
                    None => ToolAutoResult::tools_result(execution.tool_calls, execution.tool_results),
                    Some(error) => ToolAutoResult::error_result(
                        error,
                        execution.tool_calls,
                        execution.tool_results,
                    ),
                };
                (result, true)
            }
            Some(Err(error)) => (
                ToolAutoResult::error_result(error, call_values.clone(), Vec::new()),
                false,
            ),
        };
        let result = result.with_text(response_text.clone());

        // The assistant turn falls back to the tool output when the model sent no text.
        let assistant_text = response_text.or_else(|| {
            executed.then(|| Value::Array(result.tool_results.clone()).to_string())
        });
        self.record(prepared, Some(&completed), |record| {
            let record = record
                .with_tool_calls(call_values)
                .with_tool_results(result.tool_results.clone())
                .with_error(result.error.clone());
            match assistant_text {
                Some(text) => record.with_response_text(text),
                None => record,
            }
        });
        result
    }
}
