//! Streaming: the event state machine and the blocking/async stream types.
//!
//! A stream drains provider chunks into `text` events, then emits assembled
//! `tool_call` events, executes runnable tools into `tool_result` events, and
//! ends with optional `usage` and `error` events and exactly one `final`.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::StreamExt;
use rcommon::ErrorPayload;
use rprovider::{
    AsyncCompletionOutput, BoxedChunkStream, ChatChunk, ChatResponse, ChunkIter,
    CompletionOutput, LLMCore, ToolCall, ToolCallDelta, TransportError, Usage, VecChunkStream,
};
use rtape::TapeManager;
use rtooling::{ToolContext, ToolExecution, ToolExecutor, ToolSet};
use serde_json::Value;

use crate::ToolCallAssembler;
use crate::prepare::{PreparedChat, commit_record};
use crate::results::{SharedStreamState, StreamEvent, StreamState, read_state, write_state};

/// Tools the machine wants executed before it can finish.
pub(crate) struct ToolRun {
    pub calls: Vec<ToolCall>,
    pub toolset: ToolSet,
    pub context: ToolContext,
}

/// Sans-IO core shared by the blocking and async drivers.
pub(crate) struct EventMachine {
    core: Arc<LLMCore>,
    tapes: Arc<TapeManager>,
    prepared: PreparedChat,
    provider: String,
    model: String,
    state: SharedStreamState,
    text: String,
    assembler: ToolCallAssembler,
    calls: Vec<ToolCall>,
    usage: Option<Usage>,
    error: Option<ErrorPayload>,
}

impl EventMachine {
    pub fn new(
        core: Arc<LLMCore>,
        tapes: Arc<TapeManager>,
        prepared: PreparedChat,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            core,
            tapes,
            prepared,
            provider: provider.into(),
            model: model.into(),
            state: Arc::new(Mutex::new(StreamState::default())),
            text: String::new(),
            assembler: ToolCallAssembler::new(),
            calls: Vec::new(),
            usage: None,
            error: None,
        }
    }

    /// Starts already failed; only the error and final events remain.
    pub fn failed(mut self, error: ErrorPayload) -> Self {
        self.error = Some(error);
        self
    }

    pub fn state(&self) -> SharedStreamState {
        Arc::clone(&self.state)
    }

    pub fn on_chunk(&mut self, chunk: ChatChunk) -> Option<StreamEvent> {
        if !chunk.tool_calls.is_empty() {
            self.assembler.add_deltas(&chunk.tool_calls);
        }
        if chunk.usage.is_some() {
            self.usage = chunk.usage;
        }
        let delta = chunk.text.filter(|delta| !delta.is_empty())?;
        self.text.push_str(&delta);
        Some(StreamEvent::Text { delta })
    }

    /// A chunk source failure ends the drain.
    pub fn on_error(&mut self, error: &TransportError) {
        let wrapped = self.core.wrap_error(error, &self.provider, &self.model);
        tracing::debug!(
            provider = %self.provider,
            model = %self.model,
            error_kind = %wrapped.kind,
            "stream interrupted"
        );
        self.error = Some(wrapped);
    }

    pub fn finish_calls(&mut self) -> Vec<StreamEvent> {
        self.calls = std::mem::take(&mut self.assembler).finish();
        self.calls
            .iter()
            .enumerate()
            .map(|(index, call)| StreamEvent::ToolCall {
                index,
                call: call.clone(),
            })
            .collect()
    }

    pub fn tool_run(&self) -> Option<ToolRun> {
        if self.error.is_some()
            || self.calls.is_empty()
            || !self.prepared.toolset.has_runnable()
        {
            return None;
        }
        Some(ToolRun {
            calls: self.calls.clone(),
            toolset: self.prepared.toolset.clone(),
            context: self.prepared.tool_context(),
        })
    }

    /// Emits the closing events, publishes the state, and records the turn.
    pub fn complete(
        mut self,
        execution: Option<Result<ToolExecution, ErrorPayload>>,
    ) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let mut tool_results = None;
        match execution {
            Some(Ok(execution)) => {
                events.extend(
                    execution
                        .tool_results
                        .iter()
                        .enumerate()
                        .map(|(index, result)| StreamEvent::ToolResult {
                            index,
                            result: result.clone(),
                        }),
                );
                if self.error.is_none() {
                    self.error = execution.error;
                }
                tool_results = Some(execution.tool_results);
            }
            Some(Err(error)) => {
                self.error.get_or_insert(error);
                tool_results = Some(Vec::new());
            }
            None => {}
        }

        if self.error.is_none() && self.text.is_empty() && self.calls.is_empty() {
            self.error = Some(ErrorPayload::temporary(format!(
                "{}:{}: empty response",
                self.provider, self.model
            )));
        }

        if let Some(usage) = self.usage {
            events.push(StreamEvent::Usage(usage));
        }
        if let Some(error) = &self.error {
            events.push(StreamEvent::Error(error.clone()));
        }

        let call_values = self.calls.iter().map(ToolCall::to_value).collect::<Vec<Value>>();
        let text = (!self.text.is_empty()).then(|| self.text.clone());
        events.push(StreamEvent::Final {
            text: text.clone(),
            tool_calls: call_values.clone(),
            tool_results: tool_results.clone().unwrap_or_default(),
            usage: self.usage,
            ok: self.error.is_none(),
        });

        write_state(&self.state, self.error.clone(), self.usage);

        let record = self.prepared.record().map(|record| {
            let mut record = record
                .with_tool_calls(call_values)
                .with_error(self.error.clone())
                .with_target(Some(self.provider.clone()), Some(self.model.clone()))
                .with_usage(self.usage.map(Usage::to_value));
            if let Some(results) = tool_results {
                record = record.with_tool_results(results);
            }
            if let Some(text) = text {
                record = record.with_response_text(text);
            }
            record
        });
        commit_record(&self.tapes, record);
        events
    }
}

/// Replays a complete response as chunks so both output shapes share one path.
pub(crate) fn response_chunks(response: ChatResponse) -> Vec<ChatChunk> {
    let mut chunks = Vec::new();
    if let Some(text) = response.text.filter(|text| !text.is_empty()) {
        chunks.push(ChatChunk::text(text));
    }
    if !response.tool_calls.is_empty() {
        let mut chunk = ChatChunk::default();
        for (index, call) in response.tool_calls.into_iter().enumerate() {
            let mut delta = ToolCallDelta::default()
                .with_index(index as u32)
                .with_name(call.function.name)
                .with_arguments(call.function.arguments);
            delta.id = call.id;
            chunk = chunk.with_tool_delta(delta);
        }
        chunks.push(chunk);
    }
    if let Some(usage) = response.usage {
        chunks.push(ChatChunk::usage(usage));
    }
    chunks
}

pub(crate) fn sync_chunks(output: CompletionOutput) -> ChunkIter {
    match output {
        CompletionOutput::Chunks(chunks) => chunks,
        CompletionOutput::Response(response) => {
            Box::new(response_chunks(response).into_iter().map(Ok))
        }
    }
}

pub(crate) fn async_chunks(output: AsyncCompletionOutput) -> BoxedChunkStream<'static> {
    match output {
        AsyncCompletionOutput::Chunks(chunks) => chunks,
        AsyncCompletionOutput::Response(response) => Box::pin(VecChunkStream::new(
            response_chunks(response).into_iter().map(Ok).collect(),
        )),
    }
}

struct SyncDriver {
    machine: Option<EventMachine>,
    chunks: Option<ChunkIter>,
    executor: ToolExecutor,
    calls_finished: bool,
    pending: VecDeque<StreamEvent>,
}

impl Iterator for SyncDriver {
    type Item = StreamEvent;

    fn next(&mut self) -> Option<StreamEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            let machine = self.machine.as_mut()?;

            if let Some(chunks) = self.chunks.as_mut() {
                match chunks.next() {
                    Some(Ok(chunk)) => self.pending.extend(machine.on_chunk(chunk)),
                    Some(Err(error)) => {
                        machine.on_error(&error);
                        self.chunks = None;
                    }
                    None => self.chunks = None,
                }
                continue;
            }

            if !self.calls_finished {
                self.calls_finished = true;
                self.pending.extend(machine.finish_calls());
                continue;
            }

            let machine = self.machine.take()?;
            let execution = machine.tool_run().map(|run| {
                self.executor
                    .execute(run.calls, Some(&run.toolset), Some(&run.context))
            });
            self.pending.extend(machine.complete(execution));
        }
    }
}

/// Blocking structured event stream. Single pass; `error()` and `usage()`
/// are meaningful once it is exhausted.
pub struct StreamEvents {
    inner: Box<dyn Iterator<Item = StreamEvent> + Send>,
    state: SharedStreamState,
}

impl std::fmt::Debug for StreamEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamEvents")
            .field("state", &read_state(&self.state))
            .finish_non_exhaustive()
    }
}

impl StreamEvents {
    pub(crate) fn new(
        machine: EventMachine,
        chunks: Option<ChunkIter>,
        executor: ToolExecutor,
    ) -> Self {
        let state = machine.state();
        let driver = SyncDriver {
            machine: Some(machine),
            chunks,
            executor,
            calls_finished: false,
            pending: VecDeque::new(),
        };
        Self {
            inner: Box::new(driver),
            state,
        }
    }

    pub fn error(&self) -> Option<ErrorPayload> {
        read_state(&self.state).error
    }

    pub fn usage(&self) -> Option<Usage> {
        read_state(&self.state).usage
    }

    pub fn state(&self) -> StreamState {
        read_state(&self.state)
    }
}

impl Iterator for StreamEvents {
    type Item = StreamEvent;

    fn next(&mut self) -> Option<StreamEvent> {
        self.inner.next()
    }
}

/// Blocking text-delta stream over the same machine as [`StreamEvents`].
#[derive(Debug)]
pub struct TextStream {
    events: StreamEvents,
}

impl TextStream {
    pub(crate) fn new(events: StreamEvents) -> Self {
        Self { events }
    }

    pub fn error(&self) -> Option<ErrorPayload> {
        self.events.error()
    }

    pub fn usage(&self) -> Option<Usage> {
        self.events.usage()
    }

    /// Drains the rest of the stream into one string.
    pub fn collect_text(self) -> String {
        self.collect()
    }
}

impl Iterator for TextStream {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            if let StreamEvent::Text { delta } = self.events.next()? {
                return Some(delta);
            }
        }
    }
}

type BoxedEventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

fn drive_async(
    mut machine: EventMachine,
    chunks: Option<BoxedChunkStream<'static>>,
    executor: ToolExecutor,
) -> BoxedEventStream {
    Box::pin(async_stream::stream! {
        if let Some(mut chunks) = chunks {
            while let Some(item) = chunks.next().await {
                match item {
                    Ok(chunk) => {
                        if let Some(event) = machine.on_chunk(chunk) {
                            yield event;
                        }
                    }
                    Err(error) => {
                        machine.on_error(&error);
                        break;
                    }
                }
            }
        }

        for event in machine.finish_calls() {
            yield event;
        }

        let execution = match machine.tool_run() {
            Some(run) => Some(
                executor
                    .execute_async(run.calls, Some(&run.toolset), Some(&run.context))
                    .await,
            ),
            None => None,
        };
        for event in machine.complete(execution) {
            yield event;
        }
    })
}

/// Async structured event stream.
pub struct AsyncStreamEvents {
    inner: BoxedEventStream,
    state: SharedStreamState,
}

impl std::fmt::Debug for AsyncStreamEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncStreamEvents")
            .field("state", &read_state(&self.state))
            .finish_non_exhaustive()
    }
}

impl AsyncStreamEvents {
    pub(crate) fn new(
        machine: EventMachine,
        chunks: Option<BoxedChunkStream<'static>>,
        executor: ToolExecutor,
    ) -> Self {
        let state = machine.state();
        Self {
            inner: drive_async(machine, chunks, executor),
            state,
        }
    }

    pub fn error(&self) -> Option<ErrorPayload> {
        read_state(&self.state).error
    }

    pub fn usage(&self) -> Option<Usage> {
        read_state(&self.state).usage
    }

    pub fn state(&self) -> StreamState {
        read_state(&self.state)
    }
}

impl Stream for AsyncStreamEvents {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<StreamEvent>> {
        self.get_mut().inner.as_mut().poll_next(cx)
    }
}

/// Async text-delta stream.
pub struct AsyncTextStream {
    inner: Pin<Box<dyn Stream<Item = String> + Send>>,
    state: SharedStreamState,
}

impl std::fmt::Debug for AsyncTextStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncTextStream")
            .field("state", &read_state(&self.state))
            .finish_non_exhaustive()
    }
}

impl AsyncTextStream {
    pub(crate) fn new(events: AsyncStreamEvents) -> Self {
        let AsyncStreamEvents { inner, state } = events;
        let inner = inner.filter_map(|event| {
            std::future::ready(match event {
                StreamEvent::Text { delta } => Some(delta),
                _ => None,
            })
        });
        Self {
            inner: Box::pin(inner),
            state,
        }
    }

    pub fn error(&self) -> Option<ErrorPayload> {
        read_state(&self.state).error
    }

    pub fn usage(&self) -> Option<Usage> {
        read_state(&self.state).usage
    }
}

impl Stream for AsyncTextStream {
    type Item = String;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        self.get_mut().inner.as_mut().poll_next(cx)
    }
}
