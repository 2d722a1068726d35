use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use rchat::prelude::*;
use rprovider::{
    AsyncCompletionOutput, ChatChunk, ChatResponse, ClientSettings, CompletionOutput,
    CompletionRequest, LLMCore, ProviderClient, ProviderFuture, ToolCall, ToolCallDelta,
    TransportError, Usage, VecChunkStream,
};
use rtape::TapeManager;
use rtooling::{ParamType, ToolParams, required_string};
use serde_json::{Value, json};

enum Script {
    Response(ChatResponse),
    Chunks(Vec<Result<ChatChunk, TransportError>>),
    Fail(TransportError),
}

#[derive(Default)]
struct ScriptedClient {
    script: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    fn new(script: Vec<Script>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn take(&self, request: &CompletionRequest) -> Script {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        self.script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| Script::Fail(TransportError::provider("script exhausted")))
    }

    fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl ProviderClient for ScriptedClient {
    fn completion(&self, request: &CompletionRequest) -> Result<CompletionOutput, TransportError> {
        match self.take(request) {
            Script::Response(response) => Ok(CompletionOutput::Response(response)),
            Script::Chunks(chunks) => Ok(CompletionOutput::Chunks(Box::new(chunks.into_iter()))),
            Script::Fail(error) => Err(error),
        }
    }

    fn acompletion<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> ProviderFuture<'a, Result<AsyncCompletionOutput, TransportError>> {
        Box::pin(async move {
            match self.take(request) {
                Script::Response(response) => Ok(AsyncCompletionOutput::Response(response)),
                Script::Chunks(chunks) => {
                    Ok(AsyncCompletionOutput::Chunks(Box::pin(VecChunkStream::new(chunks))))
                }
                Script::Fail(error) => Err(error),
            }
        })
    }
}

fn client_with(
    script: Vec<Script>,
    configure: impl FnOnce(LLMCore) -> LLMCore,
) -> (ChatClient, Arc<ScriptedClient>) {
    let fake = Arc::new(ScriptedClient::new(script));
    let shared = Arc::clone(&fake);
    let factory = move |_provider: &str, _settings: &ClientSettings| {
        Ok::<Arc<dyn ProviderClient>, TransportError>(shared.clone())
    };
    let core = configure(LLMCore::new("openai", "gpt-4o-mini", Arc::new(factory)));
    let client = ChatClient::new(
        Arc::new(core),
        ToolExecutor::new(),
        Arc::new(TapeManager::in_memory()),
    );
    (client, fake)
}

fn client(script: Vec<Script>) -> (ChatClient, Arc<ScriptedClient>) {
    client_with(script, |core| core)
}

fn echo() -> Tool {
    Tool::from_fn(
        "echo",
        ToolParams::new().required("text", ParamType::String),
        |args, _ctx| Ok(json!(required_string(&args, "text")?.to_uppercase())),
    )
}

fn roles(messages: &[Value]) -> Vec<&str> {
    messages
        .iter()
        .filter_map(|message| message["role"].as_str())
        .collect()
}

#[test]
fn tape_without_anchor_fails_before_transport_then_handoff_unlocks_history() {
    let (client, fake) = client(vec![
        Script::Response(ChatResponse::text("In ops.")),
        Script::Response(ChatResponse::text("Still ops.")),
    ]);
    let ops = client.tape("ops");

    let failed = ops.chat("hi");
    let error = failed.error.expect("missing anchor should fail");
    assert_eq!(error.kind, ErrorKind::NotFound);
    assert!(fake.requests().is_empty());

    let kinds = ops
        .entries()
        .expect("entries")
        .into_iter()
        .map(|entry| entry.kind)
        .collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![TapeEntryKind::Error, TapeEntryKind::Message, TapeEntryKind::Event]
    );

    ops.handoff("start", None).expect("handoff");
    let first = ops.chat("Where am I?");
    assert_eq!(first.value.as_deref(), Some("In ops."));
    let second = ops.chat("And now?");
    assert!(second.ok());

    let requests = fake.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(roles(&requests[0].messages), vec!["user"]);
    assert_eq!(roles(&requests[1].messages), vec!["user", "assistant", "user"]);
    assert_eq!(requests[1].model, "gpt-4o-mini");

    let run = ops
        .entries()
        .expect("entries")
        .into_iter()
        .filter(|entry| entry.event_name() == Some("run"))
        .last()
        .expect("run event");
    assert_eq!(run.payload["data"]["status"], "ok");
    assert_eq!(run.payload["data"]["provider"], "openai");
}

#[test]
fn stream_events_follow_text_tool_call_result_final_order() {
    let (client, fake) = client(vec![Script::Chunks(vec![
        Ok(ChatChunk::text("Checking ")),
        Ok(ChatChunk::tool_delta(
            ToolCallDelta::default()
                .with_id("call_1")
                .with_name("echo")
                .with_arguments("{\"text\":\"to"),
        )),
        Ok(ChatChunk::tool_delta(
            ToolCallDelta::default()
                .with_id("call_1")
                .with_arguments("kyo\"}"),
        )),
        Ok(ChatChunk::usage(Usage::new(12, 8))),
    ])]);

    let mut events = client.stream_events(ChatRequest::prompt("weather in tokyo").with_tool(echo()));
    let collected = events.by_ref().collect::<Vec<_>>();
    let kinds = collected.iter().map(StreamEvent::kind).collect::<Vec<_>>();
    assert_eq!(kinds, vec!["text", "tool_call", "tool_result", "usage", "final"]);

    assert_eq!(collected[0].data()["delta"], "Checking ");
    let call = &collected[1].data()["call"];
    assert_eq!(call["id"], "call_1");
    assert_eq!(call["function"]["name"], "echo");
    assert_eq!(call["function"]["arguments"], "{\"text\":\"tokyo\"}");
    assert_eq!(collected[2].data()["result"], "TOKYO");
    assert_eq!(collected[4].data()["ok"], true);
    assert_eq!(collected[4].data()["text"], "Checking ");

    assert!(events.error().is_none());
    assert_eq!(events.usage().map(|usage| usage.total_tokens), Some(20));
    let requests = fake.requests();
    assert!(requests[0].stream);
    assert_eq!(requests[0].tools.as_ref().map(Vec::len), Some(1));
}

#[test]
fn tool_calls_merge_bare_deltas_from_chunked_output() {
    let (client, _fake) = client(vec![Script::Chunks(vec![
        Ok(ChatChunk::default()
            .with_tool_delta(ToolCallDelta::default().with_id("call_a").with_name("echo"))
            .with_tool_delta(ToolCallDelta::default().with_id("call_b").with_name("echo"))),
        Ok(ChatChunk::default()
            .with_tool_delta(ToolCallDelta::default().with_arguments("{\"text\":\"a\"}"))
            .with_tool_delta(ToolCallDelta::default().with_arguments("{\"text\":\"b\"}"))),
    ])]);

    let calls = client
        .tool_calls(ChatRequest::prompt("echo twice").with_tool(echo()))
        .into_result()
        .expect("tool calls");
    assert_eq!(
        calls,
        vec![
            ToolCall::new(Some("call_a".to_string()), "echo", "{\"text\":\"a\"}"),
            ToolCall::new(Some("call_b".to_string()), "echo", "{\"text\":\"b\"}"),
        ]
    );
}

#[tokio::test]
async fn run_tools_async_executes_with_tape_bound_context() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let whoami = Tool::from_async_fn("whoami", ToolParams::new(), move |_args, ctx| {
        let recorder = Arc::clone(&recorder);
        async move {
            let tape = ctx.and_then(|ctx| ctx.tape).unwrap_or_default();
            recorder.lock().expect("seen lock").push(tape.clone());
            Ok(json!({"tape": tape}))
        }
    })
    .with_context();

    let (client, _fake) = client(vec![Script::Response(
        ChatResponse::empty()
            .with_tool_call(ToolCall::new(Some("call_1".to_string()), "whoami", "{}")),
    )]);
    client
        .tapes()
        .handoff("ops", "start", None, rcommon::JsonMap::new())
        .expect("handoff");

    let result = client
        .tape("ops")
        .run_tools_async(ChatRequest::prompt("who am I").with_tool(whoami))
        .await;
    assert_eq!(result.kind, ToolAutoResultKind::Tools);
    assert_eq!(result.tool_results, vec![json!({"tape": "ops"})]);
    assert_eq!(*seen.lock().expect("seen lock"), vec!["ops".to_string()]);

    let kinds = client
        .tapes()
        .read_entries("ops")
        .expect("entries")
        .into_iter()
        .map(|entry| entry.kind)
        .collect::<Vec<_>>();
    assert_eq!(
        kinds[kinds.len() - 4..],
        [
            TapeEntryKind::ToolCall,
            TapeEntryKind::ToolResult,
            TapeEntryKind::Message,
            TapeEntryKind::Event
        ]
    );
    let entries = client.tapes().read_entries("ops").expect("entries");
    let assistant = &entries[entries.len() - 2];
    assert_eq!(assistant.payload["role"], "assistant");
    assert_eq!(assistant.payload["content"], r#"[{"tape":"ops"}]"#);
}

#[test]
fn run_tools_records_text_sent_with_tool_calls() {
    let (client, _fake) = client(vec![Script::Response(
        ChatResponse::text("Let me check.").with_tool_call(ToolCall::new(
            Some("call_1".to_string()),
            "echo",
            "{\"text\":\"tokyo\"}",
        )),
    )]);
    let ops = client.tape("ops");
    ops.handoff("start", None).expect("handoff");

    let result = ops.run_tools(ChatRequest::prompt("weather?").with_tool(echo()));
    assert_eq!(result.kind, ToolAutoResultKind::Tools);
    assert_eq!(result.text.as_deref(), Some("Let me check."));
    assert_eq!(result.tool_results, vec![json!("TOKYO")]);

    let entries = ops.entries().expect("entries");
    let tail = &entries[entries.len() - 5..];
    let kinds = tail.iter().map(|entry| entry.kind).collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![
            TapeEntryKind::Message,
            TapeEntryKind::ToolCall,
            TapeEntryKind::ToolResult,
            TapeEntryKind::Message,
            TapeEntryKind::Event
        ]
    );
    assert_eq!(tail[0].payload["role"], "user");
    assert_eq!(
        Value::Object(tail[3].payload.clone()),
        json!({"role": "assistant", "content": "Let me check."})
    );
    assert_eq!(tail[4].payload["data"]["status"], "ok");
}

#[test]
fn run_tools_isolates_failing_calls() {
    let (client, _fake) = client(vec![Script::Response(
        ChatResponse::empty()
            .with_tool_call(ToolCall::new(
                Some("call_1".to_string()),
                "echo",
                "{\"text\":\"ok\"}",
            ))
            .with_tool_call(ToolCall::new(Some("call_2".to_string()), "missing", "{}")),
    )]);

    let result = client.run_tools(ChatRequest::prompt("go").with_tool(echo()));
    assert_eq!(result.kind, ToolAutoResultKind::Error);
    assert_eq!(result.tool_results.len(), 2);
    assert_eq!(result.tool_results[0], json!("OK"));
    let error = result.error.expect("second call should fail");
    assert_eq!(error.kind, ErrorKind::Tool);
    assert_eq!(error.message, "Unknown tool name: missing.");
}

#[test]
fn invalid_requests_never_reach_the_transport() {
    let (client, fake) = client(Vec::new());

    let both = client.chat(ChatRequest::prompt("hi").with_messages(vec![json!({"role": "user"})]));
    assert_eq!(
        both.error.expect("invalid").message,
        "Provide either prompt or messages, not both."
    );

    let tools = client.run_tools(ChatRequest::prompt("hi"));
    assert_eq!(
        tools.error.expect("invalid").message,
        "tools are required for this operation."
    );

    let stream = client.stream_events(ChatRequest::new());
    let kinds = stream.map(|event| event.kind()).collect::<Vec<_>>();
    assert_eq!(kinds, vec!["error", "final"]);
    assert!(fake.requests().is_empty());
}

#[test]
fn empty_response_is_retried_in_place() {
    let (client, fake) = client(vec![
        Script::Response(ChatResponse::empty()),
        Script::Response(ChatResponse::text("second time")),
    ]);

    let output = client.chat("hi");
    assert_eq!(output.value.as_deref(), Some("second time"));
    assert_eq!(fake.requests().len(), 2);
}

#[test]
fn temporary_failures_fall_back_after_exhausting_attempts() {
    let (client, fake) = client_with(
        vec![
            Script::Fail(TransportError::rate_limit("slow down")),
            Script::Fail(TransportError::timeout("timed out")),
            Script::Response(ChatResponse::text("from fallback")),
        ],
        |core| {
            core.with_max_retries(2)
                .with_fallback_models(vec!["anthropic:claude-3-5-haiku".to_string()])
        },
    );

    let output = client.chat("hi");
    assert_eq!(output.value.as_deref(), Some("from fallback"));
    let models = fake
        .requests()
        .into_iter()
        .map(|request| request.model)
        .collect::<Vec<_>>();
    assert_eq!(
        models,
        vec!["gpt-4o-mini", "gpt-4o-mini", "claude-3-5-haiku"]
    );
}

#[test]
fn non_retryable_failure_stops_immediately() {
    let (client, fake) = client(vec![Script::Fail(TransportError::authentication("bad key"))]);

    let error = client.chat("hi").error.expect("auth failure");
    assert_eq!(error.kind, ErrorKind::Config);
    assert_eq!(error.message, "openai:gpt-4o-mini: bad key");
    assert_eq!(fake.requests().len(), 1);
}

#[test]
fn exhausted_retries_report_last_candidate() {
    let (client, fake) = client_with(
        vec![
            Script::Fail(TransportError::rate_limit("busy")),
            Script::Fail(TransportError::rate_limit("busy")),
        ],
        |core| core.with_max_retries(2),
    );

    let error = client.chat("hi").error.expect("exhausted");
    assert_eq!(error.kind, ErrorKind::Temporary);
    assert_eq!(error.message, "openai:gpt-4o-mini: LLM call failed after retries");
    assert_eq!(fake.requests().len(), 2);
}

#[tokio::test]
async fn async_text_stream_yields_deltas_and_records() {
    let (client, _fake) = client(vec![Script::Chunks(vec![
        Ok(ChatChunk::text("Hel")),
        Ok(ChatChunk::text("lo")),
    ])]);
    client
        .tapes()
        .handoff("ops", "start", None, rcommon::JsonMap::new())
        .expect("handoff");

    let mut stream = client.tape("ops").stream_async("greet").await;
    let mut text = String::new();
    while let Some(delta) = stream.next().await {
        text.push_str(&delta);
    }
    assert_eq!(text, "Hello");
    assert!(stream.error().is_none());

    let messages = client
        .tape("ops")
        .messages()
        .expect("messages");
    assert_eq!(messages.last().map(|message| message["content"].clone()), Some(json!("Hello")));
}

#[test]
fn tape_context_override_reads_whole_tape() {
    let (client, fake) = client(vec![Script::Response(ChatResponse::text("ok"))]);
    let notes = client
        .tape("notes")
        .with_context(TapeContext::new(AnchorSelector::WholeTape));
    notes
        .append(TapeEntry::message(json!({"role": "user", "content": "earlier"})))
        .expect("append");

    assert!(notes.chat("later").ok());
    assert_eq!(roles(&fake.requests()[0].messages), vec!["user", "user"]);
}
