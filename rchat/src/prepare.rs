//! Request validation and outbound message preparation.

use rcommon::{ErrorPayload, JsonMap};
use rprovider::CallParams;
use rtape::{RecordChat, TapeManager};
use rtooling::{ToolContext, ToolSet, normalize_tools};
use serde_json::{Value, json};

use crate::ChatRequest;

/// What an operation demands of the request's tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct ToolRequirement {
    pub tools: bool,
    pub runnable: bool,
}

impl ToolRequirement {
    pub const NONE: Self = Self {
        tools: false,
        runnable: false,
    };
    pub const TOOLS: Self = Self {
        tools: true,
        runnable: false,
    };
    pub const RUNNABLE: Self = Self {
        tools: true,
        runnable: true,
    };
}

/// One logical chat invocation, ready for the orchestrator.
#[derive(Debug, Clone, Default)]
pub(crate) struct PreparedChat {
    pub payload: Vec<Value>,
    pub new_messages: Vec<Value>,
    pub toolset: ToolSet,
    pub tape: Option<String>,
    pub should_update: bool,
    /// Set when tape history could not be resolved; no transport call is made.
    pub context_error: Option<ErrorPayload>,
    pub run_id: String,
    pub system_prompt: Option<String>,
    model: Option<String>,
    provider: Option<String>,
    max_tokens: Option<u32>,
    extra: JsonMap,
}

impl PreparedChat {
    pub fn call_params(&self, stream: bool) -> CallParams {
        CallParams {
            messages: self.payload.clone(),
            tools: self.toolset.payload(),
            model: self.model.clone(),
            provider: self.provider.clone(),
            max_tokens: self.max_tokens,
            stream,
            extra: self.extra.clone(),
        }
    }

    /// Tape to record into, when this invocation records at all.
    pub fn recording_tape(&self) -> Option<&str> {
        self.tape.as_deref().filter(|_| self.should_update)
    }

    /// Turn record seeded with everything known before the transport call.
    pub fn record(&self) -> Option<RecordChat> {
        let tape = self.recording_tape()?;
        Some(
            RecordChat::new(tape, self.run_id.clone())
                .with_system_prompt(self.system_prompt.clone())
                .with_context_error(self.context_error.clone())
                .with_new_messages(self.new_messages.clone()),
        )
    }

    pub fn tool_context(&self) -> ToolContext {
        let context = ToolContext::new(self.run_id.clone());
        match &self.tape {
            Some(tape) => context.with_tape(tape.clone()),
            None => context,
        }
    }
}

/// Appends a finished turn. Recording failures never replace the result the
/// caller is about to receive.
pub(crate) fn commit_record(tapes: &TapeManager, record: Option<RecordChat>) {
    let Some(record) = record else {
        return;
    };
    let tape = record.tape.clone();
    if let Err(error) = tapes.record_chat(record) {
        tracing::warn!(tape = %tape, error = %error, "failed to record chat turn");
    }
}

pub(crate) fn validate_request(request: &ChatRequest) -> Result<(), ErrorPayload> {
    match (&request.prompt, &request.messages) {
        (Some(_), Some(_)) => {
            return Err(ErrorPayload::invalid_input(
                "Provide either prompt or messages, not both.",
            ));
        }
        (None, None) => {
            return Err(ErrorPayload::invalid_input(
                "Either prompt or messages is required.",
            ));
        }
        _ => {}
    }

    if request.messages.is_some() {
        if request.system_prompt.is_some() {
            return Err(ErrorPayload::invalid_input(
                "system_prompt is not supported with messages. Include it in messages instead.",
            ));
        }
        if request.images.is_some() {
            return Err(ErrorPayload::invalid_input(
                "images are not supported with messages. Include image content in messages instead.",
            ));
        }
        if request.tape.is_some() {
            return Err(ErrorPayload::invalid_input(
                "tape is not supported with messages.",
            ));
        }
    }

    if request.images.is_some() && request.prompt.is_none() {
        return Err(ErrorPayload::invalid_input("images require prompt to be set."));
    }
    Ok(())
}

pub(crate) fn prepare_chat(
    request: ChatRequest,
    tapes: &TapeManager,
    requirement: ToolRequirement,
) -> Result<PreparedChat, ErrorPayload> {
    if requirement.tools && request.tools.is_empty() {
        return Err(ErrorPayload::invalid_input(
            "tools are required for this operation.",
        ));
    }
    validate_request(&request)?;

    let toolset = normalize_tools(request.tools)?;
    if requirement.tools && toolset.is_empty() {
        return Err(ErrorPayload::invalid_input(
            "tools are required for this operation.",
        ));
    }
    if requirement.runnable {
        toolset.require_runnable()?;
    }

    let run_id = uuid::Uuid::new_v4().simple().to_string();
    let mut prepared = PreparedChat {
        payload: Vec::new(),
        new_messages: Vec::new(),
        toolset,
        tape: request.tape.clone(),
        should_update: false,
        context_error: None,
        run_id,
        system_prompt: None,
        model: request.model,
        provider: request.provider,
        max_tokens: request.max_tokens,
        extra: request.extra,
    };

    if let Some(messages) = request.messages {
        prepared.payload = messages;
        return Ok(prepared);
    }

    let prompt = request.prompt.unwrap_or_default();
    let user_message = user_message(&prompt, request.images.as_deref());
    let system_prompt = request.system_prompt.filter(|prompt| !prompt.is_empty());

    let Some(tape) = request.tape else {
        if let Some(system_prompt) = system_prompt {
            prepared
                .payload
                .push(json!({"role": "system", "content": system_prompt}));
        }
        prepared.payload.push(user_message);
        return Ok(prepared);
    };

    prepared.should_update = true;
    let history = match tapes.read_messages(&tape, request.context.as_ref()) {
        Ok(history) => history,
        Err(error) => {
            tracing::debug!(tape = %tape, error = %error, "tape context resolution failed");
            prepared.context_error = Some(error);
            Vec::new()
        }
    };

    // History that already carries a system message keeps it; the new prompt is dropped.
    let has_system = history
        .iter()
        .any(|message| message.get("role").and_then(Value::as_str) == Some("system"));
    if let Some(system_prompt) = system_prompt.filter(|_| !has_system) {
        prepared
            .new_messages
            .push(json!({"role": "system", "content": system_prompt.clone()}));
        prepared.system_prompt = Some(system_prompt);
    }
    prepared.new_messages.push(user_message);
    prepared.payload = history;
    prepared.payload.extend(prepared.new_messages.iter().cloned());
    Ok(prepared)
}

fn user_message(prompt: &str, images: Option<&[String]>) -> Value {
    let content = match images.filter(|images| !images.is_empty()) {
        None => Value::from(prompt),
        Some(images) => {
            let mut parts = vec![json!({"type": "text", "text": prompt})];
            parts.extend(
                images
                    .iter()
                    .map(|url| json!({"type": "image_url", "image_url": {"url": url}})),
            );
            Value::Array(parts)
        }
    };
    json!({"role": "user", "content": content})
}

#[cfg(test)]
mod tests {
    use rcommon::ErrorKind;
    use rtape::{AnchorSelector, TapeContext, TapeEntry};
    use rtooling::{ParamType, Tool, ToolParams};

    use super::*;

    fn echo() -> Tool {
        Tool::from_fn(
            "echo",
            ToolParams::new().required("text", ParamType::String),
            |args, _ctx| Ok(Value::Object(args)),
        )
    }

    #[test]
    fn validation_messages_cover_invalid_combinations() {
        let cases = [
            (
                ChatRequest::prompt("hi").with_messages(Vec::new()),
                "Provide either prompt or messages, not both.",
            ),
            (ChatRequest::new(), "Either prompt or messages is required."),
            (
                ChatRequest::messages(Vec::new()).with_system_prompt("s"),
                "system_prompt is not supported with messages. Include it in messages instead.",
            ),
            (
                ChatRequest::messages(Vec::new()).with_image("https://x/y.png"),
                "images are not supported with messages. Include image content in messages instead.",
            ),
            (
                ChatRequest::messages(Vec::new()).with_tape("ops"),
                "tape is not supported with messages.",
            ),
        ];

        for (request, expected) in cases {
            let error = validate_request(&request).expect_err("request should be rejected");
            assert_eq!(error.kind, ErrorKind::InvalidInput);
            assert_eq!(error.message, expected);
        }
    }

    #[test]
    fn tool_operations_require_tools_and_runnable_handlers() {
        let tapes = TapeManager::in_memory();
        let error = prepare_chat(ChatRequest::prompt("hi"), &tapes, ToolRequirement::TOOLS)
            .expect_err("tools required");
        assert_eq!(error.message, "tools are required for this operation.");

        let schema_only = Tool::schema_only("lookup", "", json!({"type": "object"}));
        let error = prepare_chat(
            ChatRequest::prompt("hi").with_tool(schema_only),
            &tapes,
            ToolRequirement::RUNNABLE,
        )
        .expect_err("schema-only tools cannot run");
        assert_eq!(error.message, "Schema-only tools cannot be executed.");

        let prepared = prepare_chat(
            ChatRequest::prompt("hi").with_tool(echo()),
            &tapes,
            ToolRequirement::RUNNABLE,
        )
        .expect("runnable tool should prepare");
        assert_eq!(prepared.call_params(false).tools.map(|tools| tools.len()), Some(1));
    }

    #[test]
    fn plain_prompt_puts_system_before_user() {
        let prepared = prepare_chat(
            ChatRequest::prompt("hi").with_system_prompt("be brief"),
            &TapeManager::in_memory(),
            ToolRequirement::NONE,
        )
        .expect("prepare");
        assert_eq!(
            prepared.payload,
            vec![
                json!({"role": "system", "content": "be brief"}),
                json!({"role": "user", "content": "hi"}),
            ]
        );
        assert!(prepared.new_messages.is_empty());
        assert!(!prepared.should_update);
        assert_eq!(prepared.run_id.len(), 32);
    }

    #[test]
    fn images_become_content_parts() {
        let prepared = prepare_chat(
            ChatRequest::prompt("describe").with_images(["https://img/a.png"]),
            &TapeManager::in_memory(),
            ToolRequirement::NONE,
        )
        .expect("prepare");
        assert_eq!(
            prepared.payload[0]["content"],
            json!([
                {"type": "text", "text": "describe"},
                {"type": "image_url", "image_url": {"url": "https://img/a.png"}},
            ])
        );
    }

    #[test]
    fn tape_history_is_prepended_and_system_added_once() {
        let tapes = TapeManager::in_memory()
            .with_default_context(TapeContext::new(AnchorSelector::WholeTape));
        tapes
            .append_entry("ops", TapeEntry::message(json!({"role": "system", "content": "old"})))
            .expect("append");
        tapes
            .append_entry("ops", TapeEntry::message(json!({"role": "user", "content": "q1"})))
            .expect("append");

        let prepared = prepare_chat(
            ChatRequest::prompt("q2").with_system_prompt("new").with_tape("ops"),
            &tapes,
            ToolRequirement::NONE,
        )
        .expect("prepare");
        assert!(prepared.should_update);
        assert_eq!(prepared.payload.len(), 3);
        assert_eq!(prepared.new_messages, vec![json!({"role": "user", "content": "q2"})]);
        assert!(prepared.system_prompt.is_none());

        let fresh = prepare_chat(
            ChatRequest::prompt("q1").with_system_prompt("new").with_tape("fresh"),
            &tapes,
            ToolRequirement::NONE,
        )
        .expect("prepare");
        assert_eq!(fresh.new_messages[0], json!({"role": "system", "content": "new"}));
        assert_eq!(fresh.system_prompt.as_deref(), Some("new"));
    }

    #[test]
    fn context_failure_is_carried_not_raised() {
        let prepared = prepare_chat(
            ChatRequest::prompt("hi").with_tape("ops"),
            &TapeManager::in_memory(),
            ToolRequirement::NONE,
        )
        .expect("context errors do not fail preparation");
        let error = prepared.context_error.as_ref().expect("context error");
        assert_eq!(error.kind, ErrorKind::NotFound);
        assert_eq!(prepared.recording_tape(), Some("ops"));
    }
}
