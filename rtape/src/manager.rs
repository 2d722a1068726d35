//! Tape manager owning the store and the default context.
//!
//! ```rust
//! use rtape::{RecordChat, TapeEntryKind, TapeManager};
//!
//! let manager = TapeManager::in_memory();
//! manager
//!     .record_chat(
//!         RecordChat::new("ops", "run-1")
//!             .with_new_messages(vec![serde_json::json!({"role": "user", "content": "hi"})])
//!             .with_response_text("hello"),
//!     )
//!     .expect("record should succeed");
//!
//! let kinds = manager
//!     .read_entries("ops")
//!     .expect("read")
//!     .into_iter()
//!     .map(|entry| entry.kind)
//!     .collect::<Vec<_>>();
//! assert_eq!(
//!     kinds,
//!     vec![TapeEntryKind::Message, TapeEntryKind::Message, TapeEntryKind::Event]
//! );
//! ```

use std::sync::{Arc, RwLock};

use rcommon::{ErrorPayload, JsonMap};
use serde_json::{Value, json};

use crate::{InMemoryTapeStore, TapeContext, TapeEntry, TapeQuery, TapeStore};

/// Builds the entries a handoff appends.
pub trait HandoffHandler: Send + Sync {
    fn build_entries(
        &self,
        tape: &str,
        name: &str,
        state: Option<&JsonMap>,
        meta: &JsonMap,
    ) -> Vec<TapeEntry>;
}

/// Decides whether a handoff is recorded at all.
pub trait HandoffPolicy: Send + Sync {
    fn allow(&self, tape: &str, name: &str, state: Option<&JsonMap>, meta: &JsonMap) -> bool;
}

/// One completed tape-scoped turn.
#[derive(Debug, Clone, Default)]
pub struct RecordChat {
    pub tape: String,
    pub run_id: String,
    pub system_prompt: Option<String>,
    pub context_error: Option<ErrorPayload>,
    pub new_messages: Vec<Value>,
    pub response_text: Option<String>,
    pub tool_calls: Vec<Value>,
    /// `Some` whenever tools ran, even with no results.
    pub tool_results: Option<Vec<Value>>,
    pub error: Option<ErrorPayload>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub usage: Option<Value>,
}

impl RecordChat {
    pub fn new(tape: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            tape: tape.into(),
            run_id: run_id.into(),
            ..Self::default()
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt;
        self
    }

    pub fn with_context_error(mut self, error: Option<ErrorPayload>) -> Self {
        self.context_error = error;
        self
    }

    pub fn with_new_messages(mut self, messages: Vec<Value>) -> Self {
        self.new_messages = messages;
        self
    }

    pub fn with_response_text(mut self, text: impl Into<String>) -> Self {
        self.response_text = Some(text.into());
        self
    }

    pub fn with_tool_calls(mut self, calls: Vec<Value>) -> Self {
        self.tool_calls = calls;
        self
    }

    pub fn with_tool_results(mut self, results: Vec<Value>) -> Self {
        self.tool_results = Some(results);
        self
    }

    pub fn with_error(mut self, error: Option<ErrorPayload>) -> Self {
        self.error = error;
        self
    }

    pub fn with_target(mut self, provider: Option<String>, model: Option<String>) -> Self {
        self.provider = provider;
        self.model = model;
        self
    }

    pub fn with_usage(mut self, usage: Option<Value>) -> Self {
        self.usage = usage;
        self
    }
}

pub struct TapeManager {
    store: Arc<dyn TapeStore>,
    default_context: RwLock<TapeContext>,
    handoff_handler: Option<Arc<dyn HandoffHandler>>,
    handoff_policy: Option<Arc<dyn HandoffPolicy>>,
}

impl std::fmt::Debug for TapeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapeManager")
            .field("default_context", &self.default_context())
            .field("handoff_handler", &self.handoff_handler.is_some())
            .field("handoff_policy", &self.handoff_policy.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for TapeManager {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl TapeManager {
    pub fn new(store: Arc<dyn TapeStore>) -> Self {
        Self {
            store,
            default_context: RwLock::new(TapeContext::default()),
            handoff_handler: None,
            handoff_policy: None,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryTapeStore::new()))
    }

    pub fn with_default_context(self, context: TapeContext) -> Self {
        self.set_default_context(context);
        self
    }

    pub fn with_handoff_handler(mut self, handler: Arc<dyn HandoffHandler>) -> Self {
        self.handoff_handler = Some(handler);
        self
    }

    pub fn with_handoff_policy(mut self, policy: Arc<dyn HandoffPolicy>) -> Self {
        self.handoff_policy = Some(policy);
        self
    }

    pub fn store(&self) -> Arc<dyn TapeStore> {
        Arc::clone(&self.store)
    }

    pub fn default_context(&self) -> TapeContext {
        self.default_context
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_default_context(&self, context: TapeContext) {
        *self
            .default_context
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = context;
    }

    pub fn list_tapes(&self) -> Result<Vec<String>, ErrorPayload> {
        self.store.list_tapes()
    }

    /// Every entry of `tape`; empty when the tape does not exist.
    pub fn read_entries(&self, tape: &str) -> Result<Vec<TapeEntry>, ErrorPayload> {
        Ok(self.store.read(tape)?.unwrap_or_default())
    }

    /// Messages of `tape` under `context`, or the default context.
    pub fn read_messages(
        &self,
        tape: &str,
        context: Option<&TapeContext>,
    ) -> Result<Vec<Value>, ErrorPayload> {
        let active = context.cloned().unwrap_or_else(|| self.default_context());
        let query = active.build_query(&self.query_tape(tape));
        let entries = self.store.fetch_all(&query)?;
        Ok(active.build_messages(&entries))
    }

    pub fn append_entry(&self, tape: &str, entry: TapeEntry) -> Result<TapeEntry, ErrorPayload> {
        self.store.append(tape, entry)
    }

    pub fn query_tape(&self, tape: &str) -> TapeQuery {
        TapeQuery::new(tape, Arc::clone(&self.store))
    }

    pub fn reset_tape(&self, tape: &str) -> Result<(), ErrorPayload> {
        self.store.reset(tape)
    }

    /// Appends an anchor and a `handoff` event, returning the stored entries.
    ///
    /// A configured policy may veto the handoff (nothing is appended) and a
    /// configured handler replaces the default entries.
    pub fn handoff(
        &self,
        tape: &str,
        name: &str,
        state: Option<JsonMap>,
        meta: JsonMap,
    ) -> Result<Vec<TapeEntry>, ErrorPayload> {
        if let Some(policy) = &self.handoff_policy
            && !policy.allow(tape, name, state.as_ref(), &meta)
        {
            tracing::debug!(tape, name, "handoff rejected by policy");
            return Ok(Vec::new());
        }

        let entries = match &self.handoff_handler {
            Some(handler) => handler.build_entries(tape, name, state.as_ref(), &meta),
            None => {
                let data = json!({
                    "name": name,
                    "state": Value::Object(state.clone().unwrap_or_default()),
                });
                vec![
                    TapeEntry::anchor(name, state).with_meta(meta.clone()),
                    TapeEntry::event("handoff", data).with_meta(meta),
                ]
            }
        };

        entries
            .into_iter()
            .map(|entry| self.store.append(tape, entry))
            .collect()
    }

    /// Appends one turn in causal order:
    /// system, context error, new messages, tool calls, tool results,
    /// execution error, assistant text, then the `run` event.
    ///
    /// The system entry is skipped when a new message already carries the
    /// same system prompt.
    pub fn record_chat(&self, record: RecordChat) -> Result<(), ErrorPayload> {
        let RecordChat {
            tape,
            run_id,
            system_prompt,
            context_error,
            new_messages,
            response_text,
            tool_calls,
            tool_results,
            error,
            provider,
            model,
            usage,
        } = record;

        let mut meta = JsonMap::new();
        meta.insert("run_id".to_string(), Value::from(run_id.clone()));
        let append = |entry: TapeEntry| -> Result<(), ErrorPayload> {
            self.store.append(&tape, entry.with_meta(meta.clone()))?;
            Ok(())
        };

        let carried = |prompt: &String| {
            new_messages.iter().any(|message| {
                message.get("role").and_then(Value::as_str) == Some("system")
                    && message.get("content").and_then(Value::as_str) == Some(prompt.as_str())
            })
        };
        if let Some(system_prompt) =
            system_prompt.filter(|prompt| !prompt.is_empty() && !carried(prompt))
        {
            append(TapeEntry::system(system_prompt))?;
        }
        if let Some(context_error) = &context_error {
            append(TapeEntry::error(context_error))?;
        }
        for message in new_messages {
            append(TapeEntry::message(message))?;
        }
        if !tool_calls.is_empty() {
            append(TapeEntry::tool_call(tool_calls))?;
        }
        if let Some(results) = tool_results {
            append(TapeEntry::tool_result(results))?;
        }
        if let Some(error) = &error
            && context_error.as_ref() != Some(error)
        {
            append(TapeEntry::error(error))?;
        }
        if let Some(text) = response_text {
            append(TapeEntry::message(json!({"role": "assistant", "content": text})))?;
        }

        let failed = error.is_some() || context_error.is_some();
        let mut data = JsonMap::new();
        data.insert(
            "status".to_string(),
            Value::from(if failed { "error" } else { "ok" }),
        );
        if let Some(usage) = usage {
            data.insert("usage".to_string(), usage);
        }
        if let Some(provider) = provider.filter(|value| !value.is_empty()) {
            data.insert("provider".to_string(), Value::from(provider));
        }
        if let Some(model) = model.filter(|value| !value.is_empty()) {
            data.insert("model".to_string(), Value::from(model));
        }
        append(TapeEntry::event("run", Value::Object(data)))?;

        tracing::debug!(tape = %tape, run_id = %run_id, failed, "recorded chat turn");
        Ok(())
    }
}
