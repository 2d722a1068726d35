//! Chat request description.
//!
//! ```rust
//! use rchat::ChatRequest;
//!
//! let request = ChatRequest::prompt("What changed?")
//!     .with_system_prompt("Answer in one line.")
//!     .with_max_tokens(64)
//!     .with_tape("ops");
//! assert_eq!(request.tape_name(), Some("ops"));
//!
//! let from_text: ChatRequest = "hello".into();
//! assert_eq!(from_text.prompt_text(), Some("hello"));
//! ```

use rcommon::JsonMap;
use rtape::TapeContext;
use rtooling::ToolSpec;
use serde_json::Value;

/// Inputs for one chat operation. Exactly one of prompt or messages is
/// expected; the client validates the combination.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub(crate) prompt: Option<String>,
    pub(crate) messages: Option<Vec<Value>>,
    pub(crate) system_prompt: Option<String>,
    pub(crate) images: Option<Vec<String>>,
    pub(crate) model: Option<String>,
    pub(crate) provider: Option<String>,
    pub(crate) max_tokens: Option<u32>,
    pub(crate) tools: Vec<ToolSpec>,
    pub(crate) extra: JsonMap,
    pub(crate) tape: Option<String>,
    pub(crate) context: Option<TapeContext>,
}

impl ChatRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self::new().with_prompt(prompt)
    }

    pub fn messages(messages: Vec<Value>) -> Self {
        Self::new().with_messages(messages)
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_messages(mut self, messages: Vec<Value>) -> Self {
        self.messages = Some(messages);
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Image URLs attached to the prompt as `image_url` content parts.
    pub fn with_images<I, S>(mut self, images: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.images = Some(images.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.images.get_or_insert_with(Vec::new).push(url.into());
        self
    }

    /// Overrides the client model. Either `provider:model` or a bare model
    /// together with [`with_provider`](Self::with_provider).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_tool(mut self, tool: impl Into<ToolSpec>) -> Self {
        self.tools.push(tool.into());
        self
    }

    pub fn with_tools<I, T>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ToolSpec>,
    {
        self.tools.extend(tools.into_iter().map(Into::into));
        self
    }

    /// Provider-specific option forwarded untouched.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Reads history from and records the turn into the named tape.
    pub fn with_tape(mut self, tape: impl Into<String>) -> Self {
        self.tape = Some(tape.into());
        self
    }

    pub fn with_context(mut self, context: TapeContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn prompt_text(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn tape_name(&self) -> Option<&str> {
        self.tape.as_deref()
    }

    pub fn has_tools(&self) -> bool {
        !self.tools.is_empty()
    }
}

impl From<&str> for ChatRequest {
    fn from(prompt: &str) -> Self {
        Self::prompt(prompt)
    }
}

impl From<String> for ChatRequest {
    fn from(prompt: String) -> Self {
        Self::prompt(prompt)
    }
}

impl From<Vec<Value>> for ChatRequest {
    fn from(messages: Vec<Value>) -> Self {
        Self::messages(messages)
    }
}
