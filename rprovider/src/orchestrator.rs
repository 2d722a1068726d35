//! Provider/model resolution, client caching, and the retry/fallback loop.
//!
//! ```rust
//! use rprovider::LLMCore;
//!
//! let (provider, model) = LLMCore::resolve_model_provider("openai:gpt-4o-mini", None)
//!     .expect("prefixed model should resolve");
//! assert_eq!(provider, "openai");
//! assert_eq!(model, "gpt-4o-mini");
//!
//! assert!(LLMCore::resolve_model_provider("openai:gpt-4o-mini", Some("openai")).is_err());
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use rcommon::{ErrorKind, ErrorPayload, JsonMap};
use serde_json::Value;
use tracing::Instrument;

use crate::{
    AsyncCompletionOutput, AttemptInfo, AttemptOutcome, ClientSettings, CompletionOutput,
    CompletionRequest, CredentialSetting, ErrorClassifier, NoopOperationHooks, ProviderClient,
    ProviderClientFactory, ProviderOperationHooks, TransportError, classify_transport_error,
};

/// Per-call inputs shared by every attempt of one logical operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallParams {
    pub messages: Vec<Value>,
    pub tools: Option<Vec<Value>>,
    pub model: Option<String>,
    pub provider: Option<String>,
    pub max_tokens: Option<u32>,
    pub stream: bool,
    pub extra: JsonMap,
}

impl CallParams {
    fn request_for(&self, model: &str) -> CompletionRequest {
        CompletionRequest {
            model: model.to_string(),
            messages: self.messages.clone(),
            tools: self.tools.clone(),
            max_tokens: self.max_tokens,
            stream: self.stream,
            extra: self.extra.clone(),
        }
    }
}

pub struct LLMCore {
    provider: String,
    model: String,
    fallback_models: Vec<String>,
    max_retries: u32,
    api_key: Option<CredentialSetting>,
    api_base: Option<CredentialSetting>,
    client_args: JsonMap,
    verbose: u8,
    classifier: Option<Arc<dyn ErrorClassifier>>,
    hooks: Arc<dyn ProviderOperationHooks>,
    factory: Arc<dyn ProviderClientFactory>,
    clients: Mutex<HashMap<String, Arc<dyn ProviderClient>>>,
}

impl std::fmt::Debug for LLMCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LLMCore")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("fallback_models", &self.fallback_models)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl LLMCore {
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        factory: Arc<dyn ProviderClientFactory>,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            fallback_models: Vec::new(),
            max_retries: 3,
            api_key: None,
            api_base: None,
            client_args: JsonMap::new(),
            verbose: 0,
            classifier: None,
            hooks: Arc::new(NoopOperationHooks),
            factory,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_fallback_models(mut self, fallback_models: Vec<String>) -> Self {
        self.fallback_models = fallback_models;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_api_key(mut self, api_key: Option<CredentialSetting>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_api_base(mut self, api_base: Option<CredentialSetting>) -> Self {
        self.api_base = api_base;
        self
    }

    pub fn with_client_args(mut self, client_args: JsonMap) -> Self {
        self.client_args = client_args;
        self
    }

    pub fn with_verbose(mut self, verbose: u8) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_error_classifier(mut self, classifier: Option<Arc<dyn ErrorClassifier>>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ProviderOperationHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn fallback_models(&self) -> &[String] {
        &self.fallback_models
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    pub fn resolve_model_provider(
        model: &str,
        provider: Option<&str>,
    ) -> Result<(String, String), ErrorPayload> {
        if let Some(provider) = provider.filter(|provider| !provider.is_empty()) {
            if model.contains(':') {
                return Err(ErrorPayload::invalid_input(
                    "When provider is specified, model must not include a provider prefix.",
                ));
            }
            return Ok((provider.to_string(), model.to_string()));
        }

        match model.split_once(':') {
            Some((provider, model)) if !provider.is_empty() && !model.is_empty() => {
                Ok((provider.to_string(), model.to_string()))
            }
            _ => Err(ErrorPayload::invalid_input(
                "Model must be in 'provider:model' format.",
            )),
        }
    }

    pub fn resolve_fallback(&self, model: &str) -> Result<(String, String), ErrorPayload> {
        if let Some((provider, model_id)) = model.split_once(':') {
            if provider.is_empty() || model_id.is_empty() {
                return Err(ErrorPayload::invalid_input(
                    "Fallback models must be in 'provider:model' format.",
                ));
            }
            return Ok((provider.to_string(), model_id.to_string()));
        }

        if self.provider.is_empty() {
            return Err(ErrorPayload::invalid_input(
                "Fallback models must include provider or LLM must be initialized with a provider.",
            ));
        }
        Ok((self.provider.clone(), model.to_string()))
    }

    pub fn model_candidates(
        &self,
        override_model: Option<&str>,
        override_provider: Option<&str>,
    ) -> Result<Vec<(String, String)>, ErrorPayload> {
        if let Some(model) = override_model.filter(|model| !model.is_empty()) {
            return Ok(vec![Self::resolve_model_provider(model, override_provider)?]);
        }

        let mut candidates = vec![(self.provider.clone(), self.model.clone())];
        for model in &self.fallback_models {
            candidates.push(self.resolve_fallback(model)?);
        }
        Ok(candidates)
    }

    pub fn client_settings(&self, provider: &str) -> ClientSettings {
        ClientSettings {
            api_key: self
                .api_key
                .as_ref()
                .and_then(|setting| setting.resolve(provider))
                .map(ToString::to_string),
            api_base: self
                .api_base
                .as_ref()
                .and_then(|setting| setting.resolve(provider))
                .map(ToString::to_string),
            client_args: self.client_args.clone(),
        }
    }

    /// Order-independent identity of a client construction request.
    pub fn cache_key(provider: &str, settings: &ClientSettings) -> String {
        let payload = serde_json::json!({
            "provider": provider,
            "api_key": settings.api_key,
            "api_base": settings.api_base,
            "client_args": Value::Object(settings.client_args.clone()),
        });
        canonicalize(&payload).to_string()
    }

    pub fn get_client(&self, provider: &str) -> Result<Arc<dyn ProviderClient>, ErrorPayload> {
        let settings = self.client_settings(provider);
        let key = Self::cache_key(provider, &settings);

        let mut clients = self
            .clients
            .lock()
            .map_err(|_| ErrorPayload::unknown("provider client cache lock poisoned"))?;
        if let Some(client) = clients.get(&key) {
            return Ok(Arc::clone(client));
        }

        let client = self.factory.create(provider, &settings).map_err(|error| {
            let kind = self.classify(&error);
            ErrorPayload::new(kind, format!("{provider}: {error}"))
        })?;
        clients.insert(key, Arc::clone(&client));
        Ok(client)
    }

    pub fn cached_client_count(&self) -> usize {
        self.clients.lock().map(|clients| clients.len()).unwrap_or(0)
    }

    pub fn classify(&self, error: &TransportError) -> ErrorKind {
        classify_transport_error(error, self.classifier.as_deref())
    }

    pub fn wrap_error(&self, error: &TransportError, provider: &str, model: &str) -> ErrorPayload {
        ErrorPayload::new(self.classify(error), format!("{provider}:{model}: {error}"))
    }

    /// Records a failure that consumed an attempt without ending the loop.
    pub fn report_retry(&self, error: &ErrorPayload, info: &AttemptInfo) {
        self.hooks
            .on_retry_scheduled(&info.provider, &info.model, info.attempt, error);
        let Some(message) = self.retry_message(error, info) else {
            return;
        };
        tracing::warn!(
            provider = %info.provider,
            model = %info.model,
            attempt = info.attempt,
            error_kind = %error.kind,
            "{message}"
        );
    }

    /// Log line for a retried failure: none at verbose 0, the failure at 1,
    /// and at 2 also its kind and details.
    pub fn retry_message(&self, error: &ErrorPayload, info: &AttemptInfo) -> Option<String> {
        let mut message = match self.verbose {
            0 => return None,
            _ => format!(
                "[{}] attempt {}/{} failed: {}",
                info.label(),
                info.attempt,
                info.max_attempts,
                error.message
            ),
        };
        if self.verbose >= 2 {
            message.push_str(&format!(" (kind={}", error.kind));
            if let Some(details) = &error.details {
                message.push_str(&format!(", details={}", Value::Object(details.clone())));
            }
            message.push(')');
        }
        Some(message)
    }

    /// Classifies a transport failure. Returns `Err` when the loop must stop.
    pub fn handle_attempt_error(
        &self,
        error: &TransportError,
        info: &AttemptInfo,
    ) -> Result<(), ErrorPayload> {
        let wrapped = self.wrap_error(error, &info.provider, &info.model);
        if !wrapped.is_retryable() {
            self.hooks
                .on_failure(&info.provider, &info.model, info.attempt, &wrapped);
            return Err(wrapped);
        }
        self.report_retry(&wrapped, info);
        Ok(())
    }

    fn exhausted(&self, last: Option<&(String, String)>) -> ErrorPayload {
        let error = match last {
            Some((provider, model)) => {
                ErrorPayload::temporary(format!("{provider}:{model}: LLM call failed after retries"))
            }
            None => ErrorPayload::temporary("LLM call failed after retries"),
        };
        if let Some((provider, model)) = last {
            self.hooks
                .on_failure(provider, model, self.max_attempts(), &error);
        }
        error
    }

    fn attempt_info(&self, provider: &str, model: &str, attempt: u32) -> AttemptInfo {
        AttemptInfo {
            provider: provider.to_string(),
            model: model.to_string(),
            attempt,
            max_attempts: self.max_attempts(),
        }
    }

    pub fn run_chat_sync<T, F>(&self, params: &CallParams, mut on_response: F) -> Result<T, ErrorPayload>
    where
        F: FnMut(CompletionOutput, &AttemptInfo) -> Result<AttemptOutcome<T>, ErrorPayload>,
    {
        let candidates =
            self.model_candidates(params.model.as_deref(), params.provider.as_deref())?;

        for (provider, model) in &candidates {
            let client = self.get_client(provider)?;
            let request = params.request_for(model);

            for attempt in 1..=self.max_attempts() {
                let info = self.attempt_info(provider, model, attempt);
                let span = tracing::info_span!(
                    "republic.llm.attempt",
                    provider = %provider,
                    model = %model,
                    attempt,
                    stream = params.stream
                );
                let _entered = span.enter();
                self.hooks.on_attempt_start(provider, model, attempt);

                match client.completion(&request) {
                    Ok(output) => match on_response(output, &info)? {
                        AttemptOutcome::Done(value) => {
                            self.hooks.on_success(provider, model, attempt);
                            return Ok(value);
                        }
                        AttemptOutcome::Retry => continue,
                    },
                    Err(error) => self.handle_attempt_error(&error, &info)?,
                }
            }
        }

        Err(self.exhausted(candidates.last()))
    }

    pub async fn run_chat_async<T, F, Fut>(
        &self,
        params: &CallParams,
        mut on_response: F,
    ) -> Result<T, ErrorPayload>
    where
        F: FnMut(AsyncCompletionOutput, AttemptInfo) -> Fut,
        Fut: Future<Output = Result<AttemptOutcome<T>, ErrorPayload>>,
    {
        let candidates =
            self.model_candidates(params.model.as_deref(), params.provider.as_deref())?;

        for (provider, model) in &candidates {
            let client = self.get_client(provider)?;
            let request = params.request_for(model);

            for attempt in 1..=self.max_attempts() {
                let info = self.attempt_info(provider, model, attempt);
                let span = tracing::info_span!(
                    "republic.llm.attempt",
                    provider = %provider,
                    model = %model,
                    attempt,
                    stream = params.stream
                );
                self.hooks.on_attempt_start(provider, model, attempt);

                let completion = client.acompletion(&request).instrument(span.clone()).await;
                match completion {
                    Ok(output) => {
                        let outcome = on_response(output, info).instrument(span).await?;
                        match outcome {
                            AttemptOutcome::Done(value) => {
                                self.hooks.on_success(provider, model, attempt);
                                return Ok(value);
                            }
                            AttemptOutcome::Retry => continue,
                        }
                    }
                    Err(error) => self.handle_attempt_error(&error, &info)?,
                }
            }
        }

        Err(self.exhausted(candidates.last()))
    }
}

/// Rebuilds every object with keys in sorted order so the rendered string is
/// independent of insertion order.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys = map.keys().collect::<Vec<_>>();
            keys.sort();
            let mut sorted = JsonMap::new();
            for key in keys {
                if let Some(item) = map.get(key) {
                    sorted.insert(key.clone(), canonicalize(item));
                }
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
