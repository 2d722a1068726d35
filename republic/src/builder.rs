//! Configuration surface for [`LLM`](crate::LLM).

use std::sync::Arc;

use rchat::ChatClient;
use rcommon::{ErrorPayload, JsonMap};
use robserve::{SafeProviderHooks, SafeToolHooks, TracingObservabilityHooks};
use rprovider::{
    CredentialSetting, ErrorClassifier, LLMCore, ProviderClientFactory, ProviderOperationHooks,
};
use rtape::{
    HandoffHandler, HandoffPolicy, TapeContext, TapeManager, TapeStore, TapeStoreConfig,
    create_tape_store,
};
use rtooling::{ToolExecutor, ToolRuntimeHooks};

use crate::LLM;

/// Model used when the builder is given none.
pub const DEFAULT_MODEL: &str = "openai:gpt-4o-mini";

pub struct LLMBuilder {
    factory: Arc<dyn ProviderClientFactory>,
    model: Option<String>,
    provider: Option<String>,
    fallback_models: Vec<String>,
    max_retries: u32,
    api_key: Option<CredentialSetting>,
    api_base: Option<CredentialSetting>,
    client_args: JsonMap,
    verbose: u8,
    tape_store: Option<Arc<dyn TapeStore>>,
    tape_store_config: TapeStoreConfig,
    context: Option<TapeContext>,
    classifier: Option<Arc<dyn ErrorClassifier>>,
    provider_hooks: Option<Arc<dyn ProviderOperationHooks>>,
    tool_hooks: Option<Arc<dyn ToolRuntimeHooks>>,
    handoff_handler: Option<Arc<dyn HandoffHandler>>,
    handoff_policy: Option<Arc<dyn HandoffPolicy>>,
}

impl LLMBuilder {
    pub fn new(factory: Arc<dyn ProviderClientFactory>) -> Self {
        Self {
            factory,
            model: None,
            provider: None,
            fallback_models: Vec::new(),
            max_retries: 3,
            api_key: None,
            api_base: None,
            client_args: JsonMap::new(),
            verbose: 0,
            tape_store: None,
            tape_store_config: TapeStoreConfig::default(),
            context: None,
            classifier: None,
            provider_hooks: None,
            tool_hooks: None,
            handoff_handler: None,
            handoff_policy: None,
        }
    }

    /// `provider:model`, or a bare model id together with [`Self::with_provider`].
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_fallback_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_models = models.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<CredentialSetting>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<CredentialSetting>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    pub fn with_client_args(mut self, client_args: JsonMap) -> Self {
        self.client_args = client_args;
        self
    }

    /// 0 is quiet; 1 logs each retried failure; 2 adds its error kind and details.
    pub fn with_verbose(mut self, verbose: u8) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_tape_store(mut self, store: Arc<dyn TapeStore>) -> Self {
        self.tape_store = Some(store);
        self
    }

    /// Ignored when a store is injected with [`Self::with_tape_store`].
    pub fn with_tape_store_config(mut self, config: TapeStoreConfig) -> Self {
        self.tape_store_config = config;
        self
    }

    pub fn with_context(mut self, context: TapeContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_error_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_provider_hooks(mut self, hooks: Arc<dyn ProviderOperationHooks>) -> Self {
        self.provider_hooks = Some(hooks);
        self
    }

    pub fn with_tool_hooks(mut self, hooks: Arc<dyn ToolRuntimeHooks>) -> Self {
        self.tool_hooks = Some(hooks);
        self
    }

    /// Installs panic-safe tracing hooks for provider attempts and tool runs.
    pub fn with_tracing(self) -> Self {
        self.with_provider_hooks(Arc::new(SafeProviderHooks::new(TracingObservabilityHooks)))
            .with_tool_hooks(Arc::new(SafeToolHooks::new(TracingObservabilityHooks)))
    }

    pub fn with_handoff_handler(mut self, handler: Arc<dyn HandoffHandler>) -> Self {
        self.handoff_handler = Some(handler);
        self
    }

    pub fn with_handoff_policy(mut self, policy: Arc<dyn HandoffPolicy>) -> Self {
        self.handoff_policy = Some(policy);
        self
    }

    pub fn build(self) -> Result<LLM, ErrorPayload> {
        if self.verbose > 2 {
            return Err(ErrorPayload::invalid_input("verbose must be 0, 1, or 2"));
        }

        let model = match self.model.filter(|model| !model.is_empty()) {
            Some(model) => model,
            None => {
                tracing::warn!("No model was provided, defaulting to {}", DEFAULT_MODEL);
                DEFAULT_MODEL.to_string()
            }
        };
        let (provider, model) = LLMCore::resolve_model_provider(&model, self.provider.as_deref())?;

        let mut core = LLMCore::new(provider, model, self.factory)
            .with_fallback_models(self.fallback_models)
            .with_max_retries(self.max_retries)
            .with_api_key(self.api_key)
            .with_api_base(self.api_base)
            .with_client_args(self.client_args)
            .with_verbose(self.verbose)
            .with_error_classifier(self.classifier);
        if let Some(hooks) = self.provider_hooks {
            core = core.with_hooks(hooks);
        }

        let mut executor = ToolExecutor::new();
        if let Some(hooks) = self.tool_hooks {
            executor = executor.with_hooks(hooks);
        }

        let store = match self.tape_store {
            Some(store) => store,
            None => create_tape_store(self.tape_store_config)?,
        };
        let mut tapes = TapeManager::new(store);
        if let Some(context) = self.context {
            tapes = tapes.with_default_context(context);
        }
        if let Some(handler) = self.handoff_handler {
            tapes = tapes.with_handoff_handler(handler);
        }
        if let Some(policy) = self.handoff_policy {
            tapes = tapes.with_handoff_policy(policy);
        }

        Ok(LLM::from_client(ChatClient::new(
            Arc::new(core),
            executor,
            Arc::new(tapes),
        )))
    }
}

impl std::fmt::Debug for LLMBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LLMBuilder")
            .field("model", &self.model)
            .field("provider", &self.provider)
            .field("fallback_models", &self.fallback_models)
            .field("max_retries", &self.max_retries)
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use rcommon::ErrorKind;
    use rprovider::ProviderClientRegistry;

    use super::*;

    fn builder() -> LLMBuilder {
        LLMBuilder::new(Arc::new(ProviderClientRegistry::new()))
    }

    #[test]
    fn verbose_above_two_is_rejected() {
        let error = builder()
            .with_model("openai:gpt-4o")
            .with_verbose(3)
            .build()
            .expect_err("verbose 3 should be rejected");
        assert_eq!(error.kind, ErrorKind::InvalidInput);
        assert_eq!(error.message, "verbose must be 0, 1, or 2");
    }

    #[test]
    fn missing_model_falls_back_to_default() {
        let llm = builder().build().expect("default model should build");
        assert_eq!(llm.provider(), "openai");
        assert_eq!(llm.model(), "gpt-4o-mini");
    }

    #[test]
    fn explicit_provider_rejects_prefixed_model() {
        let error = builder()
            .with_model("openai:gpt-4o")
            .with_provider("anthropic")
            .build()
            .expect_err("prefixed model with provider should fail");
        assert_eq!(
            error.message,
            "When provider is specified, model must not include a provider prefix."
        );

        let llm = builder()
            .with_model("claude-3-5-sonnet")
            .with_provider("anthropic")
            .with_fallback_models(["openai:gpt-4o-mini"])
            .build()
            .expect("bare model with provider should build");
        assert_eq!(llm.provider(), "anthropic");
        assert_eq!(llm.fallback_models(), ["openai:gpt-4o-mini".to_string()]);
    }

    #[test]
    fn bare_model_without_provider_is_invalid() {
        let error = builder()
            .with_model("gpt-4o")
            .build()
            .expect_err("bare model should fail");
        assert_eq!(error.message, "Model must be in 'provider:model' format.");
    }
}
