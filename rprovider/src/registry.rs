//! Name-keyed registry of ready-made clients, usable as a client factory.
//!
//! ```rust
//! use rprovider::{ClientSettings, ProviderClientFactory, ProviderClientRegistry};
//!
//! let registry = ProviderClientRegistry::new();
//! assert!(registry.is_empty());
//! assert!(registry.create("openai", &ClientSettings::default()).is_err());
//! ```

use std::sync::Arc;

use rcommon::Registry;

use crate::{ClientSettings, ProviderClient, ProviderClientFactory, TransportError};

#[derive(Default)]
pub struct ProviderClientRegistry {
    clients: Registry<String, Arc<dyn ProviderClient>>,
}

impl ProviderClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C>(&mut self, provider: impl Into<String>, client: C)
    where
        C: ProviderClient + 'static,
    {
        self.clients.insert(provider.into(), Arc::new(client));
    }

    pub fn register_shared(&mut self, provider: impl Into<String>, client: Arc<dyn ProviderClient>) {
        self.clients.insert(provider.into(), client);
    }

    pub fn with_client<C>(mut self, provider: impl Into<String>, client: C) -> Self
    where
        C: ProviderClient + 'static,
    {
        self.register(provider, client);
        self
    }

    pub fn contains(&self, provider: &str) -> bool {
        self.clients.contains_key(provider)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl ProviderClientFactory for ProviderClientRegistry {
    fn create(
        &self,
        provider: &str,
        _settings: &ClientSettings,
    ) -> Result<Arc<dyn ProviderClient>, TransportError> {
        self.clients.get(provider).cloned().ok_or_else(|| {
            TransportError::unsupported_provider(format!("provider '{provider}' is not registered"))
        })
    }
}
