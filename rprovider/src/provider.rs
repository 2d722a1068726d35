//! The only seam to real network I/O: provider clients and their factory.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use rcommon::JsonMap;

use crate::{BoxedChunkStream, ChatResponse, ChunkIter, CompletionRequest, TransportError};

pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of a blocking completion call.
pub enum CompletionOutput {
    Response(ChatResponse),
    Chunks(ChunkIter),
}

/// Result of a cooperative completion call.
pub enum AsyncCompletionOutput {
    Response(ChatResponse),
    Chunks(BoxedChunkStream<'static>),
}

pub trait ProviderClient: Send + Sync {
    fn completion(&self, request: &CompletionRequest) -> Result<CompletionOutput, TransportError>;

    fn acompletion<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> ProviderFuture<'a, Result<AsyncCompletionOutput, TransportError>>;
}

/// Resolved construction inputs for one provider client.
#[derive(Clone, Default, PartialEq)]
pub struct ClientSettings {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub client_args: JsonMap,
}

impl std::fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("client_args", &self.client_args)
            .finish()
    }
}

/// Builds transport clients. Construction may be expensive, so the
/// orchestrator caches what this returns.
pub trait ProviderClientFactory: Send + Sync {
    fn create(
        &self,
        provider: &str,
        settings: &ClientSettings,
    ) -> Result<Arc<dyn ProviderClient>, TransportError>;
}

impl<F> ProviderClientFactory for F
where
    F: Fn(&str, &ClientSettings) -> Result<Arc<dyn ProviderClient>, TransportError> + Send + Sync,
{
    fn create(
        &self,
        provider: &str,
        settings: &ClientSettings,
    ) -> Result<Arc<dyn ProviderClient>, TransportError> {
        self(provider, settings)
    }
}
