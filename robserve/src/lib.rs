//! Observability hooks for the retry loop and tool execution.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use robserve::{MetricsObservabilityHooks, SafeProviderHooks, TracingObservabilityHooks};
//! use rprovider::ProviderOperationHooks;
//!
//! let _provider_hooks: Arc<dyn ProviderOperationHooks> =
//!     Arc::new(SafeProviderHooks::new(TracingObservabilityHooks));
//! let _metrics = MetricsObservabilityHooks;
//! ```

mod metrics_hooks;
mod safe_hooks;
mod tracing_hooks;

pub use metrics_hooks::MetricsObservabilityHooks;
pub use safe_hooks::{SafeProviderHooks, SafeToolHooks};
pub use tracing_hooks::TracingObservabilityHooks;

pub mod prelude {
    pub use crate::{
        MetricsObservabilityHooks, SafeProviderHooks, SafeToolHooks, TracingObservabilityHooks,
    };
}
