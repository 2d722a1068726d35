//! Transport-level failures reported by provider clients.
//!
//! These are the raw failure categories a transport can surface. The
//! orchestrator never lets them escape: every one is classified into the
//! closed [`ErrorKind`](rcommon::ErrorKind) taxonomy first.
//!
//! ```rust
//! use rprovider::{TransportError, TransportErrorKind};
//!
//! let error = TransportError::rate_limit("slow down");
//! assert_eq!(error.kind, TransportErrorKind::RateLimit);
//! assert_eq!(error.to_string(), "slow down");
//! ```

use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    MissingApiKey,
    Authentication,
    UnsupportedProvider,
    InvalidRequest,
    ModelNotFound,
    ContextLengthExceeded,
    RateLimit,
    ContentFilter,
    Timeout,
    /// Generic backend failure raised by the provider SDK.
    Provider,
    /// Request or response failed schema validation before reaching the backend.
    Validation,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn missing_api_key(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::MissingApiKey, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Authentication, message)
    }

    pub fn unsupported_provider(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::UnsupportedProvider, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::InvalidRequest, message)
    }

    pub fn model_not_found(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::ModelNotFound, message)
    }

    pub fn context_length_exceeded(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::ContextLengthExceeded, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::RateLimit, message)
    }

    pub fn content_filter(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::ContentFilter, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Provider, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Validation, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Other, message)
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for TransportError {}
