//! Mapping of transport failures onto the closed error taxonomy.
//!
//! ```rust
//! use rcommon::ErrorKind;
//! use rprovider::{TransportError, classify_transport_error};
//!
//! let kind = classify_transport_error(&TransportError::rate_limit("429"), None);
//! assert_eq!(kind, ErrorKind::Temporary);
//!
//! let custom = |error: &TransportError| error.message.contains("quota").then_some(ErrorKind::Config);
//! let kind = classify_transport_error(&TransportError::provider("quota exhausted"), Some(&custom));
//! assert_eq!(kind, ErrorKind::Config);
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};

use rcommon::ErrorKind;

use crate::{TransportError, TransportErrorKind};

/// Caller-supplied classification consulted before the built-in table.
/// Returning `None` defers to the table.
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, error: &TransportError) -> Option<ErrorKind>;
}

impl<F> ErrorClassifier for F
where
    F: Fn(&TransportError) -> Option<ErrorKind> + Send + Sync,
{
    fn classify(&self, error: &TransportError) -> Option<ErrorKind> {
        self(error)
    }
}

pub fn default_error_kind(kind: TransportErrorKind) -> ErrorKind {
    match kind {
        TransportErrorKind::MissingApiKey | TransportErrorKind::Authentication => ErrorKind::Config,
        TransportErrorKind::UnsupportedProvider
        | TransportErrorKind::InvalidRequest
        | TransportErrorKind::ModelNotFound
        | TransportErrorKind::ContextLengthExceeded
        | TransportErrorKind::Validation => ErrorKind::InvalidInput,
        TransportErrorKind::RateLimit
        | TransportErrorKind::ContentFilter
        | TransportErrorKind::Timeout => ErrorKind::Temporary,
        TransportErrorKind::Provider => ErrorKind::Provider,
        TransportErrorKind::Other => ErrorKind::Unknown,
    }
}

pub fn classify_transport_error(
    error: &TransportError,
    classifier: Option<&dyn ErrorClassifier>,
) -> ErrorKind {
    if let Some(classifier) = classifier {
        match catch_unwind(AssertUnwindSafe(|| classifier.classify(error))) {
            Ok(Some(kind)) => return kind,
            Ok(None) => {}
            Err(_) => {
                tracing::error!(
                    event = "classifier_failed",
                    error = %error,
                    "error classifier panicked; using default mapping"
                );
            }
        }
    }

    default_error_kind(error.kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_covers_every_transport_category() {
        let cases = [
            (TransportError::missing_api_key("x"), ErrorKind::Config),
            (TransportError::authentication("x"), ErrorKind::Config),
            (TransportError::unsupported_provider("x"), ErrorKind::InvalidInput),
            (TransportError::invalid_request("x"), ErrorKind::InvalidInput),
            (TransportError::model_not_found("x"), ErrorKind::InvalidInput),
            (TransportError::context_length_exceeded("x"), ErrorKind::InvalidInput),
            (TransportError::validation("x"), ErrorKind::InvalidInput),
            (TransportError::rate_limit("x"), ErrorKind::Temporary),
            (TransportError::content_filter("x"), ErrorKind::Temporary),
            (TransportError::timeout("x"), ErrorKind::Temporary),
            (TransportError::provider("x"), ErrorKind::Provider),
            (TransportError::other("x"), ErrorKind::Unknown),
        ];

        for (error, expected) in cases {
            assert_eq!(classify_transport_error(&error, None), expected, "{:?}", error.kind);
        }
    }

    #[test]
    fn custom_classifier_wins_and_none_defers() {
        let classifier = |error: &TransportError| {
            (error.kind == TransportErrorKind::Other).then_some(ErrorKind::Temporary)
        };

        assert_eq!(
            classify_transport_error(&TransportError::other("flaky"), Some(&classifier)),
            ErrorKind::Temporary
        );
        assert_eq!(
            classify_transport_error(&TransportError::authentication("bad"), Some(&classifier)),
            ErrorKind::Config
        );
    }

    #[test]
    fn panicking_classifier_is_swallowed() {
        let classifier = |_error: &TransportError| -> Option<ErrorKind> { panic!("classifier bug") };

        let kind = classify_transport_error(&TransportError::rate_limit("429"), Some(&classifier));
        assert_eq!(kind, ErrorKind::Temporary);
    }
}
