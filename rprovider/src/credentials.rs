//! Credential and endpoint settings resolved per provider.
//!
//! ```rust
//! use rprovider::CredentialSetting;
//!
//! let shared = CredentialSetting::from("sk-shared");
//! assert_eq!(shared.resolve("openai"), Some("sk-shared"));
//!
//! let scoped = CredentialSetting::per_provider([("anthropic", "sk-ant")]);
//! assert_eq!(scoped.resolve("anthropic"), Some("sk-ant"));
//! assert_eq!(scoped.resolve("openai"), None);
//! ```

use std::collections::HashMap;

#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSetting {
    /// One value used for every provider.
    Single(String),
    /// Values keyed by provider name; unknown providers resolve to nothing.
    PerProvider(HashMap<String, String>),
}

impl CredentialSetting {
    pub fn per_provider<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::PerProvider(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    pub fn resolve(&self, provider: &str) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value.as_str()),
            Self::PerProvider(values) => values.get(provider).map(String::as_str),
        }
    }
}

impl std::fmt::Debug for CredentialSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(_) => f.write_str("Single([REDACTED])"),
            Self::PerProvider(values) => {
                let mut providers = values.keys().collect::<Vec<_>>();
                providers.sort();
                f.debug_tuple("PerProvider").field(&providers).finish()
            }
        }
    }
}

impl From<&str> for CredentialSetting {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<String> for CredentialSetting {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<HashMap<String, String>> for CredentialSetting {
    fn from(values: HashMap<String, String>) -> Self {
        Self::PerProvider(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_never_contains_secret_values() {
        let single = CredentialSetting::from("sk-one");
        let scoped = CredentialSetting::per_provider([("openai", "sk-two")]);

        assert_eq!(format!("{single:?}"), "Single([REDACTED])");
        let rendered = format!("{scoped:?}");
        assert!(rendered.contains("openai"));
        assert!(!rendered.contains("sk-two"));
    }
}
