//! Shared primitives for the republic workspace crates.
//!
//! ```rust
//! use rcommon::{ErrorKind, ErrorPayload, JsonMap, Registry};
//!
//! let mut registry = Registry::new();
//! registry.insert("echo".to_string(), 1_u32);
//!
//! let mut meta = JsonMap::new();
//! meta.insert("run_id".to_string(), "abc".into());
//!
//! let error = ErrorPayload::invalid_input("Tool call is missing name.");
//! assert_eq!(error.kind, ErrorKind::InvalidInput);
//! assert!(registry.contains_key("echo"));
//! ```

mod error;

pub mod future {
    //! Shared async future aliases.
    //!
    //! ```rust
    //! use rcommon::BoxFuture;
    //!
    //! fn str_len<'a>(value: &'a str) -> BoxFuture<'a, usize> {
    //!     Box::pin(async move { value.len() })
    //! }
    //!
    //! let _future = str_len("hello");
    //! ```

    use std::future::Future;
    use std::pin::Pin;

    pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
}

pub mod json {
    //! JSON object helpers used for payloads, metadata, and tool arguments.

    use serde_json::{Map, Value};

    pub type JsonMap = Map<String, Value>;

    /// Returns the object map of `value`, or an empty map for any other JSON shape.
    pub fn object_or_empty(value: Option<&Value>) -> JsonMap {
        value.and_then(Value::as_object).cloned().unwrap_or_default()
    }
}

pub mod registry {
    //! Generic registry map wrapper used by runtime registries.
    //!
    //! ```rust
    //! use rcommon::Registry;
    //!
    //! let mut registry = Registry::new();
    //! registry.insert("alpha".to_string(), 1_u32);
    //!
    //! assert_eq!(registry.get("alpha"), Some(&1));
    //! assert!(registry.contains_key("alpha"));
    //! ```

    use std::borrow::Borrow;
    use std::collections::HashMap;
    use std::hash::Hash;

    #[derive(Debug, Clone)]
    pub struct Registry<K, V> {
        items: HashMap<K, V>,
    }

    impl<K, V> Default for Registry<K, V>
    where
        K: Eq + Hash,
    {
        fn default() -> Self {
            Self {
                items: HashMap::new(),
            }
        }
    }

    impl<K, V> Registry<K, V>
    where
        K: Eq + Hash,
    {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&mut self, key: K, value: V) -> Option<V> {
            self.items.insert(key, value)
        }

        pub fn get<Q>(&self, key: &Q) -> Option<&V>
        where
            K: Borrow<Q>,
            Q: Eq + Hash + ?Sized,
        {
            self.items.get(key)
        }

        pub fn contains_key<Q>(&self, key: &Q) -> bool
        where
            K: Borrow<Q>,
            Q: Eq + Hash + ?Sized,
        {
            self.items.contains_key(key)
        }

        pub fn len(&self) -> usize {
            self.items.len()
        }

        pub fn is_empty(&self) -> bool {
            self.items.is_empty()
        }
    }
}

pub use error::{ErrorKind, ErrorPayload};
pub use future::BoxFuture;
pub use json::JsonMap;
pub use registry::Registry;
