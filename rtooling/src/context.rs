//! Execution context handed to tools that declare they need one.
//!
//! ```rust
//! use rtooling::ToolContext;
//!
//! let context = ToolContext::new("run-1").with_tape("support");
//! let shared = context.clone();
//! shared.set_state("visits", 1).expect("state should be writable");
//!
//! assert_eq!(context.state_value("visits"), Some(serde_json::json!(1)));
//! assert_eq!(context.tape.as_deref(), Some("support"));
//! ```

use std::sync::{Arc, Mutex};

use rcommon::{ErrorPayload, JsonMap};
use serde_json::Value;

/// Clones share the same `state` map.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub tape: Option<String>,
    pub run_id: String,
    pub meta: JsonMap,
    state: Arc<Mutex<JsonMap>>,
}

impl ToolContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            ..Self::default()
        }
    }

    pub fn with_tape(mut self, tape: impl Into<String>) -> Self {
        self.tape = Some(tape.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn with_state(mut self, state: Arc<Mutex<JsonMap>>) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> Arc<Mutex<JsonMap>> {
        Arc::clone(&self.state)
    }

    pub fn state_value(&self, key: &str) -> Option<Value> {
        self.state.lock().ok()?.get(key).cloned()
    }

    pub fn set_state(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<(), ErrorPayload> {
        self.state
            .lock()
            .map_err(|_| ErrorPayload::unknown("tool context state lock poisoned"))?
            .insert(key.into(), value.into());
        Ok(())
    }

    pub fn snapshot_state(&self) -> JsonMap {
        self.state
            .lock()
            .map(|state| state.clone())
            .unwrap_or_default()
    }
}
