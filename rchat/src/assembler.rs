//! Merges streamed tool-call fragments into complete calls.
//!
//! Providers identify fragments inconsistently: some repeat the call id on
//! every delta, some send the id once and then only an index, and some send
//! neither. Each fragment is routed to an existing call by id, then by index,
//! then by its position inside the chunk.
//!
//! ```rust
//! use rchat::ToolCallAssembler;
//! use rprovider::ToolCallDelta;
//!
//! let mut assembler = ToolCallAssembler::new();
//! assembler.add_deltas(&[ToolCallDelta::default()
//!     .with_id("call_1")
//!     .with_index(0)
//!     .with_name("echo")
//!     .with_arguments("{\"text\":")]);
//! assembler.add_deltas(&[ToolCallDelta::default().with_index(0).with_arguments("\"tokyo\"}")]);
//!
//! let calls = assembler.finish();
//! assert_eq!(calls.len(), 1);
//! assert_eq!(calls[0].arguments(), "{\"text\":\"tokyo\"}");
//! ```

use std::collections::HashMap;

use rprovider::{ToolCall, ToolCallDelta};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CallKey {
    Id(String),
    Index(u32),
    Position(usize),
}

#[derive(Debug, Clone, Default)]
struct PartialCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    order: Vec<CallKey>,
    calls: HashMap<CallKey, PartialCall>,
    index_to_key: HashMap<u32, CallKey>,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Folds every delta of one chunk. Positions are relative to the chunk.
    pub fn add_deltas(&mut self, deltas: &[ToolCallDelta]) {
        for (position, delta) in deltas.iter().enumerate() {
            let key = self.resolve_key(delta, position);
            let call = self.calls.entry(key.clone()).or_default();
            if let Some(id) = non_empty(delta.id.as_deref()) {
                call.id = Some(id.to_string());
            }
            if let Some(name) = non_empty(delta.name.as_deref()) {
                call.name = name.to_string();
            }
            if let Some(arguments) = delta.arguments.as_deref() {
                call.arguments.push_str(arguments);
            }
            if !self.order.contains(&key) {
                self.order.push(key);
            }
        }
    }

    /// Calls in first-seen order.
    pub fn finish(self) -> Vec<ToolCall> {
        let Self {
            order, mut calls, ..
        } = self;
        order
            .into_iter()
            .filter_map(|key| calls.remove(&key))
            .map(|call| ToolCall::new(call.id, call.name, call.arguments))
            .collect()
    }

    fn resolve_key(&mut self, delta: &ToolCallDelta, position: usize) -> CallKey {
        match (non_empty(delta.id.as_deref()), delta.index) {
            (Some(id), index) => self.resolve_id(id, index, position),
            (None, Some(index)) => self.resolve_index(delta, index, position),
            (None, None) => self
                .order
                .get(position)
                .cloned()
                .unwrap_or(CallKey::Position(position)),
        }
    }

    fn resolve_id(&mut self, id: &str, index: Option<u32>, position: usize) -> CallKey {
        let key = CallKey::Id(id.to_string());
        if self.calls.contains_key(&key) {
            if let Some(index) = index {
                self.index_to_key.insert(index, key.clone());
            }
            return key;
        }

        let candidate = match index {
            Some(index) => self
                .index_to_key
                .get(&index)
                .cloned()
                .or_else(|| Some(CallKey::Index(index)).filter(|key| self.calls.contains_key(key))),
            None => Some(CallKey::Position(position)).filter(|key| self.calls.contains_key(key)),
        };
        if let Some(candidate) = candidate.filter(|candidate| !matches!(candidate, CallKey::Id(_))) {
            self.promote(&candidate, &key);
        }
        if let Some(index) = index {
            self.index_to_key.insert(index, key.clone());
        }
        key
    }

    fn resolve_index(&mut self, delta: &ToolCallDelta, index: u32, position: usize) -> CallKey {
        if let Some(key) = self.index_to_key.get(&index) {
            return key.clone();
        }
        let by_index = CallKey::Index(index);
        if self.calls.contains_key(&by_index) {
            self.index_to_key.insert(index, by_index.clone());
            return by_index;
        }
        if non_empty(delta.name.as_deref()).is_none()
            && let Some(existing) = self.order.get(position).cloned()
        {
            self.index_to_key.insert(index, existing.clone());
            return existing;
        }
        self.index_to_key.insert(index, by_index.clone());
        by_index
    }

    /// Re-keys an anonymous call under its id without moving it in the order.
    fn promote(&mut self, from: &CallKey, to: &CallKey) {
        let Some(call) = self.calls.remove(from) else {
            return;
        };
        self.calls.insert(to.clone(), call);
        for key in &mut self.order {
            if key == from {
                *key = to.clone();
            }
        }
        for key in self.index_to_key.values_mut() {
            if key == from {
                *key = to.clone();
            }
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta() -> ToolCallDelta {
        ToolCallDelta::default()
    }

    fn summary(calls: &[ToolCall]) -> Vec<(Option<&str>, &str, &str)> {
        calls
            .iter()
            .map(|call| (call.id.as_deref(), call.name(), call.arguments()))
            .collect()
    }

    #[test]
    fn id_then_index_only_fragments_merge() {
        let mut assembler = ToolCallAssembler::new();
        assembler.add_deltas(&[delta().with_id("call_1").with_index(0).with_name("echo")]);
        assembler.add_deltas(&[delta().with_index(0).with_arguments("{\"text\":")]);
        assembler.add_deltas(&[delta().with_index(0).with_arguments("\"tokyo\"}")]);

        let calls = assembler.finish();
        assert_eq!(
            summary(&calls),
            vec![(Some("call_1"), "echo", "{\"text\":\"tokyo\"}")]
        );
    }

    #[test]
    fn anonymous_call_is_promoted_when_id_arrives_later() {
        let mut assembler = ToolCallAssembler::new();
        assembler.add_deltas(&[delta().with_index(0).with_name("echo").with_arguments("{\"a\"")]);
        assembler.add_deltas(&[delta().with_id("call_9").with_index(0).with_arguments(":1}")]);
        assembler.add_deltas(&[delta().with_index(0)]);

        let calls = assembler.finish();
        assert_eq!(summary(&calls), vec![(Some("call_9"), "echo", "{\"a\":1}")]);
    }

    #[test]
    fn bare_deltas_merge_by_position() {
        let mut assembler = ToolCallAssembler::new();
        assembler.add_deltas(&[
            delta().with_id("call_a").with_name("first"),
            delta().with_id("call_b").with_name("second"),
        ]);
        assembler.add_deltas(&[
            delta().with_arguments("{\"x\":1}"),
            delta().with_arguments("{\"y\":2}"),
        ]);

        let calls = assembler.finish();
        assert_eq!(
            summary(&calls),
            vec![
                (Some("call_a"), "first", "{\"x\":1}"),
                (Some("call_b"), "second", "{\"y\":2}"),
            ]
        );
    }

    #[test]
    fn three_calls_in_mixed_bursts_resolve_to_three_calls() {
        let mut assembler = ToolCallAssembler::new();
        assembler.add_deltas(&[
            delta().with_id("call_a").with_name("alpha").with_arguments("{\"a\""),
            delta().with_index(1).with_name("beta").with_arguments("{\"b\""),
            delta().with_name("gamma").with_arguments("{\"c\""),
        ]);
        assembler.add_deltas(&[
            delta().with_index(0).with_arguments(":"),
            delta().with_id("call_b").with_index(1).with_arguments(":"),
            delta().with_id("call_c").with_arguments(":"),
        ]);
        assembler.add_deltas(&[
            delta().with_arguments("1}"),
            delta().with_arguments("2}"),
            delta().with_arguments("3}"),
        ]);

        let calls = assembler.finish();
        assert_eq!(
            summary(&calls),
            vec![
                (Some("call_a"), "alpha", "{\"a\":1}"),
                (Some("call_b"), "beta", "{\"b\":2}"),
                (Some("call_c"), "gamma", "{\"c\":3}"),
            ]
        );
    }

    #[test]
    fn index_without_name_attaches_to_positional_call() {
        let mut assembler = ToolCallAssembler::new();
        assembler.add_deltas(&[delta().with_id("call_1").with_name("echo")]);
        assembler.add_deltas(&[delta().with_index(0).with_arguments("{}")]);

        let calls = assembler.finish();
        assert_eq!(summary(&calls), vec![(Some("call_1"), "echo", "{}")]);
    }

    #[test]
    fn named_index_delta_starts_a_new_call() {
        let mut assembler = ToolCallAssembler::new();
        assembler.add_deltas(&[delta().with_id("call_1").with_name("echo").with_arguments("{}")]);
        assembler.add_deltas(&[delta().with_index(0).with_name("lookup").with_arguments("{}")]);

        let calls = assembler.finish();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].name(), "lookup");
        assert_eq!(calls[1].id, None);
    }

    #[test]
    fn parallel_calls_keep_first_seen_order() {
        let mut assembler = ToolCallAssembler::new();
        assembler.add_deltas(&[
            delta().with_id("call_b").with_index(1).with_name("beta"),
            delta().with_id("call_a").with_index(0).with_name("alpha"),
        ]);
        assembler.add_deltas(&[delta().with_index(0).with_arguments("{\"a\":true}")]);
        assembler.add_deltas(&[delta().with_index(1).with_arguments("{\"b\":true}")]);

        let calls = assembler.finish();
        assert_eq!(
            summary(&calls),
            vec![
                (Some("call_b"), "beta", "{\"b\":true}"),
                (Some("call_a"), "alpha", "{\"a\":true}"),
            ]
        );
    }

    #[test]
    fn empty_name_does_not_overwrite_and_empty_id_is_ignored() {
        let mut assembler = ToolCallAssembler::new();
        assembler.add_deltas(&[delta().with_id("call_1").with_index(0).with_name("echo")]);
        assembler.add_deltas(&[delta().with_id("").with_index(0).with_name("").with_arguments("{}")]);

        let calls = assembler.finish();
        assert_eq!(summary(&calls), vec![(Some("call_1"), "echo", "{}")]);
    }

    #[test]
    fn arguments_are_concatenated_verbatim() {
        let mut assembler = ToolCallAssembler::new();
        assembler.add_deltas(&[delta().with_index(0).with_name("echo").with_arguments(" {")]);
        assembler.add_deltas(&[delta().with_index(0).with_arguments(" } ")]);

        let calls = assembler.finish();
        assert_eq!(calls[0].arguments(), " { } ");
        assert!(ToolCallAssembler::new().finish().is_empty());
    }
}
