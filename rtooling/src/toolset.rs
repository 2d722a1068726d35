//! Normalization of heterogeneous tool inputs into a [`ToolSet`].
//!
//! ```rust
//! use rtooling::{Tool, ToolParams, ToolSpec, normalize_tools};
//!
//! let echo = Tool::from_fn("echo", ToolParams::new(), |args, _ctx| {
//!     Ok(serde_json::Value::Object(args))
//! });
//! let remote = serde_json::json!({
//!     "type": "function",
//!     "function": {"name": "remote", "parameters": {"type": "object"}}
//! });
//!
//! let toolset = normalize_tools(vec![ToolSpec::from(echo), ToolSpec::from(remote)])
//!     .expect("tools should normalize");
//! assert_eq!(toolset.schemas.len(), 2);
//! assert_eq!(toolset.runnable.len(), 1);
//! ```

use std::collections::HashSet;

use rcommon::{ErrorPayload, Registry};
use serde_json::Value;

use crate::Tool;
use crate::schema::validate_tool_schema;

/// One item of a tool list as supplied by callers.
#[derive(Debug, Clone)]
pub enum ToolSpec {
    /// A raw `{type: "function", function: {...}}` payload; never runnable.
    Schema(Value),
    Tool(Tool),
    /// A pre-normalized set. Must be the only item.
    Set(ToolSet),
}

impl From<Tool> for ToolSpec {
    fn from(tool: Tool) -> Self {
        Self::Tool(tool)
    }
}

impl From<Value> for ToolSpec {
    fn from(schema: Value) -> Self {
        Self::Schema(schema)
    }
}

impl From<ToolSet> for ToolSpec {
    fn from(toolset: ToolSet) -> Self {
        Self::Set(toolset)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    pub schemas: Vec<Value>,
    pub runnable: Vec<Tool>,
}

impl ToolSet {
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Schema list for the request, or `None` when no tools are declared.
    pub fn payload(&self) -> Option<Vec<Value>> {
        (!self.schemas.is_empty()).then(|| self.schemas.clone())
    }

    pub fn require_runnable(&self) -> Result<(), ErrorPayload> {
        if !self.schemas.is_empty() && self.runnable.len() < self.schemas.len() {
            return Err(ErrorPayload::invalid_input(
                "Schema-only tools cannot be executed.",
            ));
        }
        Ok(())
    }

    pub fn has_runnable(&self) -> bool {
        !self.runnable.is_empty()
    }

    pub fn runnable_map(&self) -> Registry<String, Tool> {
        let mut map = Registry::new();
        for tool in &self.runnable {
            if !tool.name().is_empty() {
                map.insert(tool.name().to_string(), tool.clone());
            }
        }
        map
    }

    pub fn names(&self) -> Vec<String> {
        self.schemas
            .iter()
            .filter_map(|schema| schema.pointer("/function/name").and_then(Value::as_str))
            .map(ToString::to_string)
            .collect()
    }
}

impl TryFrom<Vec<Tool>> for ToolSet {
    type Error = ErrorPayload;

    fn try_from(tools: Vec<Tool>) -> Result<Self, Self::Error> {
        normalize_tools(tools.into_iter().map(ToolSpec::from).collect())
    }
}

fn ensure_unique(name: &str, seen: &mut HashSet<String>) -> Result<(), ErrorPayload> {
    if name.is_empty() {
        return Err(ErrorPayload::invalid_input("Tool name cannot be empty."));
    }
    if !seen.insert(name.to_string()) {
        return Err(ErrorPayload::invalid_input(format!(
            "Duplicate tool name: {name}"
        )));
    }
    Ok(())
}

pub fn normalize_tools(tools: Vec<ToolSpec>) -> Result<ToolSet, ErrorPayload> {
    if tools.iter().any(|item| matches!(item, ToolSpec::Set(_))) {
        if tools.len() > 1 {
            return Err(ErrorPayload::invalid_input(
                "ToolSet cannot be mixed with other tool definitions.",
            ));
        }
        if let Some(ToolSpec::Set(toolset)) = tools.into_iter().next() {
            return Ok(toolset);
        }
        return Ok(ToolSet::default());
    }

    let mut toolset = ToolSet::default();
    let mut seen = HashSet::new();
    for item in tools {
        match item {
            ToolSpec::Schema(schema) => {
                let name = validate_tool_schema(&schema)?;
                ensure_unique(&name, &mut seen)?;
                toolset.schemas.push(schema);
            }
            ToolSpec::Tool(tool) => {
                ensure_unique(tool.name(), &mut seen)?;
                toolset.schemas.push(tool.schema());
                if tool.is_runnable() {
                    toolset.runnable.push(tool);
                }
            }
            ToolSpec::Set(_) => {}
        }
    }
    Ok(toolset)
}

#[cfg(test)]
mod tests {
    use rcommon::ErrorKind;
    use serde_json::json;

    use super::*;
    use crate::ToolParams;

    fn echo(name: &str) -> Tool {
        Tool::from_fn(name, ToolParams::new(), |args, _ctx| Ok(Value::Object(args)))
    }

    fn remote_schema(name: &str) -> Value {
        json!({"type": "function", "function": {"name": name, "parameters": {}}})
    }

    #[test]
    fn empty_input_yields_empty_set() {
        let toolset = normalize_tools(Vec::new()).expect("empty should normalize");
        assert!(toolset.is_empty());
        assert!(toolset.payload().is_none());
        assert!(toolset.require_runnable().is_ok());
    }

    #[test]
    fn duplicate_and_empty_names_are_rejected() {
        let error = normalize_tools(vec![echo("echo").into(), remote_schema("echo").into()])
            .expect_err("duplicate should fail");
        assert_eq!(error.kind, ErrorKind::InvalidInput);
        assert_eq!(error.message, "Duplicate tool name: echo");

        let error = normalize_tools(vec![Tool::schema_only("", "", json!({})).into()])
            .expect_err("empty name should fail");
        assert_eq!(error.message, "Tool name cannot be empty.");
    }

    #[test]
    fn toolset_cannot_be_mixed() {
        let prebuilt = normalize_tools(vec![echo("a").into()]).expect("prebuilt");
        let error = normalize_tools(vec![prebuilt.clone().into(), echo("b").into()])
            .expect_err("mixing should fail");
        assert_eq!(error.message, "ToolSet cannot be mixed with other tool definitions.");

        let passthrough = normalize_tools(vec![prebuilt.into()]).expect("single set");
        assert_eq!(passthrough.names(), vec!["a"]);
    }

    #[test]
    fn schema_only_entries_block_execution() {
        let toolset = normalize_tools(vec![echo("local").into(), remote_schema("remote").into()])
            .expect("mixed kinds should normalize");

        assert_eq!(toolset.payload().expect("payload").len(), 2);
        assert!(toolset.has_runnable());
        assert!(toolset.runnable_map().contains_key("local"));
        let error = toolset.require_runnable().expect_err("schema-only present");
        assert_eq!(error.message, "Schema-only tools cannot be executed.");
    }

    #[test]
    fn invalid_schema_items_fail_normalization() {
        let error = normalize_tools(vec![json!({"type": "function"}).into()])
            .expect_err("bad schema should fail");
        assert_eq!(error.kind, ErrorKind::InvalidInput);
    }
}
