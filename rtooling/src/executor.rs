//! Executes model-issued tool calls against a normalized [`ToolSet`].
//!
//! ```rust
//! use rtooling::{ParamType, Tool, ToolExecutor, ToolParams, ToolSet, required_string};
//!
//! let echo = Tool::from_fn(
//!     "echo",
//!     ToolParams::new().required("text", ParamType::String),
//!     |args, _ctx| Ok(serde_json::json!(required_string(&args, "text")?)),
//! );
//! let toolset = ToolSet::try_from(vec![echo]).expect("toolset should build");
//!
//! let execution = ToolExecutor::new()
//!     .execute(
//!         r#"[{"function": {"name": "echo", "arguments": "{\"text\":\"hi\"}"}}]"#,
//!         Some(&toolset),
//!         None,
//!     )
//!     .expect("execution should run");
//! assert_eq!(execution.tool_results, vec![serde_json::json!("hi")]);
//! assert!(execution.error.is_none());
//! ```

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use rcommon::{ErrorPayload, JsonMap, Registry};
use rprovider::ToolCall;
use serde_json::Value;

use crate::args::normalize_arguments;
use crate::{NoopToolRuntimeHooks, Tool, ToolContext, ToolError, ToolHandler, ToolRuntimeHooks, ToolSet};

/// Tool calls as produced by a model: a JSON string, a JSON value (one call
/// object or a list), or already-typed calls.
#[derive(Debug, Clone)]
pub enum ToolResponse {
    Json(String),
    Value(Value),
    Calls(Vec<ToolCall>),
}

impl From<&str> for ToolResponse {
    fn from(raw: &str) -> Self {
        Self::Json(raw.to_string())
    }
}

impl From<String> for ToolResponse {
    fn from(raw: String) -> Self {
        Self::Json(raw)
    }
}

impl From<Value> for ToolResponse {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Vec<ToolCall>> for ToolResponse {
    fn from(calls: Vec<ToolCall>) -> Self {
        Self::Calls(calls)
    }
}

impl From<&[ToolCall]> for ToolResponse {
    fn from(calls: &[ToolCall]) -> Self {
        Self::Calls(calls.to_vec())
    }
}

impl ToolResponse {
    fn into_calls(self) -> Result<Vec<Value>, ErrorPayload> {
        let value = match self {
            Self::Calls(calls) => return Ok(calls.iter().map(ToolCall::to_value).collect()),
            Self::Value(value) => value,
            Self::Json(raw) => serde_json::from_str(&raw).map_err(|error| {
                ErrorPayload::invalid_input("Tool response is not a valid JSON string.")
                    .with_detail("error", error.to_string())
            })?,
        };
        match value {
            Value::Array(calls) => Ok(calls),
            call @ Value::Object(_) => Ok(vec![call]),
            _ => Err(ErrorPayload::invalid_input(
                "Tool response must be a list of objects.",
            )),
        }
    }
}

/// Outcome of one batch: every call keeps its own result slot; `error` holds
/// the last per-call failure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolExecution {
    pub tool_calls: Vec<Value>,
    pub tool_results: Vec<Value>,
    pub error: Option<ErrorPayload>,
}

impl ToolExecution {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Clone)]
pub struct ToolExecutor {
    hooks: Arc<dyn ToolRuntimeHooks>,
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor").finish_non_exhaustive()
    }
}

struct ResolvedCall {
    name: String,
    tool: Tool,
    args: JsonMap,
}

impl ToolExecutor {
    pub fn new() -> Self {
        Self {
            hooks: Arc::new(NoopToolRuntimeHooks),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ToolRuntimeHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Runs blocking handlers. Async handlers fail with `InvalidInput`.
    pub fn execute(
        &self,
        response: impl Into<ToolResponse>,
        tools: Option<&ToolSet>,
        context: Option<&ToolContext>,
    ) -> Result<ToolExecution, ErrorPayload> {
        let Some((calls, tool_map)) = prepare(response.into(), tools)? else {
            return Ok(ToolExecution::default());
        };

        let mut execution = ToolExecution::default();
        for call in calls {
            let started = Instant::now();
            let name = call_name(&call).unwrap_or_default().to_string();
            self.hooks.on_execution_start(&name, &call, context);

            let outcome = resolve_call(&call, &tool_map).and_then(|resolved| {
                let handler_context = select_context(&resolved, context)?;
                invoke_blocking(resolved, handler_context)
            });
            self.finish(&mut execution, call, &name, outcome, started);
        }
        Ok(execution)
    }

    pub async fn execute_async(
        &self,
        response: impl Into<ToolResponse>,
        tools: Option<&ToolSet>,
        context: Option<&ToolContext>,
    ) -> Result<ToolExecution, ErrorPayload> {
        let Some((calls, tool_map)) = prepare(response.into(), tools)? else {
            return Ok(ToolExecution::default());
        };

        let mut execution = ToolExecution::default();
        for call in calls {
            let started = Instant::now();
            let name = call_name(&call).unwrap_or_default().to_string();
            self.hooks.on_execution_start(&name, &call, context);

            let outcome = match resolve_call(&call, &tool_map) {
                Ok(resolved) => match select_context(&resolved, context) {
                    Ok(handler_context) => invoke_async(resolved, handler_context).await,
                    Err(error) => Err(error),
                },
                Err(error) => Err(error),
            };
            self.finish(&mut execution, call, &name, outcome, started);
        }
        Ok(execution)
    }

    fn finish(
        &self,
        execution: &mut ToolExecution,
        call: Value,
        name: &str,
        outcome: Result<Value, ErrorPayload>,
        started: Instant,
    ) {
        let elapsed = started.elapsed();
        let result = match outcome {
            Ok(result) => {
                self.hooks
                    .on_execution_success(name, &call, &result, elapsed);
                result
            }
            Err(error) => {
                self.hooks
                    .on_execution_failure(name, &call, &error, elapsed);
                let slot = error.as_value();
                execution.error = Some(error);
                slot
            }
        };
        execution.tool_calls.push(call);
        execution.tool_results.push(result);
    }
}

type Prepared = Option<(Vec<Value>, Registry<String, Tool>)>;

/// `None` means there is nothing to run and nothing was requested.
fn prepare(response: ToolResponse, tools: Option<&ToolSet>) -> Result<Prepared, ErrorPayload> {
    let calls = response.into_calls()?;
    let toolset = tools.ok_or_else(|| ErrorPayload::invalid_input("No tools provided."))?;
    let tool_map = toolset.runnable_map();
    if tool_map.is_empty() {
        if calls.is_empty() {
            return Ok(None);
        }
        return Err(ErrorPayload::tool("No runnable tools are available."));
    }
    Ok(Some((calls, tool_map)))
}

fn call_name(call: &Value) -> Option<&str> {
    call.pointer("/function/name").and_then(Value::as_str)
}

fn resolve_call(call: &Value, tool_map: &Registry<String, Tool>) -> Result<ResolvedCall, ErrorPayload> {
    if !call.is_object() {
        return Err(ErrorPayload::invalid_input("Each tool call must be an object."));
    }
    let name = call_name(call)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ErrorPayload::invalid_input("Tool call is missing name."))?;
    let tool = tool_map
        .get(name)
        .cloned()
        .ok_or_else(|| ErrorPayload::tool(format!("Unknown tool name: {name}.")))?;

    let empty = Value::Object(JsonMap::new());
    let raw_args = call.pointer("/function/arguments").unwrap_or(&empty);
    let args = normalize_arguments(name, raw_args)?;
    Ok(ResolvedCall {
        name: name.to_string(),
        tool,
        args,
    })
}

fn select_context(
    resolved: &ResolvedCall,
    context: Option<&ToolContext>,
) -> Result<Option<ToolContext>, ErrorPayload> {
    if !resolved.tool.needs_context() {
        return Ok(None);
    }
    context.cloned().map(Some).ok_or_else(|| {
        ErrorPayload::invalid_input(format!(
            "Tool '{}' requires context but none was provided.",
            resolved.name
        ))
    })
}

fn invoke_blocking(
    resolved: ResolvedCall,
    context: Option<ToolContext>,
) -> Result<Value, ErrorPayload> {
    let ResolvedCall { name, tool, args } = resolved;
    match tool.handler() {
        Some(ToolHandler::Sync(handler)) => {
            let outcome = catch_unwind(AssertUnwindSafe(|| handler(args, context)));
            settle(&name, outcome)
        }
        Some(ToolHandler::Async(_)) => Err(ErrorPayload::invalid_input(format!(
            "Tool '{name}' is async; use execute_async() instead of execute()."
        ))),
        None => Err(ErrorPayload::tool(format!("Unknown tool name: {name}."))),
    }
}

async fn invoke_async(
    resolved: ResolvedCall,
    context: Option<ToolContext>,
) -> Result<Value, ErrorPayload> {
    let ResolvedCall { name, tool, args } = resolved;
    match tool.handler() {
        Some(ToolHandler::Sync(handler)) => {
            let outcome = catch_unwind(AssertUnwindSafe(|| handler(args, context)));
            settle(&name, outcome)
        }
        Some(ToolHandler::Async(handler)) => {
            let outcome = AssertUnwindSafe(handler(args, context)).catch_unwind().await;
            settle(&name, outcome)
        }
        None => Err(ErrorPayload::tool(format!("Unknown tool name: {name}."))),
    }
}

fn settle(
    name: &str,
    outcome: Result<Result<Value, ToolError>, Box<dyn Any + Send>>,
) -> Result<Value, ErrorPayload> {
    match outcome {
        Ok(result) => result.map_err(|error| error.into_payload(name)),
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::warn!(tool = %name, panic = %message, "tool handler panicked");
            Err(ToolError::execution(format!("panic: {message}")).into_payload(name))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = panic.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic".to_string()
}
