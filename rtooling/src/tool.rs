//! Tool definitions: schema plus an optional local handler.
//!
//! ```rust
//! use rtooling::{ParamType, Tool, ToolParams, required_string};
//!
//! let tool = Tool::from_fn(
//!     "Echo",
//!     ToolParams::new().required("text", ParamType::String),
//!     |args, _ctx| Ok(serde_json::json!(required_string(&args, "text")?)),
//! )
//! .with_description("Echoes input");
//!
//! assert_eq!(tool.name(), "echo");
//! assert!(tool.is_runnable());
//! assert_eq!(tool.schema()["function"]["parameters"]["required"][0], "text");
//! ```

use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::sync::Arc;

use rcommon::{BoxFuture, ErrorPayload, JsonMap};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::args::{field_error, validate_arguments};
use crate::schema::{function_parts, function_schema, model_schema, to_snake_case, validate_tool_schema};
use crate::{ToolContext, ToolError, ToolParams};

pub type ToolFuture<'a, T> = BoxFuture<'a, T>;

type SyncHandler = dyn Fn(JsonMap, Option<ToolContext>) -> Result<Value, ToolError> + Send + Sync;
type AsyncHandler = dyn Fn(JsonMap, Option<ToolContext>) -> ToolFuture<'static, Result<Value, ToolError>>
    + Send
    + Sync;

#[derive(Clone)]
pub enum ToolHandler {
    Sync(Arc<SyncHandler>),
    Async(Arc<AsyncHandler>),
}

impl ToolHandler {
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }
}

impl Debug for ToolHandler {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("ToolHandler::Sync"),
            Self::Async(_) => f.write_str("ToolHandler::Async"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tool {
    name: String,
    description: String,
    parameters: Value,
    handler: Option<ToolHandler>,
    needs_context: bool,
}

impl Tool {
    /// Builds a non-runnable tool that only advertises a schema.
    pub fn schema_only(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: None,
            needs_context: false,
        }
    }

    /// Builds a schema-only tool from a full `{type: "function", ...}` payload.
    pub fn from_schema(schema: &Value) -> Result<Self, ErrorPayload> {
        validate_tool_schema(schema)?;
        let (name, description, parameters) = function_parts(schema);
        Ok(Self::schema_only(name.trim(), description, parameters))
    }

    /// Wraps a blocking function. The name is converted to snake_case.
    pub fn from_fn<F>(name: impl AsRef<str>, params: ToolParams, handler: F) -> Self
    where
        F: Fn(JsonMap, Option<ToolContext>) -> Result<Value, ToolError> + Send + Sync + 'static,
    {
        Self {
            handler: Some(ToolHandler::Sync(Arc::new(handler))),
            ..Self::schema_only(to_snake_case(name.as_ref()), "", params.to_schema())
        }
    }

    pub fn from_async_fn<F, Fut>(name: impl AsRef<str>, params: ToolParams, handler: F) -> Self
    where
        F: Fn(JsonMap, Option<ToolContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        let handler: Arc<AsyncHandler> = Arc::new(move |args, context| Box::pin(handler(args, context)));
        Self {
            handler: Some(ToolHandler::Async(handler)),
            ..Self::schema_only(to_snake_case(name.as_ref()), "", params.to_schema())
        }
    }

    /// Derives name, description, and parameters from `T` and validates raw
    /// arguments into `T` before the handler runs.
    pub fn from_model<T, F>(handler: F) -> Self
    where
        T: DeserializeOwned + JsonSchema + 'static,
        F: Fn(T) -> Result<Value, ToolError> + Send + Sync + 'static,
    {
        let model = model_schema::<T>();
        let schema = model.parameters.clone();
        let wrapped = move |args: JsonMap, _context: Option<ToolContext>| {
            let parsed = parse_model::<T>(&schema, args)?;
            handler(parsed)
        };
        Self {
            handler: Some(ToolHandler::Sync(Arc::new(wrapped))),
            ..Self::schema_only(model.name, model.description, model.parameters)
        }
    }

    pub fn from_model_async<T, F, Fut>(handler: F) -> Self
    where
        T: DeserializeOwned + JsonSchema + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        let model = model_schema::<T>();
        let schema = model.parameters.clone();
        let handler: Arc<AsyncHandler> = Arc::new(move |args, _context| {
            let future: ToolFuture<'static, Result<Value, ToolError>> =
                match parse_model::<T>(&schema, args) {
                    Ok(parsed) => Box::pin(handler(parsed)),
                    Err(error) => Box::pin(async move { Err(error) }),
                };
            future
        });
        Self {
            handler: Some(ToolHandler::Async(handler)),
            ..Self::schema_only(model.name, model.description, model.parameters)
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Marks the tool as requiring a [`ToolContext`] at execution time.
    pub fn with_context(mut self) -> Self {
        self.needs_context = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &Value {
        &self.parameters
    }

    pub fn handler(&self) -> Option<&ToolHandler> {
        self.handler.as_ref()
    }

    pub fn needs_context(&self) -> bool {
        self.needs_context
    }

    pub fn is_runnable(&self) -> bool {
        self.handler.is_some()
    }

    pub fn is_async(&self) -> bool {
        self.handler.as_ref().is_some_and(ToolHandler::is_async)
    }

    pub fn schema(&self) -> Value {
        function_schema(&self.name, &self.description, self.parameters.clone())
    }
}

fn parse_model<T: DeserializeOwned>(schema: &Value, args: JsonMap) -> Result<T, ToolError> {
    let errors = validate_arguments(schema, &args);
    if !errors.is_empty() {
        return Err(ToolError::invalid_arguments(errors));
    }
    serde_json::from_value(Value::Object(args)).map_err(|error| {
        ToolError::invalid_arguments(vec![field_error("", &error.to_string(), "value_error")])
    })
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::{ParamType, ToolErrorKind};

    #[derive(Debug, Deserialize, JsonSchema)]
    /// Convert a temperature.
    struct ConvertTemperature {
        celsius: f64,
        #[serde(default)]
        precision: Option<u32>,
    }

    fn run_sync(tool: &Tool, args: Value) -> Result<Value, ToolError> {
        let Some(ToolHandler::Sync(handler)) = tool.handler() else {
            panic!("tool should be sync");
        };
        let args = args.as_object().cloned().expect("args should be an object");
        handler(args, None)
    }

    #[test]
    fn schema_payload_shape() {
        let tool = Tool::from_fn("lookup", ToolParams::new(), |_args, _ctx| Ok(Value::Null))
            .with_description("Looks things up");
        assert_eq!(
            tool.schema(),
            json!({
                "type": "function",
                "function": {
                    "name": "lookup",
                    "description": "Looks things up",
                    "parameters": {"type": "object", "properties": {}}
                }
            })
        );
    }

    #[test]
    fn from_schema_is_not_runnable() {
        let tool = Tool::from_schema(&json!({
            "type": "function",
            "function": {"name": "remote", "parameters": {"type": "object"}}
        }))
        .expect("schema should be valid");

        assert_eq!(tool.name(), "remote");
        assert!(!tool.is_runnable());
        assert!(!tool.is_async());
    }

    #[test]
    fn model_tool_validates_before_handler() {
        let tool = Tool::from_model(|input: ConvertTemperature| {
            let places = input.precision.unwrap_or(1) as i32;
            let factor = 10f64.powi(places);
            Ok(json!(((input.celsius * 9.0 / 5.0 + 32.0) * factor).round() / factor))
        });

        assert_eq!(tool.name(), "convert_temperature");
        assert_eq!(tool.description(), "Convert a temperature.");
        assert_eq!(
            run_sync(&tool, json!({"celsius": 100})).expect("should convert"),
            json!(212.0)
        );

        let error = run_sync(&tool, json!({})).expect_err("missing field");
        assert_eq!(error.kind, ToolErrorKind::InvalidArguments);
        assert_eq!(error.field_errors[0]["loc"], json!(["celsius"]));

        let error = run_sync(&tool, json!({"celsius": "hot"})).expect_err("wrong type");
        assert_eq!(error.field_errors[0]["type"], "number_type");
    }

    #[tokio::test]
    async fn async_tools_report_async_handler() {
        let tool = Tool::from_async_fn(
            "fetchPage",
            ToolParams::new().required("url", ParamType::String),
            |args, _ctx| async move { Ok(Value::Object(args)) },
        )
        .with_context();

        assert_eq!(tool.name(), "fetch_page");
        assert!(tool.is_async());
        assert!(tool.needs_context());

        let Some(ToolHandler::Async(handler)) = tool.handler() else {
            panic!("tool should be async");
        };
        let mut args = JsonMap::new();
        args.insert("url".to_string(), json!("https://example.test"));
        let output = handler(args, None).await.expect("handler should succeed");
        assert_eq!(output["url"], "https://example.test");
    }
}
