//! Schema helpers: model-derived parameter schemas, tool naming, and
//! validation of hand-written tool schemas.
//!
//! ```rust
//! use rtooling::{schema_from_model, to_snake_case};
//!
//! #[derive(schemars::JsonSchema)]
//! /// Look up the weather.
//! struct WeatherQuery {
//!     city: String,
//! }
//!
//! let schema = schema_from_model::<WeatherQuery>();
//! assert_eq!(schema["function"]["name"], "weather_query");
//! assert_eq!(to_snake_case("GetWeather"), "get_weather");
//! ```

use rcommon::{ErrorPayload, JsonMap};
use schemars::JsonSchema;
use schemars::r#gen::SchemaSettings;
use schemars::schema::RootSchema;
use serde_json::Value;

/// `CamelCase` to `snake_case`; every uppercase letter starts a new word.
pub fn to_snake_case(name: &str) -> String {
    let mut output = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_uppercase() {
            output.push('_');
            output.extend(ch.to_lowercase());
        } else {
            output.push(ch);
        }
    }
    output.trim_start_matches('_').to_string()
}

pub(crate) fn inline_schema_for<T: JsonSchema>() -> RootSchema {
    SchemaSettings::draft07()
        .with(|settings| settings.inline_subschemas = true)
        .into_generator()
        .into_root_schema_for::<T>()
}

/// Parameter schema, tool name, and description derived from `T`.
pub(crate) struct ModelSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

pub(crate) fn model_schema<T: JsonSchema>() -> ModelSchema {
    let mut parameters = serde_json::to_value(inline_schema_for::<T>()).unwrap_or_default();
    let mut description = String::new();
    if let Value::Object(map) = &mut parameters {
        map.remove("$schema");
        if let Some(Value::String(text)) = map.get("description") {
            description = text.trim().to_string();
        }
    }
    ModelSchema {
        name: to_snake_case(&T::schema_name()),
        description,
        parameters,
    }
}

/// Non-runnable schema payload for a structured input type.
pub fn schema_from_model<T: JsonSchema>() -> Value {
    let model = model_schema::<T>();
    function_schema(&model.name, &model.description, model.parameters)
}

pub(crate) fn function_schema(name: &str, description: &str, parameters: Value) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": name,
            "description": description,
            "parameters": parameters,
        }
    })
}

/// Validates a `{type: "function", function: {name, parameters}}` payload and
/// returns the function name.
pub fn validate_tool_schema(schema: &Value) -> Result<String, ErrorPayload> {
    if schema.get("type").and_then(Value::as_str) != Some("function") {
        return Err(ErrorPayload::invalid_input(
            "Tool schema must have type='function'.",
        ));
    }
    let function = schema
        .get("function")
        .and_then(Value::as_object)
        .ok_or_else(|| ErrorPayload::invalid_input("Tool schema must include a 'function' object."))?;
    let name = function
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            ErrorPayload::invalid_input("Tool schema must include a non-empty function name.")
        })?;
    if !function.contains_key("parameters") {
        return Err(ErrorPayload::invalid_input(
            "Tool schema must include function parameters.",
        ));
    }
    Ok(name.to_string())
}

pub(crate) fn function_parts(schema: &Value) -> (String, String, Value) {
    let function = schema
        .get("function")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_else(JsonMap::new);
    let text = |key: &str| {
        function
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    (
        text("name"),
        text("description"),
        function.get("parameters").cloned().unwrap_or(Value::Null),
    )
}
