//! JSON argument normalization and schema checks for tool calls.
//!
//! ```rust
//! use rtooling::{normalize_arguments, required_string};
//!
//! let args = normalize_arguments("search", &serde_json::json!(r#"{"query":"rust"}"#))
//!     .expect("object should parse");
//! let query = required_string(&args, "query").expect("query should be present");
//! assert_eq!(query, "rust");
//! ```

use jsonschema::error::ValidationErrorKind;
use rcommon::{ErrorPayload, JsonMap};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::ToolError;

/// Accepts either a JSON-encoded string or an object and returns the object.
pub fn normalize_arguments(tool_name: &str, arguments: &Value) -> Result<JsonMap, ErrorPayload> {
    let parsed;
    let arguments = match arguments {
        Value::String(raw) => {
            parsed = serde_json::from_str::<Value>(raw).map_err(|_| {
                ErrorPayload::invalid_input(format!(
                    "Tool '{tool_name}' arguments are not valid JSON."
                ))
            })?;
            &parsed
        }
        other => other,
    };

    arguments.as_object().cloned().ok_or_else(|| {
        ErrorPayload::invalid_input(format!("Tool '{tool_name}' arguments must be an object."))
    })
}

pub fn required_string(args: &JsonMap, key: &str) -> Result<String, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| {
            ToolError::invalid_arguments(vec![field_error(key, "Field required", "missing")])
        })
}

/// Deserializes one argument, reporting a field-level error when it is absent
/// or has the wrong shape.
pub fn required_field<T: DeserializeOwned>(args: &JsonMap, key: &str) -> Result<T, ToolError> {
    let value = args.get(key).ok_or_else(|| {
        ToolError::invalid_arguments(vec![field_error(key, "Field required", "missing")])
    })?;
    serde_json::from_value(value.clone()).map_err(|error| {
        ToolError::invalid_arguments(vec![field_error(key, &error.to_string(), "value_error")])
    })
}

pub fn optional_field<T: DeserializeOwned>(
    args: &JsonMap,
    key: &str,
) -> Result<Option<T>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => required_field(args, key).map(Some),
    }
}

pub(crate) fn field_error(field: &str, message: &str, error_type: &str) -> Value {
    let loc = if field.is_empty() {
        Value::Array(Vec::new())
    } else {
        json!([field])
    };
    json!({"loc": loc, "msg": message, "type": error_type})
}

/// Validates `args` against a JSON Schema and returns one `{loc, msg, type}`
/// entry per violation, with missing fields listed first.
pub fn validate_arguments(schema: &Value, args: &JsonMap) -> Vec<Value> {
    let validator = match jsonschema::Validator::new(schema) {
        Ok(validator) => validator,
        Err(error) => {
            return vec![field_error(
                "",
                &format!("invalid tool schema: {error}"),
                "schema_error",
            )];
        }
    };

    let instance = Value::Object(args.clone());
    if validator.is_valid(&instance) {
        return Vec::new();
    }

    let mut errors: Vec<Value> = validator
        .iter_errors(&instance)
        .map(|error| {
            let mut loc = pointer_segments(&error.instance_path.to_string());
            match &error.kind {
                ValidationErrorKind::Required { property } => {
                    loc.push(match property {
                        Value::String(name) => Value::String(name.clone()),
                        other => Value::String(other.to_string()),
                    });
                    json!({"loc": loc, "msg": "Field required", "type": "missing"})
                }
                ValidationErrorKind::Type { .. } => {
                    let expected = expected_type(schema, &loc).unwrap_or("value");
                    json!({
                        "loc": loc,
                        "msg": format!("Input should be a valid {}", describe_type(expected)),
                        "type": format!("{expected}_type"),
                    })
                }
                _ => json!({"loc": loc, "msg": error.to_string(), "type": "value_error"}),
            }
        })
        .collect();

    errors.sort_by_key(|error| error["type"] != "missing");
    errors
}

fn pointer_segments(pointer: &str) -> Vec<Value> {
    pointer
        .split('/')
        .skip(1)
        .map(|segment| {
            let segment = segment.replace("~1", "/").replace("~0", "~");
            match segment.parse::<u64>() {
                Ok(index) => Value::from(index),
                Err(_) => Value::String(segment),
            }
        })
        .collect()
}

/// First declared `type` of the subschema at `loc`.
fn expected_type<'a>(schema: &'a Value, loc: &[Value]) -> Option<&'a str> {
    let mut current = schema;
    for segment in loc {
        current = match segment {
            Value::String(name) => current.get("properties")?.get(name)?,
            _ => current.get("items")?,
        };
    }
    match current.get("type")? {
        Value::String(name) => Some(name.as_str()),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .find(|name| *name != "null"),
        _ => None,
    }
}

fn describe_type(name: &str) -> &str {
    match name {
        "array" => "list",
        "object" => "dictionary",
        "null" => "null value",
        other => other,
    }
}
