//! Parameter list builder for function tools.
//!
//! ```rust
//! use rtooling::{ParamType, ToolParams};
//!
//! let params = ToolParams::new()
//!     .required("city", ParamType::String)
//!     .optional("days", ParamType::Integer);
//!
//! let schema = params.to_schema();
//! assert_eq!(schema["required"], serde_json::json!(["city"]));
//! assert_eq!(schema["properties"]["days"]["type"], "integer");
//! ```

use rcommon::JsonMap;
use schemars::JsonSchema;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    /// No constraint on the value.
    Any,
    Schema(Value),
}

impl ParamType {
    /// Schema derived from a Rust type.
    pub fn of<T: JsonSchema>() -> Self {
        let mut schema =
            serde_json::to_value(crate::schema::inline_schema_for::<T>()).unwrap_or_default();
        if let Value::Object(map) = &mut schema {
            map.remove("$schema");
            map.remove("title");
        }
        Self::Schema(schema)
    }

    pub fn to_schema(&self) -> Value {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Any => return Value::Object(JsonMap::new()),
            Self::Schema(schema) => return schema.clone(),
        };
        serde_json::json!({ "type": name })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Param {
    name: String,
    kind: ParamType,
    required: bool,
    description: Option<String>,
}

/// Ordered parameter declarations. A parameter without a default is required.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolParams {
    params: Vec<Param>,
}

impl ToolParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(self, name: impl Into<String>, kind: ParamType) -> Self {
        self.push(name.into(), kind, true)
    }

    pub fn optional(self, name: impl Into<String>, kind: ParamType) -> Self {
        self.push(name.into(), kind, false)
    }

    /// Attaches a description to the most recently declared parameter.
    pub fn described(mut self, description: impl Into<String>) -> Self {
        if let Some(param) = self.params.last_mut() {
            param.description = Some(description.into());
        }
        self
    }

    fn push(mut self, name: String, kind: ParamType, required: bool) -> Self {
        self.params.retain(|param| param.name != name);
        self.params.push(Param {
            name,
            kind,
            required,
            description: None,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn to_schema(&self) -> Value {
        let mut properties = JsonMap::new();
        let mut required = Vec::new();
        for param in &self.params {
            let mut schema = param.kind.to_schema();
            if let (Some(description), Value::Object(map)) = (&param.description, &mut schema) {
                map.insert("description".to_string(), Value::from(description.clone()));
            }
            properties.insert(param.name.clone(), schema);
            if param.required {
                required.push(Value::from(param.name.clone()));
            }
        }

        let mut schema = JsonMap::new();
        schema.insert("type".to_string(), Value::from("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), Value::Array(required));
        }
        Value::Object(schema)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_params_produce_bare_object_schema() {
        assert_eq!(
            ToolParams::new().to_schema(),
            json!({"type": "object", "properties": {}})
        );
    }

    #[test]
    fn descriptions_and_redeclaration() {
        let schema = ToolParams::new()
            .required("text", ParamType::Number)
            .required("text", ParamType::String)
            .described("Text to echo")
            .optional("extra", ParamType::Any)
            .to_schema();

        assert_eq!(
            schema,
            json!({
                "type": "object",
                "properties": {
                    "text": {"type": "string", "description": "Text to echo"},
                    "extra": {}
                },
                "required": ["text"]
            })
        );
    }

    #[test]
    fn derived_param_types_drop_root_metadata() {
        let schema = ParamType::of::<Vec<String>>().to_schema();
        assert_eq!(schema["type"], "array");
        assert!(schema.get("$schema").is_none());
    }
}
