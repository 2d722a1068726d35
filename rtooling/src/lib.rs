//! Tool layer: schemas, normalization of tool inputs, and execution of
//! model-issued tool calls.

mod args;
mod context;
mod error;
mod executor;
mod hooks;
mod params;
mod schema;
mod tool;
mod toolset;

pub mod prelude {
    pub use crate::{
        ParamType, Tool, ToolContext, ToolError, ToolErrorKind, ToolExecution, ToolExecutor,
        ToolHandler, ToolParams, ToolResponse, ToolRuntimeHooks, ToolSet, ToolSpec,
        normalize_tools,
    };
}

pub use args::{
    normalize_arguments, optional_field, required_field, required_string, validate_arguments,
};
pub use context::ToolContext;
pub use error::{ToolError, ToolErrorKind};
pub use executor::{ToolExecution, ToolExecutor, ToolResponse};
pub use hooks::{NoopToolRuntimeHooks, ToolRuntimeHooks};
pub use params::{ParamType, ToolParams};
pub use schema::{schema_from_model, to_snake_case, validate_tool_schema};
pub use tool::{Tool, ToolFuture, ToolHandler};
pub use toolset::{ToolSet, ToolSpec, normalize_tools};
