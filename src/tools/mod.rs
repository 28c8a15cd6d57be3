pub mod builtin;
pub mod coerce;
pub mod factory;
pub mod manifest;
pub mod registry;
pub mod schema;
pub mod tool;

pub use builtin::{ConstantTool, EchoTool};
pub use coerce::{coerce, coerce_arguments};
pub use factory::{register_builtin_tool_factories, ToolFactory, ToolFactoryRegistry};
pub use manifest::{
    ToolCallParameter, ToolCallParameterType, ToolDefinition, ToolDefinitionBuilder,
};
pub use registry::{execute_tool, ToolRegistry};
pub use schema::{describe, describe_definition, InputSchema, PropertySchema, ToolSchema};
pub use tool::{DynTool, FunctionTool, Tool, ToolArguments, ToolInvocation};
