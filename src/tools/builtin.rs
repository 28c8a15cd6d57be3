use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::tools::manifest::{ToolCallParameter, ToolCallParameterType, ToolDefinition};
use crate::tools::tool::{Tool, ToolArguments};

/// Returns its `text` argument with a prefix.
pub struct EchoTool {
    definition: ToolDefinition,
    prefix: String,
}

impl EchoTool {
    pub fn new() -> Self {
        Self::with_prefix("Echo")
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        let definition = ToolDefinition {
            name: "echo".to_string(),
            description: "Repeats the given text".to_string(),
            parameters: vec![ToolCallParameter::new("text", ToolCallParameterType::String)
                .with_description("text to repeat")
                .required()],
        };
        Self {
            definition,
            prefix: prefix.into(),
        }
    }
}

impl Default for EchoTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn call(&self, arguments: ToolArguments) -> Result<String> {
        let text = arguments
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(format!("{}: {}", self.prefix, text))
    }
}

/// Parameterless tool that always answers with a fixed value.
pub struct ConstantTool {
    definition: ToolDefinition,
    value: String,
}

impl ConstantTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self> {
        let definition = ToolDefinition::builder(name)
            .description(description)
            .build()?;
        Ok(Self {
            definition,
            value: value.into(),
        })
    }
}

#[async_trait]
impl Tool for ConstantTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn call(&self, _arguments: ToolArguments) -> Result<String> {
        Ok(self.value.clone())
    }
}
