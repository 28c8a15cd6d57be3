use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{AgentCoreError, Result};

/// Declared type of a tool parameter.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallParameterType {
    String,
    Boolean,
    Integer,
    Long,
    Double,
    Float,
    Date,
    DateTime,
    /// Accepts any JSON value unchanged.
    Any,
}

impl ToolCallParameterType {
    /// JSON-schema `type` keyword for this parameter type.
    pub fn schema_type(self) -> &'static str {
        match self {
            ToolCallParameterType::String
            | ToolCallParameterType::Date
            | ToolCallParameterType::DateTime => "string",
            ToolCallParameterType::Boolean => "boolean",
            ToolCallParameterType::Integer | ToolCallParameterType::Long => "integer",
            ToolCallParameterType::Double | ToolCallParameterType::Float => "number",
            ToolCallParameterType::Any => "object",
        }
    }

    /// Whether values of this type can be listed in an enum set.
    pub fn is_scalar(self) -> bool {
        self != ToolCallParameterType::Any
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCallParameter {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub parameter_type: ToolCallParameterType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enums: Vec<String>,
}

impl ToolCallParameter {
    pub fn new(name: impl Into<String>, parameter_type: ToolCallParameterType) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            parameter_type,
            required: false,
            enums: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_enums<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enums = values.into_iter().map(Into::into).collect();
        self
    }
}

/// Name, description and ordered parameters of a callable tool.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ToolCallParameter>,
}

impl ToolDefinition {
    pub fn builder(name: impl Into<String>) -> ToolDefinitionBuilder {
        ToolDefinitionBuilder::new(name)
    }

    pub fn parameter(&self, name: &str) -> Option<&ToolCallParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Checks the invariants the builder enforces; used after deserializing.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AgentCoreError::InvalidConfig(
                "tool name must not be empty".into(),
            ));
        }
        let mut seen = HashSet::new();
        for parameter in &self.parameters {
            if !seen.insert(parameter.name.as_str()) {
                return Err(AgentCoreError::InvalidConfig(format!(
                    "tool `{}` declares parameter `{}` twice",
                    self.name, parameter.name
                )));
            }
            if !parameter.enums.is_empty() && !parameter.parameter_type.is_scalar() {
                return Err(AgentCoreError::InvalidConfig(format!(
                    "tool `{}` parameter `{}`: enums require a scalar type",
                    self.name, parameter.name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct ToolDefinitionBuilder {
    definition: ToolDefinition,
}

impl ToolDefinitionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            definition: ToolDefinition {
                name: name.into(),
                description: String::new(),
                parameters: Vec::new(),
            },
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.definition.description = description.into();
        self
    }

    pub fn parameter(mut self, parameter: ToolCallParameter) -> Self {
        self.definition.parameters.push(parameter);
        self
    }

    pub fn build(self) -> Result<ToolDefinition> {
        self.definition.validate()?;
        Ok(self.definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_parameter_is_rejected() {
        let result = ToolDefinition::builder("search")
            .parameter(ToolCallParameter::new("q", ToolCallParameterType::String))
            .parameter(ToolCallParameter::new("q", ToolCallParameterType::Integer))
            .build();
        assert!(matches!(result, Err(AgentCoreError::InvalidConfig(_))));
    }

    #[test]
    fn enums_on_any_parameter_are_rejected() {
        let result = ToolDefinition::builder("pick")
            .parameter(ToolCallParameter::new("n", ToolCallParameterType::Any).with_enums(["1", "2"]))
            .build();
        assert!(result.is_err());

        let numeric = ToolDefinition::builder("pick")
            .parameter(
                ToolCallParameter::new("n", ToolCallParameterType::Integer).with_enums(["1", "2"]),
            )
            .build();
        assert!(numeric.is_ok());
    }
}
