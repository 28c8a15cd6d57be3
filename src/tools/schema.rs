use serde::{Deserialize, Serialize};

use crate::tools::manifest::ToolDefinition;
use crate::tools::tool::Tool;

/// Model-facing description of a tool.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: Vec<PropertySchema>,
    pub required: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PropertySchema {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub property_type: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enums: Vec<String>,
}

pub fn describe(tool: &dyn Tool) -> ToolSchema {
    describe_definition(tool.definition())
}

/// Deterministic: properties keep declaration order.
pub fn describe_definition(definition: &ToolDefinition) -> ToolSchema {
    let properties = definition
        .parameters
        .iter()
        .map(|parameter| PropertySchema {
            name: parameter.name.clone(),
            description: parameter.description.clone(),
            property_type: parameter.parameter_type.schema_type().to_string(),
            required: parameter.required,
            enums: parameter.enums.clone(),
        })
        .collect();
    let required = definition
        .parameters
        .iter()
        .filter(|parameter| parameter.required)
        .map(|parameter| parameter.name.clone())
        .collect();

    ToolSchema {
        name: definition.name.clone(),
        description: definition.description.clone(),
        input_schema: InputSchema {
            schema_type: "object".to_string(),
            properties,
            required,
        },
    }
}
