use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::config::RuntimeConfig;
use crate::error::{AgentCoreError, Result};
use crate::flow::{Flow, FlowEnvironment, FlowNodeRegistry, FlowNodeType};
use crate::llm::{DynLlmClient, LocalEchoClient, ModelRegistry, RetryingClient};
use crate::node::Node;
use crate::planning::{local_planning, PlanningResult};
use crate::tools::{describe_definition, ToolDefinition, ToolSchema};

#[derive(Clone, Debug, Serialize)]
pub struct FlowNodeSummary {
    pub id: String,
    pub name: String,
    pub type_name: String,
    pub node_type: String,
    /// Ids of the nodes attached through SETTING edges.
    pub settings: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct FlowEdgeSummary {
    pub id: String,
    pub kind: String,
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct FlowSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    pub nodes: Vec<FlowNodeSummary>,
    pub edges: Vec<FlowEdgeSummary>,
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|err| AgentCoreError::InvalidConfig(format!("read {}: {err}", path.display())))
}

/// Reads and validates a serialized flow document.
pub async fn read_flow(path: &Path, registry: &FlowNodeRegistry) -> Result<Flow> {
    let text = read_text(path).await?;
    Flow::deserialization(&text, registry)
}

pub fn inspect_flow(flow: &Flow) -> FlowSummary {
    FlowSummary {
        id: flow.id().to_string(),
        name: flow.name().to_string(),
        description: flow.description().to_string(),
        entry: flow.entry_node().ok(),
        nodes: flow
            .nodes()
            .map(|node| FlowNodeSummary {
                id: node.id().to_string(),
                name: node.name().to_string(),
                type_name: node.type_name().to_string(),
                node_type: node.node_type().to_string(),
                settings: flow
                    .settings_of(node.id())
                    .iter()
                    .map(|setting| setting.id().to_string())
                    .collect(),
            })
            .collect(),
        edges: flow
            .edges()
            .iter()
            .map(|edge| FlowEdgeSummary {
                id: edge.id.clone(),
                kind: edge.kind.to_string(),
                source: edge.source_node_id.clone(),
                target: edge.target_node_id.clone(),
                value: edge.value().map(str::to_string),
            })
            .collect(),
    }
}

/// Parses captured planning output offline.
pub async fn explain_planning_file(path: &Path) -> Result<PlanningResult> {
    local_planning(&read_text(path).await?)
}

/// Validates a tool definition document and renders its model-facing schema.
pub async fn describe_tool_file(path: &Path) -> Result<ToolSchema> {
    let definition: ToolDefinition = serde_json::from_str(&read_text(path).await?)?;
    definition.validate()?;
    Ok(describe_definition(&definition))
}

/// Offline environment: every model name resolves to a retrying echo
/// client so flows can be dry-run without a provider.
pub fn offline_environment(config: &RuntimeConfig, models: &[String]) -> FlowEnvironment {
    let mut registry = ModelRegistry::new();
    let echo: DynLlmClient = Arc::new(RetryingClient::new(
        Arc::new(LocalEchoClient),
        config.retry.clone(),
    ));
    let default_model = config
        .default_model
        .clone()
        .unwrap_or_else(|| "echo".to_string());
    registry.register(default_model.clone(), echo.clone());
    for model in models {
        registry.register(model.clone(), echo.clone());
    }
    registry.set_default(default_model);
    FlowEnvironment::new()
        .with_models(registry)
        .with_limits(config.round_limits())
}

/// Model names referenced by the flow's LLM nodes.
pub fn flow_models(flow: &Flow) -> Result<Vec<String>> {
    let mut models = Vec::new();
    for node in flow.nodes().filter(|node| node.node_type() == FlowNodeType::Llm) {
        let domain: serde_json::Value = serde_json::from_str(&node.serialization()?)?;
        if let Some(model) = domain.get("model").and_then(serde_json::Value::as_str) {
            if !model.trim().is_empty() && !models.iter().any(|known| known == model) {
                models.push(model.to_string());
            }
        }
    }
    Ok(models)
}
