use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::environment::FlowEnvironment;
use crate::error::{AgentCoreError, Result};
use crate::handoff::HandoffKind;
use crate::llm::DynLlmClient;
use crate::node::{BoxedNode, NodeCheckpoint, Variables};
use crate::tools::DynTool;
use crate::utils::ConfigValidator;

/// 节点类型标签
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowNodeType {
    #[default]
    Empty,
    Execute,
    Agent,
    AgentGroup,
    Llm,
    Tool,
    Handoff,
    OperatorFilter,
}

impl FlowNodeType {
    /// Whether the runner executes nodes of this type; others pass their
    /// input through unchanged.
    pub fn is_executable(self) -> bool {
        matches!(
            self,
            FlowNodeType::Execute
                | FlowNodeType::Agent
                | FlowNodeType::AgentGroup
                | FlowNodeType::Tool
                | FlowNodeType::OperatorFilter
        )
    }
}

impl fmt::Display for FlowNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FlowNodeType::Empty => "EMPTY",
            FlowNodeType::Execute => "EXECUTE",
            FlowNodeType::Agent => "AGENT",
            FlowNodeType::AgentGroup => "AGENT_GROUP",
            FlowNodeType::Llm => "LLM",
            FlowNodeType::Tool => "TOOL",
            FlowNodeType::Handoff => "HANDOFF",
            FlowNodeType::OperatorFilter => "OPERATOR_FILTER",
        })
    }
}

/// 画布坐标
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowNodePosition {
    pub x: f64,
    pub y: f64,
}

/// Persisted identity shared by every node type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowNodeBase {
    pub id: String,
    #[serde(rename = "type", default)]
    pub node_type: FlowNodeType,
    #[serde(default)]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub type_description: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<FlowNodePosition>,
}

impl FlowNodeBase {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        node_type: FlowNodeType,
        type_name: &str,
    ) -> Self {
        Self {
            id: id.into(),
            node_type,
            type_name: type_name.to_string(),
            type_description: String::new(),
            name: name.into(),
            position: None,
        }
    }

    pub fn check(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(AgentCoreError::graph("<node>", "node id is blank"));
        }
        if self.name.trim().is_empty() {
            return Err(AgentCoreError::graph(&self.id, "node name is blank"));
        }
        ConfigValidator::validate_id("node", &self.id)
            .map_err(|err| AgentCoreError::graph(&self.id, err.to_string()))
    }
}

/// What a setting node contributes to the node it is attached to.
pub enum FlowSetting {
    Model {
        name: String,
        client: DynLlmClient,
        temperature: Option<f32>,
    },
    Tool(DynTool),
    Handoff {
        kind: HandoffKind,
        target: Option<String>,
    },
    Member(BoxedNode),
}

impl FlowSetting {
    pub fn label(&self) -> &'static str {
        match self {
            FlowSetting::Model { .. } => "model",
            FlowSetting::Tool(_) => "tool",
            FlowSetting::Handoff { .. } => "handoff",
            FlowSetting::Member(_) => "member",
        }
    }
}

impl fmt::Debug for FlowSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowSetting::Model { name, .. } => write!(f, "Model({name})"),
            FlowSetting::Tool(tool) => write!(f, "Tool({})", tool.name()),
            FlowSetting::Handoff { kind, target } => write!(f, "Handoff({kind}, {target:?})"),
            FlowSetting::Member(node) => write!(f, "Member({})", node.name()),
        }
    }
}

/// Result of executing one flow node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlowNodeResult {
    pub text: String,
    /// The node is waiting for an external decision; the run pauses here.
    pub suspended: bool,
}

impl FlowNodeResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            suspended: false,
        }
    }

    pub fn suspended(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            suspended: true,
        }
    }
}

/// A typed vertex of a flow graph.
///
/// `serialization` emits only the persisted Domain fields; live objects
/// built during `init` never reach the serialized form.
#[async_trait]
pub trait FlowNode: Send + Sync {
    fn base(&self) -> &FlowNodeBase;

    fn base_mut(&mut self) -> &mut FlowNodeBase;

    fn serialization(&self) -> Result<String>;

    /// Structural validation against the setting nodes attached to this one.
    fn check(&self, _settings: &[&dyn FlowNode]) -> Result<()> {
        self.base().check()
    }

    /// Builds the value this node contributes when attached as a setting.
    /// `settings` are the node's own resolved settings.
    fn provide(&self, _settings: Vec<FlowSetting>, _env: &FlowEnvironment) -> Result<FlowSetting> {
        Err(AgentCoreError::graph(
            &self.base().id,
            format!("{} nodes cannot be used as settings", self.base().node_type),
        ))
    }

    /// Materializes runtime objects before the node first executes.
    fn init(&mut self, _settings: Vec<FlowSetting>, _env: &FlowEnvironment) -> Result<()> {
        Ok(())
    }

    async fn execute(&mut self, input: &str, _variables: &mut Variables) -> Result<FlowNodeResult> {
        Ok(FlowNodeResult::text(input))
    }

    /// Continues after this node suspended, with the member and query an
    /// external driver picked.
    async fn resume(
        &mut self,
        _agent: &str,
        _query: &str,
        _variables: &mut Variables,
    ) -> Result<FlowNodeResult> {
        Err(AgentCoreError::ContractViolation(format!(
            "flow node `{}` cannot be resumed",
            self.base().id
        )))
    }

    /// Runtime state of the materialized node; `None` before init or for
    /// nodes that keep none.
    fn checkpoint(&self) -> Result<Option<NodeCheckpoint>> {
        Ok(None)
    }

    fn restore(&mut self, _checkpoint: NodeCheckpoint) -> Result<()> {
        Err(AgentCoreError::ContractViolation(format!(
            "flow node `{}` keeps no runtime state",
            self.base().id
        )))
    }

    fn id(&self) -> &str {
        &self.base().id
    }

    fn name(&self) -> &str {
        &self.base().name
    }

    fn node_type(&self) -> FlowNodeType {
        self.base().node_type
    }

    fn type_name(&self) -> &str {
        &self.base().type_name
    }
}

pub type BoxedFlowNode = Box<dyn FlowNode>;

/// Node types that can be rebuilt from their serialized Domain.
pub trait FlowNodeDomain: FlowNode + Sized + 'static {
    const TYPE_NAME: &'static str;

    fn deserialization(text: &str) -> Result<Self>;
}

/// Parses a Domain document, reporting the node type on failure.
pub(crate) fn parse_domain<T: DeserializeOwned>(type_name: &str, text: &str) -> Result<T> {
    serde_json::from_str(text)
        .map_err(|err| AgentCoreError::Serialization(format!("{type_name} node: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_work_nodes_execute() {
        assert!(FlowNodeType::Agent.is_executable());
        assert!(FlowNodeType::OperatorFilter.is_executable());
        assert!(!FlowNodeType::Llm.is_executable());
        assert!(!FlowNodeType::Empty.is_executable());
    }

    #[test]
    fn node_id_with_path_characters_fails_check() {
        let base = FlowNodeBase::new("../writer", "writer", FlowNodeType::Agent, "Agent");
        assert!(matches!(
            base.check(),
            Err(AgentCoreError::GraphValidation { ref element, .. }) if element == "../writer"
        ));
    }

    #[test]
    fn blank_name_fails_check() {
        let base = FlowNodeBase::new("n1", " ", FlowNodeType::Empty, "Empty");
        assert!(matches!(
            base.check(),
            Err(AgentCoreError::GraphValidation { .. })
        ));
    }
}
