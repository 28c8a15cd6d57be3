use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::environment::FlowEnvironment;
use super::node::{
    parse_domain, FlowNode, FlowNodeBase, FlowNodeDomain, FlowNodeResult, FlowNodeType,
    FlowSetting,
};
use crate::agent::{Agent, AgentGroup};
use crate::config::RoundLimits;
use crate::error::{AgentCoreError, Result};
use crate::handoff::HandoffKind;
use crate::node::{Node, NodeCheckpoint, RunOutcome, Variables};
use crate::tools::{execute_tool, DynTool, ToolInvocation};
use crate::utils::ConfigValidator;

fn outcome_result(outcome: RunOutcome) -> FlowNodeResult {
    match outcome {
        RunOutcome::Completed { output } => FlowNodeResult::text(output),
        RunOutcome::Suspended { output, .. } => FlowNodeResult::suspended(output),
    }
}

fn not_initialized(base: &FlowNodeBase) -> AgentCoreError {
    AgentCoreError::ContractViolation(format!(
        "flow node `{}` executed before init",
        base.id
    ))
}

fn count_settings(settings: &[&dyn FlowNode], node_type: FlowNodeType) -> usize {
    settings
        .iter()
        .filter(|setting| setting.node_type() == node_type)
        .count()
}

/// Passthrough node, usually the trigger at the head of a flow.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EmptyFlowNode {
    #[serde(flatten)]
    pub base: FlowNodeBase,
}

impl EmptyFlowNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            base: FlowNodeBase::new(id, name, FlowNodeType::Empty, Self::TYPE_NAME),
        }
    }
}

#[async_trait]
impl FlowNode for EmptyFlowNode {
    fn base(&self) -> &FlowNodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut FlowNodeBase {
        &mut self.base
    }

    fn serialization(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl FlowNodeDomain for EmptyFlowNode {
    const TYPE_NAME: &'static str = "Empty";

    fn deserialization(text: &str) -> Result<Self> {
        let mut node: Self = parse_domain(Self::TYPE_NAME, text)?;
        node.base.node_type = FlowNodeType::Empty;
        node.base.type_name = Self::TYPE_NAME.to_string();
        Ok(node)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentFlowNodeDomain {
    #[serde(flatten)]
    pub base: FlowNodeBase,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub prompt_template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_round: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
}

/// Agent node. Needs exactly one LLM setting; TOOL settings become the
/// agent's tools.
pub struct AgentFlowNode {
    domain: AgentFlowNodeDomain,
    agent: Option<Agent>,
}

impl AgentFlowNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::from_domain(AgentFlowNodeDomain {
            base: FlowNodeBase::new(id, name, FlowNodeType::Agent, Self::TYPE_NAME),
            ..Default::default()
        })
    }

    pub fn from_domain(mut domain: AgentFlowNodeDomain) -> Self {
        domain.base.node_type = FlowNodeType::Agent;
        domain.base.type_name = Self::TYPE_NAME.to_string();
        Self {
            domain,
            agent: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.domain.system_prompt = prompt.into();
        self
    }

    pub fn with_prompt_template(mut self, template: impl Into<String>) -> Self {
        self.domain.prompt_template = template.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.domain.description = description.into();
        self
    }

    pub fn with_max_round(mut self, max_round: u32) -> Self {
        self.domain.max_round = Some(max_round);
        self
    }

    pub fn domain(&self) -> &AgentFlowNodeDomain {
        &self.domain
    }

    /// The materialized agent, present after init.
    pub fn agent(&self) -> Option<&Agent> {
        self.agent.as_ref()
    }

    fn build_agent(&self, settings: Vec<FlowSetting>, limits: &RoundLimits) -> Result<Agent> {
        let domain = &self.domain;
        let mut builder = Agent::builder(domain.base.name.clone())
            .limits(limits)
            .id(domain.base.id.clone())
            .description(domain.description.clone())
            .system_prompt(domain.system_prompt.clone())
            .prompt_template(domain.prompt_template.clone());
        if let Some(template) = &domain.continue_template {
            builder = builder.continue_template(template.clone());
        }
        if let Some(max_round) = domain.max_round {
            builder = builder.max_round(max_round);
        }
        if let Some(max_turns) = domain.max_turns {
            builder = builder.max_turns(max_turns);
        }

        let mut has_model = false;
        for setting in settings {
            match setting {
                FlowSetting::Model {
                    name,
                    client,
                    temperature,
                } => {
                    builder = builder.model(name, client);
                    if let Some(temperature) = temperature {
                        builder = builder.temperature(temperature);
                    }
                    has_model = true;
                }
                FlowSetting::Tool(tool) => builder = builder.tool(tool),
                other => {
                    return Err(AgentCoreError::graph(
                        &domain.base.id,
                        format!("agent does not accept {} settings", other.label()),
                    ))
                }
            }
        }
        if !has_model {
            return Err(AgentCoreError::graph(
                &domain.base.id,
                "agent requires an LLM setting",
            ));
        }
        builder.build()
    }
}

#[async_trait]
impl FlowNode for AgentFlowNode {
    fn base(&self) -> &FlowNodeBase {
        &self.domain.base
    }

    fn base_mut(&mut self) -> &mut FlowNodeBase {
        &mut self.domain.base
    }

    fn serialization(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.domain)?)
    }

    fn check(&self, settings: &[&dyn FlowNode]) -> Result<()> {
        self.domain.base.check()?;
        if count_settings(settings, FlowNodeType::Llm) != 1 {
            return Err(AgentCoreError::graph(
                &self.domain.base.id,
                "agent requires exactly one LLM setting",
            ));
        }
        if let Some(other) = settings
            .iter()
            .find(|s| !matches!(s.node_type(), FlowNodeType::Llm | FlowNodeType::Tool))
        {
            return Err(AgentCoreError::graph(
                &self.domain.base.id,
                format!("{} node `{}` is not a valid agent setting", other.node_type(), other.id()),
            ));
        }
        Ok(())
    }

    fn provide(&self, settings: Vec<FlowSetting>, env: &FlowEnvironment) -> Result<FlowSetting> {
        Ok(FlowSetting::Member(Box::new(self.build_agent(settings, &env.limits)?)))
    }

    fn init(&mut self, settings: Vec<FlowSetting>, env: &FlowEnvironment) -> Result<()> {
        self.agent = Some(self.build_agent(settings, &env.limits)?);
        Ok(())
    }

    fn checkpoint(&self) -> Result<Option<NodeCheckpoint>> {
        self.agent.as_ref().map(Node::checkpoint).transpose()
    }

    fn restore(&mut self, checkpoint: NodeCheckpoint) -> Result<()> {
        match self.agent.as_mut() {
            Some(agent) => agent.restore(checkpoint),
            None => Err(not_initialized(&self.domain.base)),
        }
    }

    async fn execute(&mut self, input: &str, variables: &mut Variables) -> Result<FlowNodeResult> {
        let agent = match self.agent.as_mut() {
            Some(agent) => agent,
            None => return Err(not_initialized(&self.domain.base)),
        };
        Ok(outcome_result(agent.run(input, variables).await?))
    }
}

impl FlowNodeDomain for AgentFlowNode {
    const TYPE_NAME: &'static str = "Agent";

    fn deserialization(text: &str) -> Result<Self> {
        Ok(Self::from_domain(parse_domain(Self::TYPE_NAME, text)?))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentGroupFlowNodeDomain {
    #[serde(flatten)]
    pub base: FlowNodeBase,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_round: Option<u32>,
    /// Member that runs first; defaults to the first member setting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
}

/// Group node. Members come from AGENT or AGENT_GROUP settings, the
/// policy from exactly one HANDOFF setting.
pub struct AgentGroupFlowNode {
    domain: AgentGroupFlowNodeDomain,
    group: Option<AgentGroup>,
}

impl AgentGroupFlowNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::from_domain(AgentGroupFlowNodeDomain {
            base: FlowNodeBase::new(id, name, FlowNodeType::AgentGroup, Self::TYPE_NAME),
            ..Default::default()
        })
    }

    pub fn from_domain(mut domain: AgentGroupFlowNodeDomain) -> Self {
        domain.base.node_type = FlowNodeType::AgentGroup;
        domain.base.type_name = Self::TYPE_NAME.to_string();
        Self {
            domain,
            group: None,
        }
    }

    pub fn with_max_round(mut self, max_round: u32) -> Self {
        self.domain.max_round = Some(max_round);
        self
    }

    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.domain.entry = Some(entry.into());
        self
    }

    pub fn domain(&self) -> &AgentGroupFlowNodeDomain {
        &self.domain
    }

    pub fn group(&self) -> Option<&AgentGroup> {
        self.group.as_ref()
    }

    /// Mutable access for resuming a group suspended by a manual handoff.
    pub fn group_mut(&mut self) -> Option<&mut AgentGroup> {
        self.group.as_mut()
    }

    fn build_group(&self, settings: Vec<FlowSetting>, limits: &RoundLimits) -> Result<AgentGroup> {
        let domain = &self.domain;
        let mut builder = AgentGroup::builder(domain.base.name.clone())
            .limits(limits)
            .id(domain.base.id.clone())
            .description(domain.description.clone());
        if let Some(max_round) = domain.max_round {
            builder = builder.max_round(max_round);
        }
        if let Some(entry) = &domain.entry {
            builder = builder.entry(entry.clone());
        }
        for setting in settings {
            match setting {
                FlowSetting::Member(node) => builder = builder.agent(node),
                FlowSetting::Handoff { kind, target } => {
                    builder = builder.handoff_kind(kind, target)
                }
                other => {
                    return Err(AgentCoreError::graph(
                        &domain.base.id,
                        format!("group does not accept {} settings", other.label()),
                    ))
                }
            }
        }
        builder.build()
    }
}

#[async_trait]
impl FlowNode for AgentGroupFlowNode {
    fn base(&self) -> &FlowNodeBase {
        &self.domain.base
    }

    fn base_mut(&mut self) -> &mut FlowNodeBase {
        &mut self.domain.base
    }

    fn serialization(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.domain)?)
    }

    fn check(&self, settings: &[&dyn FlowNode]) -> Result<()> {
        self.domain.base.check()?;
        let id = &self.domain.base.id;
        let members = count_settings(settings, FlowNodeType::Agent)
            + count_settings(settings, FlowNodeType::AgentGroup);
        if members == 0 {
            return Err(AgentCoreError::graph(id, "group requires at least one agent setting"));
        }
        if count_settings(settings, FlowNodeType::Handoff) != 1 {
            return Err(AgentCoreError::graph(
                id,
                "group requires exactly one handoff setting",
            ));
        }
        if let Some(other) = settings.iter().find(|s| {
            !matches!(
                s.node_type(),
                FlowNodeType::Agent | FlowNodeType::AgentGroup | FlowNodeType::Handoff
            )
        }) {
            return Err(AgentCoreError::graph(
                id,
                format!("{} node `{}` is not a valid group setting", other.node_type(), other.id()),
            ));
        }
        Ok(())
    }

    fn provide(&self, settings: Vec<FlowSetting>, env: &FlowEnvironment) -> Result<FlowSetting> {
        Ok(FlowSetting::Member(Box::new(self.build_group(settings, &env.limits)?)))
    }

    fn init(&mut self, settings: Vec<FlowSetting>, env: &FlowEnvironment) -> Result<()> {
        self.group = Some(self.build_group(settings, &env.limits)?);
        Ok(())
    }

    fn checkpoint(&self) -> Result<Option<NodeCheckpoint>> {
        self.group.as_ref().map(Node::checkpoint).transpose()
    }

    fn restore(&mut self, checkpoint: NodeCheckpoint) -> Result<()> {
        match self.group.as_mut() {
            Some(group) => group.restore(checkpoint),
            None => Err(not_initialized(&self.domain.base)),
        }
    }

    async fn execute(&mut self, input: &str, variables: &mut Variables) -> Result<FlowNodeResult> {
        let group = match self.group.as_mut() {
            Some(group) => group,
            None => return Err(not_initialized(&self.domain.base)),
        };
        Ok(outcome_result(group.run(input, variables).await?))
    }

    async fn resume(
        &mut self,
        agent: &str,
        query: &str,
        variables: &mut Variables,
    ) -> Result<FlowNodeResult> {
        let group = match self.group.as_mut() {
            Some(group) => group,
            None => return Err(not_initialized(&self.domain.base)),
        };
        Ok(outcome_result(group.resume(agent, query, variables).await?))
    }
}

impl FlowNodeDomain for AgentGroupFlowNode {
    const TYPE_NAME: &'static str = "AgentGroup";

    fn deserialization(text: &str) -> Result<Self> {
        Ok(Self::from_domain(parse_domain(Self::TYPE_NAME, text)?))
    }
}

/// Model setting; a blank model name resolves to the registry default.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmFlowNode {
    #[serde(flatten)]
    pub base: FlowNodeBase,
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl LlmFlowNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base: FlowNodeBase::new(id, name, FlowNodeType::Llm, Self::TYPE_NAME),
            model: model.into(),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[async_trait]
impl FlowNode for LlmFlowNode {
    fn base(&self) -> &FlowNodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut FlowNodeBase {
        &mut self.base
    }

    fn serialization(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn check(&self, _settings: &[&dyn FlowNode]) -> Result<()> {
        self.base.check()?;
        if let Some(temperature) = self.temperature {
            ConfigValidator::validate_temperature(temperature)
                .map_err(|err| AgentCoreError::graph(&self.base.id, err.to_string()))?;
        }
        Ok(())
    }

    fn provide(&self, _settings: Vec<FlowSetting>, env: &FlowEnvironment) -> Result<FlowSetting> {
        let requested = (!self.model.trim().is_empty()).then_some(self.model.as_str());
        let (name, client) = env.models.resolve(requested)?;
        Ok(FlowSetting::Model {
            name,
            client,
            temperature: self.temperature,
        })
    }
}

impl FlowNodeDomain for LlmFlowNode {
    const TYPE_NAME: &'static str = "Llm";

    fn deserialization(text: &str) -> Result<Self> {
        let mut node: Self = parse_domain(Self::TYPE_NAME, text)?;
        node.base.node_type = FlowNodeType::Llm;
        node.base.type_name = Self::TYPE_NAME.to_string();
        Ok(node)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolFlowNodeDomain {
    #[serde(flatten)]
    pub base: FlowNodeBase,
    /// Registered tool name; ignored when `factory` is set.
    #[serde(default)]
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    /// Parameter that receives plain-text input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument: Option<String>,
}

/// Tool node: a setting for agents, or executed directly with the
/// incoming text (a JSON object input is passed as the arguments).
pub struct ToolFlowNode {
    domain: ToolFlowNodeDomain,
    tool: Option<DynTool>,
}

impl ToolFlowNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self::from_domain(ToolFlowNodeDomain {
            base: FlowNodeBase::new(id, name, FlowNodeType::Tool, Self::TYPE_NAME),
            tool_name: tool_name.into(),
            ..Default::default()
        })
    }

    pub fn from_domain(mut domain: ToolFlowNodeDomain) -> Self {
        domain.base.node_type = FlowNodeType::Tool;
        domain.base.type_name = Self::TYPE_NAME.to_string();
        Self { domain, tool: None }
    }

    /// Builds the tool from a factory instead of the tool registry.
    pub fn with_factory(mut self, factory: impl Into<String>, config: Option<Value>) -> Self {
        self.domain.factory = Some(factory.into());
        self.domain.config = config;
        self
    }

    pub fn with_argument(mut self, argument: impl Into<String>) -> Self {
        self.domain.argument = Some(argument.into());
        self
    }

    pub fn domain(&self) -> &ToolFlowNodeDomain {
        &self.domain
    }

    fn resolve_tool(&self, env: &FlowEnvironment) -> Result<DynTool> {
        match &self.domain.factory {
            Some(factory) => env.tool_factories.build(factory, self.domain.config.clone()),
            None => env
                .tools
                .get(&self.domain.tool_name)
                .ok_or_else(|| AgentCoreError::ToolNotRegistered(self.domain.tool_name.clone())),
        }
    }

    fn invocation(&self, tool: &DynTool, input: &str) -> ToolInvocation {
        let arguments = match serde_json::from_str::<Value>(input) {
            Ok(value @ Value::Object(_)) => value,
            _ => {
                let parameters = &tool.definition().parameters;
                let key = match &self.domain.argument {
                    Some(argument) => argument.clone(),
                    None if parameters.len() == 1 => parameters[0].name.clone(),
                    None => "input".to_string(),
                };
                let mut map = serde_json::Map::new();
                map.insert(key, Value::String(input.to_string()));
                Value::Object(map)
            }
        };
        ToolInvocation::new(tool.name(), arguments).with_id(self.domain.base.id.clone())
    }
}

#[async_trait]
impl FlowNode for ToolFlowNode {
    fn base(&self) -> &FlowNodeBase {
        &self.domain.base
    }

    fn base_mut(&mut self) -> &mut FlowNodeBase {
        &mut self.domain.base
    }

    fn serialization(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.domain)?)
    }

    fn check(&self, _settings: &[&dyn FlowNode]) -> Result<()> {
        self.domain.base.check()?;
        if self.domain.factory.is_none() && self.domain.tool_name.trim().is_empty() {
            return Err(AgentCoreError::graph(
                &self.domain.base.id,
                "tool node needs a tool name or a factory",
            ));
        }
        Ok(())
    }

    fn provide(&self, _settings: Vec<FlowSetting>, env: &FlowEnvironment) -> Result<FlowSetting> {
        Ok(FlowSetting::Tool(self.resolve_tool(env)?))
    }

    fn init(&mut self, _settings: Vec<FlowSetting>, env: &FlowEnvironment) -> Result<()> {
        self.tool = Some(self.resolve_tool(env)?);
        Ok(())
    }

    async fn execute(&mut self, input: &str, _variables: &mut Variables) -> Result<FlowNodeResult> {
        let tool = match &self.tool {
            Some(tool) => tool,
            None => return Err(not_initialized(&self.domain.base)),
        };
        let invocation = self.invocation(tool, input);
        debug!(node = %self.domain.base.id, tool = %invocation.name, "flow tool node executing");
        Ok(FlowNodeResult::text(
            execute_tool(tool.as_ref(), &invocation).await?,
        ))
    }
}

impl FlowNodeDomain for ToolFlowNode {
    const TYPE_NAME: &'static str = "Tool";

    fn deserialization(text: &str) -> Result<Self> {
        Ok(Self::from_domain(parse_domain(Self::TYPE_NAME, text)?))
    }
}

/// Handoff policy setting for a group node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HandoffFlowNode {
    #[serde(flatten)]
    pub base: FlowNodeBase,
    #[serde(default)]
    pub handoff_type: HandoffKind,
    /// Member name DIRECT routes to and HYBRID falls back to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl HandoffFlowNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>, handoff_type: HandoffKind) -> Self {
        Self {
            base: FlowNodeBase::new(id, name, FlowNodeType::Handoff, Self::TYPE_NAME),
            handoff_type,
            target: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

#[async_trait]
impl FlowNode for HandoffFlowNode {
    fn base(&self) -> &FlowNodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut FlowNodeBase {
        &mut self.base
    }

    fn serialization(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn check(&self, _settings: &[&dyn FlowNode]) -> Result<()> {
        self.base.check()?;
        let blank_target = self
            .target
            .as_deref()
            .map(|t| t.trim().is_empty())
            .unwrap_or(true);
        if self.handoff_type == HandoffKind::Direct && blank_target {
            return Err(AgentCoreError::graph(
                &self.base.id,
                "DIRECT handoff requires a target",
            ));
        }
        Ok(())
    }

    fn provide(&self, _settings: Vec<FlowSetting>, _env: &FlowEnvironment) -> Result<FlowSetting> {
        Ok(FlowSetting::Handoff {
            kind: self.handoff_type,
            target: self.target.clone(),
        })
    }
}

impl FlowNodeDomain for HandoffFlowNode {
    const TYPE_NAME: &'static str = "Handoff";

    fn deserialization(text: &str) -> Result<Self> {
        let mut node: Self = parse_domain(Self::TYPE_NAME, text)?;
        node.base.node_type = FlowNodeType::Handoff;
        node.base.type_name = Self::TYPE_NAME.to_string();
        Ok(node)
    }
}

/// Fails the run with its message when reached.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ThrowErrorFlowNode {
    #[serde(flatten)]
    pub base: FlowNodeBase,
    #[serde(default)]
    pub message: String,
}

impl ThrowErrorFlowNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            base: FlowNodeBase::new(id, name, FlowNodeType::Execute, Self::TYPE_NAME),
            message: message.into(),
        }
    }
}

#[async_trait]
impl FlowNode for ThrowErrorFlowNode {
    fn base(&self) -> &FlowNodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut FlowNodeBase {
        &mut self.base
    }

    fn serialization(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    async fn execute(&mut self, _input: &str, _variables: &mut Variables) -> Result<FlowNodeResult> {
        info!(node = %self.base.id, message = %self.message, "error node reached");
        Err(AgentCoreError::FlowAborted {
            node: self.base.id.clone(),
            message: self.message.clone(),
        })
    }
}

impl FlowNodeDomain for ThrowErrorFlowNode {
    const TYPE_NAME: &'static str = "ThrowError";

    fn deserialization(text: &str) -> Result<Self> {
        let mut node: Self = parse_domain(Self::TYPE_NAME, text)?;
        node.base.node_type = FlowNodeType::Execute;
        node.base.type_name = Self::TYPE_NAME.to_string();
        Ok(node)
    }
}

/// Maps free text onto one of a fixed set of values so that the
/// following CONNECTION edges can branch on it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterFlowNode {
    #[serde(flatten)]
    pub base: FlowNodeBase,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl FilterFlowNode {
    pub fn new<I, S>(id: impl Into<String>, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            base: FlowNodeBase::new(id, name, FlowNodeType::OperatorFilter, Self::TYPE_NAME),
            values: values.into_iter().map(Into::into).collect(),
            default_value: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// First value contained in `input` (case-insensitive), else the default,
    /// else the input unchanged.
    pub fn select(&self, input: &str) -> String {
        let haystack = input.to_lowercase();
        self.values
            .iter()
            .find(|value| haystack.contains(&value.to_lowercase()))
            .or(self.default_value.as_ref())
            .cloned()
            .unwrap_or_else(|| input.to_string())
    }
}

#[async_trait]
impl FlowNode for FilterFlowNode {
    fn base(&self) -> &FlowNodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut FlowNodeBase {
        &mut self.base
    }

    fn serialization(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn check(&self, _settings: &[&dyn FlowNode]) -> Result<()> {
        self.base.check()?;
        if self.values.iter().any(|v| v.trim().is_empty()) {
            return Err(AgentCoreError::graph(&self.base.id, "filter values must not be blank"));
        }
        Ok(())
    }

    async fn execute(&mut self, input: &str, _variables: &mut Variables) -> Result<FlowNodeResult> {
        Ok(FlowNodeResult::text(self.select(input)))
    }
}

impl FlowNodeDomain for FilterFlowNode {
    const TYPE_NAME: &'static str = "Filter";

    fn deserialization(text: &str) -> Result<Self> {
        let mut node: Self = parse_domain(Self::TYPE_NAME, text)?;
        node.base.node_type = FlowNodeType::OperatorFilter;
        node.base.type_name = Self::TYPE_NAME.to_string();
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_prefers_listed_values() {
        let filter = FilterFlowNode::new("f", "route", ["yes", "no"]).with_default("no");
        assert_eq!(filter.select("Answer: YES, definitely"), "yes");
        assert_eq!(filter.select("unclear"), "no");
    }

    #[test]
    fn llm_temperature_is_range_checked() {
        let node = LlmFlowNode::new("llm", "model", "gpt").with_temperature(2.5);
        assert!(matches!(
            node.check(&[]),
            Err(AgentCoreError::GraphValidation { ref element, .. }) if element == "llm"
        ));
        assert!(node.with_temperature(0.7).check(&[]).is_ok());
    }

    #[test]
    fn direct_handoff_node_needs_target() {
        let node = HandoffFlowNode::new("h", "handoff", HandoffKind::Direct);
        assert!(node.check(&[]).is_err());
        assert!(node.with_target("writer").check(&[]).is_ok());
    }

    #[test]
    fn agent_domain_omits_runtime_agent() {
        let node = AgentFlowNode::new("a1", "writer").with_system_prompt("be brief");
        let text = node.serialization().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "AGENT");
        assert_eq!(value["type_name"], "Agent");
        assert_eq!(value["system_prompt"], "be brief");
        assert!(value.get("agent").is_none());
        assert!(value.get("status").is_none());
    }
}
