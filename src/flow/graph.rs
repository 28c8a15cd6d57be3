use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::edge::{FlowEdge, FlowEdgeKind};
use super::environment::FlowEnvironment;
use super::node::{BoxedFlowNode, FlowNode, FlowNodeResult, FlowSetting};
use super::registry::FlowNodeRegistry;
use crate::constants::flow::DEFAULT_MAX_STEPS;
use crate::error::{AgentCoreError, Result};
use crate::events::{NodeOutputUpdated, SharedListeners};
use crate::node::{Node, NodeCheckpoint, NodeKind, NodeState, NodeStatus, RunOutcome, Variables};
use crate::persistence::PersistenceProvider;
use crate::utils::ConfigValidator;

/// One serialized graph element: its type token plus its own Domain JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowElementRecord {
    pub type_name: String,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct FlowDocument {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    nodes: Vec<FlowElementRecord>,
    #[serde(default)]
    edges: Vec<FlowElementRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    start_node: Option<String>,
    #[serde(default = "default_max_steps")]
    max_steps: u32,
}

fn default_max_steps() -> u32 {
    DEFAULT_MAX_STEPS
}

/// Where a run stands: the node it stopped at plus what that node was given.
#[derive(Debug, Default, Serialize, Deserialize)]
struct FlowCursor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current_node_id: Option<String>,
    #[serde(default)]
    current_input: String,
    #[serde(default)]
    current_variables: Variables,
}

/// Storage key of the runtime checkpoint saved next to flow `id`.
pub fn runtime_key(id: &str) -> String {
    format!("{id}-runtime")
}

/// Persistable graph of typed nodes. CONNECTION edges carry control,
/// SETTING edges attach configuration (models, tools, members, handoff).
pub struct Flow {
    state: NodeState,
    nodes: Vec<BoxedFlowNode>,
    edges: Vec<FlowEdge>,
    start_node: Option<String>,
    max_steps: u32,
    environment: Option<Arc<FlowEnvironment>>,
    initialized: HashSet<String>,
    current_node_id: Option<String>,
    current_input: String,
    current_variables: Variables,
    /// Checkpoints applied to nodes as they are initialized after a load.
    pending: HashMap<String, NodeCheckpoint>,
}

impl std::fmt::Debug for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flow")
            .field("state", &self.state)
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edges.len())
            .field("start_node", &self.start_node)
            .field("max_steps", &self.max_steps)
            .field("current_node_id", &self.current_node_id)
            .finish()
    }
}

impl Flow {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            state: NodeState::new(name).with_id(id),
            nodes: Vec::new(),
            edges: Vec::new(),
            start_node: None,
            max_steps: DEFAULT_MAX_STEPS,
            environment: None,
            initialized: HashSet::new(),
            current_node_id: None,
            current_input: String::new(),
            current_variables: Variables::new(),
            pending: HashMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.state = self.state.with_description(description);
        self
    }

    /// Node used when the flow runs as a plain [`Node`].
    pub fn with_start(mut self, node_id: impl Into<String>) -> Self {
        self.start_node = Some(node_id.into());
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn with_environment(mut self, environment: FlowEnvironment) -> Self {
        self.environment = Some(Arc::new(environment));
        self
    }

    pub fn with_listeners(mut self, listeners: SharedListeners) -> Self {
        self.state = self.state.with_listeners(listeners);
        self
    }

    pub fn description(&self) -> &str {
        self.state.description()
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    pub fn nodes(&self) -> impl Iterator<Item = &dyn FlowNode> {
        self.nodes.iter().map(|node| node.as_ref() as &dyn FlowNode)
    }

    pub fn edges(&self) -> &[FlowEdge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&dyn FlowNode> {
        self.nodes
            .iter()
            .find(|node| node.id() == id)
            .map(|node| node.as_ref() as &dyn FlowNode)
    }

    /// Node the last run stopped at (or is suspended at).
    pub fn current_node_id(&self) -> Option<&str> {
        self.current_node_id.as_deref()
    }

    /// Input handed to the current node.
    pub fn current_input(&self) -> &str {
        &self.current_input
    }

    /// Variables as they stood after the current node ran.
    pub fn current_variables(&self) -> &Variables {
        &self.current_variables
    }

    pub fn add_node<N: FlowNode + 'static>(&mut self, node: N) -> Result<()> {
        self.add_boxed_node(Box::new(node))
    }

    pub fn add_boxed_node(&mut self, node: BoxedFlowNode) -> Result<()> {
        node.base().check()?;
        if self.node(node.id()).is_some() {
            return Err(AgentCoreError::graph(
                node.id(),
                "duplicate node id in flow",
            ));
        }
        self.nodes.push(node);
        Ok(())
    }

    pub fn add_edge(&mut self, edge: FlowEdge) -> Result<()> {
        edge.check()?;
        if self.edges.iter().any(|existing| existing.id == edge.id) {
            return Err(AgentCoreError::graph(&edge.id, "duplicate edge id in flow"));
        }
        for endpoint in [&edge.source_node_id, &edge.target_node_id] {
            if self.node(endpoint).is_none() {
                return Err(AgentCoreError::graph(
                    &edge.id,
                    format!("edge references unknown node `{endpoint}`"),
                ));
            }
        }
        self.edges.push(edge);
        Ok(())
    }

    /// Adds an edge between two existing nodes and returns its id.
    pub fn link(
        &mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        kind: FlowEdgeKind,
    ) -> Result<String> {
        let edge = FlowEdge::new(source, target, kind);
        let id = edge.id.clone();
        self.add_edge(edge)?;
        Ok(id)
    }

    /// Targets of the SETTING edges leaving `node_id`.
    pub fn settings_of(&self, node_id: &str) -> Vec<&dyn FlowNode> {
        self.edges
            .iter()
            .filter(|edge| edge.is_setting() && edge.source_node_id == node_id)
            .filter_map(|edge| self.node(&edge.target_node_id))
            .collect()
    }

    /// Structural validation of the whole graph. Cycles along CONNECTION
    /// edges are allowed; runs are bounded by `max_steps`.
    pub fn check(&self) -> Result<()> {
        let id = self.state.id();
        if id.trim().is_empty() {
            return Err(AgentCoreError::graph("<flow>", "flow id is blank"));
        }
        if self.state.name().trim().is_empty() {
            return Err(AgentCoreError::graph(id, "flow name is blank"));
        }
        ConfigValidator::validate_id("flow", id)
            .and_then(|_| ConfigValidator::validate_flow_name(self.state.name()))
            .map_err(|err| AgentCoreError::graph(id, err.to_string()))?;
        if self.nodes.is_empty() {
            return Err(AgentCoreError::graph(id, "flow has no nodes"));
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id()) {
                return Err(AgentCoreError::graph(node.id(), "duplicate node id in flow"));
            }
        }
        let mut seen_edges = HashSet::new();
        for edge in &self.edges {
            edge.check()?;
            if !seen_edges.insert(edge.id.as_str()) {
                return Err(AgentCoreError::graph(&edge.id, "duplicate edge id in flow"));
            }
            for endpoint in [&edge.source_node_id, &edge.target_node_id] {
                if !seen.contains(endpoint.as_str()) {
                    return Err(AgentCoreError::graph(
                        &edge.id,
                        format!("edge references unknown node `{endpoint}`"),
                    ));
                }
            }
        }
        for node in &self.nodes {
            node.check(&self.settings_of(node.id()))?;
        }
        if let Some(start) = &self.start_node {
            if !seen.contains(start.as_str()) {
                return Err(AgentCoreError::graph(
                    id,
                    format!("start node `{start}` is not in the flow"),
                ));
            }
        }
        Ok(())
    }

    pub fn serialization(&self) -> Result<String> {
        let nodes = self
            .nodes
            .iter()
            .map(|node| {
                Ok(FlowElementRecord {
                    type_name: node.type_name().to_string(),
                    text: node.serialization()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let edges = self
            .edges
            .iter()
            .map(|edge| {
                Ok(FlowElementRecord {
                    type_name: edge.type_name().to_string(),
                    text: edge.serialization()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let document = FlowDocument {
            id: self.state.id().to_string(),
            name: self.state.name().to_string(),
            description: self.state.description().to_string(),
            nodes,
            edges,
            start_node: self.start_node.clone(),
            max_steps: self.max_steps,
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Rebuilds a flow from [`Flow::serialization`] output and validates it.
    pub fn deserialization(text: &str, registry: &FlowNodeRegistry) -> Result<Flow> {
        let document: FlowDocument = serde_json::from_str(text)?;
        let mut flow = Flow::new(document.id, document.name)
            .with_description(document.description)
            .with_max_steps(document.max_steps);
        flow.start_node = document.start_node;
        for record in &document.nodes {
            flow.add_boxed_node(registry.deserialize(&record.type_name, &record.text)?)?;
        }
        for record in &document.edges {
            flow.add_edge(FlowEdge::deserialization(&record.type_name, &record.text)?)?;
        }
        flow.check()?;
        debug!(
            flow = %flow.state.id(),
            nodes = flow.nodes.len(),
            edges = flow.edges.len(),
            "flow deserialized"
        );
        Ok(flow)
    }

    /// Saves the graph under `id`. A run that stopped part way also saves
    /// its checkpoint under [`runtime_key`]; otherwise that key is cleared.
    pub async fn save(&self, provider: &dyn PersistenceProvider, id: &str) -> Result<()> {
        provider.save(id, self.serialization()?).await?;
        let key = runtime_key(id);
        if self.current_node_id.is_some() && !self.state.status().is_finished() {
            provider
                .save(&key, serde_json::to_string(&self.checkpoint()?)?)
                .await?;
            info!(flow = %self.state.id(), key = id, node = ?self.current_node_id, "flow saved with runtime");
        } else {
            provider.delete(&[key]).await?;
            info!(flow = %self.state.id(), key = id, "flow saved");
        }
        Ok(())
    }

    pub async fn load(
        provider: &dyn PersistenceProvider,
        id: &str,
        registry: &FlowNodeRegistry,
    ) -> Result<Flow> {
        let text = provider
            .load(id)
            .await?
            .ok_or_else(|| AgentCoreError::Persistence(format!("flow `{id}` not found")))?;
        let mut flow = Flow::deserialization(&text, registry)?;
        if let Some(runtime) = provider.load(&runtime_key(id)).await? {
            let checkpoint: NodeCheckpoint = serde_json::from_str(&runtime)?;
            flow.restore(checkpoint)?;
            debug!(flow = %flow.state.id(), node = ?flow.current_node_id, "flow runtime restored");
        }
        Ok(flow)
    }

    /// Configured start node, else the first node nothing points at.
    pub fn entry_node(&self) -> Result<String> {
        if let Some(start) = &self.start_node {
            return Ok(start.clone());
        }
        self.nodes
            .iter()
            .map(|node| node.id())
            .find(|id| !self.edges.iter().any(|edge| edge.target_node_id == *id))
            .map(str::to_string)
            .ok_or_else(|| AgentCoreError::graph(self.state.id(), "flow has no entry node"))
    }

    /// Executes from `start` until a node has no outgoing connection, a
    /// node suspends, or `max_steps` nodes have run.
    #[instrument(skip(self, input, variables, env), fields(flow = %self.state.id()))]
    pub async fn run(
        &mut self,
        start: &str,
        input: &str,
        variables: &mut Variables,
        env: &FlowEnvironment,
    ) -> Result<RunOutcome> {
        self.check()?;
        if self.node(start).is_none() {
            return Err(AgentCoreError::graph(
                self.state.id(),
                format!("start node `{start}` is not in the flow"),
            ));
        }
        self.state.start(input);
        self.pending.clear();
        let outcome = self
            .walk(start.to_string(), input.to_string(), None, variables, env)
            .await;
        self.finish(input, outcome)
    }

    /// Resumes a run suspended at a group node. Works on a flow rebuilt
    /// by [`Flow::load`]; saved variables fill keys `variables` lacks.
    pub async fn resume(
        &mut self,
        agent: &str,
        query: &str,
        variables: &mut Variables,
        env: &FlowEnvironment,
    ) -> Result<RunOutcome> {
        let current = self.current_node_id.clone().ok_or_else(|| {
            AgentCoreError::ContractViolation(format!(
                "flow `{}` has no suspended node",
                self.state.id()
            ))
        })?;
        for (key, value) in &self.current_variables {
            variables
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        if let Err(err) = self.initialize(&current, env) {
            return self.finish(query, Err(err));
        }
        let index = self.index_of(&current)?;
        let result = self.nodes[index].resume(agent, query, variables).await;
        self.current_variables = variables.clone();
        let outcome = match result {
            Ok(result) => {
                self.publish_output(index, query, &result.text);
                self.walk(current, query.to_string(), Some(result), variables, env)
                    .await
            }
            Err(err) => Err(err),
        };
        self.finish(query, outcome)
    }

    fn finish(&mut self, input: &str, outcome: Result<RunOutcome>) -> Result<RunOutcome> {
        match outcome {
            Ok(RunOutcome::Completed { output }) => {
                self.state.set_output(input, output.clone());
                self.state.set_status(NodeStatus::Done);
                Ok(RunOutcome::Completed { output })
            }
            Ok(suspended) => Ok(suspended),
            Err(err) => {
                warn!(
                    flow = %self.state.id(),
                    node = ?self.current_node_id,
                    error = %err,
                    "flow run failed"
                );
                self.state.set_status(NodeStatus::Failed);
                Err(err)
            }
        }
    }

    async fn walk(
        &mut self,
        mut current: String,
        mut input: String,
        mut resumed: Option<FlowNodeResult>,
        variables: &mut Variables,
        env: &FlowEnvironment,
    ) -> Result<RunOutcome> {
        let mut steps = 0u32;
        loop {
            let result = match resumed.take() {
                Some(result) => result,
                None => {
                    if steps >= self.max_steps {
                        return Err(AgentCoreError::MaxStepsExceeded(self.max_steps));
                    }
                    steps += 1;
                    self.step(&current, &input, variables, env).await?
                }
            };

            if result.suspended {
                info!(flow = %self.state.id(), node = %current, "flow suspended");
                return Ok(RunOutcome::Suspended {
                    node: current,
                    output: result.text,
                });
            }
            match self.next_node(&current, &result.text)? {
                Some(next) => {
                    current = next;
                    input = result.text;
                }
                None => {
                    return Ok(RunOutcome::Completed {
                        output: result.text,
                    })
                }
            }
        }
    }

    async fn step(
        &mut self,
        node_id: &str,
        input: &str,
        variables: &mut Variables,
        env: &FlowEnvironment,
    ) -> Result<FlowNodeResult> {
        self.current_node_id = Some(node_id.to_string());
        self.current_input = input.to_string();
        self.initialize(node_id, env)?;
        let index = self.index_of(node_id)?;

        let node = &mut self.nodes[index];
        let result = if node.node_type().is_executable() {
            debug!(node = %node_id, node_type = %node.node_type(), "executing flow node");
            node.execute(input, variables).await?
        } else {
            FlowNodeResult::text(input)
        };
        self.current_variables = variables.clone();
        self.publish_output(index, input, &result.text);
        Ok(result)
    }

    fn publish_output(&self, index: usize, query: &str, output: &str) {
        let node = &self.nodes[index];
        self.state.listeners().output.publish(NodeOutputUpdated {
            node_id: node.id().to_string(),
            node_name: node.name().to_string(),
            query: query.to_string(),
            output: output.to_string(),
        });
    }

    fn index_of(&self, node_id: &str) -> Result<usize> {
        self.nodes
            .iter()
            .position(|node| node.id() == node_id)
            .ok_or_else(|| AgentCoreError::graph(node_id, "node is not in the flow"))
    }

    /// Resolves the node's settings once and hands them to `init`.
    fn initialize(&mut self, node_id: &str, env: &FlowEnvironment) -> Result<()> {
        if self.initialized.contains(node_id) {
            return Ok(());
        }
        let mut visiting = Vec::new();
        let settings = self.resolve_settings(node_id, env, &mut visiting)?;
        let index = self.index_of(node_id)?;
        self.nodes[index].init(settings, env)?;
        if let Some(checkpoint) = self.pending.remove(node_id) {
            self.nodes[index].restore(checkpoint)?;
        }
        self.initialized.insert(node_id.to_string());
        Ok(())
    }

    fn resolve_settings(
        &self,
        node_id: &str,
        env: &FlowEnvironment,
        visiting: &mut Vec<String>,
    ) -> Result<Vec<FlowSetting>> {
        if visiting.iter().any(|id| id == node_id) {
            return Err(AgentCoreError::graph(node_id, "setting edges form a cycle"));
        }
        visiting.push(node_id.to_string());

        let mut settings = Vec::new();
        for edge in self
            .edges
            .iter()
            .filter(|edge| edge.is_setting() && edge.source_node_id == node_id)
        {
            let target = self.node(&edge.target_node_id).ok_or_else(|| {
                AgentCoreError::graph(&edge.id, "setting target is not in the flow")
            })?;
            let nested = self.resolve_settings(&edge.target_node_id, env, visiting)?;
            settings.push(target.provide(nested, env)?);
        }

        visiting.pop();
        Ok(settings)
    }

    /// Picks the successor along CONNECTION edges. A single edge is always
    /// taken; among several, the first whose value equals `output`
    /// (case-insensitive), else the first edge without a value.
    fn next_node(&self, node_id: &str, output: &str) -> Result<Option<String>> {
        let next: Vec<&FlowEdge> = self
            .edges
            .iter()
            .filter(|edge| edge.is_connection() && edge.source_node_id == node_id)
            .collect();
        match next.as_slice() {
            [] => Ok(None),
            [edge] => Ok(Some(edge.target_node_id.clone())),
            many => {
                let wanted = output.trim();
                many.iter()
                    .find(|edge| {
                        edge.value()
                            .map(|value| value.trim().eq_ignore_ascii_case(wanted))
                            .unwrap_or(false)
                    })
                    .or_else(|| many.iter().find(|edge| edge.value().is_none()))
                    .map(|edge| Some(edge.target_node_id.clone()))
                    .ok_or_else(|| {
                        AgentCoreError::graph(
                            node_id,
                            format!("no outgoing edge matches output `{wanted}`"),
                        )
                    })
            }
        }
    }
}

#[async_trait]
impl Node for Flow {
    fn state(&self) -> &NodeState {
        &self.state
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Flow
    }

    /// Flow counters plus the checkpoint of every node that has run,
    /// keyed by node id.
    fn checkpoint(&self) -> Result<NodeCheckpoint> {
        let mut checkpoint = self.state.checkpoint();
        checkpoint.cursor = serde_json::to_value(FlowCursor {
            current_node_id: self.current_node_id.clone(),
            current_input: self.current_input.clone(),
            current_variables: self.current_variables.clone(),
        })?;
        let mut members = BTreeMap::new();
        for node in &self.nodes {
            if let Some(saved) = node.checkpoint()? {
                members.insert(node.id().to_string(), saved);
            }
        }
        // loaded but not yet resumed
        for (id, saved) in &self.pending {
            members.entry(id.clone()).or_insert_with(|| saved.clone());
        }
        checkpoint.members = members;
        Ok(checkpoint)
    }

    /// Node checkpoints are applied lazily, when each node is next
    /// initialized.
    fn restore(&mut self, checkpoint: NodeCheckpoint) -> Result<()> {
        let cursor: FlowCursor = serde_json::from_value(checkpoint.cursor.clone())?;
        if let Some(current) = &cursor.current_node_id {
            self.index_of(current)?;
        }
        for id in checkpoint.members.keys() {
            self.index_of(id)?;
        }
        self.state.restore(&checkpoint);
        self.initialized.clear();
        self.current_node_id = cursor.current_node_id;
        self.current_input = cursor.current_input;
        self.current_variables = cursor.current_variables;
        self.pending = checkpoint.members.into_iter().collect();
        Ok(())
    }

    async fn run(&mut self, query: &str, variables: &mut Variables) -> Result<RunOutcome> {
        let env = self.environment.clone().ok_or_else(|| {
            AgentCoreError::InvalidConfig(format!(
                "flow `{}` has no environment",
                self.state.id()
            ))
        })?;
        let start = self.entry_node()?;
        Flow::run(self, &start, query, variables, &env).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::nodes::{EmptyFlowNode, FilterFlowNode};

    fn routed_flow() -> Flow {
        let mut flow = Flow::new("f1", "router");
        flow.add_node(EmptyFlowNode::new("start", "start")).unwrap();
        flow.add_node(FilterFlowNode::new("route", "route", ["left", "right"]))
            .unwrap();
        flow.add_node(EmptyFlowNode::new("l", "left")).unwrap();
        flow.add_node(EmptyFlowNode::new("r", "right")).unwrap();
        flow.add_edge(FlowEdge::connection("start", "route")).unwrap();
        flow.add_edge(FlowEdge::branch("route", "l", "LEFT")).unwrap();
        flow.add_edge(FlowEdge::branch("route", "r", "right")).unwrap();
        flow
    }

    #[tokio::test]
    async fn branches_on_edge_value() {
        let mut flow = routed_flow();
        let env = FlowEnvironment::new();
        let mut vars = Variables::new();
        let outcome = flow
            .run("start", "go right please", &mut vars, &env)
            .await
            .unwrap();
        assert_eq!(outcome.output(), "right");
        assert_eq!(flow.current_node_id(), Some("r"));
        assert_eq!(flow.status(), NodeStatus::Done);
    }

    #[test]
    fn edge_to_missing_node_is_rejected() {
        let mut flow = Flow::new("f1", "broken");
        flow.add_node(EmptyFlowNode::new("a", "a")).unwrap();
        let err = flow.add_edge(FlowEdge::connection("a", "ghost")).unwrap_err();
        assert!(matches!(err, AgentCoreError::GraphValidation { .. }));
    }

    #[test]
    fn overlong_flow_name_fails_check() {
        let mut flow = Flow::new("f1", "n".repeat(101));
        flow.add_node(EmptyFlowNode::new("a", "a")).unwrap();
        assert!(matches!(
            flow.check(),
            Err(AgentCoreError::GraphValidation { ref element, .. }) if element == "f1"
        ));
    }

    #[tokio::test]
    async fn connection_cycle_hits_step_limit() {
        let mut flow = Flow::new("f1", "loop").with_max_steps(5);
        flow.add_node(EmptyFlowNode::new("a", "a")).unwrap();
        flow.add_node(EmptyFlowNode::new("b", "b")).unwrap();
        flow.add_edge(FlowEdge::connection("a", "b")).unwrap();
        flow.add_edge(FlowEdge::connection("b", "a")).unwrap();
        assert!(flow.check().is_ok());

        let err = flow
            .run("a", "x", &mut Variables::new(), &FlowEnvironment::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentCoreError::MaxStepsExceeded(5)));
        assert_eq!(flow.status(), NodeStatus::Failed);
    }
}
