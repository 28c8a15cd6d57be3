use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::events::{
    MessageUpdated, NodeListeners, NodeOutputUpdated, SharedListeners, StatusChanged,
};
use crate::llm::LlmMessage;
use crate::utils::next_id;

/// Variables threaded through a run: template inputs plus handoff outputs.
pub type Variables = HashMap<String, Value>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    #[default]
    Idle,
    Running,
    Done,
    Failed,
    /// Paused until the caller supplies the user's answer.
    WaitingForUserInput,
}

impl NodeStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, NodeStatus::Done | NodeStatus::Failed)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NodeStatus::Idle => "IDLE",
            NodeStatus::Running => "RUNNING",
            NodeStatus::Done => "DONE",
            NodeStatus::Failed => "FAILED",
            NodeStatus::WaitingForUserInput => "WAITING_FOR_USER_INPUT",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Agent,
    ImageAgent,
    Group,
    Chain,
    UserInput,
    Flow,
}

/// How a run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { output: String },
    /// Waiting for an external decision; resume through the owning group.
    Suspended { node: String, output: String },
}

impl RunOutcome {
    pub fn output(&self) -> &str {
        match self {
            RunOutcome::Completed { output } | RunOutcome::Suspended { output, .. } => output,
        }
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, RunOutcome::Suspended { .. })
    }
}

/// Runtime state of a node as persisted between processes. Identity and
/// configuration live in the node's own serialized form, not here.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeCheckpoint {
    pub status: NodeStatus,
    #[serde(default)]
    pub round: u32,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub output: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<LlmMessage>,
    /// Node-specific cursor, e.g. the group's current member.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub cursor: Value,
    /// Checkpoints of child nodes keyed by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub members: BTreeMap<String, NodeCheckpoint>,
}

/// Identity plus the mutable execution state of a node.
///
/// Only the owning execution loop mutates status, output and round.
#[derive(Clone)]
pub struct NodeState {
    id: String,
    name: String,
    description: String,
    status: NodeStatus,
    input: String,
    output: String,
    round: u32,
    max_round: u32,
    listeners: SharedListeners,
}

impl NodeState {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            id: next_id("node"),
            name: name.into(),
            description: String::new(),
            status: NodeStatus::Idle,
            input: String::new(),
            output: String::new(),
            round: 0,
            max_round: 1,
            listeners: Arc::new(NodeListeners::default()),
        }
    }

    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_max_round(mut self, max_round: u32) -> Self {
        self.max_round = max_round.max(1);
        self
    }

    pub fn with_listeners(mut self, listeners: SharedListeners) -> Self {
        self.listeners = listeners;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn max_round(&self) -> u32 {
        self.max_round
    }

    pub fn listeners(&self) -> &SharedListeners {
        &self.listeners
    }

    /// Resets the counters for a fresh run and moves to RUNNING.
    pub(crate) fn start(&mut self, query: &str) {
        self.round = 1;
        self.input = query.to_string();
        self.output.clear();
        self.set_status(NodeStatus::Running);
    }

    pub(crate) fn set_status(&mut self, status: NodeStatus) {
        if self.status == status {
            return;
        }
        let from = self.status;
        self.status = status;
        debug!(node = %self.name, %from, to = %status, "node status changed");
        self.listeners.status.publish(StatusChanged {
            node_id: self.id.clone(),
            from,
            to: status,
        });
    }

    pub(crate) fn set_input(&mut self, query: &str) {
        self.input = query.to_string();
    }

    pub(crate) fn set_output(&mut self, query: &str, output: String) {
        self.output = output;
        self.listeners.output.publish(NodeOutputUpdated {
            node_id: self.id.clone(),
            node_name: self.name.clone(),
            query: query.to_string(),
            output: self.output.clone(),
        });
    }

    pub(crate) fn next_round(&mut self) {
        self.round += 1;
    }

    pub(crate) fn set_round(&mut self, round: u32) {
        self.round = round;
    }

    pub(crate) fn set_max_round(&mut self, max_round: u32) {
        self.max_round = max_round.max(1);
    }

    pub fn checkpoint(&self) -> NodeCheckpoint {
        NodeCheckpoint {
            status: self.status,
            round: self.round,
            input: self.input.clone(),
            output: self.output.clone(),
            ..NodeCheckpoint::default()
        }
    }

    /// Reinstates persisted counters and status. Output is restored
    /// silently; only the status change is published.
    pub(crate) fn restore(&mut self, checkpoint: &NodeCheckpoint) {
        self.round = checkpoint.round;
        self.input = checkpoint.input.clone();
        self.output = checkpoint.output.clone();
        self.set_status(checkpoint.status);
    }

    pub(crate) fn publish_message(&self, role: &str, content: &str) {
        self.listeners.message.publish(MessageUpdated {
            node_id: self.id.clone(),
            role: role.to_string(),
            content: content.to_string(),
        });
    }
}

impl fmt::Debug for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeState")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status)
            .field("round", &self.round)
            .field("max_round", &self.max_round)
            .finish()
    }
}

/// Read-only snapshot a termination or test can be built from without a
/// live execution loop.
impl NodeState {
    pub fn snapshot<N: Into<String>>(name: N, output: &str, round: u32, max_round: u32) -> Self {
        let mut state = NodeState::new(name).with_max_round(max_round);
        state.output = output.to_string();
        state.round = round;
        state
    }
}

#[async_trait]
pub trait Node: Send + Sync {
    fn state(&self) -> &NodeState;

    fn kind(&self) -> NodeKind;

    /// Runs the node to completion (or suspension) for one query.
    async fn run(&mut self, query: &str, variables: &mut Variables) -> Result<RunOutcome>;

    /// Runtime state to persist alongside the node's configuration.
    fn checkpoint(&self) -> Result<NodeCheckpoint> {
        Ok(self.state().checkpoint())
    }

    /// Reinstates a checkpoint taken from a node built the same way.
    fn restore(&mut self, checkpoint: NodeCheckpoint) -> Result<()>;

    fn id(&self) -> &str {
        self.state().id()
    }

    fn name(&self) -> &str {
        self.state().name()
    }

    fn status(&self) -> NodeStatus {
        self.state().status()
    }

    fn output(&self) -> &str {
        self.state().output()
    }

    fn round(&self) -> u32 {
        self.state().round()
    }
}

pub type BoxedNode = Box<dyn Node>;
