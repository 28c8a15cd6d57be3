use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::{AgentCoreError, Result};
use crate::events::SharedListeners;
use crate::node::{
    BoxedNode, Node, NodeCheckpoint, NodeKind, NodeState, NodeStatus, RunOutcome, Variables,
};
use crate::termination::{any_terminates, BoxedTermination};

#[derive(Debug, Default, Serialize, Deserialize)]
struct ChainCursor {
    #[serde(default)]
    position: usize,
}

/// Runs its members in order, feeding each output to the next member.
///
/// A member that suspends suspends the chain; the next run continues at
/// that member with the caller's query.
pub struct AgentChain {
    state: NodeState,
    members: Vec<BoxedNode>,
    terminations: Vec<BoxedTermination>,
    cursor: usize,
}

impl AgentChain {
    pub fn builder(name: impl Into<String>) -> AgentChainBuilder {
        AgentChainBuilder::new(name)
    }

    pub fn members(&self) -> impl Iterator<Item = &BoxedNode> {
        self.members.iter()
    }

    /// Index of the member that runs next.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_waiting(&self) -> bool {
        self.state.status() == NodeStatus::WaitingForUserInput
    }

    /// `name: output` lines of every member that has produced output.
    pub fn conversation_text(&self) -> String {
        self.members
            .iter()
            .filter(|member| !member.output().is_empty())
            .map(|member| format!("{}: {}", member.name(), member.output()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn drive(&mut self, mut input: String, vars: &mut Variables) -> Result<RunOutcome> {
        while self.cursor < self.members.len() {
            let member = &mut self.members[self.cursor];
            let name = member.name().to_string();
            let outcome = member.run(&input, vars).await?;

            self.state.set_round(self.cursor as u32 + 1);
            self.state.set_output(&input, outcome.output().to_string());
            if outcome.is_suspended() {
                info!(chain = %self.state.name(), member = %name, "chain waiting for input");
                self.state.set_status(NodeStatus::WaitingForUserInput);
                return Ok(RunOutcome::Suspended {
                    node: self.state.id().to_string(),
                    output: outcome.output().to_string(),
                });
            }

            self.cursor += 1;
            input = outcome.output().to_string();
            if any_terminates(&self.terminations, &self.state)? {
                info!(chain = %self.state.name(), member = %name, "chain stopped early");
                break;
            }
        }
        self.state.set_status(NodeStatus::Done);
        Ok(RunOutcome::Completed {
            output: self.state.output().to_string(),
        })
    }
}

#[async_trait]
impl Node for AgentChain {
    fn state(&self) -> &NodeState {
        &self.state
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Chain
    }

    fn checkpoint(&self) -> Result<NodeCheckpoint> {
        let mut checkpoint = self.state.checkpoint();
        checkpoint.cursor = serde_json::to_value(ChainCursor {
            position: self.cursor,
        })?;
        for member in &self.members {
            checkpoint
                .members
                .insert(member.name().to_string(), member.checkpoint()?);
        }
        Ok(checkpoint)
    }

    fn restore(&mut self, checkpoint: NodeCheckpoint) -> Result<()> {
        let cursor: ChainCursor = serde_json::from_value(checkpoint.cursor.clone())?;
        if cursor.position > self.members.len() {
            return Err(AgentCoreError::ContractViolation(format!(
                "chain `{}` has no member at position {}",
                self.state.name(),
                cursor.position
            )));
        }
        for (name, saved) in &checkpoint.members {
            self.members
                .iter_mut()
                .find(|member| member.name() == name)
                .ok_or_else(|| AgentCoreError::UnknownAgent(name.clone()))?
                .restore(saved.clone())?;
        }
        self.state.restore(&checkpoint);
        self.cursor = cursor.position;
        Ok(())
    }

    #[instrument(skip(self, variables), fields(chain = %self.state.name()))]
    async fn run(&mut self, query: &str, variables: &mut Variables) -> Result<RunOutcome> {
        if !self.is_waiting() {
            self.state.start(query);
            self.cursor = 0;
        }
        match self.drive(query.to_string(), variables).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                warn!(chain = %self.state.name(), position = self.cursor, error = %err, "chain member failed");
                self.state.set_status(NodeStatus::Failed);
                Err(err)
            }
        }
    }
}

pub struct AgentChainBuilder {
    name: String,
    id: Option<String>,
    description: String,
    members: Vec<BoxedNode>,
    terminations: Vec<BoxedTermination>,
    listeners: Option<SharedListeners>,
}

impl AgentChainBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            description: String::new(),
            members: Vec::new(),
            terminations: Vec::new(),
            listeners: None,
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn agent(mut self, node: BoxedNode) -> Self {
        self.members.push(node);
        self
    }

    /// Checked after every member; a hit ends the chain as DONE.
    pub fn termination(mut self, termination: BoxedTermination) -> Self {
        self.terminations.push(termination);
        self
    }

    pub fn listeners(mut self, listeners: SharedListeners) -> Self {
        self.listeners = Some(listeners);
        self
    }

    pub fn build(self) -> Result<AgentChain> {
        if self.members.is_empty() {
            return Err(AgentCoreError::InvalidConfig(format!(
                "chain `{}` has no agents",
                self.name
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for member in &self.members {
            if !seen.insert(member.name().to_string()) {
                return Err(AgentCoreError::InvalidConfig(format!(
                    "chain `{}` has two agents named `{}`",
                    self.name,
                    member.name()
                )));
            }
        }

        let mut state = NodeState::new(self.name)
            .with_description(self.description)
            .with_max_round(self.members.len() as u32);
        if let Some(id) = self.id {
            state = state.with_id(id);
        }
        if let Some(listeners) = self.listeners {
            state = state.with_listeners(listeners);
        }
        Ok(AgentChain {
            state,
            members: self.members,
            terminations: self.terminations,
            cursor: 0,
        })
    }
}
