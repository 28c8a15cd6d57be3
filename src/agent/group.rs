use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::registry::AgentRoster;
use crate::config::RoundLimits;
use crate::constants::{actions, group as defaults, variables};
use crate::error::{AgentCoreError, Result};
use crate::events::SharedListeners;
use crate::handoff::{
    build_handoff, BoxedHandoff, HandoffContext, HandoffDecision, HandoffKind,
};
use crate::node::{
    BoxedNode, Node, NodeCheckpoint, NodeKind, NodeState, NodeStatus, RunOutcome, Variables,
};
use crate::planning::{BoxedPlanning, DefaultPlanning, PlanningResult};
use crate::termination::{any_terminates, BoxedTermination, MaxRoundTermination};

enum Step {
    Continue,
    Finished(RunOutcome),
}

/// Where a group stands between rounds.
#[derive(Debug, Default, Serialize, Deserialize)]
struct GroupCursor {
    current_agent: String,
    #[serde(default)]
    current_query: String,
    #[serde(default)]
    suspended: bool,
    #[serde(default)]
    trace: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    planning: Option<PlanningResult>,
}

/// Members plus the planning and handoff policies that move control
/// between them, one member per round.
pub struct AgentGroup {
    state: NodeState,
    roster: AgentRoster,
    planning: BoxedPlanning,
    handoff: BoxedHandoff,
    terminations: Vec<BoxedTermination>,
    entry: String,
    current_agent: String,
    current_query: String,
    suspended: bool,
    trace: Vec<String>,
}

impl AgentGroup {
    pub fn builder(name: impl Into<String>) -> AgentGroupBuilder {
        AgentGroupBuilder::new(name)
    }

    pub fn roster(&self) -> &AgentRoster {
        &self.roster
    }

    pub fn handoff_kind(&self) -> HandoffKind {
        self.handoff.kind()
    }

    pub fn planning(&self) -> &BoxedPlanning {
        &self.planning
    }

    pub fn current_agent(&self) -> &str {
        &self.current_agent
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Member names in the order they ran during the last run.
    pub fn trace(&self) -> &[String] {
        &self.trace
    }

    /// Continues a run suspended by a manual handoff with the member and
    /// query chosen by the caller.
    pub async fn resume(
        &mut self,
        agent: &str,
        query: &str,
        vars: &mut Variables,
    ) -> Result<RunOutcome> {
        if !self.suspended {
            return Err(AgentCoreError::ContractViolation(format!(
                "group `{}` is not waiting for a handoff",
                self.state.name()
            )));
        }
        if !self.roster.contains(agent) {
            return Err(AgentCoreError::UnknownAgent(agent.to_string()));
        }
        self.suspended = false;
        vars.insert(
            variables::NEXT_QUERY.to_string(),
            Value::String(query.to_string()),
        );
        self.current_agent = agent.to_string();
        self.current_query = query.to_string();
        self.state.next_round();
        self.drive(vars).await
    }

    async fn drive(&mut self, vars: &mut Variables) -> Result<RunOutcome> {
        loop {
            match self.step(vars).await {
                Ok(Step::Continue) => continue,
                Ok(Step::Finished(outcome)) => return Ok(outcome),
                Err(err) => {
                    warn!(
                        group = %self.state.name(),
                        round = self.state.round(),
                        agent = %self.current_agent,
                        error = %err,
                        "group round failed"
                    );
                    self.state.set_status(NodeStatus::Failed);
                    return Err(err);
                }
            }
        }
    }

    fn suspend(&mut self, output: String) -> Step {
        self.suspended = true;
        Step::Finished(RunOutcome::Suspended {
            node: self.state.id().to_string(),
            output,
        })
    }

    fn complete(&mut self) -> Step {
        self.state.set_status(NodeStatus::Done);
        Step::Finished(RunOutcome::Completed {
            output: self.state.output().to_string(),
        })
    }

    async fn step(&mut self, vars: &mut Variables) -> Result<Step> {
        let agent_name = self.current_agent.clone();
        let query = self.current_query.clone();
        vars.insert(
            variables::CURRENT_AGENT.to_string(),
            Value::String(agent_name.clone()),
        );

        let uses_planning = self.handoff.uses_planning();
        let agent = self
            .roster
            .get_mut(&agent_name)
            .ok_or_else(|| AgentCoreError::UnknownAgent(agent_name.clone()))?;
        let (raw, member_waiting) = if uses_planning {
            let raw = self.planning.planning(agent.as_mut(), &query, vars).await?;
            // a suspended member leaves nothing to parse
            let waiting = agent.status() == NodeStatus::WaitingForUserInput
                || self.planning.result().is_none();
            (raw, waiting)
        } else {
            let outcome = agent.run(&query, vars).await?;
            (outcome.output().to_string(), outcome.is_suspended())
        };
        self.trace.push(agent_name.clone());

        self.state.set_input(&query);
        self.state.set_output(&query, raw.clone());
        if member_waiting {
            info!(group = %self.state.name(), agent = %agent_name, "member is waiting for input");
            return Ok(self.suspend(raw));
        }
        info!(
            group = %self.state.name(),
            round = self.state.round(),
            max_round = self.state.max_round(),
            agent = %agent_name,
            "group round completed"
        );

        let explicit_stop = uses_planning
            && self
                .planning
                .next_action()
                .map(|action| action.trim().eq_ignore_ascii_case(actions::TERMINATE))
                .unwrap_or(false);
        if explicit_stop || any_terminates(&self.terminations, &self.state)? {
            return Ok(self.complete());
        }

        let ctx = HandoffContext {
            roster: &self.roster,
            current_agent: &agent_name,
            last_output: &raw,
        };
        match self.handoff.handoff(&ctx, self.planning.as_mut(), vars)? {
            HandoffDecision::Route { agent, query } => {
                self.current_agent = agent;
                self.current_query = query;
                self.state.next_round();
                Ok(Step::Continue)
            }
            HandoffDecision::Finish => Ok(self.complete()),
            HandoffDecision::Suspend => {
                info!(group = %self.state.name(), round = self.state.round(), "waiting for manual handoff");
                Ok(self.suspend(raw))
            }
        }
    }
}

#[async_trait]
impl Node for AgentGroup {
    fn state(&self) -> &NodeState {
        &self.state
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Group
    }

    fn checkpoint(&self) -> Result<NodeCheckpoint> {
        let cursor = GroupCursor {
            current_agent: self.current_agent.clone(),
            current_query: self.current_query.clone(),
            suspended: self.suspended,
            trace: self.trace.clone(),
            planning: self.planning.result().cloned(),
        };
        let mut checkpoint = self.state.checkpoint();
        checkpoint.cursor = serde_json::to_value(cursor)?;
        for member in self.roster.iter() {
            checkpoint
                .members
                .insert(member.name().to_string(), member.checkpoint()?);
        }
        Ok(checkpoint)
    }

    fn restore(&mut self, checkpoint: NodeCheckpoint) -> Result<()> {
        let cursor: GroupCursor = serde_json::from_value(checkpoint.cursor.clone())?;
        if !cursor.current_agent.is_empty() && !self.roster.contains(&cursor.current_agent) {
            return Err(AgentCoreError::UnknownAgent(cursor.current_agent));
        }
        for (name, member) in &checkpoint.members {
            self.roster
                .get_mut(name)
                .ok_or_else(|| AgentCoreError::UnknownAgent(name.clone()))?
                .restore(member.clone())?;
        }
        self.state.restore(&checkpoint);
        self.current_agent = cursor.current_agent;
        self.current_query = cursor.current_query;
        self.suspended = cursor.suspended;
        self.trace = cursor.trace;
        if let Some(result) = cursor.planning {
            self.planning.direct_planning(result);
        }
        Ok(())
    }

    #[instrument(skip(self, variables), fields(group = %self.state.name()))]
    async fn run(&mut self, query: &str, variables: &mut Variables) -> Result<RunOutcome> {
        self.state.start(query);
        self.suspended = false;
        self.trace.clear();
        self.current_agent = self.entry.clone();
        self.current_query = query.to_string();
        self.drive(variables).await
    }
}

pub struct AgentGroupBuilder {
    name: String,
    id: Option<String>,
    description: String,
    members: Vec<BoxedNode>,
    planning: Option<BoxedPlanning>,
    handoff: Option<BoxedHandoff>,
    handoff_kind: HandoffKind,
    handoff_target: Option<String>,
    terminations: Vec<BoxedTermination>,
    entry: Option<String>,
    max_round: u32,
    listeners: Option<SharedListeners>,
}

impl AgentGroupBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            description: String::new(),
            members: Vec::new(),
            planning: None,
            handoff: None,
            handoff_kind: HandoffKind::default(),
            handoff_target: None,
            terminations: Vec::new(),
            entry: None,
            max_round: defaults::DEFAULT_MAX_ROUND,
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

    pub fn planning(mut self, planning: BoxedPlanning) -> Self {
        self.planning = Some(planning);
        self
    }

    /// Policy by kind; DIRECT and HYBRID use `target` (default: first member).
    pub fn handoff_kind(mut self, kind: HandoffKind, target: Option<String>) -> Self {
        self.handoff_kind = kind;
        self.handoff_target = target;
        self
    }

    pub fn handoff(mut self, handoff: BoxedHandoff) -> Self {
        self.handoff = Some(handoff);
        self
    }

    pub fn termination(mut self, termination: BoxedTermination) -> Self {
        self.terminations.push(termination);
        self
    }

    /// Member that runs first (default: first member added).
    pub fn entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    pub fn max_round(mut self, max_round: u32) -> Self {
        self.max_round = max_round;
        self
    }

    pub fn limits(mut self, limits: &RoundLimits) -> Self {
        self.max_round = limits.group_max_round;
        self
    }

    pub fn listeners(mut self, listeners: SharedListeners) -> Self {
        self.listeners = Some(listeners);
        self
    }

    pub fn build(self) -> Result<AgentGroup> {
        let mut roster = AgentRoster::new();
        for member in self.members {
            roster.register(member);
        }
        let first = roster.first_name().map(str::to_string).ok_or_else(|| {
            AgentCoreError::InvalidConfig(format!("group `{}` has no agents", self.name))
        })?;

        let entry = self.entry.unwrap_or_else(|| first.clone());
        if !roster.contains(&entry) {
            return Err(AgentCoreError::UnknownAgent(entry));
        }

        let handoff = match self.handoff {
            Some(handoff) => handoff,
            None => {
                let target = self.handoff_target.unwrap_or(first);
                build_handoff(self.handoff_kind, Some(&target))?
            }
        };

        let mut state = NodeState::new(self.name)
            .with_description(self.description)
            .with_max_round(self.max_round);
        if let Some(id) = self.id {
            state = state.with_id(id);
        }
        if let Some(listeners) = self.listeners {
            state = state.with_listeners(listeners);
        }

        let mut terminations = self.terminations;
        terminations.push(Box::new(MaxRoundTermination));

        Ok(AgentGroup {
            state,
            roster,
            planning: self
                .planning
                .unwrap_or_else(|| Box::new(DefaultPlanning::new())),
            handoff,
            terminations,
            current_agent: entry.clone(),
            entry,
            current_query: String::new(),
            suspended: false,
            trace: Vec::new(),
        })
    }
}
