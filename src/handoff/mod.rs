use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::agent::registry::AgentRoster;
use crate::constants::variables::NEXT_QUERY;
use crate::error::{AgentCoreError, Result};
use crate::node::Variables;
use crate::planning::{Planning, PlanningResult};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandoffKind {
    Auto,
    Direct,
    #[default]
    Hybrid,
    Manual,
}

impl fmt::Display for HandoffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HandoffKind::Auto => "AUTO",
            HandoffKind::Direct => "DIRECT",
            HandoffKind::Hybrid => "HYBRID",
            HandoffKind::Manual => "MANUAL",
        };
        f.write_str(label)
    }
}

impl FromStr for HandoffKind {
    type Err = AgentCoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AUTO" => Ok(HandoffKind::Auto),
            "DIRECT" => Ok(HandoffKind::Direct),
            "HYBRID" => Ok(HandoffKind::Hybrid),
            "MANUAL" => Ok(HandoffKind::Manual),
            other => Err(AgentCoreError::InvalidConfig(format!(
                "unknown handoff kind `{other}`"
            ))),
        }
    }
}

/// What the group loop should do next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandoffDecision {
    Route { agent: String, query: String },
    /// Planning named nobody; the group is finished.
    Finish,
    /// Wait for an external resume.
    Suspend,
}

/// Read-only view of the group handed to a policy.
pub struct HandoffContext<'a> {
    pub roster: &'a AgentRoster,
    pub current_agent: &'a str,
    pub last_output: &'a str,
}

pub trait Handoff: Send + Sync {
    fn kind(&self) -> HandoffKind;

    /// Whether members' outputs go through planning before the handoff.
    fn uses_planning(&self) -> bool {
        true
    }

    /// Picks the next member and writes its query into `variables`.
    /// Never touches node status.
    fn handoff(
        &self,
        ctx: &HandoffContext<'_>,
        planning: &mut dyn Planning,
        variables: &mut Variables,
    ) -> Result<HandoffDecision>;
}

pub type BoxedHandoff = Box<dyn Handoff>;

fn route(agent: &str, query: String, variables: &mut Variables) -> HandoffDecision {
    variables.insert(NEXT_QUERY.to_string(), Value::String(query.clone()));
    debug!(next_agent = agent, "handoff routed");
    HandoffDecision::Route {
        agent: agent.to_string(),
        query,
    }
}

fn planned_query(planning: &dyn Planning, ctx: &HandoffContext<'_>) -> String {
    planning
        .next_query()
        .map(str::to_string)
        .unwrap_or_else(|| ctx.last_output.to_string())
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AutoHandoff;

impl Handoff for AutoHandoff {
    fn kind(&self) -> HandoffKind {
        HandoffKind::Auto
    }

    fn handoff(
        &self,
        ctx: &HandoffContext<'_>,
        planning: &mut dyn Planning,
        variables: &mut Variables,
    ) -> Result<HandoffDecision> {
        let Some(name) = planning.next_agent_name().map(str::to_string) else {
            return Ok(HandoffDecision::Finish);
        };
        if !ctx.roster.contains(&name) {
            return Err(AgentCoreError::UnknownAgent(name));
        }
        let query = planned_query(planning, ctx);
        Ok(route(&name, query, variables))
    }
}

/// Always routes to one preconfigured member with the previous output.
#[derive(Debug, Clone)]
pub struct DirectHandoff {
    target: String,
}

impl DirectHandoff {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    fn direct(
        &self,
        ctx: &HandoffContext<'_>,
        query: String,
        planning: &mut dyn Planning,
        variables: &mut Variables,
    ) -> Result<HandoffDecision> {
        if !ctx.roster.contains(&self.target) {
            return Err(AgentCoreError::UnknownAgent(self.target.clone()));
        }
        planning.direct_planning(PlanningResult {
            planning: format!("direct handoff to {}", self.target),
            next_agent_name: Some(self.target.clone()),
            next_query: Some(query.clone()),
            next_step_action: None,
        });
        Ok(route(&self.target, query, variables))
    }
}

impl Handoff for DirectHandoff {
    fn kind(&self) -> HandoffKind {
        HandoffKind::Direct
    }

    fn uses_planning(&self) -> bool {
        false
    }

    fn handoff(
        &self,
        ctx: &HandoffContext<'_>,
        planning: &mut dyn Planning,
        variables: &mut Variables,
    ) -> Result<HandoffDecision> {
        self.direct(ctx, ctx.last_output.to_string(), planning, variables)
    }
}

/// Auto routing that falls back to a direct target when the planned name
/// is missing or not a member.
#[derive(Debug, Clone)]
pub struct HybridHandoff {
    fallback: DirectHandoff,
}

impl HybridHandoff {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            fallback: DirectHandoff::new(fallback),
        }
    }
}

impl Handoff for HybridHandoff {
    fn kind(&self) -> HandoffKind {
        HandoffKind::Hybrid
    }

    fn handoff(
        &self,
        ctx: &HandoffContext<'_>,
        planning: &mut dyn Planning,
        variables: &mut Variables,
    ) -> Result<HandoffDecision> {
        match planning.next_agent_name().map(str::to_string) {
            Some(name) if ctx.roster.contains(&name) => {
                let query = planned_query(planning, ctx);
                Ok(route(&name, query, variables))
            }
            other => {
                warn!(
                    planned = ?other,
                    fallback = self.fallback.target(),
                    "planned agent unavailable, falling back"
                );
                let query = planned_query(planning, ctx);
                self.fallback.direct(ctx, query, planning, variables)
            }
        }
    }
}

/// Leaves the decision to an external driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualHandoff;

impl Handoff for ManualHandoff {
    fn kind(&self) -> HandoffKind {
        HandoffKind::Manual
    }

    fn uses_planning(&self) -> bool {
        false
    }

    fn handoff(
        &self,
        _ctx: &HandoffContext<'_>,
        _planning: &mut dyn Planning,
        _variables: &mut Variables,
    ) -> Result<HandoffDecision> {
        Ok(HandoffDecision::Suspend)
    }
}

/// Builds a policy; DIRECT and HYBRID need a target member.
pub fn build_handoff(kind: HandoffKind, target: Option<&str>) -> Result<BoxedHandoff> {
    let require_target = || {
        target.map(str::to_string).ok_or_else(|| {
            AgentCoreError::InvalidConfig(format!("{kind} handoff requires a target agent"))
        })
    };
    Ok(match kind {
        HandoffKind::Auto => Box::new(AutoHandoff),
        HandoffKind::Direct => Box::new(DirectHandoff::new(require_target()?)),
        HandoffKind::Hybrid => Box::new(HybridHandoff::new(require_target()?)),
        HandoffKind::Manual => Box::new(ManualHandoff),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("hybrid".parse::<HandoffKind>().unwrap(), HandoffKind::Hybrid);
        assert!("sideways".parse::<HandoffKind>().is_err());
    }

    #[test]
    fn direct_requires_target() {
        assert!(build_handoff(HandoffKind::Direct, None).is_err());
        assert!(build_handoff(HandoffKind::Auto, None).is_ok());
    }
}
