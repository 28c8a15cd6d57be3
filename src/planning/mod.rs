use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AgentCoreError, Result};
use crate::node::{Node, Variables};
use crate::utils::strip_code_fence;

/// Routing decision parsed from one round of model output.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanningResult {
    #[serde(default)]
    pub planning: String,
    #[serde(default, alias = "name", skip_serializing_if = "Option::is_none")]
    pub next_agent_name: Option<String>,
    #[serde(default, alias = "query", skip_serializing_if = "Option::is_none")]
    pub next_query: Option<String>,
    #[serde(
        default,
        alias = "next_step",
        alias = "next_action",
        skip_serializing_if = "Option::is_none"
    )]
    pub next_step_action: Option<String>,
}

impl PlanningResult {
    pub fn route(agent: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            planning: String::new(),
            next_agent_name: Some(agent.into()),
            next_query: Some(query.into()),
            next_step_action: None,
        }
    }
}

/// Parses previously captured text without calling a model. Code fences
/// around the JSON are stripped; the JSON itself is never repaired.
pub fn local_planning<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(strip_code_fence(text)).map_err(|err| AgentCoreError::PlanningParse {
        node: "local".to_string(),
        round: 0,
        text: text.to_string(),
        reason: err.to_string(),
    })
}

#[async_trait]
pub trait Planning: Send + Sync {
    /// Runs `agent` on `query` and parses its output into the current
    /// result. Returns the raw output.
    async fn planning(
        &mut self,
        agent: &mut dyn Node,
        query: &str,
        variables: &mut Variables,
    ) -> Result<String>;

    /// Parses `text` into a result without touching the current one.
    fn explain(&self, text: &str) -> Result<PlanningResult>;

    /// Installs a synthesized decision, used when planning is bypassed.
    fn direct_planning(&mut self, result: PlanningResult);

    fn result(&self) -> Option<&PlanningResult>;

    fn next_agent_name(&self) -> Option<&str> {
        self.result()
            .and_then(|r| r.next_agent_name.as_deref())
            .filter(|name| !name.trim().is_empty())
    }

    fn next_query(&self) -> Option<&str> {
        self.result().and_then(|r| r.next_query.as_deref())
    }

    fn next_action(&self) -> Option<&str> {
        self.result().and_then(|r| r.next_step_action.as_deref())
    }

    fn planning_text(&self) -> Option<&str> {
        self.result().map(|r| r.planning.as_str())
    }
}

pub type BoxedPlanning = Box<dyn Planning>;

#[derive(Debug, Default)]
pub struct DefaultPlanning {
    result: Option<PlanningResult>,
}

impl DefaultPlanning {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Planning for DefaultPlanning {
    async fn planning(
        &mut self,
        agent: &mut dyn Node,
        query: &str,
        variables: &mut Variables,
    ) -> Result<String> {
        self.result = None;
        let outcome = agent.run(query, variables).await?;
        let raw = outcome.output().to_string();
        if outcome.is_suspended() {
            debug!(agent = %agent.name(), "agent suspended, nothing to parse");
            return Ok(raw);
        }

        let parsed: PlanningResult = serde_json::from_str(strip_code_fence(&raw)).map_err(|err| {
            AgentCoreError::PlanningParse {
                node: agent.id().to_string(),
                round: agent.round(),
                text: raw.clone(),
                reason: err.to_string(),
            }
        })?;
        info!(
            agent = %agent.name(),
            next_agent = ?parsed.next_agent_name,
            next_action = ?parsed.next_step_action,
            "planning parsed"
        );
        self.result = Some(parsed);
        Ok(raw)
    }

    fn explain(&self, text: &str) -> Result<PlanningResult> {
        local_planning(text)
    }

    fn direct_planning(&mut self, result: PlanningResult) {
        debug!(next_agent = ?result.next_agent_name, "direct planning installed");
        self.result = Some(result);
    }

    fn result(&self) -> Option<&PlanningResult> {
        self.result.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_are_empty_before_planning() {
        let planning = DefaultPlanning::new();
        assert!(planning.next_agent_name().is_none());
        assert!(planning.planning_text().is_none());
    }

    #[test]
    fn explain_accepts_short_field_names() {
        let planning = DefaultPlanning::new();
        let result = planning
            .explain(r#"{"planning":"p","name":"b","query":"q","next_step":"TERMINATE"}"#)
            .unwrap();
        assert_eq!(result.next_agent_name.as_deref(), Some("b"));
        assert_eq!(result.next_step_action.as_deref(), Some("TERMINATE"));
    }

    #[test]
    fn explain_reports_malformed_text() {
        let planning = DefaultPlanning::new();
        let err = planning.explain("{not json").unwrap_err();
        assert!(matches!(err, AgentCoreError::PlanningParse { .. }));
    }

    #[test]
    fn blank_agent_name_reads_as_absent() {
        let mut planning = DefaultPlanning::new();
        planning.direct_planning(PlanningResult::route("  ", "q"));
        assert!(planning.next_agent_name().is_none());
        assert_eq!(planning.next_query(), Some("q"));
    }
}
