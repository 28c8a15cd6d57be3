use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AgentCoreError, Result};
use crate::utils::next_id;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowEdgeKind {
    /// Control flow. With several outgoing connections the one whose
    /// `value` matches the source output is taken.
    Connection {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    /// The target configures the source (model, tool, member, handoff).
    Setting,
}

impl FlowEdgeKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            FlowEdgeKind::Connection { .. } => "Connection",
            FlowEdgeKind::Setting => "Setting",
        }
    }
}

impl fmt::Display for FlowEdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FlowEdgeKind::Connection { .. } => "CONNECTION",
            FlowEdgeKind::Setting => "SETTING",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEdge {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub kind: FlowEdgeKind,
    pub source_node_id: String,
    pub target_node_id: String,
}

impl FlowEdge {
    pub fn connection(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(source, target, FlowEdgeKind::Connection { value: None })
    }

    /// Connection taken when the source output equals `value`
    /// (case-insensitive).
    pub fn branch(
        source: impl Into<String>,
        target: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::new(
            source,
            target,
            FlowEdgeKind::Connection {
                value: Some(value.into()),
            },
        )
    }

    pub fn setting(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(source, target, FlowEdgeKind::Setting)
    }

    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: FlowEdgeKind) -> Self {
        Self {
            id: next_id("edge"),
            name: String::new(),
            kind,
            source_node_id: source.into(),
            target_node_id: target.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn is_setting(&self) -> bool {
        matches!(self.kind, FlowEdgeKind::Setting)
    }

    pub fn is_connection(&self) -> bool {
        matches!(self.kind, FlowEdgeKind::Connection { .. })
    }

    pub fn value(&self) -> Option<&str> {
        match &self.kind {
            FlowEdgeKind::Connection { value } => value.as_deref(),
            FlowEdgeKind::Setting => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn check(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(AgentCoreError::graph("<edge>", "edge id is blank"));
        }
        if self.source_node_id.trim().is_empty() || self.target_node_id.trim().is_empty() {
            return Err(AgentCoreError::graph(&self.id, "edge endpoints must not be blank"));
        }
        if self.is_setting() && self.source_node_id == self.target_node_id {
            return Err(AgentCoreError::graph(&self.id, "a node cannot configure itself"));
        }
        Ok(())
    }

    pub fn serialization(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn deserialization(type_name: &str, text: &str) -> Result<Self> {
        let edge: FlowEdge = serde_json::from_str(text)
            .map_err(|err| AgentCoreError::Serialization(format!("{type_name} edge: {err}")))?;
        if edge.type_name() != type_name {
            return Err(AgentCoreError::graph(
                &edge.id,
                format!("edge declared as {type_name} but is {}", edge.type_name()),
            ));
        }
        Ok(edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn connection_value_is_persisted() {
        let edge = FlowEdge::branch("a", "b", "yes").with_id("e1");
        let value: Value = serde_json::from_str(&edge.serialization().unwrap()).unwrap();
        assert_eq!(value["type"], "CONNECTION");
        assert_eq!(value["value"], "yes");
        let back = FlowEdge::deserialization("Connection", &edge.serialization().unwrap()).unwrap();
        assert_eq!(back, edge);
    }

    #[test]
    fn self_setting_is_rejected() {
        assert!(FlowEdge::setting("a", "a").check().is_err());
        assert!(FlowEdge::connection("a", "a").check().is_ok());
    }
}
