use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{AgentCoreError, Result};
use crate::tools::coerce::coerce_arguments;
use crate::tools::schema::{describe, ToolSchema};
use crate::tools::tool::{DynTool, Tool, ToolInvocation};

/// Tools available to agents, keyed by name in registration order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, DynTool>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: DynTool) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<DynTool> {
        self.tools.get(name).map(Arc::clone)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn tools(&self) -> impl Iterator<Item = &DynTool> {
        self.order.iter().filter_map(|name| self.tools.get(name))
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools().map(|tool| describe(tool.as_ref())).collect()
    }

    /// Looks the tool up and runs it through [`execute_tool`].
    pub async fn execute(&self, invocation: &ToolInvocation) -> Result<String> {
        let tool = self
            .get(&invocation.name)
            .ok_or_else(|| AgentCoreError::ToolNotRegistered(invocation.name.clone()))?;
        execute_tool(tool.as_ref(), invocation).await
    }
}

/// Coerces the invocation's arguments against the tool definition and calls
/// it. Argument and tool failures are reported as `ToolExecution` for that tool.
pub async fn execute_tool(tool: &dyn Tool, invocation: &ToolInvocation) -> Result<String> {
    let arguments = coerce_arguments(tool.definition(), &invocation.arguments()).map_err(|err| {
        AgentCoreError::ToolExecution {
            tool: invocation.name.clone(),
            message: err.to_string(),
        }
    })?;

    debug!(tool = %invocation.name, "executing tool");
    tool.call(arguments).await.map_err(|err| {
        warn!(tool = %invocation.name, error = %err, "tool call failed");
        match err {
            AgentCoreError::ToolExecution { .. } => err,
            other => AgentCoreError::ToolExecution {
                tool: invocation.name.clone(),
                message: other.to_string(),
            },
        }
    })
}
