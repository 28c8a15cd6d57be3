use crate::config::RoundLimits;
use crate::llm::ModelRegistry;
use crate::tools::{ToolFactoryRegistry, ToolRegistry};

/// Runtime services that setting nodes resolve names against.
#[derive(Clone, Default)]
pub struct FlowEnvironment {
    pub models: ModelRegistry,
    pub tools: ToolRegistry,
    pub tool_factories: ToolFactoryRegistry,
    /// Defaults for agent and group nodes that do not set their own.
    pub limits: RoundLimits,
}

impl FlowEnvironment {
    pub fn new() -> Self {
        Self {
            models: ModelRegistry::new(),
            tools: ToolRegistry::new(),
            tool_factories: ToolFactoryRegistry::with_builtins(),
            limits: RoundLimits::default(),
        }
    }

    pub fn with_models(mut self, models: ModelRegistry) -> Self {
        self.models = models;
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_limits(mut self, limits: RoundLimits) -> Self {
        self.limits = limits;
        self
    }
}
