use std::collections::HashMap;

use super::node::{BoxedFlowNode, FlowNodeDomain};
use super::nodes::{
    AgentFlowNode, AgentGroupFlowNode, EmptyFlowNode, FilterFlowNode, HandoffFlowNode,
    LlmFlowNode, ThrowErrorFlowNode, ToolFlowNode,
};
use crate::error::{AgentCoreError, Result};

type NodeConstructor = fn(&str) -> Result<BoxedFlowNode>;

fn construct<T: FlowNodeDomain>(text: &str) -> Result<BoxedFlowNode> {
    Ok(Box::new(T::deserialization(text)?))
}

/// 节点类型注册表：按 type_name 重建节点
#[derive(Clone, Default)]
pub struct FlowNodeRegistry {
    constructors: HashMap<String, NodeConstructor>,
}

impl FlowNodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register::<EmptyFlowNode>();
        registry.register::<AgentFlowNode>();
        registry.register::<AgentGroupFlowNode>();
        registry.register::<LlmFlowNode>();
        registry.register::<ToolFlowNode>();
        registry.register::<HandoffFlowNode>();
        registry.register::<ThrowErrorFlowNode>();
        registry.register::<FilterFlowNode>();
        registry
    }

    pub fn register<T: FlowNodeDomain>(&mut self) {
        self.constructors
            .insert(T::TYPE_NAME.to_string(), construct::<T> as NodeConstructor);
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name)
    }

    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn deserialize(&self, type_name: &str, text: &str) -> Result<BoxedFlowNode> {
        let constructor = self.constructors.get(type_name).ok_or_else(|| {
            AgentCoreError::Serialization(format!("unknown flow node type `{type_name}`"))
        })?;
        constructor(text)
    }
}
