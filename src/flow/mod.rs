pub mod edge;
pub mod environment;
pub mod graph;
pub mod node;
pub mod nodes;
pub mod registry;

pub use edge::{FlowEdge, FlowEdgeKind};
pub use environment::FlowEnvironment;
pub use graph::{runtime_key, Flow, FlowElementRecord};
pub use node::{
    BoxedFlowNode, FlowNode, FlowNodeBase, FlowNodeDomain, FlowNodePosition, FlowNodeResult,
    FlowNodeType, FlowSetting,
};
pub use nodes::{
    AgentFlowNode, AgentFlowNodeDomain, AgentGroupFlowNode, AgentGroupFlowNodeDomain,
    EmptyFlowNode, FilterFlowNode, HandoffFlowNode, LlmFlowNode, ThrowErrorFlowNode,
    ToolFlowNode, ToolFlowNodeDomain,
};
pub use registry::FlowNodeRegistry;
