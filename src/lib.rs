pub mod agent;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod flow;
pub mod handoff;
pub mod llm;
pub mod memory;
pub mod node;
pub mod persistence;
pub mod planning;
pub mod prompt;
pub mod termination;
pub mod tools;
pub mod utils;

pub use agent::{
    Agent, AgentBuilder, AgentChain, AgentGroup, AgentGroupBuilder, AgentRoster, ImageAgent,
    UserInputAgent,
};
pub use config::{EnvConfig, RoundLimits, RuntimeConfig};
pub use error::{AgentCoreError, Result};
pub use events::{EventChannel, MessageUpdated, NodeListeners, NodeOutputUpdated, StatusChanged};
pub use flow::{
    Flow, FlowEdge, FlowEdgeKind, FlowEnvironment, FlowNode, FlowNodeRegistry, FlowNodeType,
};
pub use handoff::{Handoff, HandoffDecision, HandoffKind};
pub use llm::{DynLlmClient, LlmClient, LlmRequest, LlmResponse, LocalEchoClient, ModelRegistry};
pub use memory::{DynMemory, LongTermMemory, Memory, NaiveMemory};
pub use node::{
    BoxedNode, Node, NodeCheckpoint, NodeKind, NodeState, NodeStatus, RunOutcome, Variables,
};
pub use persistence::{PersistenceConfig, PersistenceKind, PersistenceProvider};
pub use planning::{DefaultPlanning, Planning, PlanningResult};
pub use termination::{
    ChainOfThoughtTermination, MaxRoundTermination, NoImprovementTermination,
    ScoreBasedTermination, StopMessageTermination, Termination,
};
pub use tools::{
    describe, FunctionTool, Tool, ToolCallParameter, ToolCallParameterType, ToolDefinition,
    ToolInvocation, ToolRegistry,
};
pub use utils::{logging, validation};
