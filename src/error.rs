use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentCoreError>;

#[derive(Debug, Error)]
pub enum AgentCoreError {
    #[error("planning output of node `{node}` (round {round}) is not parseable: {reason}; text: {text}")]
    PlanningParse {
        node: String,
        round: u32,
        text: String,
        reason: String,
    },
    #[error("agent `{0}` is not a member of the group")]
    UnknownAgent(String),
    #[error("model invocation failed at node `{node}` round {round}: {message}")]
    ModelInvocation {
        node: String,
        round: u32,
        message: String,
    },
    #[error("tool `{tool}` failed: {message}")]
    ToolExecution { tool: String, message: String },
    #[error("invalid argument `{parameter}`: {message}")]
    InvalidArgument { parameter: String, message: String },
    #[error("graph validation failed at `{element}`: {message}")]
    GraphValidation { element: String, message: String },
    #[error("contract violation: {0}")]
    ContractViolation(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("tool `{0}` not registered")]
    ToolNotRegistered(String),
    #[error("model `{0}` not registered")]
    ModelNotRegistered(String),
    #[error("flow aborted at node `{node}`: {message}")]
    FlowAborted { node: String, message: String },
    #[error("flow exceeded {0} steps")]
    MaxStepsExceeded(u32),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AgentCoreError {
    pub fn graph<E: Into<String>, M: Into<String>>(element: E, message: M) -> Self {
        Self::GraphValidation {
            element: element.into(),
            message: message.into(),
        }
    }

    pub fn invalid_argument<P: Into<String>, M: Into<String>>(parameter: P, message: M) -> Self {
        Self::InvalidArgument {
            parameter: parameter.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for AgentCoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
