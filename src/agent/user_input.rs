use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::constants::variables;
use crate::error::Result;
use crate::events::SharedListeners;
use crate::llm::LlmMessage;
use crate::node::{Node, NodeCheckpoint, NodeKind, NodeState, NodeStatus, RunOutcome, Variables};

/// 向用户提问并挂起，直到调用方带着回答再次运行。
///
/// The first run publishes the query as the question and suspends in
/// WAITING_FOR_USER_INPUT. The next run takes its query as the answer.
pub struct UserInputAgent {
    state: NodeState,
    history: Vec<LlmMessage>,
}

impl UserInputAgent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            state: NodeState::new(name),
            history: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.state = self.state.with_id(id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.state = self.state.with_description(description);
        self
    }

    pub fn with_listeners(mut self, listeners: SharedListeners) -> Self {
        self.state = self.state.with_listeners(listeners);
        self
    }

    pub fn is_waiting(&self) -> bool {
        self.state.status() == NodeStatus::WaitingForUserInput
    }

    /// Question and answer of the last exchange.
    pub fn history(&self) -> &[LlmMessage] {
        &self.history
    }
}

#[async_trait]
impl Node for UserInputAgent {
    fn state(&self) -> &NodeState {
        &self.state
    }

    fn kind(&self) -> NodeKind {
        NodeKind::UserInput
    }

    fn checkpoint(&self) -> Result<NodeCheckpoint> {
        Ok(NodeCheckpoint {
            messages: self.history.clone(),
            ..self.state.checkpoint()
        })
    }

    fn restore(&mut self, checkpoint: NodeCheckpoint) -> Result<()> {
        self.state.restore(&checkpoint);
        self.history = checkpoint.messages;
        Ok(())
    }

    async fn run(&mut self, query: &str, vars: &mut Variables) -> Result<RunOutcome> {
        if self.is_waiting() {
            let question = self.state.input().to_string();
            self.history.push(LlmMessage::user(query));
            self.state.publish_message("user", query);
            self.state.set_output(&question, query.to_string());
            self.state.set_status(NodeStatus::Done);
            info!(agent = %self.state.name(), "user answered");
            return Ok(RunOutcome::Completed {
                output: query.to_string(),
            });
        }

        self.state.start(query);
        self.history.clear();
        vars.insert(variables::QUERY.to_string(), Value::String(query.to_string()));
        self.history.push(LlmMessage::assistant(query));
        self.state.publish_message("assistant", query);
        self.state.set_output(query, query.to_string());
        self.state.set_status(NodeStatus::WaitingForUserInput);
        info!(agent = %self.state.name(), "waiting for user input");
        Ok(RunOutcome::Suspended {
            node: self.state.id().to_string(),
            output: query.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn asks_then_takes_the_answer() {
        let mut agent = UserInputAgent::new("ask");
        let mut vars = Variables::new();

        let outcome = agent.run("which city?", &mut vars).await.unwrap();
        assert!(outcome.is_suspended());
        assert_eq!(agent.status(), NodeStatus::WaitingForUserInput);

        let outcome = agent.run("Oslo", &mut vars).await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed { output: "Oslo".into() });
        assert_eq!(agent.status(), NodeStatus::Done);
        assert_eq!(agent.history().len(), 2);
    }
}
