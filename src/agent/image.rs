use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::constants::variables;
use crate::error::{AgentCoreError, Result};
use crate::node::{Node, NodeCheckpoint, NodeKind, NodeState, NodeStatus, RunOutcome, Variables};
use crate::prompt::render;

#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generates an image for `prompt` and returns its URL.
    async fn generate_image(&self, prompt: &str) -> Result<String>;
}

pub type DynImageProvider = Arc<dyn ImageProvider>;

/// Single-round node that turns its prompt into an image URL.
pub struct ImageAgent {
    state: NodeState,
    prompt_template: String,
    provider: DynImageProvider,
}

impl ImageAgent {
    pub fn new(name: impl Into<String>, provider: DynImageProvider) -> Self {
        Self {
            state: NodeState::new(name),
            prompt_template: String::new(),
            provider,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.state = self.state.with_description(description);
        self
    }

    pub fn with_prompt_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = template.into();
        self
    }
}

#[async_trait]
impl Node for ImageAgent {
    fn state(&self) -> &NodeState {
        &self.state
    }

    fn kind(&self) -> NodeKind {
        NodeKind::ImageAgent
    }

    fn restore(&mut self, checkpoint: NodeCheckpoint) -> Result<()> {
        self.state.restore(&checkpoint);
        Ok(())
    }

    async fn run(&mut self, query: &str, vars: &mut Variables) -> Result<RunOutcome> {
        self.state.start(query);
        vars.insert(variables::QUERY.to_string(), Value::String(query.to_string()));
        let prompt = render(&format!("{}{}", self.prompt_template, query), vars);

        match self.provider.generate_image(&prompt).await {
            Ok(url) => {
                info!(agent = %self.state.name(), %url, "image generated");
                self.state.set_output(query, url.clone());
                self.state.set_status(NodeStatus::Done);
                Ok(RunOutcome::Completed { output: url })
            }
            Err(err) => {
                warn!(agent = %self.state.name(), error = %err, "image generation failed");
                self.state.set_status(NodeStatus::Failed);
                Err(AgentCoreError::ModelInvocation {
                    node: self.state.id().to_string(),
                    round: self.state.round(),
                    message: err.to_string(),
                })
            }
        }
    }
}
