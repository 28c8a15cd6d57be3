use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::config::RoundLimits;
use crate::constants::{agent as defaults, variables};
use crate::error::{AgentCoreError, Result};
use crate::events::SharedListeners;
use crate::llm::{
    estimate_tokens, invoke_streaming, model_limits, DynLlmClient, LlmMessage, LlmRequest,
    LlmResponse, StreamingCallback,
};
use crate::memory::DynMemory;
use crate::node::{Node, NodeCheckpoint, NodeKind, NodeState, NodeStatus, RunOutcome, Variables};
use crate::prompt::{placeholders, render};
use crate::termination::{any_terminates, BoxedTermination, MaxRoundTermination};
use crate::tools::{DynTool, ToolInvocation, ToolRegistry};
use crate::utils::ConfigValidator;

/// Model-backed node: renders its prompt, lets the model call tools, and
/// repeats reflection rounds until a termination fires.
pub struct Agent {
    state: NodeState,
    system_prompt: String,
    prompt_template: String,
    continue_template: String,
    model: String,
    client: DynLlmClient,
    temperature: f32,
    tools: ToolRegistry,
    memory: Option<DynMemory>,
    memory_limit: usize,
    terminations: Vec<BoxedTermination>,
    max_turns: u32,
    streaming: Option<Arc<dyn StreamingCallback>>,
    history: Vec<LlmMessage>,
}

impl Agent {
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn prompt_template(&self) -> &str {
        &self.prompt_template
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn memory(&self) -> Option<&DynMemory> {
        self.memory.as_ref()
    }

    /// Short-term conversation of the current run.
    pub fn history(&self) -> &[LlmMessage] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    fn model_error(&self, err: AgentCoreError) -> AgentCoreError {
        match err {
            AgentCoreError::ModelInvocation { .. } => err,
            other => AgentCoreError::ModelInvocation {
                node: self.state.id().to_string(),
                round: self.state.round(),
                message: other.to_string(),
            },
        }
    }

    async fn build_system_prompt(&self, query: &str, vars: &mut Variables) -> Result<Option<String>> {
        let recalled = match &self.memory {
            Some(memory) => memory.retrieve(query, self.memory_limit).await?,
            None => Vec::new(),
        };
        let memory_text = recalled
            .iter()
            .map(|entry| format!("- {entry}"))
            .collect::<Vec<_>>()
            .join("\n");
        vars.insert(
            variables::MEMORY.to_string(),
            Value::String(memory_text.clone()),
        );

        let mut system = render(&self.system_prompt, vars);
        let referenced = placeholders(&self.system_prompt)
            .iter()
            .any(|name| name == variables::MEMORY);
        if !memory_text.is_empty() && !referenced {
            if !system.is_empty() {
                system.push_str("\n\n");
            }
            system.push_str("Relevant memory:\n");
            system.push_str(&memory_text);
        }
        Ok((!system.is_empty()).then_some(system))
    }

    /// Drops the oldest history until the request fits the model's window.
    fn fit_context_window(&self, request: &mut LlmRequest) {
        let limit = model_limits(&self.model).context_window as f64 * defaults::CONTEXT_WINDOW_RATIO;
        let mut dropped = 0;
        while estimate_tokens(request.text_len()) as f64 > limit && !request.history.is_empty() {
            request.history.remove(0);
            dropped += 1;
        }
        if dropped > 0 {
            debug!(agent = %self.state.name(), dropped, "trimmed history to fit context window");
        }
    }

    async fn invoke(&self, request: LlmRequest) -> Result<LlmResponse> {
        match &self.streaming {
            Some(callback) => invoke_streaming(self.client.as_ref(), request, callback.as_ref()).await,
            None => self.client.complete(request).await,
        }
    }

    async fn call_tool(&self, call: &ToolInvocation) -> Result<String> {
        self.tools.execute(call).await.map_err(|err| match err {
            AgentCoreError::ToolExecution { .. } => err,
            other => AgentCoreError::ToolExecution {
                tool: call.name.clone(),
                message: other.to_string(),
            },
        })
    }

    /// One reflection round: prompt, model and tool turns, memory append.
    async fn round_once(&mut self, query: &str, vars: &mut Variables) -> Result<String> {
        vars.insert(variables::QUERY.to_string(), Value::String(query.to_string()));
        let system = self.build_system_prompt(query, vars).await?;
        let user = render(&format!("{}{}", self.prompt_template, query), vars);

        let mut request = LlmRequest::new(user.clone()).with_model(self.model.clone());
        request.system = system;
        request.history = self.history.clone();
        request.tools = self.tools.schemas();
        request.temperature = self.temperature;
        self.fit_context_window(&mut request);
        self.state.publish_message("user", &user);

        let mut output = None;
        for turn in 0..self.max_turns {
            let response = self
                .invoke(request.clone())
                .await
                .map_err(|err| self.model_error(err))?;
            if response.tool_calls.is_empty() {
                output = Some(response.content);
                break;
            }

            debug!(
                agent = %self.state.name(),
                turn,
                calls = response.tool_calls.len(),
                "model requested tools"
            );
            let mut assistant = LlmMessage::assistant(response.content);
            assistant.tool_calls = response.tool_calls.clone();
            request.tool_turns.push(assistant);
            for call in &response.tool_calls {
                let result = self.call_tool(call).await?;
                self.state.publish_message("tool", &result);
                request.tool_turns.push(LlmMessage::tool_result(call, result));
            }
        }
        let output = output.ok_or_else(|| {
            self.model_error(AgentCoreError::Other(anyhow::anyhow!(
                "model kept requesting tools after {} turns",
                self.max_turns
            )))
        })?;

        self.history.push(LlmMessage::user(user));
        self.history.extend(request.tool_turns);
        self.history.push(LlmMessage::assistant(output.clone()));
        self.state.publish_message("assistant", &output);

        if let Some(memory) = &self.memory {
            memory.add(vec![output.clone()]).await?;
        }
        Ok(output)
    }

    async fn run_rounds(&mut self, query: &str, vars: &mut Variables) -> Result<String> {
        let mut current = query.to_string();
        loop {
            let output = self.round_once(&current, vars).await?;
            self.state.set_output(&current, output.clone());
            info!(
                agent = %self.state.name(),
                round = self.state.round(),
                max_round = self.state.max_round(),
                "agent round completed"
            );

            if any_terminates(&self.terminations, &self.state)? {
                return Ok(output);
            }

            vars.insert("output".to_string(), Value::String(output));
            current = render(&self.continue_template, vars);
            self.state.next_round();
        }
    }
}

#[async_trait]
impl Node for Agent {
    fn state(&self) -> &NodeState {
        &self.state
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Agent
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

    #[instrument(skip(self, variables), fields(agent = %self.state.name()))]
    async fn run(&mut self, query: &str, variables: &mut Variables) -> Result<RunOutcome> {
        self.state.start(query);
        self.history.clear();
        match self.run_rounds(query, variables).await {
            Ok(output) => {
                self.state.set_status(NodeStatus::Done);
                Ok(RunOutcome::Completed { output })
            }
            Err(err) => {
                warn!(agent = %self.state.name(), round = self.state.round(), error = %err, "agent failed");
                self.state.set_status(NodeStatus::Failed);
                Err(err)
            }
        }
    }
}

pub struct AgentBuilder {
    name: String,
    id: Option<String>,
    description: String,
    system_prompt: String,
    prompt_template: String,
    continue_template: String,
    model: Option<String>,
    client: Option<DynLlmClient>,
    temperature: f32,
    tools: ToolRegistry,
    memory: Option<DynMemory>,
    memory_limit: usize,
    terminations: Vec<BoxedTermination>,
    max_round: u32,
    max_turns: u32,
    streaming: Option<Arc<dyn StreamingCallback>>,
    listeners: Option<SharedListeners>,
}

impl AgentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            description: String::new(),
            system_prompt: String::new(),
            prompt_template: String::new(),
            continue_template: defaults::DEFAULT_CONTINUE_PROMPT.to_string(),
            model: None,
            client: None,
            temperature: 0.2,
            tools: ToolRegistry::new(),
            memory: None,
            memory_limit: defaults::DEFAULT_MEMORY_LIMIT,
            terminations: Vec::new(),
            max_round: defaults::DEFAULT_MAX_ROUND,
            max_turns: defaults::DEFAULT_MAX_TURNS,
            streaming: None,
            listeners: None,
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = template.into();
        self
    }

    /// Query template for reflection rounds; `{{output}}` is the previous answer.
    pub fn continue_template(mut self, template: impl Into<String>) -> Self {
        self.continue_template = template.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>, client: DynLlmClient) -> Self {
        self.model = Some(model.into());
        self.client = Some(client);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn tool(mut self, tool: DynTool) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn memory(mut self, memory: DynMemory) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn memory_limit(mut self, limit: usize) -> Self {
        self.memory_limit = limit;
        self
    }

    /// Extra stop condition; the round limit always applies.
    pub fn termination(mut self, termination: BoxedTermination) -> Self {
        self.terminations.push(termination);
        self
    }

    /// Round and turn defaults from the runtime config.
    pub fn limits(mut self, limits: &RoundLimits) -> Self {
        self.max_round = limits.agent_max_round;
        self.max_turns = limits.agent_max_turns;
        self
    }

    pub fn max_round(mut self, max_round: u32) -> Self {
        self.max_round = max_round;
        self
    }

    pub fn max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn streaming(mut self, callback: Arc<dyn StreamingCallback>) -> Self {
        self.streaming = Some(callback);
        self
    }

    pub fn listeners(mut self, listeners: SharedListeners) -> Self {
        self.listeners = Some(listeners);
        self
    }

    pub fn build(self) -> Result<Agent> {
        let client = self.client.ok_or_else(|| {
            AgentCoreError::InvalidConfig(format!("agent `{}` has no model client", self.name))
        })?;
        ConfigValidator::validate_temperature(self.temperature)?;
        if self.max_turns == 0 {
            return Err(AgentCoreError::InvalidConfig(format!(
                "agent `{}` needs at least one model turn",
                self.name
            )));
        }

        let mut state = NodeState::new(self.name)
            .with_description(self.description)
            .with_max_round(self.max_round);
        if let Some(id) = self.id {
            state = state.with_id(id);
        }
        if let Some(listeners) = self.listeners {
            state = state.with_listeners(listeners);
        }

        let mut terminations = self.terminations;
        terminations.push(Box::new(MaxRoundTermination));

        Ok(Agent {
            state,
            system_prompt: self.system_prompt,
            prompt_template: self.prompt_template,
            continue_template: self.continue_template,
            model: self.model.unwrap_or_default(),
            client,
            temperature: self.temperature,
            tools: self.tools,
            memory: self.memory,
            memory_limit: self.memory_limit,
            terminations,
            max_turns: self.max_turns,
            streaming: self.streaming,
            history: Vec::new(),
        })
    }
}
