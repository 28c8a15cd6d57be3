mod common;

use std::sync::Arc;

use agentcore::agent::{Agent, ImageAgent, ImageProvider};
use agentcore::error::{AgentCoreError, Result};
use agentcore::events::{MessageUpdated, NodeListeners};
use agentcore::llm::{
    DynLlmClient, LlmResponse, LlmRole, RetryPolicy, RetryingClient, StreamingCallback,
};
use agentcore::memory::{LongTermMemory, Memory};
use agentcore::node::{Node, NodeKind, NodeStatus, Variables};
use agentcore::tools::{EchoTool, ToolInvocation};
use async_trait::async_trait;
use common::{FlakyClient, ScriptedClient};
use parking_lot::Mutex;
use serde_json::json;

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
    }
}

#[tokio::test]
async fn tool_calls_feed_back_into_the_model() -> anyhow::Result<()> {
    let client = ScriptedClient::new(vec![
        LlmResponse::text("").with_tool_calls(vec![
            ToolInvocation::new("echo", json!({"text": "hi"})).with_id("call-1"),
        ]),
        LlmResponse::text("the tool said hi"),
    ]);
    let mut agent = Agent::builder("caller")
        .model("scripted", client.clone())
        .tool(Arc::new(EchoTool::new()))
        .build()?;

    let outcome = agent.run("say hi", &mut Variables::new()).await?;
    assert_eq!(outcome.output(), "the tool said hi");

    let requests = client.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tools.len(), 1);
    let tool_turn = requests[1]
        .tool_turns
        .last()
        .ok_or_else(|| anyhow::anyhow!("missing tool turn"))?;
    assert_eq!(tool_turn.role, LlmRole::Tool);
    assert_eq!(tool_turn.content, "Echo: hi");
    assert_eq!(tool_turn.tool_call_id.as_deref(), Some("call-1"));

    let roles: Vec<LlmRole> = agent.history().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![LlmRole::User, LlmRole::Assistant, LlmRole::Tool, LlmRole::Assistant]
    );
    Ok(())
}

#[tokio::test]
async fn message_events_follow_conversation_order() -> anyhow::Result<()> {
    let client = ScriptedClient::new(vec![
        LlmResponse::text("").with_tool_calls(vec![
            ToolInvocation::new("echo", json!({"text": "hi"})).with_id("call-1"),
        ]),
        LlmResponse::text("done"),
    ]);
    let listeners = Arc::new(NodeListeners::default());
    let roles = Arc::new(Mutex::new(Vec::new()));
    let sink = roles.clone();
    listeners
        .message
        .subscribe(move |event: &MessageUpdated| sink.lock().push(event.role.clone()));

    let mut agent = Agent::builder("caller")
        .model("scripted", client)
        .tool(Arc::new(EchoTool::new()))
        .listeners(listeners)
        .build()?;
    agent.run("say hi", &mut Variables::new()).await?;

    assert_eq!(*roles.lock(), vec!["user", "tool", "assistant"]);
    Ok(())
}

#[tokio::test]
async fn failing_tool_fails_the_agent() -> anyhow::Result<()> {
    let client = ScriptedClient::new(vec![LlmResponse::text("").with_tool_calls(vec![
        ToolInvocation::new("echo", json!({})),
    ])]);
    let mut agent = Agent::builder("caller")
        .model("scripted", client)
        .tool(Arc::new(EchoTool::new()))
        .build()?;

    let err = agent.run("say hi", &mut Variables::new()).await.unwrap_err();
    assert!(matches!(err, AgentCoreError::ToolExecution { ref tool, .. } if tool == "echo"));
    assert_eq!(agent.status(), NodeStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn recalled_memory_reaches_the_system_prompt() -> anyhow::Result<()> {
    let memory = Arc::new(LongTermMemory::new());
    memory.add(vec!["The user prefers tea".to_string()]).await?;

    let client = ScriptedClient::texts(["Tea it is"]);
    let mut agent = Agent::builder("host")
        .system_prompt("You are a helpful host.")
        .model("scripted", client.clone())
        .memory(memory.clone())
        .build()?;

    agent.run("What should I serve?", &mut Variables::new()).await?;

    let system = client.requests()[0].system.clone().unwrap_or_default();
    assert!(system.starts_with("You are a helpful host."));
    assert!(system.contains("Relevant memory"));
    assert!(system.contains("The user prefers tea"));
    assert_eq!(memory.len(), 2);
    Ok(())
}

#[tokio::test]
async fn reflection_rounds_continue_from_previous_output() -> anyhow::Result<()> {
    let client = ScriptedClient::texts(["first draft", "second draft"]);
    let mut agent = Agent::builder("writer")
        .model("scripted", client.clone())
        .max_round(2)
        .build()?;

    let outcome = agent.run("write a haiku", &mut Variables::new()).await?;
    assert_eq!(outcome.output(), "second draft");
    assert_eq!(agent.round(), 2);

    let requests = client.requests();
    assert_eq!(requests[0].user, "write a haiku");
    assert!(requests[1].user.contains("first draft"));
    Ok(())
}

#[derive(Default)]
struct Collector {
    chunks: Mutex<Vec<String>>,
    completed: Mutex<u32>,
    errors: Mutex<u32>,
}

impl StreamingCallback for Collector {
    fn on_chunk(&self, chunk: &str) {
        self.chunks.lock().push(chunk.to_string());
    }

    fn on_complete(&self, _response: &LlmResponse) {
        *self.completed.lock() += 1;
    }

    fn on_error(&self, _error: &AgentCoreError) {
        *self.errors.lock() += 1;
    }
}

#[tokio::test]
async fn streaming_callback_sees_every_chunk() -> anyhow::Result<()> {
    let collector = Arc::new(Collector::default());
    let mut agent = Agent::builder("streamer")
        .model("scripted", ScriptedClient::texts(["hey"]))
        .streaming(collector.clone())
        .build()?;

    let outcome = agent.run("greet", &mut Variables::new()).await?;
    assert_eq!(outcome.output(), "hey");
    assert_eq!(collector.chunks.lock().concat(), "hey");
    assert_eq!(*collector.completed.lock(), 1);
    assert_eq!(*collector.errors.lock(), 0);
    Ok(())
}

#[tokio::test]
async fn retrying_client_recovers_from_transient_failures() -> anyhow::Result<()> {
    let flaky = FlakyClient::new(2, "recovered");
    let client: DynLlmClient = Arc::new(RetryingClient::new(flaky.clone(), fast_retry(3)));
    let mut agent = Agent::builder("patient").model("remote", client).build()?;

    let outcome = agent.run("hello", &mut Variables::new()).await?;
    assert_eq!(outcome.output(), "recovered");
    assert_eq!(*flaky.calls.lock(), 3);
    Ok(())
}

#[tokio::test]
async fn exhausted_retries_leave_the_agent_failed() -> anyhow::Result<()> {
    let flaky = FlakyClient::new(5, "never");
    let client: DynLlmClient = Arc::new(RetryingClient::new(flaky.clone(), fast_retry(2)));
    let mut agent = Agent::builder("impatient").model("remote", client).build()?;

    let err = agent.run("hello", &mut Variables::new()).await.unwrap_err();
    assert!(matches!(err, AgentCoreError::ModelInvocation { .. }));
    assert_eq!(*flaky.calls.lock(), 2);
    assert_eq!(agent.status(), NodeStatus::Failed);
    Ok(())
}

#[test]
fn agent_without_client_is_rejected() {
    assert!(Agent::builder("nobody").build().is_err());
}

struct RecordingPainter {
    prompts: Mutex<Vec<String>>,
    fail: bool,
}

#[async_trait]
impl ImageProvider for RecordingPainter {
    async fn generate_image(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        if self.fail {
            return Err(AgentCoreError::Other(anyhow::anyhow!("quota exceeded")));
        }
        Ok(format!("https://images.local/{}.png", self.prompts.lock().len()))
    }
}

#[tokio::test]
async fn image_agent_renders_prompt_and_returns_url() -> anyhow::Result<()> {
    let painter = Arc::new(RecordingPainter {
        prompts: Mutex::new(Vec::new()),
        fail: false,
    });
    let mut agent = ImageAgent::new("painter", painter.clone())
        .with_prompt_template("In the style of {{style}}: ");

    let mut vars = Variables::new();
    vars.insert("style".into(), json!("woodcut"));
    let outcome = agent.run("a lighthouse", &mut vars).await?;

    assert_eq!(outcome.output(), "https://images.local/1.png");
    assert_eq!(agent.kind(), NodeKind::ImageAgent);
    assert_eq!(agent.status(), NodeStatus::Done);
    assert_eq!(*painter.prompts.lock(), vec!["In the style of woodcut: a lighthouse"]);
    Ok(())
}

#[tokio::test]
async fn image_agent_reports_provider_failure() -> anyhow::Result<()> {
    let painter = Arc::new(RecordingPainter {
        prompts: Mutex::new(Vec::new()),
        fail: true,
    });
    let mut agent = ImageAgent::new("painter", painter);

    let err = agent.run("a lighthouse", &mut Variables::new()).await.unwrap_err();
    assert!(matches!(err, AgentCoreError::ModelInvocation { .. }));
    assert_eq!(agent.status(), NodeStatus::Failed);
    Ok(())
}
