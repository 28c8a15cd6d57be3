#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use agentcore::agent::Agent;
use agentcore::error::{AgentCoreError, Result};
use agentcore::llm::{DynLlmClient, LlmClient, LlmRequest, LlmResponse};
use async_trait::async_trait;
use parking_lot::Mutex;

/// Replays canned responses in order; the last one repeats forever.
pub struct ScriptedClient {
    replies: Mutex<VecDeque<LlmResponse>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<LlmResponse>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn texts<I, S>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(replies.into_iter().map(LlmResponse::text).collect())
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        self.requests.lock().push(request);
        let mut replies = self.replies.lock();
        let reply = if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        };
        reply.ok_or_else(|| AgentCoreError::Other(anyhow::anyhow!("script is empty")))
    }
}

/// Fails `failures` times with a model error, then answers `reply`.
pub struct FlakyClient {
    failures: Mutex<u32>,
    reply: String,
    pub calls: Mutex<u32>,
}

impl FlakyClient {
    pub fn new(failures: u32, reply: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            failures: Mutex::new(failures),
            reply: reply.into(),
            calls: Mutex::new(0),
        })
    }
}

#[async_trait]
impl LlmClient for FlakyClient {
    async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse> {
        *self.calls.lock() += 1;
        let mut failures = self.failures.lock();
        if *failures > 0 {
            *failures -= 1;
            return Err(AgentCoreError::ModelInvocation {
                node: "remote".into(),
                round: 0,
                message: "503 service unavailable".into(),
            });
        }
        Ok(LlmResponse::text(self.reply.clone()))
    }
}

pub fn planning_reply(next: &str, query: &str) -> String {
    serde_json::json!({
        "planning": format!("hand over to {next}"),
        "next_agent_name": next,
        "next_query": query,
    })
    .to_string()
}

/// Single-round agent answering from `client`.
pub fn scripted_agent(name: &str, client: DynLlmClient) -> Agent {
    Agent::builder(name)
        .description(format!("{name} test agent"))
        .model("scripted", client)
        .build()
        .expect("agent builds")
}
