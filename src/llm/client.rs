use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;

use super::types::{LlmRequest, LlmResponse, LlmStreamChunk};
use crate::error::{AgentCoreError, Result};

pub type LlmStream<'a> = BoxStream<'a, Result<LlmStreamChunk>>;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse>;

    /// Streams the response. The default splits a blocking completion into
    /// per-character chunks followed by one `done` chunk.
    fn complete_stream(&self, request: LlmRequest) -> LlmStream<'_> {
        stream::once(self.complete(request))
            .flat_map(|result| {
                let chunks: Vec<Result<LlmStreamChunk>> = match result {
                    Ok(response) => {
                        let mut chunks: Vec<Result<LlmStreamChunk>> = response
                            .content
                            .chars()
                            .map(|ch| {
                                Ok(LlmStreamChunk {
                                    content: ch.to_string(),
                                    ..Default::default()
                                })
                            })
                            .collect();
                        chunks.push(Ok(LlmStreamChunk {
                            content: String::new(),
                            done: true,
                            tool_calls: response.tool_calls,
                        }));
                        chunks
                    }
                    Err(err) => vec![Err(err)],
                };
                stream::iter(chunks)
            })
            .boxed()
    }
}

pub type DynLlmClient = Arc<dyn LlmClient>;

/// Receives streamed output. Exactly one of `on_complete` or `on_error`
/// fires per invocation.
pub trait StreamingCallback: Send + Sync {
    fn on_chunk(&self, chunk: &str);
    fn on_complete(&self, response: &LlmResponse);
    fn on_error(&self, error: &AgentCoreError);
}

/// Drives `complete_stream`, forwarding chunks to `callback`, and returns
/// the assembled response.
pub async fn invoke_streaming(
    client: &dyn LlmClient,
    request: LlmRequest,
    callback: &dyn StreamingCallback,
) -> Result<LlmResponse> {
    let mut stream = client.complete_stream(request);
    let mut response = LlmResponse::default();
    let mut finished = false;

    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) => {
                if !chunk.content.is_empty() {
                    callback.on_chunk(&chunk.content);
                    response.content.push_str(&chunk.content);
                }
                if chunk.done {
                    response.tool_calls = chunk.tool_calls;
                    finished = true;
                    break;
                }
            }
            Err(err) => {
                callback.on_error(&err);
                return Err(err);
            }
        }
    }

    if !finished {
        let err = AgentCoreError::Other(anyhow::anyhow!("stream ended without a done chunk"));
        callback.on_error(&err);
        return Err(err);
    }
    callback.on_complete(&response);
    Ok(response)
}
