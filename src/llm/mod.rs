pub mod client;
pub mod echo;
pub mod limits;
pub mod registry;
pub mod retry;
pub mod types;

pub use client::{invoke_streaming, DynLlmClient, LlmClient, LlmStream, StreamingCallback};
pub use echo::LocalEchoClient;
pub use limits::{estimate_tokens, model_limits, ModelLimits};
pub use registry::ModelRegistry;
pub use retry::{RetryPolicy, RetryingClient};
pub use types::{LlmMessage, LlmRequest, LlmResponse, LlmRole, LlmStreamChunk, TokenUsage};
