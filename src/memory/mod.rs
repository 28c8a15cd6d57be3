pub mod long_term;
pub mod naive;
pub mod vector;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

pub use long_term::LongTermMemory;
pub use naive::NaiveMemory;
pub use vector::{
    cosine_similarity, EmbeddingClient, HashingEmbedder, InMemoryVectorStore, VectorDocument,
    VectorStore,
};

/// Append-only recall store owned by an agent's execution loop.
#[async_trait]
pub trait Memory: Send + Sync {
    async fn add(&self, entries: Vec<String>) -> Result<()>;

    /// At most `limit` entries relevant to `query`.
    async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<String>>;

    async fn clear(&self) -> Result<()>;
}

pub type DynMemory = Arc<dyn Memory>;
