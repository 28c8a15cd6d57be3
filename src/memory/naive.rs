use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::vector::{EmbeddingClient, VectorDocument, VectorStore};
use super::Memory;
use crate::error::{AgentCoreError, Result};

/// Embeds entries and recalls them by vector similarity.
pub struct NaiveMemory {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
}

impl NaiveMemory {
    pub fn new(embedder: Arc<dyn EmbeddingClient>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }
}

#[async_trait]
impl Memory for NaiveMemory {
    async fn add(&self, entries: Vec<String>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let embeddings = self.embedder.embed(&entries).await?;
        if embeddings.len() != entries.len() {
            return Err(AgentCoreError::ContractViolation(format!(
                "embedder returned {} vectors for {} entries",
                embeddings.len(),
                entries.len()
            )));
        }
        let documents = entries
            .into_iter()
            .zip(embeddings)
            .map(|(text, embedding)| VectorDocument {
                text,
                embedding,
                metadata: Value::Null,
            })
            .collect();
        self.store.add(documents).await
    }

    async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let mut embeddings = self.embedder.embed(&[query.to_string()]).await?;
        let Some(embedding) = embeddings.pop() else {
            return Ok(Vec::new());
        };
        let hits = self.store.similarity_search(&embedding, limit).await?;
        Ok(hits.into_iter().map(|doc| doc.text).collect())
    }

    async fn clear(&self) -> Result<()> {
        self.store.clear().await
    }
}
