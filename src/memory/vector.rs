use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VectorDocument {
    pub text: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Value,
}

#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn add(&self, documents: Vec<VectorDocument>) -> Result<()>;
    async fn similarity_search(&self, embedding: &[f32], k: usize) -> Result<Vec<VectorDocument>>;
    async fn clear(&self) -> Result<()>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

/// Brute-force store scored by cosine similarity.
#[derive(Default)]
pub struct InMemoryVectorStore {
    documents: RwLock<Vec<VectorDocument>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add(&self, documents: Vec<VectorDocument>) -> Result<()> {
        self.documents.write().extend(documents);
        Ok(())
    }

    async fn similarity_search(&self, embedding: &[f32], k: usize) -> Result<Vec<VectorDocument>> {
        let guard = self.documents.read();
        let mut scored: Vec<(f32, &VectorDocument)> = guard
            .iter()
            .map(|doc| (cosine_similarity(embedding, &doc.embedding), doc))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn clear(&self) -> Result<()> {
        self.documents.write().clear();
        Ok(())
    }
}

/// Offline bag-of-words embedder: each lowercase word is hashed into one
/// of `dimensions` buckets.
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingClient for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_is_one() {
        let a = vec![1.0, 2.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[tokio::test]
    async fn search_orders_by_similarity() {
        let store = InMemoryVectorStore::new();
        store
            .add(vec![
                VectorDocument {
                    text: "x".into(),
                    embedding: vec![1.0, 0.0],
                    metadata: Value::Null,
                },
                VectorDocument {
                    text: "y".into(),
                    embedding: vec![0.0, 1.0],
                    metadata: Value::Null,
                },
            ])
            .await
            .unwrap();
        let hits = store.similarity_search(&[0.1, 0.9], 1).await.unwrap();
        assert_eq!(hits[0].text, "y");
    }
}
