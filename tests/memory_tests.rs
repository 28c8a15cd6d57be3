use std::sync::Arc;

use agentcore::error::Result;
use agentcore::memory::{
    EmbeddingClient, InMemoryVectorStore, LongTermMemory, Memory, NaiveMemory,
};
use async_trait::async_trait;

/// One dimension per known keyword, so similarity is easy to reason about.
struct KeywordEmbedder;

const KEYWORDS: [&str; 3] = ["tea", "coffee", "rust"];

#[async_trait]
impl EmbeddingClient for KeywordEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                KEYWORDS
                    .iter()
                    .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
                    .collect()
            })
            .collect())
    }
}

#[tokio::test]
async fn naive_memory_recalls_most_similar_entries() -> anyhow::Result<()> {
    let store = Arc::new(InMemoryVectorStore::new());
    let memory = NaiveMemory::new(Arc::new(KeywordEmbedder), store.clone());
    memory
        .add(vec![
            "Guests asked for green tea".to_string(),
            "The espresso machine makes coffee".to_string(),
            "The service is written in Rust".to_string(),
        ])
        .await?;
    assert_eq!(store.len(), 3);

    let recalled = memory.retrieve("which coffee beans?", 1).await?;
    assert_eq!(recalled, vec!["The espresso machine makes coffee"]);

    memory.clear().await?;
    assert!(store.is_empty());
    Ok(())
}

#[tokio::test]
async fn long_term_memory_returns_most_recent_entries() -> anyhow::Result<()> {
    let memory = LongTermMemory::with_capacity(3);
    for entry in ["one", "two", "three", "four"] {
        memory.add(vec![entry.to_string()]).await?;
    }
    assert_eq!(memory.len(), 3);
    assert_eq!(memory.retrieve("anything", 2).await?, vec!["three", "four"]);

    memory.clear().await?;
    assert!(memory.retrieve("anything", 2).await?.is_empty());
    Ok(())
}
