use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// Durable text storage keyed by caller-chosen ids. Concurrent saves to
/// the same id resolve last-write-wins.
#[async_trait]
pub trait PersistenceProvider: Send + Sync {
    async fn save(&self, id: &str, text: String) -> Result<()>;
    async fn load(&self, id: &str) -> Result<Option<String>>;
    async fn delete(&self, ids: &[String]) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

pub type DynPersistenceProvider = Arc<dyn PersistenceProvider>;
