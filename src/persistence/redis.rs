use async_trait::async_trait;
use redis::AsyncCommands;

use super::provider::PersistenceProvider;
use crate::error::{AgentCoreError, Result};

/// Stores each id under `<prefix><id>`.
pub struct RedisPersistenceProvider {
    client: redis::Client,
    prefix: String,
}

impl RedisPersistenceProvider {
    pub fn new(client: redis::Client, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
        }
    }

    fn key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AgentCoreError::Persistence(e.to_string()))
    }
}

#[async_trait]
impl PersistenceProvider for RedisPersistenceProvider {
    async fn save(&self, id: &str, text: String) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: () = conn
            .set(self.key(id), text)
            .await
            .map_err(|e| AgentCoreError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn
            .get(self.key(id))
            .await
            .map_err(|e| AgentCoreError::Persistence(e.to_string()))?;
        Ok(value)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let keys: Vec<String> = ids.iter().map(|id| self.key(id)).collect();
        let mut conn = self.connection().await?;
        let _: () = conn
            .del(keys)
            .await
            .map_err(|e| AgentCoreError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let keys: Vec<String> = conn
            .keys(format!("{}*", self.prefix))
            .await
            .map_err(|e| AgentCoreError::Persistence(e.to_string()))?;
        if keys.is_empty() {
            return Ok(());
        }
        let _: () = conn
            .del(keys)
            .await
            .map_err(|e| AgentCoreError::Persistence(e.to_string()))?;
        Ok(())
    }
}
