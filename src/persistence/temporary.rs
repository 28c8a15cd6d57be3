use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::provider::PersistenceProvider;
use crate::error::Result;

struct Entry {
    text: String,
    stored_at: Instant,
}

/// 内存存储实现，可选过期时间
pub struct TemporaryPersistenceProvider {
    inner: RwLock<HashMap<String, Entry>>,
    ttl: Option<Duration>,
}

impl TemporaryPersistenceProvider {
    pub fn new() -> Self {
        Self::with_ttl(None)
    }

    pub fn with_ttl(ttl: Option<Duration>) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    fn expired(&self, entry: &Entry) -> bool {
        self.ttl
            .map(|ttl| entry.stored_at.elapsed() >= ttl)
            .unwrap_or(false)
    }
}

impl Default for TemporaryPersistenceProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistenceProvider for TemporaryPersistenceProvider {
    async fn save(&self, id: &str, text: String) -> Result<()> {
        self.inner.write().insert(
            id.to_string(),
            Entry {
                text,
                stored_at: Instant::now(),
            },
        );
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<String>> {
        let mut guard = self.inner.write();
        let expired = match guard.get(id) {
            Some(entry) if self.expired(entry) => true,
            Some(entry) => return Ok(Some(entry.text.clone())),
            None => return Ok(None),
        };
        if expired {
            guard.remove(id);
        }
        Ok(None)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let mut guard = self.inner.write();
        for id in ids {
            guard.remove(id);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.inner.write().clear();
        Ok(())
    }
}
