use async_trait::async_trait;
use parking_lot::RwLock;

use super::Memory;
use crate::error::Result;

/// Ordered free-text entries; retrieval returns the most recent ones.
#[derive(Default)]
pub struct LongTermMemory {
    entries: RwLock<Vec<String>>,
    capacity: Option<usize>,
}

impl LongTermMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps only the newest `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            capacity: Some(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl Memory for LongTermMemory {
    async fn add(&self, entries: Vec<String>) -> Result<()> {
        let mut guard = self.entries.write();
        guard.extend(entries);
        if let Some(capacity) = self.capacity {
            if guard.len() > capacity {
                let excess = guard.len() - capacity;
                guard.drain(..excess);
            }
        }
        Ok(())
    }

    async fn retrieve(&self, _query: &str, limit: usize) -> Result<Vec<String>> {
        let guard = self.entries.read();
        let start = guard.len().saturating_sub(limit);
        Ok(guard[start..].to_vec())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().clear();
        Ok(())
    }
}
