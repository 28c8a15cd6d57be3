pub mod file;
pub mod provider;
#[cfg(feature = "redis-store")]
pub mod redis;
pub mod temporary;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AgentCoreError, Result};

pub use file::FilePersistenceProvider;
pub use provider::{DynPersistenceProvider, PersistenceProvider};
pub use temporary::TemporaryPersistenceProvider;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PersistenceKind {
    Redis,
    File,
    #[default]
    Temporary,
}

impl fmt::Display for PersistenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PersistenceKind::Redis => "REDIS",
            PersistenceKind::File => "FILE",
            PersistenceKind::Temporary => "TEMPORARY",
        })
    }
}

impl FromStr for PersistenceKind {
    type Err = AgentCoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "REDIS" => Ok(PersistenceKind::Redis),
            "FILE" => Ok(PersistenceKind::File),
            "TEMPORARY" | "MEMORY" => Ok(PersistenceKind::Temporary),
            other => Err(AgentCoreError::InvalidConfig(format!(
                "unknown persistence kind `{other}`"
            ))),
        }
    }
}

/// 持久化配置
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub kind: PersistenceKind,
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Expiry for TEMPORARY entries in seconds; 0 disables expiry.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_dir() -> PathBuf {
    PathBuf::from("./data/flows")
}

fn default_key_prefix() -> String {
    "agentcore:".to_string()
}

fn default_ttl_secs() -> u64 {
    15 * 60
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            kind: PersistenceKind::default(),
            dir: default_dir(),
            redis_url: None,
            key_prefix: default_key_prefix(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl PersistenceConfig {
    pub fn build(&self) -> Result<DynPersistenceProvider> {
        match self.kind {
            PersistenceKind::Temporary => {
                let ttl = (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs));
                Ok(Arc::new(TemporaryPersistenceProvider::with_ttl(ttl)))
            }
            PersistenceKind::File => Ok(Arc::new(FilePersistenceProvider::new(self.dir.clone()))),
            PersistenceKind::Redis => self.build_redis(),
        }
    }

    #[cfg(feature = "redis-store")]
    fn build_redis(&self) -> Result<DynPersistenceProvider> {
        let url = self.redis_url.as_deref().ok_or_else(|| {
            AgentCoreError::InvalidConfig("REDIS persistence requires redis_url".into())
        })?;
        let client = ::redis::Client::open(url)
            .map_err(|e| AgentCoreError::InvalidConfig(e.to_string()))?;
        Ok(Arc::new(redis::RedisPersistenceProvider::new(
            client,
            self.key_prefix.clone(),
        )))
    }

    #[cfg(not(feature = "redis-store"))]
    fn build_redis(&self) -> Result<DynPersistenceProvider> {
        Err(AgentCoreError::InvalidConfig(
            "REDIS persistence requires the `redis-store` feature".into(),
        ))
    }
}
