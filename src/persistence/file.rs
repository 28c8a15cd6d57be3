use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::provider::PersistenceProvider;
use crate::error::{AgentCoreError, Result};

const EXTENSION: &str = "data";

/// Stores each id as `<dir>/<id>.data`.
pub struct FilePersistenceProvider {
    dir: PathBuf,
}

impl FilePersistenceProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        let invalid = id.is_empty()
            || id.contains(['/', '\\'])
            || id == "."
            || id == "..";
        if invalid {
            return Err(AgentCoreError::Persistence(format!(
                "`{id}` is not a valid storage id"
            )));
        }
        Ok(self.dir.join(format!("{id}.{EXTENSION}")))
    }
}

fn io_error(action: &str, path: &Path, err: std::io::Error) -> AgentCoreError {
    AgentCoreError::Persistence(format!("{action} {}: {err}", path.display()))
}

#[async_trait]
impl PersistenceProvider for FilePersistenceProvider {
    async fn save(&self, id: &str, text: String) -> Result<()> {
        let path = self.path_for(id)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error("create", &self.dir, e))?;
        tokio::fs::write(&path, text)
            .await
            .map_err(|e| io_error("write", &path, e))?;
        debug!(path = %path.display(), "saved");
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<String>> {
        let path = self.path_for(id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error("read", &path, err)),
        }
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        for id in ids {
            let path = self.path_for(id)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(io_error("delete", &path, err)),
            }
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error("clear", &self.dir, err)),
        }
    }
}
