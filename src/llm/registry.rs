use std::collections::HashMap;
use std::sync::Arc;

use super::client::DynLlmClient;
use crate::error::{AgentCoreError, Result};

/// Model clients addressable by name from flow settings.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    clients: HashMap<String, DynLlmClient>,
    default_model: Option<String>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Into<String>>(&mut self, name: T, client: DynLlmClient) {
        let name = name.into();
        if self.default_model.is_none() {
            self.default_model = Some(name.clone());
        }
        self.clients.insert(name, client);
    }

    pub fn set_default<T: Into<String>>(&mut self, name: T) {
        self.default_model = Some(name.into());
    }

    pub fn get(&self, name: &str) -> Result<DynLlmClient> {
        self.clients
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| AgentCoreError::ModelNotRegistered(name.to_string()))
    }

    /// The named model, or the default when `name` is absent.
    pub fn resolve(&self, name: Option<&str>) -> Result<(String, DynLlmClient)> {
        let name = match name.or(self.default_model.as_deref()) {
            Some(name) => name.to_string(),
            None => return Err(AgentCoreError::ModelNotRegistered("<default>".to_string())),
        };
        let client = self.get(&name)?;
        Ok((name, client))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clients.keys().cloned().collect();
        names.sort();
        names
    }
}
