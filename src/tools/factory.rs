use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{AgentCoreError, Result};
use crate::tools::builtin::{ConstantTool, EchoTool};
use crate::tools::tool::DynTool;

pub type ToolFactory = Arc<dyn Fn(Option<Value>) -> Result<DynTool> + Send + Sync>;

/// Builds tools from a factory name plus JSON configuration, so persisted
/// flow nodes can describe their tools declaratively.
#[derive(Clone, Default)]
pub struct ToolFactoryRegistry {
    factories: HashMap<String, ToolFactory>,
}

impl ToolFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_builtin_tool_factories(&mut registry);
        registry
    }

    pub fn register_factory<T: Into<String>>(&mut self, name: T, factory: ToolFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn contains(&self, factory_name: &str) -> bool {
        self.factories.contains_key(factory_name)
    }

    pub fn build(&self, factory_name: &str, config: Option<Value>) -> Result<DynTool> {
        let factory = self
            .factories
            .get(factory_name)
            .ok_or_else(|| AgentCoreError::ToolNotRegistered(factory_name.to_string()))?;
        factory(config)
    }
}

fn extract_config<T: DeserializeOwned>(config: Option<Value>) -> Result<T> {
    let normalized = config.unwrap_or_else(|| Value::Object(serde_json::Map::new()));
    serde_json::from_value(normalized).map_err(|e| AgentCoreError::InvalidConfig(e.to_string()))
}

pub fn register_builtin_tool_factories(registry: &mut ToolFactoryRegistry) {
    registry.register_factory(
        "echo",
        Arc::new(|config| {
            #[derive(Deserialize)]
            struct Conf {
                #[serde(default = "default_prefix")]
                prefix: String,
            }
            fn default_prefix() -> String {
                "Echo".to_string()
            }
            let conf: Conf = extract_config(config)?;
            Ok(Arc::new(EchoTool::with_prefix(conf.prefix)) as DynTool)
        }),
    );
    registry.register_factory(
        "constant",
        Arc::new(|config| {
            #[derive(Deserialize)]
            struct Conf {
                name: String,
                #[serde(default)]
                description: String,
                value: String,
            }
            let conf: Conf = extract_config(config)?;
            Ok(Arc::new(ConstantTool::new(conf.name, conf.description, conf.value)?) as DynTool)
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_factory_is_reported() {
        let registry = ToolFactoryRegistry::with_builtins();
        assert!(matches!(
            registry.build("missing", None),
            Err(AgentCoreError::ToolNotRegistered(_))
        ));
    }

    #[test]
    fn constant_requires_value() {
        let registry = ToolFactoryRegistry::with_builtins();
        let result = registry.build("constant", Some(json!({"name": "now"})));
        assert!(matches!(result, Err(AgentCoreError::InvalidConfig(_))));
    }
}
