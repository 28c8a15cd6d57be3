use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::tools::manifest::ToolDefinition;

/// Named arguments passed to a tool after coercion.
pub type ToolArguments = Map<String, Value>;

/// A tool call requested by a model.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolInvocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ToolInvocation {
    pub fn new<T: Into<String>>(name: T, input: Value) -> Self {
        Self {
            id: None,
            name: name.into(),
            input,
            metadata: None,
        }
    }

    pub fn with_id<T: Into<String>>(mut self, id: T) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Arguments as an object; a scalar input becomes `{"input": value}`.
    pub fn arguments(&self) -> ToolArguments {
        match &self.input {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("input".to_string(), other.clone());
                map
            }
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> &ToolDefinition;

    fn name(&self) -> &str {
        &self.definition().name
    }

    async fn call(&self, arguments: ToolArguments) -> Result<String>;
}

pub type DynTool = Arc<dyn Tool>;

type ToolHandler = Arc<dyn Fn(ToolArguments) -> BoxFuture<'static, Result<String>> + Send + Sync>;

/// Tool backed by an async closure.
#[derive(Clone)]
pub struct FunctionTool {
    definition: ToolDefinition,
    handler: ToolHandler,
}

impl FunctionTool {
    pub fn new<F, Fut>(definition: ToolDefinition, handler: F) -> Self
    where
        F: Fn(ToolArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        Self {
            definition,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }

    pub fn from_fn<F>(definition: ToolDefinition, handler: F) -> Self
    where
        F: Fn(ToolArguments) -> Result<String> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        Self::new(definition, move |args| {
            let handler = handler.clone();
            async move { handler(args) }
        })
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn call(&self, arguments: ToolArguments) -> Result<String> {
        (self.handler)(arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_input_is_wrapped() {
        let invocation = ToolInvocation::new("echo", json!("hi"));
        assert_eq!(invocation.arguments().get("input"), Some(&json!("hi")));
    }

    #[tokio::test]
    async fn function_tool_calls_handler() {
        let definition = ToolDefinition::builder("upper").build().unwrap();
        let tool = FunctionTool::from_fn(definition, |args| {
            Ok(args
                .get("input")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_uppercase())
        });
        let mut args = ToolArguments::new();
        args.insert("input".into(), json!("abc"));
        assert_eq!(tool.call(args).await.unwrap(), "ABC");
    }
}
