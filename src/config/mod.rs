pub mod env;

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{agent, flow, group};
use crate::error::{AgentCoreError, Result};
use crate::llm::RetryPolicy;
use crate::persistence::{DynPersistenceProvider, PersistenceConfig, PersistenceKind};
use crate::utils::ConfigValidator;

pub use env::EnvConfig;

/// 运行时配置：JSON 文件 + `AGENTCORE_*` 环境变量覆盖
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default = "default_agent_max_round")]
    pub agent_max_round: u32,
    #[serde(default = "default_agent_max_turns")]
    pub agent_max_turns: u32,
    #[serde(default = "default_group_max_round")]
    pub group_max_round: u32,
    #[serde(default = "default_flow_max_steps")]
    pub flow_max_steps: u32,
    /// Model used by LLM nodes that name none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    /// Log filter used when `RUST_LOG` is unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
}

fn default_agent_max_round() -> u32 {
    agent::DEFAULT_MAX_ROUND
}

fn default_agent_max_turns() -> u32 {
    agent::DEFAULT_MAX_TURNS
}

fn default_group_max_round() -> u32 {
    group::DEFAULT_MAX_ROUND
}

fn default_flow_max_steps() -> u32 {
    flow::DEFAULT_MAX_STEPS
}

/// Round and turn defaults for agents and groups built at run time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundLimits {
    pub agent_max_round: u32,
    pub agent_max_turns: u32,
    pub group_max_round: u32,
}

impl Default for RoundLimits {
    fn default() -> Self {
        Self {
            agent_max_round: agent::DEFAULT_MAX_ROUND,
            agent_max_turns: agent::DEFAULT_MAX_TURNS,
            group_max_round: group::DEFAULT_MAX_ROUND,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            persistence: PersistenceConfig::default(),
            retry: RetryPolicy::default(),
            agent_max_round: default_agent_max_round(),
            agent_max_turns: default_agent_max_turns(),
            group_max_round: default_group_max_round(),
            flow_max_steps: default_flow_max_steps(),
            default_model: None,
            log_filter: None,
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|err| AgentCoreError::InvalidConfig(format!("runtime config: {err}")))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            AgentCoreError::InvalidConfig(format!("read {}: {err}", path.display()))
        })?;
        Self::from_json(&text)
    }

    /// Defaults (or the file at `path`), then environment overrides, then
    /// validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        debug!(persistence = %config.persistence.kind, max_steps = config.flow_max_steps, "runtime config loaded");
        Ok(config)
    }

    pub fn round_limits(&self) -> RoundLimits {
        RoundLimits {
            agent_max_round: self.agent_max_round,
            agent_max_turns: self.agent_max_turns,
            group_max_round: self.group_max_round,
        }
    }

    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(kind) = EnvConfig::parse_env::<PersistenceKind>(env::ENV_PERSISTENCE)? {
            self.persistence.kind = kind;
        }
        if let Some(dir) = EnvConfig::get_env_optional(env::ENV_DATA_DIR) {
            self.persistence.dir = dir.into();
        }
        if let Some(url) = EnvConfig::get_env_optional(env::ENV_REDIS_URL) {
            self.persistence.redis_url = Some(url);
        }
        if let Some(model) = EnvConfig::get_env_optional(env::ENV_DEFAULT_MODEL) {
            self.default_model = Some(model);
        }
        if let Some(value) = EnvConfig::parse_env(env::ENV_MAX_ROUND)? {
            self.agent_max_round = value;
        }
        if let Some(value) = EnvConfig::parse_env(env::ENV_GROUP_MAX_ROUND)? {
            self.group_max_round = value;
        }
        if let Some(value) = EnvConfig::parse_env(env::ENV_MAX_TURNS)? {
            self.agent_max_turns = value;
        }
        if let Some(value) = EnvConfig::parse_env(env::ENV_MAX_STEPS)? {
            self.flow_max_steps = value;
        }
        if let Some(value) = EnvConfig::parse_env(env::ENV_RETRY_ATTEMPTS)? {
            self.retry.max_attempts = value;
        }
        if let Some(filter) = EnvConfig::get_env_optional(env::ENV_LOG) {
            self.log_filter = Some(filter);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        ConfigValidator::validate_positive("agent_max_round", self.agent_max_round)?;
        ConfigValidator::validate_positive("agent_max_turns", self.agent_max_turns)?;
        ConfigValidator::validate_positive("group_max_round", self.group_max_round)?;
        ConfigValidator::validate_positive("flow_max_steps", self.flow_max_steps)?;
        ConfigValidator::validate_positive("retry.max_attempts", self.retry.max_attempts)?;
        if self.persistence.kind == PersistenceKind::Redis {
            let raw = self.persistence.redis_url.as_deref().unwrap_or_default();
            let url = EnvConfig::resolve(raw, env::ENV_REDIS_URL)?;
            ConfigValidator::validate_redis_url(&url)?;
        }
        Ok(())
    }

    /// The configured persistence provider; a `${VAR}` redis url is
    /// resolved from the environment first.
    pub fn persistence_provider(&self) -> Result<DynPersistenceProvider> {
        let mut persistence = self.persistence.clone();
        if persistence.kind == PersistenceKind::Redis {
            let raw = persistence.redis_url.as_deref().unwrap_or_default();
            persistence.redis_url = Some(EnvConfig::resolve(raw, env::ENV_REDIS_URL)?);
        }
        persistence.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = RuntimeConfig::from_json(r#"{"flow_max_steps": 10}"#).unwrap();
        assert_eq!(config.flow_max_steps, 10);
        assert_eq!(config.group_max_round, group::DEFAULT_MAX_ROUND);
        assert_eq!(config.persistence.kind, PersistenceKind::Temporary);
    }

    #[test]
    fn round_limits_follow_the_config() {
        let config = RuntimeConfig::from_json(r#"{"agent_max_round": 3, "group_max_round": 7}"#).unwrap();
        let limits = config.round_limits();
        assert_eq!(limits.agent_max_round, 3);
        assert_eq!(limits.group_max_round, 7);
        assert_eq!(limits.agent_max_turns, agent::DEFAULT_MAX_TURNS);
        assert_eq!(RuntimeConfig::default().round_limits(), RoundLimits::default());
    }

    #[test]
    fn zero_steps_is_rejected() {
        let config = RuntimeConfig {
            flow_max_steps: 0,
            ..RuntimeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AgentCoreError::InvalidConfig(_))
        ));
    }
}
