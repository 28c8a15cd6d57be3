use std::env;
use std::str::FromStr;

use crate::error::{AgentCoreError, Result};

pub const ENV_PERSISTENCE: &str = "AGENTCORE_PERSISTENCE";
pub const ENV_DATA_DIR: &str = "AGENTCORE_DATA_DIR";
pub const ENV_REDIS_URL: &str = "AGENTCORE_REDIS_URL";
pub const ENV_DEFAULT_MODEL: &str = "AGENTCORE_DEFAULT_MODEL";
pub const ENV_MAX_ROUND: &str = "AGENTCORE_MAX_ROUND";
pub const ENV_GROUP_MAX_ROUND: &str = "AGENTCORE_GROUP_MAX_ROUND";
pub const ENV_MAX_TURNS: &str = "AGENTCORE_MAX_TURNS";
pub const ENV_MAX_STEPS: &str = "AGENTCORE_MAX_STEPS";
pub const ENV_RETRY_ATTEMPTS: &str = "AGENTCORE_RETRY_ATTEMPTS";
pub const ENV_LOG: &str = "AGENTCORE_LOG";

/// 环境变量配置管理
pub struct EnvConfig;

impl EnvConfig {
    /// 解析可能引用环境变量的配置值
    ///
    /// 优先级：
    /// 1. `${VAR_NAME}` 格式：读取该环境变量
    /// 2. 空值：读取 `default_env_var`
    /// 3. 其他：原样返回
    pub fn resolve(value: &str, default_env_var: &str) -> Result<String> {
        if value.starts_with("${") && value.ends_with('}') {
            let env_var_name = &value[2..value.len() - 1];
            Self::get_env(env_var_name)
        } else if value.is_empty() {
            Self::get_env(default_env_var)
        } else {
            Ok(value.to_string())
        }
    }

    /// 从环境变量获取值
    pub fn get_env(key: &str) -> Result<String> {
        env::var(key).map_err(|_| {
            AgentCoreError::InvalidConfig(format!("environment variable `{key}` is not set"))
        })
    }

    /// 获取可选的环境变量，空字符串视为未设置
    pub fn get_env_optional(key: &str) -> Option<String> {
        env::var(key).ok().filter(|value| !value.trim().is_empty())
    }

    /// 解析可选的环境变量
    pub fn parse_env<T>(key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match Self::get_env_optional(key) {
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|err| {
                AgentCoreError::InvalidConfig(format!("environment variable `{key}`: {err}"))
            }),
            None => Ok(None),
        }
    }
}

/// 宏：简化环境变量获取
#[macro_export]
macro_rules! env_var {
    ($key:expr) => {
        $crate::config::EnvConfig::get_env($key)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_direct() {
        let result = EnvConfig::resolve("redis://localhost:6379", "UNUSED_VAR");
        assert_eq!(result.unwrap(), "redis://localhost:6379");
    }

    #[test]
    fn test_resolve_placeholder() {
        env::set_var("AGENTCORE_TEST_RESOLVE", "redis://cache:6379");
        let result = EnvConfig::resolve("${AGENTCORE_TEST_RESOLVE}", "UNUSED_VAR");
        assert_eq!(result.unwrap(), "redis://cache:6379");
        env::remove_var("AGENTCORE_TEST_RESOLVE");
    }

    #[test]
    fn test_parse_env_reports_bad_numbers() {
        env::set_var("AGENTCORE_TEST_NUMBER", "many");
        assert!(EnvConfig::parse_env::<u32>("AGENTCORE_TEST_NUMBER").is_err());
        env::set_var("AGENTCORE_TEST_NUMBER", "12");
        assert_eq!(
            EnvConfig::parse_env::<u32>("AGENTCORE_TEST_NUMBER").unwrap(),
            Some(12)
        );
        env::remove_var("AGENTCORE_TEST_NUMBER");
    }
}
