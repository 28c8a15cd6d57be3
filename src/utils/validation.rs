use crate::error::{AgentCoreError, Result};

/// 配置验证器
pub struct ConfigValidator;

impl ConfigValidator {
    /// 验证节点或存储 ID：只允许字母、数字、下划线和短横线
    pub fn validate_id(kind: &str, id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(AgentCoreError::InvalidConfig(format!("{kind} id must not be empty")));
        }
        if !id.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
            return Err(AgentCoreError::InvalidConfig(format!(
                "{kind} id `{id}` may only contain letters, digits, `_` and `-`"
            )));
        }
        Ok(())
    }

    /// 验证流程名称
    pub fn validate_flow_name(name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(AgentCoreError::InvalidConfig("flow name must not be empty".into()));
        }
        if name.chars().count() > 100 {
            return Err(AgentCoreError::InvalidConfig(
                "flow name is longer than 100 characters".into(),
            ));
        }
        Ok(())
    }

    /// 验证 Redis 连接串
    pub fn validate_redis_url(url: &str) -> Result<()> {
        if !url.starts_with("redis://") && !url.starts_with("rediss://") {
            return Err(AgentCoreError::InvalidConfig(format!(
                "redis url `{url}` must start with redis:// or rediss://"
            )));
        }
        Ok(())
    }

    /// 验证温度参数
    pub fn validate_temperature(temperature: f32) -> Result<()> {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(AgentCoreError::InvalidConfig(format!(
                "temperature must be within 0.0..=2.0, got {temperature}"
            )));
        }
        Ok(())
    }

    /// 验证计数类参数（轮数、步数、重试次数）至少为 1
    pub fn validate_positive(name: &str, value: u32) -> Result<()> {
        if value == 0 {
            return Err(AgentCoreError::InvalidConfig(format!("{name} must be at least 1")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(ConfigValidator::validate_id("flow", "").is_err());
        assert!(ConfigValidator::validate_id("flow", "flow-1").is_ok());
        assert!(ConfigValidator::validate_id("flow", "flow_1").is_ok());
        assert!(ConfigValidator::validate_id("flow", "flow@1").is_err());
    }

    #[test]
    fn test_validate_redis_url() {
        assert!(ConfigValidator::validate_redis_url("http://localhost").is_err());
        assert!(ConfigValidator::validate_redis_url("redis://127.0.0.1:6379").is_ok());
    }

    #[test]
    fn test_validate_temperature() {
        assert!(ConfigValidator::validate_temperature(-0.1).is_err());
        assert!(ConfigValidator::validate_temperature(0.0).is_ok());
        assert!(ConfigValidator::validate_temperature(2.0).is_ok());
        assert!(ConfigValidator::validate_temperature(2.1).is_err());
    }
}
