//! 生成服务配置：端点、模型、超时与容错策略，全部可由 JSON 局部覆盖。

use serde::{Deserialize, Serialize};

use super::ProviderError;
use crate::resilience::{BreakerConfig, RetryPolicy};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API Key。只从配置文件或环境变量读取，序列化时不输出。
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// 单次生成调用的超时（毫秒），由 `tokio::time::timeout` 强制执行。
    pub request_timeout_ms: u64,
    /// 建立连接超时（秒）。
    pub connect_timeout: u64,
    /// 健康检查超时（毫秒）。
    pub health_timeout_ms: u64,
    pub retry: RetryPolicy,
    pub breaker: BreakerConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: 60_000,
            connect_timeout: 10,
            health_timeout_ms: 5_000,
            retry: RetryPolicy::default(),
            breaker: BreakerConfig::default(),
        }
    }
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.model.trim().is_empty() {
            return Err(ProviderError::Config("model 不能为空".to_string()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ProviderError::Config(format!("base_url 必须是 HTTP/HTTPS 地址：{}", self.base_url)));
        }
        if !(1_000..=300_000).contains(&self.request_timeout_ms) {
            return Err(ProviderError::Config("request_timeout_ms 必须在 1000~300000 毫秒之间".to_string()));
        }
        if !(1..=120).contains(&self.connect_timeout) {
            return Err(ProviderError::Config("connect_timeout 必须在 1~120 秒之间".to_string()));
        }
        if !(1..=10).contains(&self.retry.max_attempts) {
            return Err(ProviderError::Config("retry.max_attempts 必须在 1~10 之间".to_string()));
        }
        if self.retry.max_delay_ms > self.retry.max_total_ms {
            return Err(ProviderError::Config("retry.max_delay_ms 不能大于 retry.max_total_ms".to_string()));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(ProviderError::Config("breaker.failure_threshold 必须大于 0".to_string()));
        }
        Ok(())
    }

    /// 取出非空 API Key。
    pub fn require_api_key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ProviderError::Config("缺少 API Key（设置 GEMINI_API_KEY 或配置 provider.api_key）".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_but_has_no_key() {
        let config = ProviderConfig::default();

        assert!(config.validate().is_ok());
        assert!(matches!(config.require_api_key(), Err(ProviderError::Config(_))));
    }

    #[test]
    fn api_key_is_never_serialized() {
        let config = ProviderConfig {
            api_key: Some("secret".to_string()),
            ..ProviderConfig::default()
        };

        let json = serde_json::to_string(&config).expect("serialize failed");

        assert!(!json.contains("secret"));
    }

    #[test]
    fn nested_policies_accept_partial_json() {
        let config: ProviderConfig =
            serde_json::from_str(r#"{ "retry": { "max_attempts": 5 }, "breaker": { "cooldown_ms": 1000 } }"#)
                .expect("parse failed");

        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 500);
        assert_eq!(config.breaker.cooldown_ms, 1000);
        assert_eq!(config.breaker.failure_threshold, 5);
    }
}
