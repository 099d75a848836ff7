//! # 生成服务错误模型
//!
//! 与合成链路的 `CompositeError` 分开：生成服务的错误需要额外回答两个问题
//! 1. 是否值得重试（[`Retryable`]）
//! 2. 是否计入熔断失败次数（`counts_against_breaker`）
//!
//! 客户端类错误（参数、鉴权）说明服务本身可达，不计入熔断。

use crate::resilience::Retryable;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("生成服务配置错误：{0}")]
    Config(String),

    #[error("生成请求参数错误：{0}")]
    Validation(String),

    #[error("生成服务超时（{after_ms}ms）")]
    Timeout { after_ms: u64 },

    #[error("生成服务网络错误：{0}")]
    Network(String),

    #[error("生成服务返回 HTTP {status}：{message}")]
    Http {
        status: u16,
        message: String,
        retry_after_ms: Option<u64>,
    },

    #[error("生成服务响应无效：{0}")]
    InvalidResponse(String),

    #[error("生成服务熔断中，{retry_in_ms}ms 后再试")]
    CircuitOpen { retry_in_ms: u64 },
}

impl ProviderError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "PROVIDER_CONFIG_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Timeout { .. } => "PROVIDER_TIMEOUT",
            Self::Network(_) => "PROVIDER_NETWORK_ERROR",
            Self::Http { .. } => "PROVIDER_HTTP_ERROR",
            Self::InvalidResponse(_) => "PROVIDER_INVALID_RESPONSE",
            Self::CircuitOpen { .. } => "CIRCUIT_OPEN",
        }
    }

    /// 映射到 HTTP 语义状态码。
    pub fn status(&self) -> u16 {
        match self {
            Self::Config(_) => 500,
            Self::Validation(_) => 400,
            Self::Timeout { .. } => 504,
            Self::Network(_) | Self::Http { .. } | Self::InvalidResponse(_) => 502,
            Self::CircuitOpen { .. } => 503,
        }
    }

    /// 是否说明上游不健康，需要计入熔断失败。
    pub fn counts_against_breaker(&self) -> bool {
        self.is_retryable()
    }
}

impl Retryable for ProviderError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Network(_) => true,
            Self::Http { status, .. } => *status == 408 || *status == 429 || (500..=599).contains(status),
            Self::Config(_) | Self::Validation(_) | Self::InvalidResponse(_) | Self::CircuitOpen { .. } => false,
        }
    }

    fn retry_after_hint_ms(&self) -> Option<u64> {
        match self {
            Self::Http { retry_after_ms, .. } => *retry_after_ms,
            _ => None,
        }
    }
}
