//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义应用级 `AppError`，把合成链路、生成服务、配置与 I/O 错误收敛到一处，
//! CLI 与边界层只面对这一个类型。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息，`#[from]` 省去手动 map。
//! - `code()` / `status()` 透传到各层错误，保持错误码稳定。
//! - 实现 `Serialize`，序列化为 `{ "error": "...", "code": "..." }`。

use serde::Serialize;
use serde::ser::SerializeStruct;

use crate::compositor::{ApiResponse, CompositeError, ErrorBody};
use crate::provider::ProviderError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 合成链路错误（加载 / 解码 / 校验）
    #[error("{0}")]
    Composite(#[from] CompositeError),

    /// 生成服务错误（超时 / 熔断 / 上游失败）
    #[error("{0}")]
    Provider(#[from] ProviderError),

    /// 配置文件或环境变量不合法
    #[error("配置错误: {0}")]
    Config(String),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 解析/序列化错误
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Composite(e) => e.code(),
            Self::Provider(e) => e.code(),
            Self::Config(_) => "CONFIG_ERROR",
            Self::Io(_) => "FILE_ERROR",
            Self::Json(_) => "VALIDATION_ERROR",
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            Self::Composite(e) => e.status(),
            Self::Provider(e) => e.status(),
            Self::Json(_) => 400,
            Self::Config(_) | Self::Io(_) => 500,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
            code: self.code().to_string(),
        }
    }

    pub fn to_response(&self) -> ApiResponse {
        ApiResponse::failure(self.status(), self.to_body())
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("AppError", 2)?;
        state.serialize_field("error", &self.to_string())?;
        state.serialize_field("code", self.code())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_error_and_code() {
        let err = AppError::from(ProviderError::CircuitOpen { retry_in_ms: 1200 });

        let json = serde_json::to_value(&err).expect("serialize failed");

        assert_eq!(json["code"], "CIRCUIT_OPEN");
        assert!(json["error"].as_str().is_some_and(|msg| msg.contains("1200")));
        assert_eq!(err.status(), 503);
    }

    #[test]
    fn composite_errors_keep_their_status() {
        let err = AppError::from(CompositeError::ResourceLimit("too big".to_string()));

        let response = err.to_response();

        assert_eq!(response.status, 413);
        assert_eq!(response.body["code"], "RESOURCE_LIMIT");
    }
}
