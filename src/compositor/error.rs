//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载合成链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//!
//! 错误分为两类：
//! - 致命错误：校验失败、底图无法读取/解码，直接返回给调用方
//! - 可降级错误：Logo 资源缺失、合成阶段失败，内部吞掉并返回原始底图

/// 合成链路统一错误类型。
#[derive(Debug, thiserror::Error)]
pub enum CompositeError {
    #[error("参数校验失败：{0}")]
    Validation(String),

    #[error("解码错误：{0}")]
    Decode(String),

    #[error("格式错误：{0}")]
    InvalidFormat(String),

    #[error("网络错误：{0}")]
    Network(String),

    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("超时错误：{0}")]
    Timeout(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("Logo 资源缺失：{0}")]
    AssetMissing(String),

    #[error("合成失败：{0}")]
    Compositing(String),
}

impl CompositeError {
    /// 稳定错误码，供边界层序列化给调用方。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Decode(_) => "DECODE_ERROR",
            Self::InvalidFormat(_) => "INVALID_FORMAT",
            Self::Network(_) => "NETWORK_ERROR",
            Self::FileSystem(_) => "FILE_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::ResourceLimit(_) => "RESOURCE_LIMIT",
            Self::AssetMissing(_) => "ASSET_MISSING",
            Self::Compositing(_) => "COMPOSITING_ERROR",
        }
    }

    /// 错误发生的阶段（用于日志聚合）。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validate",
            Self::Network(_) | Self::FileSystem(_) | Self::Timeout(_) => "load",
            Self::Decode(_) | Self::InvalidFormat(_) | Self::ResourceLimit(_) => "decode",
            Self::AssetMissing(_) => "resolve",
            Self::Compositing(_) => "composite",
        }
    }

    /// 是否属于“可降级”错误：吞掉后返回未加 Logo 的底图。
    pub fn is_degradable(&self) -> bool {
        matches!(self, Self::AssetMissing(_) | Self::Compositing(_))
    }

    /// 映射到 HTTP 语义状态码。
    pub fn status(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::Decode(_) | Self::InvalidFormat(_) => 400,
            Self::FileSystem(_) => 400,
            Self::ResourceLimit(_) => 413,
            Self::Network(_) => 502,
            Self::Timeout(_) => 504,
            Self::AssetMissing(_) | Self::Compositing(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_asset_and_compositing_errors_degrade() {
        assert!(CompositeError::AssetMissing("x".into()).is_degradable());
        assert!(CompositeError::Compositing("x".into()).is_degradable());
        assert!(!CompositeError::Decode("x".into()).is_degradable());
        assert!(!CompositeError::Validation("x".into()).is_degradable());
    }

    #[test]
    fn validation_maps_to_bad_request() {
        let err = CompositeError::Validation("logoSizePercent".into());
        assert_eq!(err.status(), 400);
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(err.stage(), "validate");
    }
}
