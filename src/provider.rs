//! # 生成式图片服务模块（provider）
//!
//! ## 设计思路
//!
//! 生成服务是外部依赖，调用方只面向 [`ImageProvider`] trait：
//! - `gemini`：唯一的具体实现（HTTP + JSON）
//! - `resilient`：与具体实现无关的容错包装（熔断 + 重试 + 超时 + 健康检查）
//! - `prompt`：帖子表单 → 提示词
//!
//! ## 实现思路
//!
//! trait 通过 `async_trait` 支持 `dyn ImageProvider`，CLI 与测试可以替换为任意实现。

pub mod config;
pub mod error;
pub mod gemini;
pub mod prompt;
pub mod resilient;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;

pub use config::ProviderConfig;
pub use error::ProviderError;
pub use gemini::GeminiProvider;
pub use prompt::{AspectRatio, PostRequest, PromptRequest, build_prompt};
pub use resilient::{HealthReport, ResilientProvider};

/// 生成服务返回的图片。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Bytes,
    pub mime_type: String,
}

impl GeneratedImage {
    /// 包装为 Data URL，便于直接交给合成流水线的内联加载。
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// 服务名（日志与健康报告）。
    fn name(&self) -> &str;

    async fn generate(&self, request: &PromptRequest) -> Result<GeneratedImage, ProviderError>;

    /// 轻量可达性检查，不产生生成费用。
    async fn health_check(&self) -> Result<(), ProviderError>;
}
