//! # 服务层（请求边界）
//!
//! ## 设计思路
//!
//! 使用 `CompositorService` 包装共享的 `LogoCompositor`，替代全局单例。
//! 服务层负责：
//! 1. 解析 JSON 请求体并校验
//! 2. 调用合成器
//! 3. 把结果或错误映射为 `(status, body)`，body 为 `{ imageUrl }` 或 `{ error, code }`
//!
//! 实例可 `Clone`，内部通过 `Arc` 共享同一份只读配置与 Logo 目录。

use std::sync::Arc;

use serde::Serialize;

use super::request::{CompositeResponse, CompositingRequestBody, ErrorBody};
use super::{CompositeError, CompositingResult, LogoCompositor};

/// 边界层响应：HTTP 语义状态码 + JSON 体。
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl ApiResponse {
    pub fn success(result: &CompositingResult) -> Self {
        Self::json(
            200,
            &CompositeResponse {
                image_url: result.data_url.clone(),
            },
        )
    }

    pub fn failure(status: u16, error: ErrorBody) -> Self {
        Self::json(status, &error)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn json<T: Serialize>(status: u16, body: &T) -> Self {
        let body = serde_json::to_value(body).unwrap_or_else(|e| {
            serde_json::json!({ "error": format!("响应序列化失败：{}", e), "code": "INTERNAL_ERROR" })
        });
        Self { status, body }
    }
}

impl From<&CompositeError> for ApiResponse {
    fn from(error: &CompositeError) -> Self {
        Self::failure(error.status(), ErrorBody::from(error))
    }
}

#[derive(Clone)]
pub struct CompositorService {
    compositor: Arc<LogoCompositor>,
}

impl CompositorService {
    pub fn new(compositor: LogoCompositor) -> Self {
        Self {
            compositor: Arc::new(compositor),
        }
    }

    pub fn compositor(&self) -> &LogoCompositor {
        &self.compositor
    }

    /// 校验请求体并执行合成。
    pub async fn composite(&self, body: &CompositingRequestBody) -> Result<CompositingResult, CompositeError> {
        let request = body.validate()?;
        log::info!(
            "📝 收到合成请求 - 来源: {} 风格: {} 位置: {} 尺寸: {}% 不透明度: {}% 旋转: {}°",
            request.source.hint(),
            request.style,
            request.corner,
            request.size_percent,
            request.opacity_percent,
            request.rotation_degrees
        );
        self.compositor.process(&request).await
    }

    /// 处理原始 JSON 请求体。
    pub async fn handle_json(&self, raw_body: &str) -> ApiResponse {
        let body: CompositingRequestBody = match serde_json::from_str(raw_body) {
            Ok(body) => body,
            Err(e) => {
                let error = CompositeError::Validation(format!("请求体不是合法 JSON：{}", e));
                return ApiResponse::from(&error);
            }
        };
        self.handle(&body).await
    }

    pub async fn handle(&self, body: &CompositingRequestBody) -> ApiResponse {
        match self.composite(body).await {
            Ok(result) => ApiResponse::success(&result),
            Err(e) => {
                log::warn!("⚠️ 合成请求失败 [{}@{}]：{}", e.code(), e.stage(), e);
                ApiResponse::from(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::CompositorConfig;

    fn service() -> CompositorService {
        CompositorService::new(LogoCompositor::new(CompositorConfig::default()).expect("compositor init failed"))
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let response = service().handle_json("{ not json").await;

        assert_eq!(response.status, 400);
        assert_eq!(response.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn invalid_size_is_rejected_before_loading() {
        let response = service()
            .handle_json(r#"{"imageSource":"/does/not/exist.png","style":"isometric","position":"bottom-left","logoSizePercent":150}"#)
            .await;

        assert_eq!(response.status, 400);
        assert_eq!(response.body["code"], "VALIDATION_ERROR");
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn private_url_is_rejected() {
        let response = service()
            .handle_json(r#"{"imageSource":"http://127.0.0.1/a.png","style":"isometric","position":"bottom-left"}"#)
            .await;

        assert_eq!(response.status, 400);
        assert!(response.body["error"].as_str().is_some());
    }
}
