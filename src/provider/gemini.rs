//! # Gemini 图片生成客户端
//!
//! ## 实现思路
//!
//! - 生成：`POST {base_url}/models/{model}:generateContent`，鉴权走 `x-goog-api-key` 请求头
//!   （不放进 query，避免 Key 出现在日志与代理记录里）
//! - 响应：遍历 `candidates[*].content.parts[*]`，取第一个 `inlineData`（Base64）
//! - 健康检查：`GET {base_url}/models/{model}`，只看状态码
//!
//! 该类型只做单次调用，重试与熔断由 `ResilientProvider` 负责。

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::{GeneratedImage, ImageProvider, PromptRequest, ProviderConfig, ProviderError};
use crate::resilience::retry_after_hint_ms;

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [RequestContent<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: [&'static str; 1],
    image_config: ImageConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: &'static str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: Option<String>,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

pub struct GeminiProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl GeminiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .build()
            .map_err(|e| ProviderError::Config(format!("无法创建 HTTP 客户端：{}", e)))?;
        Ok(Self { client, config })
    }

    fn model_url(&self) -> String {
        format!(
            "{}/models/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl ImageProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &PromptRequest) -> Result<GeneratedImage, ProviderError> {
        let api_key = self.config.require_api_key()?;
        let body = GenerateContentRequest {
            contents: [RequestContent {
                parts: [RequestPart { text: &request.prompt }],
            }],
            generation_config: GenerationConfig {
                response_modalities: ["IMAGE"],
                image_config: ImageConfig {
                    aspect_ratio: request.aspect_ratio.as_str(),
                },
            },
        };

        log::info!(
            "🎨 请求生成图片 - 模型: {} 画幅: {} 提示词长度: {}",
            self.config.model,
            request.aspect_ratio,
            request.prompt.chars().count()
        );

        let response = self
            .client
            .post(format!("{}:generateContent", self.model_url()))
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let response = ensure_success(response).await?;
        let payload: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("响应不是合法 JSON：{}", e)))?;

        extract_image(payload)
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let api_key = self.config.require_api_key()?;
        let response = self
            .client
            .get(self.model_url())
            .header(API_KEY_HEADER, api_key)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        ensure_success(response).await?;
        Ok(())
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after_ms = retry_after_hint_ms(response.headers());
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorEnvelope>(&text)
        .map(|envelope| envelope.error.message)
        .ok()
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("请求失败").to_string());

    Err(ProviderError::Http {
        status: status.as_u16(),
        message,
        retry_after_ms,
    })
}

fn extract_image(payload: GenerateContentResponse) -> Result<GeneratedImage, ProviderError> {
    if let Some(reason) = payload.prompt_feedback.and_then(|feedback| feedback.block_reason) {
        return Err(ProviderError::InvalidResponse(format!("提示词被拦截：{}", reason)));
    }

    let mut finish_reason = None;
    for candidate in payload.candidates {
        if finish_reason.is_none() {
            finish_reason = candidate.finish_reason;
        }
        let parts = candidate.content.map(|content| content.parts).unwrap_or_default();
        for part in parts {
            let Some(inline) = part.inline_data else {
                continue;
            };
            let bytes = STANDARD
                .decode(inline.data.trim())
                .map_err(|e| ProviderError::InvalidResponse(format!("图片 Base64 解码失败：{}", e)))?;
            if bytes.is_empty() {
                return Err(ProviderError::InvalidResponse("图片数据为空".to_string()));
            }
            return Ok(GeneratedImage {
                bytes: Bytes::from(bytes),
                mime_type: inline.mime_type.unwrap_or_else(|| "image/png".to_string()),
            });
        }
    }

    Err(ProviderError::InvalidResponse(format!(
        "响应中没有图片（finishReason: {}）",
        finish_reason.as_deref().unwrap_or("unknown")
    )))
}

fn map_reqwest_error(e: reqwest::Error) -> ProviderError {
    let (timed_out, connect) = (e.is_timeout(), e.is_connect());
    let message = e.without_url().to_string();
    if timed_out {
        ProviderError::Network(format!("请求超时：{}", message))
    } else if connect {
        ProviderError::Network(format!("无法连接：{}", message))
    } else {
        ProviderError::Network(format!("请求失败：{}", message))
    }
}
