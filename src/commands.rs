//! # 命令层
//!
//! ## 设计思路
//!
//! 命令层只做参数适配与结果包装，不承载业务逻辑：
//! - `composite`：请求 JSON → `CompositorService`
//! - `generate`：帖子表单 → 提示词 → 生成服务 → 合成
//! - `health`：生成服务健康报告
//!
//! 所有命令都返回 `CommandOutput`，由 `main.rs` 负责打印与退出码，便于测试直接断言。

use crate::compositor::{ApiResponse, CompositingRequestBody, CompositorService, Corner, VisualStyle};
use crate::error::AppError;
use crate::provider::{AspectRatio, HealthReport, ImageProvider, PostRequest, ResilientProvider, build_prompt};

/// 命令输出：响应体 + 可选的 PNG 字节（用于 `--output`）。
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub response: ApiResponse,
    pub png: Option<Vec<u8>>,
}

impl CommandOutput {
    fn failure(error: &AppError) -> Self {
        log::warn!("⚠️ 命令失败 [{}]：{}", error.code(), error);
        Self {
            response: error.to_response(),
            png: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.response.is_success()
    }
}

/// `generate` 命令参数（字符串形式，统一在这里校验）。
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub message: String,
    pub headline: Option<String>,
    pub style: String,
    pub aspect_ratio: String,
    pub position: String,
    pub logo_size_percent: Option<f64>,
    pub logo_opacity_percent: Option<f64>,
    pub logo_rotation_degrees: Option<f64>,
}

/// 执行合成请求。
pub async fn composite(service: &CompositorService, raw_request: &str) -> CommandOutput {
    let result = async {
        let body: CompositingRequestBody = serde_json::from_str(raw_request)?;
        Ok::<_, AppError>(service.composite(&body).await?)
    }
    .await;

    match result {
        Ok(result) => CommandOutput {
            response: ApiResponse::success(&result),
            png: Some(result.png),
        },
        Err(e) => CommandOutput::failure(&e),
    }
}

/// 生成插画并叠加 Logo。
///
/// 合成参数在调用生成服务之前先校验，避免为一个注定失败的请求付费生成。
pub async fn generate<P>(service: &CompositorService, provider: &P, options: &GenerateOptions) -> CommandOutput
where
    P: ImageProvider + ?Sized,
{
    match generate_inner(service, provider, options).await {
        Ok(output) => output,
        Err(e) => CommandOutput::failure(&e),
    }
}

async fn generate_inner<P>(
    service: &CompositorService,
    provider: &P,
    options: &GenerateOptions,
) -> Result<CommandOutput, AppError>
where
    P: ImageProvider + ?Sized,
{
    let style: VisualStyle = options.style.parse()?;
    let corner: Corner = options.position.parse()?;
    let aspect_ratio: AspectRatio = options.aspect_ratio.parse()?;

    let mut body = CompositingRequestBody {
        image_source: "pending".to_string(),
        style: style.as_str().to_string(),
        position: corner.as_str().to_string(),
        logo_size_percent: options.logo_size_percent,
        logo_opacity_percent: options.logo_opacity_percent,
        logo_rotation_degrees: options.logo_rotation_degrees,
    };
    body.validate()?;

    let prompt = build_prompt(
        &PostRequest {
            message: options.message.clone(),
            headline: options.headline.clone(),
            style,
            aspect_ratio,
        },
        corner,
    )?;

    let generated = provider.generate(&prompt).await?;
    log::info!(
        "✅ {} 生成完成 - {} {} 字节",
        provider.name(),
        generated.mime_type,
        generated.bytes.len()
    );

    body.image_source = generated.to_data_url();
    let result = service.composite(&body).await?;

    Ok(CommandOutput {
        response: ApiResponse::success(&result),
        png: Some(result.png),
    })
}

/// 健康检查。
pub async fn health<P: ImageProvider>(provider: &ResilientProvider<P>) -> HealthReport {
    provider.health().await
}
