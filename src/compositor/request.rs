//! # 请求契约
//!
//! ## 设计思路
//!
//! 边界层收到的 JSON 先反序列化为宽松的 `CompositingRequestBody`（字段缺省、字符串枚举），
//! 再通过 `validate` 一次性转换为强类型的 `CompositingRequest`。
//! 任何字段非法都会在流水线启动前整体拒绝，流水线内部只接触已校验的值。

use serde::{Deserialize, Serialize};

use super::CompositeError;
use super::placement::{Corner, MAX_SIZE_PERCENT, MIN_SIZE_PERCENT};
use super::source::ImageSource;
use super::style::VisualStyle;

pub const DEFAULT_SIZE_PERCENT: f64 = 35.0;
pub const DEFAULT_OPACITY_PERCENT: f64 = 100.0;
pub const DEFAULT_ROTATION_DEGREES: f64 = 0.0;

/// 调用方提交的原始请求体（camelCase）。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositingRequestBody {
    #[serde(default)]
    pub image_source: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub position: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_size_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_opacity_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_rotation_degrees: Option<f64>,
}

/// 已校验的合成请求。
#[derive(Debug, Clone, PartialEq)]
pub struct CompositingRequest {
    pub source: ImageSource,
    pub style: VisualStyle,
    pub corner: Corner,
    pub size_percent: f64,
    pub opacity_percent: f64,
    pub rotation_degrees: f64,
}

impl CompositingRequestBody {
    pub fn validate(&self) -> Result<CompositingRequest, CompositeError> {
        if self.image_source.trim().is_empty() {
            return Err(CompositeError::Validation("imageSource 不能为空".to_string()));
        }
        if self.style.trim().is_empty() {
            return Err(CompositeError::Validation("style 不能为空".to_string()));
        }
        if self.position.trim().is_empty() {
            return Err(CompositeError::Validation("position 不能为空".to_string()));
        }

        let style: VisualStyle = self.style.parse()?;
        let corner: Corner = self.position.parse()?;

        let size_percent = in_range(
            "logoSizePercent",
            self.logo_size_percent.unwrap_or(DEFAULT_SIZE_PERCENT),
            MIN_SIZE_PERCENT,
            MAX_SIZE_PERCENT,
        )?;
        let opacity_percent = in_range(
            "logoOpacityPercent",
            self.logo_opacity_percent.unwrap_or(DEFAULT_OPACITY_PERCENT),
            0.0,
            100.0,
        )?;
        let rotation_degrees = in_range(
            "logoRotationDegrees",
            self.logo_rotation_degrees.unwrap_or(DEFAULT_ROTATION_DEGREES),
            -180.0,
            180.0,
        )?;

        Ok(CompositingRequest {
            source: ImageSource::classify(&self.image_source),
            style,
            corner,
            size_percent,
            opacity_percent,
            rotation_degrees,
        })
    }
}

fn in_range(field: &str, value: f64, min: f64, max: f64) -> Result<f64, CompositeError> {
    if !value.is_finite() || value < min || value > max {
        return Err(CompositeError::Validation(format!(
            "{} 必须在 {}~{} 之间：{}",
            field, min, max, value
        )));
    }
    Ok(value)
}

/// 成功响应。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeResponse {
    pub image_url: String,
}

/// 失败响应：`{ "error": "...", "code": "..." }`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

impl From<&CompositeError> for ErrorBody {
    fn from(error: &CompositeError) -> Self {
        Self {
            error: error.to_string(),
            code: error.code().to_string(),
        }
    }
}
