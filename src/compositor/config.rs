//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `CompositorConfig`，保证运行时行为可观测、可调整、可测试。
//! 配置在构造 `LogoCompositor` 时显式传入，之后只读，不存在全局可变状态。
//!
//! ## 实现思路
//!
//! - `Default` 提供生产可用的配置（与线上行为一致的 20px 边距、200px 最小宽度）。
//! - 通过 `serde(default)` 支持从 JSON 局部覆盖。
//! - `validate` 集中做区间校验，非法配置在启动期即失败。

use std::path::PathBuf;

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use super::CompositeError;

/// Logo 缩放滤镜。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeFilter {
    Nearest,
    Bilinear,
    CatmullRom,
    Lanczos3,
}

impl ResizeFilter {
    pub(crate) fn to_image_filter(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Bilinear => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }

    pub(crate) fn to_fast_filter(self) -> fast_image_resize::FilterType {
        match self {
            Self::Nearest => fast_image_resize::FilterType::Box,
            Self::Bilinear => fast_image_resize::FilterType::Bilinear,
            Self::CatmullRom => fast_image_resize::FilterType::CatmullRom,
            Self::Lanczos3 => fast_image_resize::FilterType::Lanczos3,
        }
    }
}

/// 合成流水线配置。
///
/// 字段覆盖了加载、解码、Logo 资源、摆放与风格转换五个阶段。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// 下载/读取原始字节时允许的最大文件体积（字节）。
    pub max_file_size: u64,
    /// 网络下载超时时间（秒）。
    pub download_timeout: u64,
    /// 建立连接（TCP/TLS）超时时间（秒）。
    pub connect_timeout: u64,
    /// 最大重定向次数，避免无限跳转或恶意链路。
    pub max_redirects: usize,
    /// 是否允许访问内网或本地地址（默认关闭，防 SSRF）。
    pub allow_private_network: bool,
    /// 下载失败时最大尝试次数（含首次）。
    pub download_attempts: u8,
    /// 下载重试基础退避（毫秒）。
    pub download_retry_base_delay_ms: u64,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// Logo 资源目录。
    pub assets_dir: PathBuf,
    /// 彩色 Logo 文件名（相对 `assets_dir`）。
    pub full_color_logo: String,
    /// 单色 Logo 文件名（相对 `assets_dir`）。
    pub monochrome_logo: String,
    /// Logo 与底图边缘的距离（像素）。
    pub margin: u32,
    /// Logo 最小宽度（像素），保证小图上依然可读。
    pub min_logo_width: u32,
    /// Logo 缩放滤镜。
    pub resize_filter: ResizeFilter,
    /// 单色化：亮度阈值，低于该值判定为黑。
    pub luma_threshold: f32,
    /// 单色化：彩度阈值，高于该值的饱和色直接判定为黑。
    pub colorfulness_threshold: u16,
    /// 单色化：alpha 不高于该值的像素视为透明，填充为不透明白。
    pub transparent_alpha_floor: u8,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            max_file_size: 25 * 1024 * 1024,
            download_timeout: 30,
            connect_timeout: 8,
            max_redirects: 5,
            allow_private_network: false,
            download_attempts: 3,
            download_retry_base_delay_ms: 180,
            max_decoded_pixels: 40_000_000,
            assets_dir: PathBuf::from("assets"),
            full_color_logo: "logo.png".to_string(),
            monochrome_logo: "logo-mono.png".to_string(),
            margin: 20,
            min_logo_width: 200,
            resize_filter: ResizeFilter::Lanczos3,
            luma_threshold: 160.0,
            colorfulness_threshold: 60,
            transparent_alpha_floor: 10,
        }
    }
}

impl CompositorConfig {
    /// 校验配置取值区间。
    pub fn validate(&self) -> Result<(), CompositeError> {
        if self.max_file_size < 1024 {
            return Err(CompositeError::Validation("max_file_size 不能小于 1KB".to_string()));
        }
        if !(1..=300).contains(&self.download_timeout) {
            return Err(CompositeError::Validation("download_timeout 必须在 1~300 秒之间".to_string()));
        }
        if !(1..=120).contains(&self.connect_timeout) {
            return Err(CompositeError::Validation("connect_timeout 必须在 1~120 秒之间".to_string()));
        }
        if !(1..=10).contains(&self.download_attempts) {
            return Err(CompositeError::Validation("download_attempts 必须在 1~10 之间".to_string()));
        }
        if self.max_decoded_pixels == 0 {
            return Err(CompositeError::Validation("max_decoded_pixels 必须大于 0".to_string()));
        }
        if self.min_logo_width == 0 {
            return Err(CompositeError::Validation("min_logo_width 必须大于 0".to_string()));
        }
        if !(0.0..=255.0).contains(&self.luma_threshold) {
            return Err(CompositeError::Validation("luma_threshold 必须在 0~255 之间".to_string()));
        }
        if self.full_color_logo.trim().is_empty() || self.monochrome_logo.trim().is_empty() {
            return Err(CompositeError::Validation("Logo 文件名不能为空".to_string()));
        }

        Ok(())
    }

    pub(crate) fn full_color_logo_path(&self) -> PathBuf {
        self.assets_dir.join(&self.full_color_logo)
    }

    pub(crate) fn monochrome_logo_path(&self) -> PathBuf {
        self.assets_dir.join(&self.monochrome_logo)
    }
}
