//! # 风格转换模块
//!
//! ## 设计思路
//!
//! 风格只作用于 Logo 图层，底图保持原样。当前只有卡通风格需要像素级转换：
//! 把 Logo 变成黑白稿，再以正片叠底方式压到底图上，模拟“墨线”效果。
//!
//! ## 实现思路
//!
//! 单色化使用两条规则：
//! 1. 彩度 `|R−G| + |G−B| + |B−R|` 超过阈值 → 黑（渐变色块不会因为亮而被判成背景）
//! 2. 否则按感知亮度 `0.299R + 0.587G + 0.114B` 与阈值比较
//!
//! 接近全透明的像素填为不透明白：正片叠底下白色是中性色，避免边缘出现噪点。

use std::fmt;
use std::str::FromStr;

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use super::blend::BlendMode;
use super::{CompositeError, CompositorConfig};

/// 视觉风格（封闭枚举）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VisualStyle {
    #[serde(rename = "isometric")]
    Isometric,
    #[serde(rename = "newyork-cartoon")]
    NewYorkCartoon,
    #[serde(rename = "minimalist-linkedin")]
    MinimalistLinkedin,
}

impl VisualStyle {
    pub const ALL: [VisualStyle; 3] = [
        VisualStyle::Isometric,
        VisualStyle::NewYorkCartoon,
        VisualStyle::MinimalistLinkedin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Isometric => "isometric",
            Self::NewYorkCartoon => "newyork-cartoon",
            Self::MinimalistLinkedin => "minimalist-linkedin",
        }
    }

    /// 是否走单色 Logo + 单色化转换。
    pub fn prefers_monochrome_logo(self) -> bool {
        matches!(self, Self::NewYorkCartoon)
    }

    pub fn blend_mode(self) -> BlendMode {
        if self.prefers_monochrome_logo() {
            BlendMode::Multiply
        } else {
            BlendMode::Over
        }
    }
}

impl fmt::Display for VisualStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisualStyle {
    type Err = CompositeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "isometric" => Ok(Self::Isometric),
            "newyork-cartoon" => Ok(Self::NewYorkCartoon),
            "minimalist-linkedin" => Ok(Self::MinimalistLinkedin),
            other => Err(CompositeError::Validation(format!(
                "未知风格：{}（可选：isometric / newyork-cartoon / minimalist-linkedin）",
                other
            ))),
        }
    }
}

/// 单色化阈值。
#[derive(Debug, Clone, Copy)]
pub struct MonochromeThresholds {
    pub luma: f32,
    pub colorfulness: u16,
    pub transparent_alpha_floor: u8,
}

impl From<&CompositorConfig> for MonochromeThresholds {
    fn from(config: &CompositorConfig) -> Self {
        Self {
            luma: config.luma_threshold,
            colorfulness: config.colorfulness_threshold,
            transparent_alpha_floor: config.transparent_alpha_floor,
        }
    }
}

/// 按风格转换 Logo。非卡通风格原样返回，不产生拷贝。
pub fn apply_style_transform(logo: RgbaImage, style: VisualStyle, thresholds: MonochromeThresholds) -> RgbaImage {
    if !style.prefers_monochrome_logo() {
        return logo;
    }

    let mut logo = logo;
    for pixel in logo.pixels_mut() {
        *pixel = monochrome_pixel(*pixel, thresholds);
    }
    logo
}

fn monochrome_pixel(pixel: Rgba<u8>, thresholds: MonochromeThresholds) -> Rgba<u8> {
    let [r, g, b, a] = pixel.0;

    if a <= thresholds.transparent_alpha_floor {
        return Rgba([255, 255, 255, 255]);
    }

    let (r16, g16, b16) = (i16::from(r), i16::from(g), i16::from(b));
    let colorfulness = ((r16 - g16).abs() + (g16 - b16).abs() + (b16 - r16).abs()) as u16;

    let ink = if colorfulness > thresholds.colorfulness {
        true
    } else {
        luma(r, g, b) < thresholds.luma
    };

    let value = if ink { 0 } else { 255 };
    Rgba([value, value, value, a])
}

fn luma(r: u8, g: u8, b: u8) -> f32 {
    0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b)
}
