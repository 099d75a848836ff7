//! Logo 摆放计算
//!
//! 纯函数：输入底图尺寸、Logo 原始尺寸、角位、尺寸百分比，输出唯一的摆放框，便于测试。
//!
//! # 设计思路
//! - 宽度先按百分比计算，再与最小宽度取大，保证小图上依然可读
//! - 高度永远由 Logo 原始宽高比推导，不信任外部传入的框
//! - 先把宽高取整，再由整数宽高推导坐标，保证 `x + width + margin == baseWidth` 精确成立
//! - 坐标做 `>= 0` 收敛：Logo 比底图还宽时贴左/上边

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::CompositeError;

pub const MIN_SIZE_PERCENT: f64 = 10.0;
pub const MAX_SIZE_PERCENT: f64 = 100.0;

/// Logo 所在角位。没有左上角：这是产品限制。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Corner {
    BottomLeft,
    BottomRight,
    TopRight,
}

impl Corner {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BottomLeft => "bottom-left",
            Self::BottomRight => "bottom-right",
            Self::TopRight => "top-right",
        }
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Corner {
    type Err = CompositeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bottom-left" => Ok(Self::BottomLeft),
            "bottom-right" => Ok(Self::BottomRight),
            "top-right" => Ok(Self::TopRight),
            other => Err(CompositeError::Validation(format!(
                "未知位置：{}（可选：bottom-left / bottom-right / top-right）",
                other
            ))),
        }
    }
}

/// Logo 在底图上的目标框（左上角 + 尺寸，像素）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlacementBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PlacementBox {
    /// 框中心（用于旋转后的图层对齐）。
    pub fn center(&self) -> (f64, f64) {
        (
            f64::from(self.x) + f64::from(self.width) / 2.0,
            f64::from(self.y) + f64::from(self.height) / 2.0,
        )
    }
}

/// 摆放计算的输入。
#[derive(Debug, Clone, Copy)]
pub struct PlacementInput {
    pub base_width: u32,
    pub base_height: u32,
    pub logo_width: u32,
    pub logo_height: u32,
    pub corner: Corner,
    pub size_percent: f64,
    pub margin: u32,
    pub min_width: u32,
}

/// 计算 Logo 摆放框。
///
/// # 实现步骤
/// 1. `width = round(max(min_width, base_width × size% / 100))`
/// 2. `height = round(width × logo_height / logo_width)`，至少 1
/// 3. 按角位与边距推导坐标
/// 4. 坐标收敛到 `>= 0`
///
/// 百分比越界或任一尺寸为 0 返回 `Validation`（边界层已校验，这里再兜一次）。
pub fn compute_placement(input: &PlacementInput) -> Result<PlacementBox, CompositeError> {
    if !(MIN_SIZE_PERCENT..=MAX_SIZE_PERCENT).contains(&input.size_percent) {
        return Err(CompositeError::Validation(format!(
            "logoSizePercent 必须在 {}~{} 之间：{}",
            MIN_SIZE_PERCENT, MAX_SIZE_PERCENT, input.size_percent
        )));
    }
    if input.base_width == 0 || input.base_height == 0 || input.logo_width == 0 || input.logo_height == 0 {
        return Err(CompositeError::Validation(format!(
            "尺寸不能为 0：底图 {}x{}，Logo {}x{}",
            input.base_width, input.base_height, input.logo_width, input.logo_height
        )));
    }

    let raw_width = f64::from(input.base_width) * input.size_percent / 100.0;
    let width = raw_width.max(f64::from(input.min_width)).round();
    let aspect = f64::from(input.logo_height) / f64::from(input.logo_width);
    let height = (width * aspect).round().max(1.0);

    let base_w = f64::from(input.base_width);
    let base_h = f64::from(input.base_height);
    let margin = f64::from(input.margin);

    let (x, y) = match input.corner {
        Corner::BottomLeft => (margin, base_h - height - margin),
        Corner::BottomRight => (base_w - width - margin, base_h - height - margin),
        Corner::TopRight => (base_w - width - margin, margin),
    };

    if x < 0.0 || y < 0.0 {
        log::debug!(
            "📐 Logo 超出底图可用区域，坐标收敛到 0（x={}, y={}）",
            x,
            y
        );
    }

    Ok(PlacementBox {
        x: x.max(0.0) as u32,
        y: y.max(0.0) as u32,
        width: width as u32,
        height: height as u32,
    })
}
