//! # 混合模块
//!
//! ## 设计思路
//!
//! 底图保持原有通道布局（RGB 或 RGBA），Logo 图层永远是 RGBA。
//! 两种混合模式都按“直通 alpha”（非预乘）计算：
//! - `Over`：标准源覆盖
//! - `Multiply`：`out = base × (1 − a) + base × logo / 255 × a`，只会变暗，保留底图纹理
//!
//! ## 实现思路
//!
//! 图层偏移允许为负（旋转后的图层可能超出摆放框），逐像素前先求出与底图的交集，
//! 交集为空直接返回，不做任何写入。

use image::{DynamicImage, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use super::CompositeError;
use super::source::RasterImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    Over,
    Multiply,
}

/// 图层与底图的可见交集（底图坐标 + 图层起点）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Overlap {
    base_x: u32,
    base_y: u32,
    layer_x: u32,
    layer_y: u32,
    width: u32,
    height: u32,
}

fn clip(base: (u32, u32), layer: (u32, u32), left: i64, top: i64) -> Option<Overlap> {
    let x0 = left.max(0);
    let y0 = top.max(0);
    let x1 = (left + i64::from(layer.0)).min(i64::from(base.0));
    let y1 = (top + i64::from(layer.1)).min(i64::from(base.1));

    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some(Overlap {
        base_x: x0 as u32,
        base_y: y0 as u32,
        layer_x: (x0 - left) as u32,
        layer_y: (y0 - top) as u32,
        width: (x1 - x0) as u32,
        height: (y1 - y0) as u32,
    })
}

/// 把 Logo 图层按给定偏移混合到底图上（原地修改）。
///
/// 返回实际写入的像素数；图层完全落在底图外时为 0。
pub(crate) fn composite_layer(
    base: &mut RasterImage,
    layer: &RgbaImage,
    left: i64,
    top: i64,
    mode: BlendMode,
) -> Result<u64, CompositeError> {
    let Some(overlap) = clip(base.dimensions(), layer.dimensions(), left, top) else {
        log::debug!("🎨 Logo 图层与底图无交集，跳过混合（offset={},{}）", left, top);
        return Ok(0);
    };

    let mut touched = 0u64;
    match base.as_dynamic_mut() {
        DynamicImage::ImageRgba8(canvas) => {
            for dy in 0..overlap.height {
                for dx in 0..overlap.width {
                    let src = *layer.get_pixel(overlap.layer_x + dx, overlap.layer_y + dy);
                    if src[3] == 0 {
                        continue;
                    }
                    let dst = canvas.get_pixel_mut(overlap.base_x + dx, overlap.base_y + dy);
                    *dst = blend_rgba(*dst, src, mode);
                    touched += 1;
                }
            }
        }
        DynamicImage::ImageRgb8(canvas) => {
            for dy in 0..overlap.height {
                for dx in 0..overlap.width {
                    let src = *layer.get_pixel(overlap.layer_x + dx, overlap.layer_y + dy);
                    if src[3] == 0 {
                        continue;
                    }
                    let dst = canvas.get_pixel_mut(overlap.base_x + dx, overlap.base_y + dy);
                    let [r, g, b, _] = blend_rgba(Rgba([dst[0], dst[1], dst[2], 255]), src, mode).0;
                    dst.0 = [r, g, b];
                    touched += 1;
                }
            }
        }
        other => {
            return Err(CompositeError::Compositing(format!(
                "底图通道布局不受支持：{:?}",
                other.color()
            )));
        }
    }

    Ok(touched)
}

fn blend_rgba(dst: Rgba<u8>, src: Rgba<u8>, mode: BlendMode) -> Rgba<u8> {
    match mode {
        BlendMode::Over => over(dst, src),
        BlendMode::Multiply => multiply(dst, src),
    }
}

fn over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let sa = u32::from(src[3]);
    if sa == 255 {
        return src;
    }

    let da = u32::from(dst[3]);
    // 目标剩余权重（×255）
    let dst_weight = da * (255 - sa);
    let out_a255 = sa * 255 + dst_weight;
    if out_a255 == 0 {
        return Rgba([0, 0, 0, 0]);
    }

    let mut out = [0u8; 4];
    for c in 0..3 {
        let num = u32::from(src[c]) * sa * 255 + u32::from(dst[c]) * dst_weight;
        out[c] = ((num + out_a255 / 2) / out_a255).min(255) as u8;
    }
    out[3] = ((out_a255 + 127) / 255).min(255) as u8;
    Rgba(out)
}

fn multiply(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let a = u32::from(src[3]);
    let mut out = dst.0;
    for c in 0..3 {
        let base = u32::from(dst[c]);
        let factor = 255 * (255 - a) + u32::from(src[c]) * a;
        out[c] = ((base * factor + 32_512) / 65_025) as u8;
    }
    Rgba(out)
}
