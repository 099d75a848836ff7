//! # 品牌化流水线（CPU 阶段）
//!
//! ## 设计思路
//!
//! Logo 图层在触碰底图之前完整准备好：缩放 → 风格转换 → 旋转 → 不透明度。
//! 只有最后一步混合会修改底图，而混合只会在写入前失败，
//! 因此任何阶段出错，底图都保持原样，调用方可直接降级返回。
//!
//! ## 实现思路
//!
//! 该模块内的函数全部是同步的，由 `handler` 放进 `spawn_blocking` 执行。
//! 图层在分配像素前按 `max_decoded_pixels` 校验尺寸（缩放后、旋转后各一次）；
//! 准备阶段的 panic 会被捕获并转成 `Compositing` 错误，交给调用方降级。
//! 混合阶段不做捕获：它直接写底图，中途 panic 时底图已不可信。

use std::panic::{AssertUnwindSafe, catch_unwind};

use image::RgbaImage;

use super::assets::LogoAsset;
use super::blend::{BlendMode, composite_layer};
use super::decoder::resize_logo;
use super::opacity::apply_opacity;
use super::placement::{PlacementBox, PlacementInput, compute_placement};
use super::request::CompositingRequest;
use super::rotation::{rotate_logo, rotated_dimensions};
use super::source::RasterImage;
use super::style::{MonochromeThresholds, apply_style_transform};
use super::{CompositeError, CompositorConfig};

/// 准备好的 Logo 图层。`left/top` 可能为负（旋转后超出摆放框）。
#[derive(Debug, Clone)]
pub(crate) struct LogoLayer {
    pub(crate) image: RgbaImage,
    pub(crate) left: i64,
    pub(crate) top: i64,
    pub(crate) placement: PlacementBox,
    pub(crate) mode: BlendMode,
}

pub(crate) fn prepare_logo_layer(
    base_dimensions: (u32, u32),
    asset: &LogoAsset,
    request: &CompositingRequest,
    config: &CompositorConfig,
) -> Result<LogoLayer, CompositeError> {
    let (logo_width, logo_height) = asset.image.dimensions();
    let placement = compute_placement(&PlacementInput {
        base_width: base_dimensions.0,
        base_height: base_dimensions.1,
        logo_width,
        logo_height,
        corner: request.corner,
        size_percent: request.size_percent,
        margin: config.margin,
        min_width: config.min_logo_width,
    })
    .map_err(|e| CompositeError::Compositing(e.to_string()))?;

    ensure_layer_fits("缩放", (placement.width, placement.height), config)?;
    ensure_layer_fits(
        "旋转",
        rotated_dimensions(placement.width, placement.height, request.rotation_degrees),
        config,
    )?;

    let resized = resize_logo(
        &asset.image.to_rgba8(),
        placement.width,
        placement.height,
        config.resize_filter,
    )?;
    let styled = apply_style_transform(resized, request.style, MonochromeThresholds::from(config));
    let rotated = rotate_logo(styled, request.rotation_degrees);
    let layer = apply_opacity(rotated, request.opacity_percent);

    // 旋转后的图层以摆放框中心为锚点
    let (center_x, center_y) = placement.center();
    let left = (center_x - f64::from(layer.width()) / 2.0).round() as i64;
    let top = (center_y - f64::from(layer.height()) / 2.0).round() as i64;

    Ok(LogoLayer {
        image: layer,
        left,
        top,
        placement,
        mode: request.style.blend_mode(),
    })
}

fn ensure_layer_fits(stage: &str, (width, height): (u32, u32), config: &CompositorConfig) -> Result<(), CompositeError> {
    let pixels = u64::from(width) * u64::from(height);
    if pixels > config.max_decoded_pixels {
        return Err(CompositeError::Compositing(format!(
            "{}后 Logo 图层过大：{}x{}（限制：{} 像素）",
            stage, width, height, config.max_decoded_pixels
        )));
    }
    Ok(())
}

fn catch_stage_panic<T>(stage: impl FnOnce() -> Result<T, CompositeError>) -> Result<T, CompositeError> {
    catch_unwind(AssertUnwindSafe(stage)).unwrap_or_else(|payload| {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|msg| msg.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "未知原因".to_string());
        Err(CompositeError::Compositing(format!("Logo 图层准备异常：{}", detail)))
    })
}

/// 把 Logo 合成到底图上，返回实际使用的摆放框。
pub(crate) fn apply_logo(
    base: &mut RasterImage,
    asset: &LogoAsset,
    request: &CompositingRequest,
    config: &CompositorConfig,
) -> Result<PlacementBox, CompositeError> {
    let base_dimensions = base.dimensions();
    let layer = catch_stage_panic(|| prepare_logo_layer(base_dimensions, asset, request, config))?;

    let touched = composite_layer(base, &layer.image, layer.left, layer.top, layer.mode)?;
    log::debug!(
        "🎨 Logo 合成 - 模式: {:?} 框: {:?} 图层: {}x{} 写入像素: {}",
        layer.mode,
        layer.placement,
        layer.image.width(),
        layer.image.height(),
        touched
    );

    Ok(layer.placement)
}
