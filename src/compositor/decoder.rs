//! # 解码与缩放模块
//!
//! ## 设计思路
//!
//! 将“字节 → 位图”的过程集中管理，并在关键节点增加资源上限控制。
//! 优先做尺寸检查，再进行完整解码，降低恶意输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 1. 猜测格式并读取 header 尺寸
//! 2. 按像素上限快速拒绝
//! 3. 完整解码并归一化为 RGB8 / RGBA8
//! 4. Logo 缩放优先走 `fast_image_resize`，失败回退 `image::imageops::resize`

use std::io::Cursor;

use fast_image_resize as fr;
use image::{ImageBuffer, ImageReader, Rgba, RgbaImage};

use super::config::ResizeFilter;
use super::source::{RasterImage, RawImageData};
use super::{CompositeError, CompositorConfig};

/// 将原始字节解码为位图。
pub(crate) fn decode_raster(raw: &RawImageData, config: &CompositorConfig) -> Result<RasterImage, CompositeError> {
    let (header_width, header_height) = inspect_dimensions_from_memory(&raw.bytes)?;
    validate_pixel_limits(config, header_width, header_height)?;

    let decoded = image::load_from_memory(&raw.bytes)
        .map_err(|e| CompositeError::Decode(format!("图片解码失败：{}", e)))?;

    let raster = RasterImage::new(decoded);
    let (width, height) = raster.dimensions();
    if width == 0 || height == 0 {
        return Err(CompositeError::Decode("图片尺寸为 0".to_string()));
    }
    validate_pixel_limits(config, width, height)?;

    log::info!(
        "✅ 图片解码成功 - 来源: {} 尺寸: {}x{} 通道: {}",
        raw.source_hint,
        width,
        height,
        raster.channel_count()
    );

    Ok(raster)
}

/// 仅通过内存中的图片头信息读取宽高。
fn inspect_dimensions_from_memory(bytes: &[u8]) -> Result<(u32, u32), CompositeError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CompositeError::InvalidFormat(format!("无法识别图片格式：{}", e)))?;

    if reader.format().is_none() {
        return Err(CompositeError::InvalidFormat("不支持的图片格式".to_string()));
    }

    reader
        .into_dimensions()
        .map_err(|e| CompositeError::Decode(format!("无法读取图片尺寸：{}", e)))
}

fn validate_pixel_limits(config: &CompositorConfig, width: u32, height: u32) -> Result<(), CompositeError> {
    let pixels = u64::from(width)
        .checked_mul(u64::from(height))
        .ok_or_else(|| CompositeError::ResourceLimit("图片像素数溢出".to_string()))?;

    if pixels > config.max_decoded_pixels {
        return Err(CompositeError::ResourceLimit(format!(
            "图片像素过大：{} 像素（限制：{} 像素）",
            pixels, config.max_decoded_pixels
        )));
    }

    Ok(())
}

/// 将 Logo 缩放到目标尺寸（不保持比例，比例已由摆放计算保证）。
pub(crate) fn resize_logo(
    logo: &RgbaImage,
    target_width: u32,
    target_height: u32,
    filter: ResizeFilter,
) -> Result<RgbaImage, CompositeError> {
    if target_width == 0 || target_height == 0 {
        return Err(CompositeError::Compositing("Logo 目标尺寸为 0".to_string()));
    }
    if logo.dimensions() == (target_width, target_height) {
        return Ok(logo.clone());
    }

    match resize_with_fast_image_resize(logo, target_width, target_height, filter) {
        Ok(resized) => Ok(resized),
        Err(err) => {
            log::warn!("⚠️ fast_image_resize 缩放失败，回退 image::imageops::resize：{}", err);
            Ok(image::imageops::resize(
                logo,
                target_width,
                target_height,
                filter.to_image_filter(),
            ))
        }
    }
}

fn resize_with_fast_image_resize(
    src: &RgbaImage,
    target_width: u32,
    target_height: u32,
    filter: ResizeFilter,
) -> Result<RgbaImage, CompositeError> {
    let (src_width, src_height) = src.dimensions();

    let src_image = fr::images::Image::from_vec_u8(
        src_width,
        src_height,
        src.as_raw().clone(),
        fr::PixelType::U8x4,
    )
    .map_err(|e| CompositeError::Compositing(format!("构建源图像缓冲失败：{}", e)))?;

    let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

    let mut resizer = fr::Resizer::new();
    let options = fr::ResizeOptions::new()
        .resize_alg(fr::ResizeAlg::Convolution(filter.to_fast_filter()))
        .use_alpha(true);

    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| CompositeError::Compositing(format!("fast_image_resize 执行失败：{}", e)))?;

    ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(target_width, target_height, dst_image.into_vec())
        .ok_or_else(|| CompositeError::Compositing("fast_image_resize 输出缓冲长度异常".to_string()))
}
