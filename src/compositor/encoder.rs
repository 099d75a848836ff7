//! # 编码模块
//!
//! 最终结果统一编码为无损 PNG，再包装成 `data:image/png;base64,...`，
//! 调用方可以直接展示或下载。底图原有的 RGB / RGBA 布局原样保留。

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::ImageFormat;

use super::CompositeError;
use super::source::RasterImage;

pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// 编码为 PNG 字节。
pub fn encode_png(image: &RasterImage) -> Result<Vec<u8>, CompositeError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .as_dynamic()
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| CompositeError::Compositing(format!("PNG 编码失败：{}", e)))?;
    Ok(buffer.into_inner())
}

/// 包装为 Data URL。
pub fn to_png_data_url(png: &[u8]) -> String {
    let mut url = String::with_capacity(PNG_DATA_URL_PREFIX.len() + png.len().div_ceil(3) * 4);
    url.push_str(PNG_DATA_URL_PREFIX);
    STANDARD.encode_string(png, &mut url);
    url
}

/// 编码并包装，返回 `(png 字节, data url)`。
pub fn encode_data_url(image: &RasterImage) -> Result<(Vec<u8>, String), CompositeError> {
    let png = encode_png(image)?;
    let url = to_png_data_url(&png);
    Ok((png, url))
}
