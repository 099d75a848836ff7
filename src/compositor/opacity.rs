//! 不透明度：只缩放 alpha 通道，颜色通道不动。`100%` 原样返回。

use image::RgbaImage;

pub fn apply_opacity(logo: RgbaImage, percent: f64) -> RgbaImage {
    if percent >= 100.0 {
        return logo;
    }

    let factor = percent.max(0.0) / 100.0;
    let mut logo = logo;
    for pixel in logo.pixels_mut() {
        pixel[3] = (f64::from(pixel[3]) * factor).round().clamp(0.0, 255.0) as u8;
    }
    logo
}
