//! # 旋转模块
//!
//! 以 Logo 中心为轴按角度旋转，正角度为屏幕上的顺时针。
//!
//! - `0°`：原样返回，不拷贝、不重采样
//! - `±90° / 180°`：走 `image::imageops` 的无损旋转
//! - 其他角度：画布扩展到旋转后的外接矩形，空白处全透明，双线性采样

use image::{Rgba, RgbaImage};

/// 把角度归一化到 `(-180, 180]`。
pub fn normalize_degrees(degrees: f64) -> f64 {
    let mut value = degrees % 360.0;
    if value <= -180.0 {
        value += 360.0;
    } else if value > 180.0 {
        value -= 360.0;
    }
    value
}

/// 旋转 Logo 图层。
pub fn rotate_logo(logo: RgbaImage, degrees: f64) -> RgbaImage {
    let degrees = normalize_degrees(degrees);

    if degrees == 0.0 {
        return logo;
    }
    if degrees == 90.0 {
        return image::imageops::rotate90(&logo);
    }
    if degrees == -90.0 {
        return image::imageops::rotate270(&logo);
    }
    if degrees == 180.0 {
        return image::imageops::rotate180(&logo);
    }

    rotate_expanded(&logo, degrees.to_radians())
}

/// 旋转后画布尺寸，与 `rotate_logo` 的输出一致，可在分配像素前用于体积校验。
pub(crate) fn rotated_dimensions(width: u32, height: u32, degrees: f64) -> (u32, u32) {
    let degrees = normalize_degrees(degrees);
    if degrees == 0.0 || degrees == 180.0 {
        return (width, height);
    }
    if degrees.abs() == 90.0 {
        return (height, width);
    }

    let (w, h) = expanded_extent(f64::from(width), f64::from(height), degrees.to_radians());
    (w as u32, h as u32)
}

// 外接矩形；减去极小量避免 45° 这类角度因浮点误差多扩一像素
fn expanded_extent(src_w: f64, src_h: f64, radians: f64) -> (f64, f64) {
    let (sin, cos) = radians.sin_cos();
    let dst_w = ((src_w * cos.abs() + src_h * sin.abs()) - 1e-9).ceil().max(1.0);
    let dst_h = ((src_w * sin.abs() + src_h * cos.abs()) - 1e-9).ceil().max(1.0);
    (dst_w, dst_h)
}

fn rotate_expanded(src: &RgbaImage, radians: f64) -> RgbaImage {
    let (sin, cos) = radians.sin_cos();
    let (src_w, src_h) = (f64::from(src.width()), f64::from(src.height()));
    let (dst_w, dst_h) = expanded_extent(src_w, src_h, radians);

    let (src_cx, src_cy) = (src_w / 2.0, src_h / 2.0);
    let (dst_cx, dst_cy) = (dst_w / 2.0, dst_h / 2.0);

    RgbaImage::from_fn(dst_w as u32, dst_h as u32, |x, y| {
        let dx = f64::from(x) + 0.5 - dst_cx;
        let dy = f64::from(y) + 0.5 - dst_cy;

        // 逆变换：目标像素回到源坐标系
        let sx = dx * cos + dy * sin + src_cx - 0.5;
        let sy = -dx * sin + dy * cos + src_cy - 0.5;

        sample_bilinear(src, sx, sy)
    })
}

/// 预乘空间内做双线性插值，避免透明边缘出现暗色描边。
fn sample_bilinear(src: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1.0, y0, fx * (1.0 - fy)),
        (x0, y0 + 1.0, (1.0 - fx) * fy),
        (x0 + 1.0, y0 + 1.0, fx * fy),
    ];

    let mut acc = [0.0f64; 4];
    for (tx, ty, weight) in taps {
        if weight <= 0.0 {
            continue;
        }
        let Some(pixel) = texel(src, tx, ty) else {
            continue;
        };
        let alpha = f64::from(pixel[3]);
        for c in 0..3 {
            acc[c] += f64::from(pixel[c]) * alpha * weight;
        }
        acc[3] += alpha * weight;
    }

    if acc[3] <= f64::EPSILON {
        return Rgba([0, 0, 0, 0]);
    }

    let mut out = [0u8; 4];
    for c in 0..3 {
        out[c] = (acc[c] / acc[3]).round().clamp(0.0, 255.0) as u8;
    }
    out[3] = acc[3].round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}

fn texel(src: &RgbaImage, x: f64, y: f64) -> Option<&Rgba<u8>> {
    if x < 0.0 || y < 0.0 || x >= f64::from(src.width()) || y >= f64::from(src.height()) {
        return None;
    }
    Some(src.get_pixel(x as u32, y as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker_logo() -> RgbaImage {
        // 左上角一个红点，其余蓝色
        let mut logo = RgbaImage::from_pixel(6, 4, Rgba([0, 0, 255, 255]));
        logo.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        logo
    }

    #[test]
    fn zero_degrees_is_identity() {
        let logo = marker_logo();

        assert_eq!(rotate_logo(logo.clone(), 0.0), logo);
        assert_eq!(rotate_logo(logo.clone(), 360.0), logo);
    }

    #[test]
    fn positive_ninety_is_clockwise() {
        let rotated = rotate_logo(marker_logo(), 90.0);

        assert_eq!(rotated.dimensions(), (4, 6));
        // 顺时针 90°：左上角移到右上角
        assert_eq!(rotated.get_pixel(3, 0).0, [255, 0, 0, 255]);
    }

    #[test]
    fn negative_ninety_is_counter_clockwise() {
        let rotated = rotate_logo(marker_logo(), -90.0);

        assert_eq!(rotated.dimensions(), (4, 6));
        assert_eq!(rotated.get_pixel(0, 5).0, [255, 0, 0, 255]);
    }

    #[test]
    fn half_turn_is_lossless() {
        let logo = marker_logo();

        let back = rotate_logo(rotate_logo(logo.clone(), 180.0), -180.0);

        assert_eq!(back, logo);
    }

    #[test]
    fn arbitrary_angle_expands_canvas_with_transparent_corners() {
        let logo = RgbaImage::from_pixel(20, 20, Rgba([10, 200, 30, 255]));

        let rotated = rotate_logo(logo, 45.0);

        assert_eq!(rotated.dimensions(), (29, 29));
        assert_eq!(rotated.get_pixel(0, 0)[3], 0);
        assert_eq!(rotated.get_pixel(28, 28)[3], 0);
        assert_eq!(rotated.get_pixel(14, 14).0, [10, 200, 30, 255]);
    }

    #[test]
    fn rotated_dimensions_match_rotated_output() {
        for degrees in [0.0, 90.0, -90.0, 180.0, 30.0, -45.0, 135.0] {
            let expected = rotate_logo(RgbaImage::new(40, 10), degrees).dimensions();
            assert_eq!(rotated_dimensions(40, 10, degrees), expected, "angle {}", degrees);
        }
    }

    #[test]
    fn normalize_keeps_range() {
        assert_eq!(normalize_degrees(270.0), -90.0);
        assert_eq!(normalize_degrees(-180.0), 180.0);
        assert_eq!(normalize_degrees(-45.0), -45.0);
    }
}
