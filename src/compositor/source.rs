//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入类型”和“流水线中间结果”解耦：
//! - `ImageSource` 表示外部来源语义
//! - `RawImageData` 表示已加载但未解码的字节
//! - `RasterImage` 表示已解码、尺寸已知的像素缓冲

use base64::{Engine as _, engine::general_purpose};
use image::{DynamicImage, GenericImageView, RgbaImage};

/// 纯 Base64 的最短长度，更短的字符串一律按路径处理。
const MIN_BARE_BASE64_LEN: usize = 64;
/// 嗅探签名时解码的前缀长度（4 的倍数，解码得 18 字节）。
const SIGNATURE_PREFIX_LEN: usize = 24;

/// 图片输入来源。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// 网络地址来源。
    Url(String),
    /// Base64（支持 Data URL 与纯 Base64 字符串）。
    Inline(String),
    /// 本地文件路径来源。
    FilePath(String),
}

impl ImageSource {
    /// 按前缀识别来源类型。
    ///
    /// `data:` 开头视为内联数据，`http(s)://` 视为网络地址；
    /// 只含 Base64 字符且开头能解出图片签名的长字符串视为纯 Base64，其余视为本地路径。
    pub fn classify(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lower = trimmed
            .get(..8.min(trimmed.len()))
            .unwrap_or_default()
            .to_ascii_lowercase();

        if lower.starts_with("data:") {
            Self::Inline(trimmed.to_string())
        } else if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Url(trimmed.to_string())
        } else if looks_like_bare_base64(trimmed) {
            Self::Inline(trimmed.to_string())
        } else {
            Self::FilePath(trimmed.to_string())
        }
    }

    /// 来源提示（用于日志与诊断）。
    pub fn hint(&self) -> &'static str {
        match self {
            Self::Url(_) => "url",
            Self::Inline(_) => "inline",
            Self::FilePath(_) => "file",
        }
    }
}

fn looks_like_bare_base64(value: &str) -> bool {
    if value.len() < MIN_BARE_BASE64_LEN
        || !value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
    {
        return false;
    }

    // 路径也可能只含这些字符，所以再确认开头是图片签名
    general_purpose::STANDARD
        .decode(&value[..SIGNATURE_PREFIX_LEN])
        .map(|head| infer::is_image(&head))
        .unwrap_or(false)
}

/// 加载阶段输出：原始字节与来源标识。
pub(crate) struct RawImageData {
    /// 原始图片字节。
    pub(crate) bytes: Vec<u8>,
    /// 来源提示（用于日志与诊断）。
    pub(crate) source_hint: &'static str,
}

/// 已解码的位图。
///
/// 只承载 8-bit RGB / RGBA 两种布局，解码阶段会把其余布局归一化。
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    inner: DynamicImage,
}

impl RasterImage {
    /// 归一化为 RGB8 / RGBA8 后包装。
    pub fn new(image: DynamicImage) -> Self {
        let inner = match image {
            DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => image,
            other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        };
        Self { inner }
    }

    pub fn from_rgba(image: RgbaImage) -> Self {
        Self {
            inner: DynamicImage::ImageRgba8(image),
        }
    }

    pub fn width(&self) -> u32 {
        self.inner.width()
    }

    pub fn height(&self) -> u32 {
        self.inner.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.inner.dimensions()
    }

    /// 通道数：3 或 4。
    pub fn channel_count(&self) -> u8 {
        self.inner.color().channel_count()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.inner
    }

    pub(crate) fn as_dynamic_mut(&mut self) -> &mut DynamicImage {
        &mut self.inner
    }

    pub fn to_rgba8(&self) -> RgbaImage {
        self.inner.to_rgba8()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    #[test]
    fn classify_recognizes_each_source_kind() {
        assert!(matches!(
            ImageSource::classify("data:image/png;base64,AAAA"),
            ImageSource::Inline(_)
        ));
        assert!(matches!(
            ImageSource::classify("  HTTPS://cdn.example.com/a.png"),
            ImageSource::Url(_)
        ));
        assert!(matches!(
            ImageSource::classify("./generated/a.png"),
            ImageSource::FilePath(_)
        ));
    }

    #[test]
    fn classify_accepts_bare_base64_image_payload() {
        let png = crate::compositor::test_support::png_bytes(50, 50, [200, 10, 10, 255]);
        let bare = general_purpose::STANDARD.encode(&png);

        assert_eq!(ImageSource::classify(&bare), ImageSource::Inline(bare.clone()));
        assert_eq!(ImageSource::classify(&format!("  {}\n", bare)), ImageSource::Inline(bare));
    }

    #[test]
    fn classify_keeps_base64_looking_paths_as_files() {
        // 字符集合法、长度足够，但开头解不出图片签名
        let path = "generated/posts/2024/launch/".repeat(3);
        assert!(matches!(ImageSource::classify(&path), ImageSource::FilePath(_)));

        let text = general_purpose::STANDARD.encode("definitely not an image payload, just some text");
        assert!(matches!(ImageSource::classify(&text), ImageSource::FilePath(_)));
        assert!(matches!(ImageSource::classify("logo"), ImageSource::FilePath(_)));
    }

    #[test]
    fn raster_normalizes_grayscale_to_rgb() {
        let gray: ImageBuffer<Luma<u8>, Vec<u8>> = ImageBuffer::from_pixel(4, 3, Luma([7]));
        let raster = RasterImage::new(DynamicImage::ImageLuma8(gray));

        assert_eq!(raster.channel_count(), 3);
        assert_eq!(raster.dimensions(), (4, 3));
    }
}
