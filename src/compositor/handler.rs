//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `LogoCompositor` 只负责流程编排，不关心调用方是 CLI 还是其他边界层。
//! 处理链路固定为：
//! 1. 按来源加载原始字节（异步）
//! 2. 解析 Logo 资源（异步，失败只记录不中断）
//! 3. 解码底图 → 准备 Logo 图层 → 混合 → 编码（`spawn_blocking`）
//!
//! ## 实现思路
//!
//! - 配置与 Logo 目录在构造时确定，之后只读，多个请求可并发共享同一实例。
//! - 底图加载/解码失败是致命错误；Logo 相关失败一律降级为返回原图。
//! - 记录 `load/resolve/decode/composite/encode/total` 阶段耗时，便于性能诊断。

use std::time::{Duration, Instant};

use serde::Serialize;

use super::assets::{LogoAsset, LogoCatalog, LogoVariant};
use super::decoder::decode_raster;
use super::encoder::encode_data_url;
use super::pipeline::apply_logo;
use super::placement::PlacementBox;
use super::request::CompositingRequest;
use super::source::{RasterImage, RawImageData};
use super::{CompositeError, CompositorConfig};

/// Logo 合成器。
pub struct LogoCompositor {
    pub(super) config: CompositorConfig,
    catalog: LogoCatalog,
}

/// 单次合成的结果，不做缓存。
#[derive(Debug, Clone)]
pub struct CompositingResult {
    pub image: RasterImage,
    pub png: Vec<u8>,
    pub data_url: String,
    pub logo_applied: bool,
    pub logo_variant: Option<LogoVariant>,
    pub placement: Option<PlacementBox>,
    /// 降级原因，仅用于日志。
    pub skipped_reason: Option<String>,
}

/// 各阶段耗时。
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StageTimings {
    pub load_ms: u128,
    pub resolve_ms: u128,
    pub decode_ms: u128,
    pub composite_ms: u128,
    pub encode_ms: u128,
}

struct BlockingOutput {
    result: CompositingResult,
    decode: Duration,
    composite: Duration,
    encode: Duration,
}

impl LogoCompositor {
    /// 根据配置创建合成器，非法配置直接失败。
    ///
    /// # 示例
    /// ```rust,ignore
    /// use brand_overlay::compositor::{CompositorConfig, LogoCompositor};
    ///
    /// let compositor = LogoCompositor::new(CompositorConfig::default())?;
    /// # Ok::<(), brand_overlay::compositor::CompositeError>(())
    /// ```
    pub fn new(config: CompositorConfig) -> Result<Self, CompositeError> {
        let catalog = LogoCatalog::from_config(&config);
        Self::with_catalog(config, catalog)
    }

    /// 使用自定义 Logo 目录创建合成器（测试与多品牌场景）。
    pub fn with_catalog(config: CompositorConfig, catalog: LogoCatalog) -> Result<Self, CompositeError> {
        config.validate()?;
        Ok(Self { config, catalog })
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// 处理主入口：加载底图并叠加 Logo。
    ///
    /// # 示例
    /// ```rust,ignore
    /// # async fn demo(compositor: brand_overlay::compositor::LogoCompositor) -> Result<(), brand_overlay::compositor::CompositeError> {
    /// use brand_overlay::compositor::CompositingRequestBody;
    ///
    /// let request = CompositingRequestBody {
    ///     image_source: "./generated/post.png".into(),
    ///     style: "isometric".into(),
    ///     position: "bottom-right".into(),
    ///     ..Default::default()
    /// }
    /// .validate()?;
    /// let result = compositor.process(&request).await?;
    /// println!("{}", result.data_url.len());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn process(&self, request: &CompositingRequest) -> Result<CompositingResult, CompositeError> {
        let total_start = Instant::now();

        let load_start = Instant::now();
        let raw = self.load_source(&request.source).await?;
        let load_elapsed = load_start.elapsed();

        let resolve_start = Instant::now();
        let logo = self.catalog.resolve(request.style, &self.config).await;
        let resolve_elapsed = resolve_start.elapsed();

        let config = self.config.clone();
        let owned_request = request.clone();
        let output = tokio::task::spawn_blocking(move || run_blocking_stages(raw, logo, &owned_request, &config))
            .await
            .map_err(|e| CompositeError::Compositing(format!("合成任务异常退出：{}", e)))??;

        let timings = StageTimings {
            load_ms: load_elapsed.as_millis(),
            resolve_ms: resolve_elapsed.as_millis(),
            decode_ms: output.decode.as_millis(),
            composite_ms: output.composite.as_millis(),
            encode_ms: output.encode.as_millis(),
        };
        log::info!(
            "✅ 合成完成 - style={} logo={} load={}ms resolve={}ms decode={}ms composite={}ms encode={}ms total={}ms",
            request.style,
            output.result.logo_applied,
            timings.load_ms,
            timings.resolve_ms,
            timings.decode_ms,
            timings.composite_ms,
            timings.encode_ms,
            total_start.elapsed().as_millis()
        );

        Ok(output.result)
    }
}

fn run_blocking_stages(
    raw: RawImageData,
    logo: Result<LogoAsset, CompositeError>,
    request: &CompositingRequest,
    config: &CompositorConfig,
) -> Result<BlockingOutput, CompositeError> {
    let decode_start = Instant::now();
    let mut base = decode_raster(&raw, config)?;
    drop(raw);
    let decode = decode_start.elapsed();

    let composite_start = Instant::now();
    let (logo_applied, logo_variant, placement, skipped_reason) = match logo {
        Ok(asset) => match apply_logo(&mut base, &asset, request, config) {
            Ok(placement) => (true, Some(asset.variant), Some(placement), None),
            Err(e) => {
                log::warn!("⚠️ Logo 合成失败，返回原图：{}", e);
                (false, None, None, Some(e.to_string()))
            }
        },
        Err(e) if e.is_degradable() => {
            log::warn!("⚠️ Logo 资源不可用，返回原图：{}", e);
            (false, None, None, Some(e.to_string()))
        }
        Err(e) => return Err(e),
    };
    let composite = composite_start.elapsed();

    let encode_start = Instant::now();
    let (png, data_url) = encode_data_url(&base)?;
    let encode = encode_start.elapsed();

    Ok(BlockingOutput {
        result: CompositingResult {
            image: base,
            png,
            data_url,
            logo_applied,
            logo_variant,
            placement,
            skipped_reason,
        },
        decode,
        composite,
        encode,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::ImageSource;
    use crate::compositor::placement::Corner;
    use crate::compositor::style::VisualStyle;
    use crate::compositor::test_support::png_bytes;
    use base64::{Engine as _, engine::general_purpose};

    fn inline(bytes: &[u8]) -> ImageSource {
        ImageSource::Inline(format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(bytes)
        ))
    }

    fn request(source: ImageSource, style: VisualStyle) -> CompositingRequest {
        CompositingRequest {
            source,
            style,
            corner: Corner::BottomLeft,
            size_percent: 35.0,
            opacity_percent: 100.0,
            rotation_degrees: 0.0,
        }
    }

    #[tokio::test]
    async fn missing_assets_degrade_to_original_image() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let config = CompositorConfig {
            assets_dir: dir.path().to_path_buf(),
            ..CompositorConfig::default()
        };
        let compositor = LogoCompositor::new(config).expect("compositor init failed");

        let result = compositor
            .process(&request(inline(&png_bytes(300, 200, [10, 20, 30, 255])), VisualStyle::Isometric))
            .await
            .expect("process should degrade instead of failing");

        assert!(!result.logo_applied);
        assert!(result.skipped_reason.is_some());
        assert!(result.image.to_rgba8().pixels().all(|p| p.0 == [10, 20, 30, 255]));
    }

    #[tokio::test]
    async fn undecodable_base_image_is_fatal() {
        let compositor = LogoCompositor::new(CompositorConfig::default()).expect("compositor init failed");

        let mut bytes = png_bytes(50, 50, [1, 1, 1, 255]);
        bytes.truncate(60);
        let result = compositor.process(&request(inline(&bytes), VisualStyle::Isometric)).await;

        assert!(matches!(
            result,
            Err(CompositeError::Decode(_)) | Err(CompositeError::InvalidFormat(_))
        ));
    }

    #[tokio::test]
    async fn applies_logo_when_asset_present() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        std::fs::write(dir.path().join("logo.png"), png_bytes(100, 50, [0, 0, 0, 255])).expect("write logo failed");
        let config = CompositorConfig {
            assets_dir: dir.path().to_path_buf(),
            ..CompositorConfig::default()
        };
        let compositor = LogoCompositor::new(config).expect("compositor init failed");

        let result = compositor
            .process(&request(inline(&png_bytes(800, 600, [255, 255, 255, 255])), VisualStyle::Isometric))
            .await
            .expect("process failed");

        assert!(result.logo_applied);
        assert_eq!(result.logo_variant, Some(LogoVariant::FullColor));
        let placement = result.placement.expect("placement missing");
        assert_eq!((placement.x, placement.width, placement.height), (20, 280, 140));
        assert!(result.data_url.starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn oversized_logo_layer_degrades_to_original_image() {
        // 底图恰好在像素上限内，200px 最小宽度的方形 Logo 超限
        let dir = tempfile::tempdir().expect("tempdir failed");
        std::fs::write(dir.path().join("logo.png"), png_bytes(100, 100, [0, 0, 0, 255])).expect("write logo failed");
        let config = CompositorConfig {
            assets_dir: dir.path().to_path_buf(),
            max_decoded_pixels: 20_000,
            ..CompositorConfig::default()
        };
        let compositor = LogoCompositor::new(config).expect("compositor init failed");

        let result = compositor
            .process(&request(inline(&png_bytes(200, 100, [90, 90, 90, 255])), VisualStyle::Isometric))
            .await
            .expect("oversized layer should degrade");

        assert!(!result.logo_applied);
        assert!(result.skipped_reason.is_some_and(|reason| reason.contains("过大")));
        assert!(result.image.to_rgba8().pixels().all(|p| p.0 == [90, 90, 90, 255]));
    }

    #[tokio::test]
    async fn bare_base64_source_is_loaded_inline() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let config = CompositorConfig {
            assets_dir: dir.path().to_path_buf(),
            ..CompositorConfig::default()
        };
        let compositor = LogoCompositor::new(config).expect("compositor init failed");
        let bare = general_purpose::STANDARD.encode(png_bytes(50, 50, [5, 6, 7, 255]));

        let result = compositor
            .process(&request(ImageSource::classify(&bare), VisualStyle::Isometric))
            .await
            .expect("bare base64 should load");

        assert_eq!(result.image.dimensions(), (50, 50));
    }
}
