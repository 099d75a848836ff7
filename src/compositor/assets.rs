//! # Logo 资源解析
//!
//! 静态目录里恰好两个变体：彩色与单色。目录在构造时确定，之后只读，无需加锁。
//!
//! 选择规则：
//! - 卡通风格优先单色变体，文件不存在时回退彩色
//! - 其余风格一律彩色
//! - 最终选中的文件不存在 → `AssetMissing`（上层降级为返回原图）

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::decoder::decode_raster;
use super::loader::{read_file_with_limit, validate_image_signature};
use super::source::{RasterImage, RawImageData};
use super::style::VisualStyle;
use super::{CompositeError, CompositorConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogoVariant {
    FullColor,
    Monochrome,
}

impl LogoVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FullColor => "full-color",
            Self::Monochrome => "monochrome",
        }
    }
}

/// 已解码的 Logo 资源，单次合成期间不可变。
#[derive(Debug, Clone)]
pub struct LogoAsset {
    pub image: RasterImage,
    pub variant: LogoVariant,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    variant: LogoVariant,
    path: PathBuf,
}

/// 两个 Logo 变体的只读目录。
#[derive(Debug, Clone)]
pub struct LogoCatalog {
    full_color: CatalogEntry,
    monochrome: CatalogEntry,
}

impl LogoCatalog {
    pub fn from_config(config: &CompositorConfig) -> Self {
        Self::new(config.full_color_logo_path(), config.monochrome_logo_path())
    }

    pub fn new(full_color: impl Into<PathBuf>, monochrome: impl Into<PathBuf>) -> Self {
        Self {
            full_color: CatalogEntry {
                variant: LogoVariant::FullColor,
                path: full_color.into(),
            },
            monochrome: CatalogEntry {
                variant: LogoVariant::Monochrome,
                path: monochrome.into(),
            },
        }
    }

    /// 按风格选择变体，只做路径决策不读文件。
    pub fn select(&self, style: VisualStyle) -> Result<(LogoVariant, &Path), CompositeError> {
        if style.prefers_monochrome_logo() {
            if self.monochrome.path.is_file() {
                return Ok((self.monochrome.variant, &self.monochrome.path));
            }
            log::debug!(
                "🎨 单色 Logo 不存在，回退彩色变体：{}",
                self.monochrome.path.display()
            );
        }

        if self.full_color.path.is_file() {
            return Ok((self.full_color.variant, &self.full_color.path));
        }

        Err(CompositeError::AssetMissing(
            self.full_color.path.display().to_string(),
        ))
    }

    /// 选择并解码 Logo。文件在选择与读取之间被删除同样归为 `AssetMissing`。
    pub async fn resolve(
        &self,
        style: VisualStyle,
        config: &CompositorConfig,
    ) -> Result<LogoAsset, CompositeError> {
        let (variant, path) = self.select(style)?;

        let bytes = read_file_with_limit(path, config.max_file_size)
            .await
            .map_err(|e| match e {
                CompositeError::FileSystem(msg) => CompositeError::AssetMissing(msg),
                other => CompositeError::Compositing(other.to_string()),
            })?;
        validate_image_signature(&bytes).map_err(|e| CompositeError::Compositing(e.to_string()))?;

        let raw = RawImageData {
            bytes,
            source_hint: variant.as_str(),
        };
        let image = decode_raster(&raw, config).map_err(|e| CompositeError::Compositing(e.to_string()))?;

        Ok(LogoAsset {
            image,
            variant,
            path: path.to_path_buf(),
        })
    }
}
