//! # Logo 合成模块（compositor）
//!
//! ## 设计思路
//!
//! 该模块将“来源加载 → 解码 → Logo 资源解析 → 摆放 → 风格转换 → 旋转 → 不透明度 → 混合 → 编码”
//! 按职责拆分为多个子模块，每个阶段都是可单独测试的小函数。
//!
//! - `service`：请求边界，JSON ↔ `(status, body)`
//! - `handler`：编排整条处理流水线（含阶段耗时日志）
//! - `loader`：负责 URL/Base64/文件加载与安全校验
//! - `decoder`：负责解码、像素限制、Logo 缩放
//! - `assets`：两种 Logo 变体的只读目录
//! - `pipeline`：Logo 图层准备与合成（同步、CPU 密集）
//! - `placement/style/rotation/opacity/blend/encoder`：各单一阶段
//! - `config/error/source/request`：配置、错误、中间数据模型、请求契约
//!
//! ## 新同事快速上手
//!
//! ```text
//! CLI / 调用方
//!    ↓
//! service.rs（解析 + 校验 + 错误映射）
//!    ↓
//! handler.rs（统一编排 + 阶段耗时日志）
//!    ├─ loader.rs（来源加载 + URL/体积安全校验）
//!    ├─ assets.rs（Logo 变体选择，缺失则降级）
//!    └─ pipeline.rs（spawn_blocking 内执行）
//!         ├─ decoder.rs（解码 + 缩放）
//!         ├─ placement.rs → style.rs → rotation.rs → opacity.rs
//!         └─ blend.rs（over / multiply）
//!    ↓
//! encoder.rs（PNG Data URL）
//! ```
//!
//! ## 分层职责建议
//!
//! - 请求字段或错误码变更优先改 `request.rs` / `error.rs`
//! - 配置与阈值变更优先改 `config.rs`
//! - 流程顺序与降级策略变更优先改 `handler.rs` / `pipeline.rs`

mod assets;
mod blend;
mod config;
mod decoder;
mod encoder;
mod error;
mod handler;
mod loader;
mod opacity;
mod pipeline;
mod placement;
mod request;
mod rotation;
mod service;
mod source;
mod style;

pub use assets::{LogoAsset, LogoCatalog, LogoVariant};
pub use blend::BlendMode;
pub use config::{CompositorConfig, ResizeFilter};
pub use encoder::{PNG_DATA_URL_PREFIX, encode_data_url, encode_png, to_png_data_url};
pub use error::CompositeError;
pub use handler::{CompositingResult, LogoCompositor, StageTimings};
pub use opacity::apply_opacity;
pub use placement::{Corner, MAX_SIZE_PERCENT, MIN_SIZE_PERCENT, PlacementBox, PlacementInput, compute_placement};
pub use request::{
    CompositeResponse,
    CompositingRequest,
    CompositingRequestBody,
    DEFAULT_OPACITY_PERCENT,
    DEFAULT_ROTATION_DEGREES,
    DEFAULT_SIZE_PERCENT,
    ErrorBody,
};
pub use rotation::{normalize_degrees, rotate_logo};
pub use service::{ApiResponse, CompositorService};
pub use source::{ImageSource, RasterImage};
pub use style::{MonochromeThresholds, VisualStyle, apply_style_transform};
