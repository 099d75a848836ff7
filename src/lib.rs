//! # 品牌配图工具 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 CLI (clap) / 其他边界层                   │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↕ ApiResponse { status, body: {imageUrl} | {error, code} }
//! ┌───────┼──────────────────────────────────────────────────┐
//! │  ┌─ commands ──── composite / generate / health          │
//! │  │                                                       │
//! │  ├─ compositor ── 加载 · 解码 · 摆放 · 风格 · 旋转 ·      │
//! │  │                不透明度 · 混合 · PNG Data URL          │
//! │  │                                                       │
//! │  ├─ provider ──── 提示词 · Gemini 客户端 · 容错包装        │
//! │  │                                                       │
//! │  ├─ resilience ── 重试退避 · 熔断器                       │
//! │  │                                                       │
//! │  ├─ settings ──── JSON 配置 + 环境变量覆盖                │
//! │  └─ error ─────── AppError (统一错误类型)                 │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError`，序列化为 `{ error, code }` |
//! | [`compositor`] | 服务端 Logo 合成流水线，Logo 相关失败降级为返回原图 |
//! | [`provider`] | 生成式图片服务抽象、Gemini 实现与熔断/重试/超时包装 |
//! | [`resilience`] | 与协议无关的重试策略与熔断器状态机 |
//! | [`settings`] | 应用设置加载 |
//! | [`commands`] | CLI 命令适配 |

pub mod commands;
pub mod compositor;
pub mod error;
pub mod provider;
pub mod resilience;
pub mod settings;
