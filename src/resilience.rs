//! # 容错工具模块
//!
//! 对外部 HTTP 依赖（图片下载、生成式图片服务）的通用保护：
//!
//! - [`retry`]：指数退避 + 抖动 + 总预算
//! - [`breaker`]：熔断器状态机（Closed → Open → HalfOpen）
//!
//! 两者都与具体协议无关，调用方通过实现 [`Retryable`] 声明哪些错误值得重试。

pub mod breaker;
pub mod retry;

pub use breaker::{Admission, BreakerConfig, BreakerState, CircuitBreaker};
pub use retry::{RetryPolicy, Retryable, retry_after_hint_ms};
