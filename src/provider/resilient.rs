//! # 容错包装
//!
//! ## 设计思路
//!
//! `ResilientProvider<P>` 把任意 [`ImageProvider`] 包装为同样的 trait，调用方无感知。
//! 每次尝试的顺序固定为：
//! 1. 熔断器放行判定（拒绝 → `CircuitOpen`，不可重试，立即返回）
//! 2. `tokio::time::timeout` 包住单次调用
//! 3. 按结果更新熔断器
//!
//! 外层由 `RetryPolicy::run` 驱动退避重试。熔断器是唯一的共享可变状态，
//! 由实例持有的 `Mutex` 保护，锁从不跨越 `.await`。

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::{GeneratedImage, ImageProvider, PromptRequest, ProviderConfig, ProviderError};
use crate::resilience::{Admission, BreakerConfig, BreakerState, CircuitBreaker, RetryPolicy};

/// 健康报告。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub provider: String,
    pub breaker_state: BreakerState,
    pub consecutive_failures: u32,
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

pub struct ResilientProvider<P> {
    inner: P,
    breaker: Mutex<CircuitBreaker>,
    retry: RetryPolicy,
    call_timeout: Duration,
    health_timeout: Duration,
}

impl<P: ImageProvider> ResilientProvider<P> {
    pub fn new(inner: P, retry: RetryPolicy, breaker: BreakerConfig, call_timeout: Duration) -> Self {
        Self {
            inner,
            breaker: Mutex::new(CircuitBreaker::new(breaker)),
            retry,
            call_timeout,
            health_timeout: call_timeout,
        }
    }

    pub fn from_config(inner: P, config: &ProviderConfig) -> Self {
        let mut provider = Self::new(
            inner,
            config.retry.clone(),
            config.breaker.clone(),
            Duration::from_millis(config.request_timeout_ms),
        );
        provider.health_timeout = Duration::from_millis(config.health_timeout_ms);
        provider
    }

    pub fn breaker_state(&self) -> BreakerState {
        self.lock_breaker().state()
    }

    fn lock_breaker(&self) -> MutexGuard<'_, CircuitBreaker> {
        // 熔断器状态只有计数与时间点，锁中毒后沿用内部值即可
        self.breaker.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn admit(&self) -> Result<Admission, ProviderError> {
        match self.lock_breaker().try_acquire() {
            Admission::Rejected { retry_in } => Err(ProviderError::CircuitOpen {
                retry_in_ms: retry_in.as_millis() as u64,
            }),
            admission => Ok(admission),
        }
    }

    fn record(&self, result: &Result<GeneratedImage, ProviderError>) {
        let mut breaker = self.lock_breaker();
        match result {
            Err(e) if e.counts_against_breaker() => {
                breaker.record_failure();
                log::warn!(
                    "⚠️ {} 调用失败，连续失败 {} 次，熔断器状态: {:?}",
                    self.inner.name(),
                    breaker.consecutive_failures(),
                    breaker.state()
                );
            }
            _ => breaker.record_success(),
        }
    }

    async fn attempt(&self, request: &PromptRequest, attempt: u32) -> Result<GeneratedImage, ProviderError> {
        let admission = self.admit()?;
        if admission == Admission::Probe {
            log::info!("🔌 {} 半开探测（第 {} 次尝试）", self.inner.name(), attempt);
        }

        let result = match tokio::time::timeout(self.call_timeout, self.inner.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                after_ms: self.call_timeout.as_millis() as u64,
            }),
        };
        self.record(&result);
        result
    }

    /// 健康检查：探测上游可达性并附带熔断器快照。不影响熔断器状态。
    pub async fn health(&self) -> HealthReport {
        let outcome = match tokio::time::timeout(self.health_timeout, self.inner.health_check()).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                after_ms: self.health_timeout.as_millis() as u64,
            }),
        };

        let breaker = self.lock_breaker();
        let report = HealthReport {
            provider: self.inner.name().to_string(),
            breaker_state: breaker.state(),
            consecutive_failures: breaker.consecutive_failures(),
            reachable: outcome.is_ok(),
            detail: outcome.err().map(|e| e.to_string()),
        };
        drop(breaker);

        log::info!(
            "🌐 健康检查 - {} reachable={} breaker={:?} failures={}",
            report.provider,
            report.reachable,
            report.breaker_state,
            report.consecutive_failures
        );
        report
    }
}

#[async_trait]
impl<P: ImageProvider> ImageProvider for ResilientProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, request: &PromptRequest) -> Result<GeneratedImage, ProviderError> {
        let label = format!("{} 图片生成", self.inner.name());
        self.retry
            .run(&label, move |attempt| self.attempt(request, attempt))
            .await
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let report = self.health().await;
        if report.reachable {
            Ok(())
        } else {
            Err(ProviderError::Network(
                report.detail.unwrap_or_else(|| "生成服务不可达".to_string()),
            ))
        }
    }
}
