//! # 重试策略
//!
//! 指数退避 + 有界抖动 + 总预算。
//!
//! - 第 n 次重试的基础等待为 `base * 2^(n-1)`，封顶 `max_delay_ms`
//! - 抖动上限为基础等待的 1/3，避免多实例同时重试形成尖峰
//! - 若“已耗时 + 本次等待”超过预算则放弃重试，直接返回最后一次错误

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// 可重试判定：由调用方的错误类型实现。
pub trait Retryable {
    fn is_retryable(&self) -> bool;

    /// 服务端给出的等待提示（如 `Retry-After`），毫秒。
    fn retry_after_hint_ms(&self) -> Option<u64> {
        None
    }
}

/// 重试策略配置。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// 最大尝试次数（含首次）。
    pub max_attempts: u32,
    /// 基础退避（毫秒）。
    pub base_delay_ms: u64,
    /// 单次退避上限（毫秒）。
    pub max_delay_ms: u64,
    /// 单次调用允许的总重试预算（毫秒）。
    pub max_total_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 4_000,
            max_total_ms: 20_000,
        }
    }
}

static JITTER_STATE: AtomicU64 = AtomicU64::new(0);

fn seed_jitter_state() -> u64 {
    let time_seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let mut state = time_seed ^ ((std::process::id() as u64) << 32) ^ 0x9E37_79B9_7F4A_7C15;
    if state == 0 {
        state = 0xA5A5_5A5A_0123_4567;
    }
    state
}

/// xorshift 抖动源，多线程下用 CAS 推进状态。
fn next_jitter_u64() -> u64 {
    let mut current = JITTER_STATE.load(Ordering::Relaxed);

    loop {
        let seeded = if current == 0 {
            seed_jitter_state()
        } else {
            current
        };

        let mut next = seeded;
        next ^= next << 13;
        next ^= next >> 7;
        next ^= next << 17;

        match JITTER_STATE.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(observed) => current = observed,
        }
    }
}

/// 计算第 `attempt` 次重试前的等待时间（毫秒）。
///
/// `server_hint_ms` 存在时替代指数基础值（仍受上限约束）。
pub fn compute_backoff_delay_with_jitter(
    base_delay_ms: u64,
    attempt: u32,
    max_delay_ms: u64,
    server_hint_ms: Option<u64>,
) -> u64 {
    let exp = base_delay_ms.saturating_mul(1_u64 << attempt.saturating_sub(1).min(16));
    let base = server_hint_ms.unwrap_or(exp);
    let capped = base.min(max_delay_ms.max(base_delay_ms));
    let jitter_bound = (capped / 3).max(1);
    let jitter = next_jitter_u64() % (jitter_bound + 1);
    capped.saturating_add(jitter)
}

/// 解析 `Retry-After`（秒数形式）为毫秒。
pub fn retry_after_hint_ms(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    let value = headers.get(reqwest::header::RETRY_AFTER)?;
    let secs = value.to_str().ok()?.trim().parse::<u64>().ok()?;
    Some(secs.saturating_mul(1000))
}

pub fn would_exceed_retry_budget(elapsed_ms: u64, wait_ms: u64, budget_ms: u64) -> bool {
    elapsed_ms.saturating_add(wait_ms) > budget_ms
}

impl RetryPolicy {
    /// 执行 `operation`，对可重试错误按策略退避重试。
    ///
    /// `label` 仅用于日志。
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.max_attempts.max(1);
        let started = Instant::now();
        let mut attempt: u32 = 1;

        loop {
            let err = match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        log::info!("✅ {} 第 {} 次尝试成功", label, attempt);
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                log::warn!("🛑 {} 遇到不可重试错误：{}", label, err);
                return Err(err);
            }

            if attempt >= attempts {
                log::warn!("❌ {} 已用尽 {} 次尝试：{}", label, attempts, err);
                return Err(err);
            }

            let wait_ms = compute_backoff_delay_with_jitter(
                self.base_delay_ms.max(1),
                attempt,
                self.max_delay_ms,
                err.retry_after_hint_ms(),
            );
            let elapsed_ms = started.elapsed().as_millis() as u64;
            if would_exceed_retry_budget(elapsed_ms, wait_ms, self.max_total_ms) {
                log::warn!(
                    "⏱️ {} 跳过第 {} 次重试：等待 {}ms 会超过预算 {}ms",
                    label,
                    attempt + 1,
                    wait_ms,
                    self.max_total_ms
                );
                return Err(err);
            }

            log::warn!(
                "⚠️ {} 失败（第 {}/{} 次，可重试）：{}；{}ms 后重试",
                label,
                attempt,
                attempts,
                err,
                wait_ms
            );
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
            attempt += 1;
        }
    }
}
