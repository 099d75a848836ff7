//! # 熔断器
//!
//! 显式状态机：`Closed → Open → HalfOpen → Closed/Open`。
//!
//! - Closed：正常放行，累计连续失败次数，达到阈值进入 Open
//! - Open：直接拒绝，冷却期结束后进入 HalfOpen
//! - HalfOpen：只放行一个探测请求；成功回到 Closed，失败重新 Open 并重置冷却
//!
//! 所有带 `_at` 后缀的方法接收外部时间点，便于测试时推进时钟。

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// 连续失败多少次后熔断。
    pub failure_threshold: u32,
    /// 熔断冷却时间（毫秒）。
    pub cooldown_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_ms: 30_000,
        }
    }
}

/// 放行判定结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// 半开状态下的唯一探测请求。
    Probe,
    /// 熔断中，附带剩余冷却时间。
    Rejected { retry_in: Duration },
}

#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: BreakerState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            probe_in_flight: false,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    fn cooldown(&self) -> Duration {
        Duration::from_millis(self.config.cooldown_ms)
    }

    pub fn try_acquire(&mut self) -> Admission {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&mut self, now: Instant) -> Admission {
        match self.state {
            BreakerState::Closed => Admission::Allowed,
            BreakerState::Open => {
                let opened_at = self.opened_at.unwrap_or(now);
                let elapsed = now.saturating_duration_since(opened_at);
                if elapsed >= self.cooldown() {
                    log::info!("🔌 熔断冷却结束，进入半开状态");
                    self.state = BreakerState::HalfOpen;
                    self.probe_in_flight = true;
                    Admission::Probe
                } else {
                    Admission::Rejected {
                        retry_in: self.cooldown() - elapsed,
                    }
                }
            }
            BreakerState::HalfOpen => {
                if self.probe_in_flight {
                    Admission::Rejected {
                        retry_in: Duration::ZERO,
                    }
                } else {
                    self.probe_in_flight = true;
                    Admission::Probe
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        if self.state != BreakerState::Closed {
            log::info!("✅ 探测成功，熔断器闭合");
        }
        self.state = BreakerState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
        self.probe_in_flight = false;
    }

    pub fn record_failure(&mut self) {
        self.record_failure_at(Instant::now());
    }

    pub fn record_failure_at(&mut self, now: Instant) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.probe_in_flight = false;

        match self.state {
            BreakerState::HalfOpen => {
                log::warn!("🔌 半开探测失败，重新熔断");
                self.trip(now);
            }
            BreakerState::Closed if self.consecutive_failures >= self.config.failure_threshold.max(1) => {
                log::warn!(
                    "🔌 连续失败 {} 次，熔断 {}ms",
                    self.consecutive_failures,
                    self.config.cooldown_ms
                );
                self.trip(now);
            }
            _ => {}
        }
    }

    fn trip(&mut self, now: Instant) {
        self.state = BreakerState::Open;
        self.opened_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, cooldown_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(BreakerConfig {
            failure_threshold: threshold,
            cooldown_ms,
        })
    }

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let mut b = breaker(3, 1_000);
        let now = Instant::now();

        b.record_failure_at(now);
        b.record_failure_at(now);
        assert_eq!(b.state(), BreakerState::Closed);

        b.record_failure_at(now);
        assert_eq!(b.state(), BreakerState::Open);
        assert!(matches!(b.try_acquire_at(now), Admission::Rejected { .. }));
    }

    #[test]
    fn success_resets_failure_streak() {
        let mut b = breaker(2, 1_000);
        let now = Instant::now();

        b.record_failure_at(now);
        b.record_success();
        b.record_failure_at(now);

        assert_eq!(b.state(), BreakerState::Closed);
        assert_eq!(b.consecutive_failures(), 1);
    }

    #[test]
    fn half_open_allows_single_probe_after_cooldown() {
        let mut b = breaker(1, 1_000);
        let start = Instant::now();
        b.record_failure_at(start);

        let later = start + Duration::from_millis(1_001);
        assert_eq!(b.try_acquire_at(later), Admission::Probe);
        assert_eq!(b.state(), BreakerState::HalfOpen);
        assert!(matches!(b.try_acquire_at(later), Admission::Rejected { .. }));

        b.record_success();
        assert_eq!(b.state(), BreakerState::Closed);
        assert_eq!(b.try_acquire_at(later), Admission::Allowed);
    }

    #[test]
    fn failed_probe_reopens_and_restarts_cooldown() {
        let mut b = breaker(1, 1_000);
        let start = Instant::now();
        b.record_failure_at(start);

        let probe_time = start + Duration::from_millis(1_500);
        assert_eq!(b.try_acquire_at(probe_time), Admission::Probe);
        b.record_failure_at(probe_time);
        assert_eq!(b.state(), BreakerState::Open);

        let Admission::Rejected { retry_in } =
            b.try_acquire_at(probe_time + Duration::from_millis(200))
        else {
            panic!("breaker should still be open");
        };
        assert_eq!(retry_in, Duration::from_millis(800));
    }
}
