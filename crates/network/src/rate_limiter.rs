// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Grid Engine Contributors.
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! The rate-limit guard (C1): a rolling-window + per-second-bucket admission filter in front of
//! every outgoing REST call, with adaptive throttling and backoff on upstream rate-limit
//! signals (spec.md §4.1).

use std::{
    collections::VecDeque,
    future::Future,
    sync::Mutex,
    time::Duration,
};

use grid_core::Clock;
use tokio::time::sleep;
use tracing::warn;

use crate::error::NetworkError;

/// Configuration for a [`RateLimitGuard`], mirroring `RateLimitConfig` from the original
/// service's rate-limit protector.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub requests_per_second: u32,
    pub safety_margin: f64,
    pub rate_limit_backoff_secs: u64,
    pub max_backoff_secs: u64,
    pub alert_threshold: f64,
    pub monitoring_window_secs: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 120,
            requests_per_second: 10,
            safety_margin: 0.8,
            rate_limit_backoff_secs: 60,
            max_backoff_secs: 300,
            alert_threshold: 0.7,
            monitoring_window_secs: 60,
        }
    }
}

#[derive(Debug)]
struct GuardState {
    /// Timestamps (millis) of admitted requests within the rolling window.
    window: VecDeque<i64>,
    /// (second, count) buckets, oldest first, capped to the last 60 seconds.
    second_buckets: VecDeque<(i64, u32)>,
    current_rpm: u32,
    consecutive_violations: u32,
    rate_limited_since: Option<i64>,
}

/// The C1 rate-limit guard: a rolling-window/per-second hybrid admission filter with adaptive
/// throttling and a backoff window triggered by upstream rate-limit signals.
#[derive(Debug)]
pub struct RateLimitGuard {
    config: RateLimitConfig,
    clock: std::sync::Arc<dyn Clock>,
    state: Mutex<GuardState>,
}

impl RateLimitGuard {
    /// Builds a guard starting at `config.requests_per_minute` with no prior violations.
    #[must_use]
    pub fn new(config: RateLimitConfig, clock: std::sync::Arc<dyn Clock>) -> Self {
        let current_rpm = config.requests_per_minute;
        Self {
            config,
            clock,
            state: Mutex::new(GuardState {
                window: VecDeque::new(),
                second_buckets: VecDeque::new(),
                current_rpm,
                consecutive_violations: 0,
                rate_limited_since: None,
            }),
        }
    }

    fn now_millis(&self) -> i64 {
        self.clock.timestamp_ms()
    }

    /// Attempts to admit a request of `weight` (normally 1). Returns `true` if the request may
    /// proceed, `false` if it should be rejected (local backoff window, or window/bucket full).
    pub fn acquire(&self, weight: u32) -> bool {
        let now = self.now_millis();
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        self.cleanup_locked(&mut state, now);

        if let Some(since) = state.rate_limited_since {
            let backoff_ms = self.config.rate_limit_backoff_secs as i64 * 1000;
            if now - since < backoff_ms {
                return false;
            }
            state.rate_limited_since = None;
        }

        if !Self::can_admit_locked(&self.config, &state, now, weight) {
            self.adaptive_throttle_locked(&mut state);
            return false;
        }

        Self::record_locked(&mut state, now, weight);
        true
    }

    fn cleanup_locked(&self, state: &mut GuardState, now: i64) {
        let cutoff = now - self.config.monitoring_window_secs * 1000;
        while matches!(state.window.front(), Some(&t) if t < cutoff) {
            state.window.pop_front();
        }
        let current_second = now / 1000;
        while state.second_buckets.len() > 60 {
            state.second_buckets.pop_front();
        }
        while matches!(state.second_buckets.front(), Some(&(s, _)) if s < current_second - 60) {
            state.second_buckets.pop_front();
        }
    }

    fn can_admit_locked(config: &RateLimitConfig, state: &GuardState, now: i64, weight: u32) -> bool {
        let minute_limit = (f64::from(state.current_rpm) * config.safety_margin).floor() as usize;
        if state.window.len() + weight as usize > minute_limit {
            return false;
        }

        let current_second = now / 1000;
        let second_count: u32 = state
            .second_buckets
            .iter()
            .filter(|(s, _)| *s == current_second)
            .map(|(_, c)| *c)
            .sum();
        let second_limit =
            (f64::from(config.requests_per_second) * config.safety_margin).floor() as u32;
        second_count + weight <= second_limit
    }

    fn record_locked(state: &mut GuardState, now: i64, weight: u32) {
        for _ in 0..weight {
            state.window.push_back(now);
        }
        let current_second = now / 1000;
        if let Some(last) = state.second_buckets.back_mut() {
            if last.0 == current_second {
                last.1 += weight;
                return;
            }
        }
        state.second_buckets.push_back((current_second, weight));
    }

    /// Adaptive throttling: when usage exceeds `alert_threshold`, shrink `current_rpm` by 10%,
    /// floored at half the configured `requests_per_minute` (spec.md §4.1).
    fn adaptive_throttle_locked(&self, state: &mut GuardState) {
        let usage_rate = state.window.len() as f64 / f64::from(state.current_rpm);
        if usage_rate > self.config.alert_threshold {
            let floor = self.config.requests_per_minute / 2;
            let candidate = (f64::from(state.current_rpm) * 0.9) as u32;
            let new_limit = candidate.max(floor);
            if new_limit != state.current_rpm {
                warn!(
                    old_rpm = state.current_rpm,
                    new_rpm = new_limit,
                    "rate-limit guard adaptively reduced rpm"
                );
                state.current_rpm = new_limit;
            }
        }
    }

    /// Records an upstream rate-limit rejection: enters the backoff window and further reduces
    /// `current_rpm` by `0.5^violations`, floored at a quarter of the configured rpm.
    pub fn record_rate_limit_violation(&self) {
        let now = self.now_millis();
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.rate_limited_since = Some(now);
        state.consecutive_violations += 1;

        let reduction = 0.5_f64.powi(state.consecutive_violations as i32);
        let floor = self.config.requests_per_minute / 4;
        let candidate = (f64::from(state.current_rpm) * reduction) as u32;
        let new_limit = candidate.max(floor);
        if new_limit != state.current_rpm {
            warn!(
                old_rpm = state.current_rpm,
                new_rpm = new_limit,
                violations = state.consecutive_violations,
                "rate-limit guard entered backoff after upstream rejection"
            );
            state.current_rpm = new_limit;
        }
    }

    /// The `current_rpm` the guard is presently enforcing (after adaptive reduction).
    #[must_use]
    pub fn current_rpm(&self) -> u32 {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).current_rpm
    }

    /// Resets the guard to its initial configured state.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.window.clear();
        state.second_buckets.clear();
        state.current_rpm = self.config.requests_per_minute;
        state.consecutive_violations = 0;
        state.rate_limited_since = None;
    }

    /// Runs `f`, retrying up to 3 times on rate-limit errors with exponential backoff bounded by
    /// `max_backoff_secs`. Non-rate-limit errors propagate immediately (spec.md §4.1).
    pub async fn execute<F, Fut, T>(&self, mut f: F) -> Result<T, NetworkError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, NetworkError>>,
    {
        const MAX_RETRIES: u32 = 3;
        let mut attempt = 0;

        loop {
            while !self.acquire(1) {
                sleep(Duration::from_millis(100)).await;
            }

            match f().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_rate_limited() && attempt < MAX_RETRIES => {
                    self.record_rate_limit_violation();
                    attempt += 1;
                    let backoff = Duration::from_secs(self.config.rate_limit_backoff_secs)
                        .saturating_mul(2u32.pow(attempt))
                        .min(Duration::from_secs(self.config.max_backoff_secs));
                    sleep(backoff).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use grid_core::clock::TestClock;

    use super::*;

    fn guard_with(config: RateLimitConfig) -> (Arc<TestClock>, RateLimitGuard) {
        let clock = Arc::new(TestClock::new(Utc::now()));
        let guard = RateLimitGuard::new(config, clock.clone());
        (clock, guard)
    }

    #[test]
    fn admits_up_to_the_safety_margin_then_rejects() {
        let config = RateLimitConfig {
            requests_per_minute: 120,
            requests_per_second: 10,
            safety_margin: 0.8,
            ..Default::default()
        };
        let (_, guard) = guard_with(config);

        let mut admitted = 0;
        for _ in 0..200 {
            if guard.acquire(1) {
                admitted += 1;
            }
        }
        // Per-second cap: floor(10 * 0.8) = 8, all within the first second.
        assert_eq!(admitted, 8);
    }

    #[test]
    fn rolling_window_frees_up_after_cleanup() {
        let config = RateLimitConfig {
            requests_per_minute: 60,
            requests_per_second: 1000,
            safety_margin: 1.0,
            monitoring_window_secs: 60,
            ..Default::default()
        };
        let (clock, guard) = guard_with(config);

        for _ in 0..60 {
            assert!(guard.acquire(1));
        }
        assert!(!guard.acquire(1));

        clock.advance(chrono::Duration::seconds(61));
        assert!(guard.acquire(1));
    }

    #[test]
    fn rate_limit_violation_enters_backoff_window() {
        let config = RateLimitConfig {
            rate_limit_backoff_secs: 60,
            ..Default::default()
        };
        let (clock, guard) = guard_with(config);

        guard.record_rate_limit_violation();
        assert!(!guard.acquire(1));

        clock.advance(chrono::Duration::seconds(61));
        assert!(guard.acquire(1));
    }

    #[test]
    fn adaptive_factor_is_non_increasing_under_violations() {
        let (_, guard) = guard_with(RateLimitConfig::default());
        let before = guard.current_rpm();
        guard.record_rate_limit_violation();
        let after_first = guard.current_rpm();
        guard.record_rate_limit_violation();
        let after_second = guard.current_rpm();

        assert!(after_first <= before);
        assert!(after_second <= after_first);
    }

    #[test]
    fn reset_restores_configured_rpm() {
        let (_, guard) = guard_with(RateLimitConfig::default());
        guard.record_rate_limit_violation();
        assert!(guard.current_rpm() < 120);
        guard.reset();
        assert_eq!(guard.current_rpm(), 120);
    }

    #[tokio::test]
    async fn execute_propagates_non_rate_limit_errors_immediately() {
        let (_, guard) = guard_with(RateLimitConfig::default());
        let result: Result<(), NetworkError> = guard
            .execute(|| async { Err(NetworkError::Auth("bad key".into())) })
            .await;
        assert!(matches!(result, Err(NetworkError::Auth(_))));
    }

    #[tokio::test]
    async fn execute_returns_ok_without_retry() {
        let (_, guard) = guard_with(RateLimitConfig::default());
        let result = guard.execute(|| async { Ok::<_, NetworkError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }
}
