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

//! Per-IP, per-route-class rate limiting (spec.md §6): a rolling 60-second window of request
//! timestamps per `(ip, class)` pair, plus a global per-IP window summed across every class.
//!
//! The rolling-window technique mirrors `grid-network`'s outbound rate-limit guard, applied here
//! to inbound requests instead of outgoing exchange calls.

use std::{collections::VecDeque, sync::Arc};

use dashmap::DashMap;
use grid_core::Clock;
use tokio::sync::Mutex;

/// The named rate-limit buckets from spec.md §6 "HTTP control plane".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitClass {
    Auth,
    Trading,
    GridControl,
    StatusCheck,
}

impl RateLimitClass {
    const fn label(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Trading => "trading",
            Self::GridControl => "grid_control",
            Self::StatusCheck => "status_check",
        }
    }
}

/// Per-minute caps for the global bucket and each named class (spec.md §6).
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub global_per_minute: u32,
    pub auth_per_minute: u32,
    pub trading_per_minute: u32,
    pub grid_control_per_minute: u32,
    pub status_check_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            global_per_minute: 1000,
            auth_per_minute: 120,
            trading_per_minute: 60,
            grid_control_per_minute: 30,
            status_check_per_minute: 300,
        }
    }
}

impl RateLimitConfig {
    fn limit_for(self, class: RateLimitClass) -> u32 {
        match class {
            RateLimitClass::Auth => self.auth_per_minute,
            RateLimitClass::Trading => self.trading_per_minute,
            RateLimitClass::GridControl => self.grid_control_per_minute,
            RateLimitClass::StatusCheck => self.status_check_per_minute,
        }
    }
}

const WINDOW_MS: i64 = 60_000;

/// A rolling 60-second window of admitted-request timestamps for one bucket key.
#[derive(Debug, Default)]
struct Window {
    timestamps: VecDeque<i64>,
}

impl Window {
    fn admit(&mut self, now_ms: i64, limit: u32) -> bool {
        while matches!(self.timestamps.front(), Some(&t) if now_ms - t >= WINDOW_MS) {
            self.timestamps.pop_front();
        }
        if self.timestamps.len() as u32 >= limit {
            return false;
        }
        self.timestamps.push_back(now_ms);
        true
    }
}

/// Per-IP, per-class admission control backing every route's rate limit (spec.md §6).
#[derive(Debug)]
pub struct IpRateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    global: DashMap<String, Mutex<Window>>,
    classed: DashMap<(String, &'static str), Mutex<Window>>,
}

impl IpRateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock, global: DashMap::new(), classed: DashMap::new() }
    }

    /// Returns whether a request from `ip` for `class` may proceed, consuming a slot from both
    /// the global bucket and the class-specific bucket if so. The class bucket is only checked
    /// once the global bucket has already admitted the request (spec.md §6 "Rate limits").
    pub async fn check(&self, ip: &str, class: RateLimitClass) -> bool {
        let now_ms = self.clock.timestamp_ms();

        let global_admitted = {
            let entry = self.global.entry(ip.to_string()).or_default();
            let mut window = entry.lock().await;
            window.admit(now_ms, self.config.global_per_minute)
        };
        if !global_admitted {
            return false;
        }

        let entry = self.classed.entry((ip.to_string(), class.label())).or_default();
        let mut window = entry.lock().await;
        window.admit(now_ms, self.config.limit_for(class))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use grid_core::clock::TestClock;

    use super::*;

    fn limiter(config: RateLimitConfig) -> (Arc<TestClock>, IpRateLimiter) {
        let clock = Arc::new(TestClock::new(chrono::Utc::now()));
        let limiter = IpRateLimiter::new(config, clock.clone());
        (clock, limiter)
    }

    #[tokio::test]
    async fn admits_up_to_the_class_limit_then_rejects() {
        let (_clock, limiter) = limiter(RateLimitConfig { auth_per_minute: 2, ..RateLimitConfig::default() });
        assert!(limiter.check("1.2.3.4", RateLimitClass::Auth).await);
        assert!(limiter.check("1.2.3.4", RateLimitClass::Auth).await);
        assert!(!limiter.check("1.2.3.4", RateLimitClass::Auth).await);
    }

    #[tokio::test]
    async fn different_ips_have_independent_buckets() {
        let (_clock, limiter) = limiter(RateLimitConfig { auth_per_minute: 1, ..RateLimitConfig::default() });
        assert!(limiter.check("1.2.3.4", RateLimitClass::Auth).await);
        assert!(limiter.check("5.6.7.8", RateLimitClass::Auth).await);
    }

    #[tokio::test]
    async fn different_classes_have_independent_buckets() {
        let (_clock, limiter) =
            limiter(RateLimitConfig { auth_per_minute: 1, trading_per_minute: 1, ..RateLimitConfig::default() });
        assert!(limiter.check("1.2.3.4", RateLimitClass::Auth).await);
        assert!(limiter.check("1.2.3.4", RateLimitClass::Trading).await);
    }

    #[tokio::test]
    async fn global_bucket_caps_across_classes() {
        let (_clock, limiter) = limiter(RateLimitConfig {
            global_per_minute: 1,
            auth_per_minute: 10,
            trading_per_minute: 10,
            ..RateLimitConfig::default()
        });
        assert!(limiter.check("1.2.3.4", RateLimitClass::Auth).await);
        assert!(!limiter.check("1.2.3.4", RateLimitClass::Trading).await);
    }

    #[tokio::test]
    async fn window_rolls_forward_after_advancing_past_it() {
        let (clock, limiter) = limiter(RateLimitConfig { auth_per_minute: 1, ..RateLimitConfig::default() });
        assert!(limiter.check("1.2.3.4", RateLimitClass::Auth).await);
        assert!(!limiter.check("1.2.3.4", RateLimitClass::Auth).await);
        clock.advance(chrono::Duration::seconds(61));
        assert!(limiter.check("1.2.3.4", RateLimitClass::Auth).await);
    }
}
