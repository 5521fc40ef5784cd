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

//! Order restoration policy for the grid engine (C7): when an externally-cancelled order should
//! be recreated, and the rate/price/window guards bounding how often that happens
//! (spec.md §4.7 "Order restoration policy").

use std::collections::VecDeque;

use rust_decimal::Decimal;

/// Why an order transitioned to Cancelled, normalized from the exchange's free-text reason
/// (spec.md §4.7). Grounded on the original bot's `CancellationType` taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationType {
    UserCancelled,
    SystemCancelled,
    Expired,
    ExternalCancelDetected,
    Unknown,
}

/// Whether, and under what conditions, a cancelled order should be automatically recreated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorationPolicy {
    Never,
    UserOnly,
    All,
    Smart,
}

impl RestorationPolicy {
    /// Whether this policy restores orders cancelled for `reason`, independent of the
    /// rate/price/window guards (spec.md §4.7's policy table).
    #[must_use]
    pub fn should_restore(self, reason: CancellationType) -> bool {
        match self {
            Self::Never => false,
            Self::UserOnly => reason == CancellationType::UserCancelled,
            Self::All => reason != CancellationType::Unknown,
            Self::Smart => matches!(
                reason,
                CancellationType::UserCancelled | CancellationType::ExternalCancelDetected
            ),
        }
    }
}

/// Normalizes a free-text cancel reason into a [`CancellationType`]: uppercase direct match
/// first, then a case-insensitive substring match (spec.md §4.7).
#[must_use]
pub fn classify_cancel_reason(reason: &str) -> CancellationType {
    if reason.is_empty() {
        return CancellationType::Unknown;
    }
    let upper = reason.to_ascii_uppercase();

    for (pattern, kind) in CANCEL_REASON_MAPPING {
        if upper == *pattern {
            return *kind;
        }
    }
    let lower = reason.to_ascii_lowercase();
    for (pattern, kind) in CANCEL_REASON_MAPPING {
        if lower.contains(&pattern.to_ascii_lowercase()) {
            return *kind;
        }
    }
    CancellationType::Unknown
}

const CANCEL_REASON_MAPPING: &[(&str, CancellationType)] = &[
    ("USER_CANCELLED", CancellationType::UserCancelled),
    ("USER_CANCELED", CancellationType::UserCancelled),
    ("CANCELLED_BY_USER", CancellationType::UserCancelled),
    ("USER_REQUESTED_CANCEL", CancellationType::UserCancelled),
    ("INSUFFICIENT_MARGIN", CancellationType::SystemCancelled),
    ("POSITION_LIMIT", CancellationType::SystemCancelled),
    ("RISK_LIMIT", CancellationType::SystemCancelled),
    ("ACCOUNT_SUSPENDED", CancellationType::SystemCancelled),
    ("EXPIRED", CancellationType::Expired),
    ("TIME_IN_FORCE", CancellationType::Expired),
    ("EXTERNAL_CANCEL_DETECTED", CancellationType::ExternalCancelDetected),
    ("UNKNOWN", CancellationType::Unknown),
];

/// The guards and rate limit bounding restoration attempts (spec.md §4.7).
#[derive(Debug, Clone, Copy)]
pub struct RestorationConfig {
    pub policy: RestorationPolicy,
    pub max_restoration_attempts_per_hour: u32,
    pub max_price_deviation_percent: Decimal,
    pub max_restore_window_seconds: i64,
    pub enable_price_check: bool,
    pub enable_time_window_check: bool,
    /// How often C7's order-sync ticker polls the exchange for externally-cancelled orders.
    pub order_sync_interval_seconds: u64,
}

impl Default for RestorationConfig {
    fn default() -> Self {
        Self {
            policy: RestorationPolicy::Smart,
            max_restoration_attempts_per_hour: 10,
            max_price_deviation_percent: Decimal::new(2, 0),
            max_restore_window_seconds: 300,
            enable_price_check: true,
            enable_time_window_check: true,
            order_sync_interval_seconds: 120,
        }
    }
}

/// Tracks restoration attempts within a rolling one-hour window, per session.
#[derive(Debug, Default)]
pub struct RestorationRateLimiter {
    attempts: VecDeque<i64>,
}

impl RestorationRateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn prune(&mut self, now_ms: i64) {
        let cutoff = now_ms - 3_600_000;
        while matches!(self.attempts.front(), Some(&t) if t < cutoff) {
            self.attempts.pop_front();
        }
    }

    /// Whether another restoration attempt is allowed right now, given `max_per_hour`.
    pub fn try_acquire(&mut self, now_ms: i64, max_per_hour: u32) -> bool {
        self.prune(now_ms);
        if self.attempts.len() >= max_per_hour as usize {
            return false;
        }
        self.attempts.push_back(now_ms);
        true
    }
}

/// The full restoration decision, combining policy, rate limit, price deviation, and time
/// window into a single verdict (spec.md §4.7).
#[must_use]
pub fn decide_restoration(
    config: &RestorationConfig,
    reason: CancellationType,
    cancelled_at_ms: i64,
    now_ms: i64,
    original_price: Decimal,
    current_price: Decimal,
    rate_limiter: &mut RestorationRateLimiter,
) -> bool {
    if !config.policy.should_restore(reason) {
        return false;
    }

    if config.enable_time_window_check {
        let elapsed_seconds = (now_ms - cancelled_at_ms) / 1000;
        if elapsed_seconds > config.max_restore_window_seconds {
            return false;
        }
    }

    if config.enable_price_check && original_price != Decimal::ZERO {
        let deviation = ((current_price - original_price) / original_price).abs() * Decimal::new(100, 0);
        if deviation > config.max_price_deviation_percent {
            return false;
        }
    }

    rate_limiter.try_acquire(now_ms, config.max_restoration_attempts_per_hour)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use rust_decimal_macros::dec;

    use super::*;

    #[rstest]
    #[case("USER_CANCELLED", CancellationType::UserCancelled)]
    #[case("user_canceled", CancellationType::UserCancelled)]
    #[case("cancelled by user request", CancellationType::UserCancelled)]
    #[case("INSUFFICIENT_MARGIN", CancellationType::SystemCancelled)]
    #[case("order expired", CancellationType::Expired)]
    #[case("EXTERNAL_CANCEL_DETECTED", CancellationType::ExternalCancelDetected)]
    #[case("something unrecognized", CancellationType::Unknown)]
    #[case("", CancellationType::Unknown)]
    fn classifies_cancel_reasons(#[case] reason: &str, #[case] expected: CancellationType) {
        assert_eq!(classify_cancel_reason(reason), expected);
    }

    #[rstest]
    #[case(RestorationPolicy::Never, CancellationType::UserCancelled, false)]
    #[case(RestorationPolicy::UserOnly, CancellationType::UserCancelled, true)]
    #[case(RestorationPolicy::UserOnly, CancellationType::ExternalCancelDetected, false)]
    #[case(RestorationPolicy::All, CancellationType::SystemCancelled, true)]
    #[case(RestorationPolicy::All, CancellationType::Unknown, false)]
    #[case(RestorationPolicy::Smart, CancellationType::UserCancelled, true)]
    #[case(RestorationPolicy::Smart, CancellationType::ExternalCancelDetected, true)]
    #[case(RestorationPolicy::Smart, CancellationType::SystemCancelled, false)]
    fn policy_matches_spec_table(
        #[case] policy: RestorationPolicy,
        #[case] reason: CancellationType,
        #[case] expected: bool,
    ) {
        assert_eq!(policy.should_restore(reason), expected);
    }

    #[test]
    fn rate_limiter_caps_attempts_per_hour() {
        let mut limiter = RestorationRateLimiter::new();
        for i in 0..10 {
            assert!(limiter.try_acquire(i * 1000, 10));
        }
        assert!(!limiter.try_acquire(10_000, 10));
    }

    #[test]
    fn rate_limiter_frees_up_after_an_hour() {
        let mut limiter = RestorationRateLimiter::new();
        assert!(limiter.try_acquire(0, 1));
        assert!(!limiter.try_acquire(1000, 1));
        assert!(limiter.try_acquire(3_600_001, 1));
    }

    #[test]
    fn decide_restoration_rejects_beyond_price_deviation() {
        let config = RestorationConfig::default();
        let mut limiter = RestorationRateLimiter::new();
        let allowed = decide_restoration(
            &config,
            CancellationType::UserCancelled,
            0,
            1000,
            dec!(100),
            dec!(105),
            &mut limiter,
        );
        assert!(!allowed);
    }

    #[test]
    fn decide_restoration_rejects_beyond_time_window() {
        let config = RestorationConfig::default();
        let mut limiter = RestorationRateLimiter::new();
        let allowed = decide_restoration(
            &config,
            CancellationType::UserCancelled,
            0,
            301_000,
            dec!(100),
            dec!(100),
            &mut limiter,
        );
        assert!(!allowed);
    }

    #[test]
    fn decide_restoration_allows_within_all_guards() {
        let config = RestorationConfig::default();
        let mut limiter = RestorationRateLimiter::new();
        let allowed = decide_restoration(
            &config,
            CancellationType::UserCancelled,
            0,
            1000,
            dec!(100),
            dec!(100.5),
            &mut limiter,
        );
        assert!(allowed);
    }
}
