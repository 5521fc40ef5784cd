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

//! A minimal testable clock abstraction.
//!
//! Cooldown windows (recovery supervisor), nonce TTLs, restoration rate limits, and health
//! sampling all need "now" to be swappable in tests without sleeping real time. This mirrors
//! the `Clock` seam the teacher's live components depend on, trimmed to what the engine
//! actually needs: no timers, no event callbacks, just the current instant.

use std::{
    fmt::Debug,
    sync::atomic::{AtomicI64, Ordering},
};

use chrono::{DateTime, Utc};

/// A source of the current time.
pub trait Clock: Debug + Send + Sync {
    /// Returns the current date and time as a timezone-aware `DateTime<Utc>`.
    fn utc_now(&self) -> DateTime<Utc>;

    /// Returns the current UNIX timestamp in milliseconds, used for challenge/nonce freshness
    /// checks and wire timestamps.
    fn timestamp_ms(&self) -> i64 {
        self.utc_now().timestamp_millis()
    }
}

/// A [`Clock`] backed by the system's real-time clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiveClock;

impl Clock for LiveClock {
    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A [`Clock`] whose current time is set explicitly, for deterministic tests of cooldowns,
/// TTL expiry, and rate-limit windows.
#[derive(Debug)]
pub struct TestClock {
    millis: AtomicI64,
}

impl TestClock {
    /// Creates a new [`TestClock`] starting at `initial`.
    #[must_use]
    pub fn new(initial: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(initial.timestamp_millis()),
        }
    }

    /// Advances the clock by `duration`.
    pub fn advance(&self, duration: chrono::Duration) {
        self.millis
            .fetch_add(duration.num_milliseconds(), Ordering::SeqCst);
    }

    /// Sets the clock to an explicit instant.
    pub fn set(&self, time: DateTime<Utc>) {
        self.millis.store(time.timestamp_millis(), Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn utc_now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst))
            .unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_clock_returns_recent_time() {
        let clock = LiveClock;
        let before = Utc::now();
        let now = clock.utc_now();
        assert!(now >= before);
    }

    #[test]
    fn test_clock_advances_deterministically() {
        let start = Utc::now();
        let clock = TestClock::new(start);
        assert_eq!(clock.utc_now().timestamp_millis(), start.timestamp_millis());

        clock.advance(chrono::Duration::seconds(60));
        assert_eq!(
            clock.utc_now().timestamp_millis(),
            start.timestamp_millis() + 60_000
        );
    }

    #[test]
    fn test_clock_set_overrides_absolute_time() {
        let clock = TestClock::new(Utc::now());
        let target = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        clock.set(target);
        assert_eq!(clock.utc_now(), target);
    }
}
