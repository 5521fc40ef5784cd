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

//! A minimal in-process metrics registry backing the `/metrics` and `/system/metrics` endpoints.
//!
//! Counters, gauges, and histograms are keyed by name plus an optional sorted tag suffix
//! (`"orders.filled[instrument=PERP_BTC_USDC]"`), the same keying scheme as the original
//! service's metrics collector. Histograms keep a bounded ring of the most recent samples and
//! report count/min/max/avg/p50/p95/p99 on read.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::Mutex,
};

use dashmap::DashMap;
use serde::Serialize;

const HISTOGRAM_CAPACITY: usize = 1000;

fn metric_key(name: &str, tags: &[(&str, &str)]) -> String {
    if tags.is_empty() {
        return name.to_string();
    }
    let mut sorted: Vec<&(&str, &str)> = tags.iter().collect();
    sorted.sort_by_key(|(k, _)| *k);
    let tag_str = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",");
    format!("{name}[{tag_str}]")
}

/// A bounded ring buffer of histogram samples with percentile helpers.
#[derive(Debug, Default)]
struct Histogram {
    samples: VecDeque<f64>,
}

impl Histogram {
    fn push(&mut self, value: f64) {
        if self.samples.len() == HISTOGRAM_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    fn stats(&self) -> Option<HistogramStats> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let count = sorted.len();
        let sum: f64 = sorted.iter().sum();
        Some(HistogramStats {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            avg: sum / count as f64,
            p50: percentile(&sorted, 50.0),
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
        })
    }
}

fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (sorted.len() - 1) as f64 * pct / 100.0;
    let lower = rank.floor() as usize;
    let frac = rank - rank.floor();
    if lower + 1 >= sorted.len() {
        sorted[lower]
    } else {
        sorted[lower] * (1.0 - frac) + sorted[lower + 1] * frac
    }
}

/// Snapshot statistics computed from a histogram's current samples.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct HistogramStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// A process-wide registry of counters, gauges, and histograms.
///
/// Cheap to clone: internally `Arc`-free but backed by lock-free maps, so a single instance
/// is meant to be constructed once (typically behind an `Arc` in application state) and shared.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: DashMap<String, i64>,
    gauges: DashMap<String, f64>,
    histograms: DashMap<String, Mutex<Histogram>>,
}

impl MetricsRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments a counter by `value` (use a negative value to decrement a running total).
    pub fn increment_counter(&self, name: &str, value: i64, tags: &[(&str, &str)]) {
        *self.counters.entry(metric_key(name, tags)).or_insert(0) += value;
    }

    /// Sets a gauge to an absolute value.
    pub fn set_gauge(&self, name: &str, value: f64, tags: &[(&str, &str)]) {
        self.gauges.insert(metric_key(name, tags), value);
    }

    /// Appends a sample to a named histogram.
    pub fn record_histogram(&self, name: &str, value: f64, tags: &[(&str, &str)]) {
        self.histograms
            .entry(metric_key(name, tags))
            .or_default()
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(value);
    }

    /// Takes a consistent snapshot of every counter, gauge, and histogram currently registered.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters: BTreeMap<String, i64> = self
            .counters
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        let gauges: BTreeMap<String, f64> = self
            .gauges
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        let histograms: BTreeMap<String, HistogramStats> = self
            .histograms
            .iter()
            .filter_map(|entry| {
                entry
                    .value()
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .stats()
                    .map(|stats| (entry.key().clone(), stats))
            })
            .collect();
        MetricsSnapshot {
            counters,
            gauges,
            histograms,
        }
    }

    /// Clears every counter, gauge, and histogram.
    pub fn reset(&self) {
        self.counters.clear();
        self.gauges.clear();
        self.histograms.clear();
    }
}

/// A point-in-time view of the registry, serializable for the `/metrics` HTTP response.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, i64>,
    pub gauges: BTreeMap<String, f64>,
    pub histograms: BTreeMap<String, HistogramStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates_across_calls() {
        let registry = MetricsRegistry::new();
        registry.increment_counter("orders.filled", 1, &[]);
        registry.increment_counter("orders.filled", 2, &[]);
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.counters["orders.filled"], 3);
    }

    #[test]
    fn tags_produce_distinct_keys() {
        let registry = MetricsRegistry::new();
        registry.increment_counter("orders.filled", 1, &[("instrument", "PERP_BTC_USDC")]);
        registry.increment_counter("orders.filled", 1, &[("instrument", "PERP_ETH_USDC")]);
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.counters.len(), 2);
        assert_eq!(
            snapshot.counters["orders.filled[instrument=PERP_BTC_USDC]"],
            1
        );
    }

    #[test]
    fn gauge_holds_latest_value() {
        let registry = MetricsRegistry::new();
        registry.set_gauge("sessions.active", 3.0, &[]);
        registry.set_gauge("sessions.active", 5.0, &[]);
        assert_eq!(registry.snapshot().gauges["sessions.active"], 5.0);
    }

    #[test]
    fn histogram_reports_percentiles() {
        let registry = MetricsRegistry::new();
        for v in 1..=100 {
            registry.record_histogram("order_latency_ms", f64::from(v), &[]);
        }
        let snapshot = registry.snapshot();
        let stats = snapshot.histograms["order_latency_ms"];
        assert_eq!(stats.count, 100);
        assert!((stats.p50 - 50.5).abs() < 1.0);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 100.0);
    }

    #[test]
    fn reset_clears_everything() {
        let registry = MetricsRegistry::new();
        registry.increment_counter("x", 1, &[]);
        registry.set_gauge("y", 1.0, &[]);
        registry.record_histogram("z", 1.0, &[]);
        registry.reset();
        let snapshot = registry.snapshot();
        assert!(snapshot.counters.is_empty());
        assert!(snapshot.gauges.is_empty());
        assert!(snapshot.histograms.is_empty());
    }
}
