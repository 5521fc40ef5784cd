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

//! The health monitor (C10): periodic system-resource sampling, bounded history, and
//! point-in-time health checks against alert thresholds (spec.md §4.10).
//!
//! Grounded on the original bot's `SystemMonitor`/`SystemMetrics` (`sysinfo` stands in for
//! `psutil`, the teacher's own dependency for this kind of sampling).

use std::collections::VecDeque;

use serde::Serialize;
use sysinfo::{Disks, System};
use tokio::sync::RwLock;

/// A single sample of system and application resource usage (spec.md §4.10 "Metrics").
#[derive(Debug, Clone, Serialize)]
pub struct SystemMetrics {
    pub timestamp_ms: i64,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub memory_used_mb: f64,
    pub memory_available_mb: f64,
    pub disk_usage_percent: f32,
    pub active_sessions: usize,
    pub websocket_connections: usize,
}

/// Alert thresholds checked by [`HealthMonitor::check_health`] (spec.md §4.10 "Alert
/// thresholds").
#[derive(Debug, Clone, Copy)]
pub struct AlertThresholds {
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub disk_usage_percent: f32,
    pub active_sessions: usize,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            cpu_percent: 80.0,
            memory_percent: 85.0,
            disk_usage_percent: 90.0,
            active_sessions: 100,
        }
    }
}

/// The outcome of one check, naming which individual checks passed or failed (spec.md §4.10
/// "Health check").
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub healthy: bool,
    pub metrics: SystemMetrics,
    pub checks: Vec<(&'static str, bool)>,
}

/// Bound on retained samples (spec.md §4.10 "History").
pub const DEFAULT_MAX_HISTORY_SIZE: usize = 100;

/// Provides the application-level counters the monitor can't see by sampling the OS alone
/// (active session count, open WebSocket connections). Implemented by `grid-live`'s wiring layer
/// (spec.md §4.10 "Application metrics").
pub trait ApplicationMetricsSource: std::fmt::Debug + Send + Sync {
    fn active_sessions(&self) -> usize;
    fn websocket_connections(&self) -> usize;
}

/// A source that always reports zero, used where no live session manager is wired (tests, or
/// a monitor started before the session manager exists).
#[derive(Debug, Default)]
pub struct NullApplicationMetrics;

impl ApplicationMetricsSource for NullApplicationMetrics {
    fn active_sessions(&self) -> usize {
        0
    }

    fn websocket_connections(&self) -> usize {
        0
    }
}

/// Periodic sampler and point-in-time health checker (spec.md §4.10).
#[derive(Debug)]
pub struct HealthMonitor {
    thresholds: AlertThresholds,
    max_history_size: usize,
    system: RwLock<System>,
    history: RwLock<VecDeque<SystemMetrics>>,
    app_metrics: Box<dyn ApplicationMetricsSource>,
}

impl HealthMonitor {
    #[must_use]
    pub fn new(thresholds: AlertThresholds, app_metrics: Box<dyn ApplicationMetricsSource>) -> Self {
        Self {
            thresholds,
            max_history_size: DEFAULT_MAX_HISTORY_SIZE,
            system: RwLock::new(System::new()),
            history: RwLock::new(VecDeque::with_capacity(DEFAULT_MAX_HISTORY_SIZE)),
            app_metrics,
        }
    }

    /// Refreshes the `sysinfo` snapshot, samples CPU/memory/disk, and appends the result to the
    /// bounded history, evicting the oldest entry once `max_history_size` is exceeded.
    pub async fn collect_metrics(&self) -> SystemMetrics {
        let mut system = self.system.write().await;
        system.refresh_cpu_usage();
        system.refresh_memory();

        let cpu_percent = system.global_cpu_usage();
        let memory_used_kb = system.used_memory();
        let memory_total_kb = system.total_memory();
        let memory_percent = if memory_total_kb == 0 {
            0.0
        } else {
            (memory_used_kb as f32 / memory_total_kb as f32) * 100.0
        };

        let disk_usage_percent = disk_usage_percent();

        let metrics = SystemMetrics {
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            cpu_percent,
            memory_percent,
            memory_used_mb: memory_used_kb as f64 / 1024.0,
            memory_available_mb: (memory_total_kb.saturating_sub(memory_used_kb)) as f64 / 1024.0,
            disk_usage_percent,
            active_sessions: self.app_metrics.active_sessions(),
            websocket_connections: self.app_metrics.websocket_connections(),
        };

        let mut history = self.history.write().await;
        if history.len() >= self.max_history_size {
            history.pop_front();
        }
        history.push_back(metrics.clone());

        metrics
    }

    /// Runs [`Self::collect_metrics`] and evaluates it against [`AlertThresholds`], aggregating
    /// into an overall healthy/unhealthy verdict (spec.md §4.10 "Health check").
    pub async fn check_health(&self) -> HealthCheckResult {
        let metrics = self.collect_metrics().await;

        let checks = vec![
            ("cpu", metrics.cpu_percent < self.thresholds.cpu_percent),
            ("memory", metrics.memory_percent < self.thresholds.memory_percent),
            ("disk", metrics.disk_usage_percent < self.thresholds.disk_usage_percent),
            ("sessions", metrics.active_sessions < self.thresholds.active_sessions),
        ];
        let healthy = checks.iter().all(|(_, passed)| *passed);

        HealthCheckResult { healthy, metrics, checks }
    }

    /// Returns up to `limit` most recent samples, newest last.
    pub async fn recent_history(&self, limit: usize) -> Vec<SystemMetrics> {
        let history = self.history.read().await;
        history.iter().rev().take(limit).rev().cloned().collect()
    }
}

fn disk_usage_percent() -> f32 {
    let disks = Disks::new_with_refreshed_list();
    let Some(disk) = disks.list().first() else {
        return 0.0;
    };
    let total = disk.total_space();
    if total == 0 {
        return 0.0;
    }
    let used = total.saturating_sub(disk.available_space());
    (used as f32 / total as f32) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct StubAppMetrics {
        sessions: usize,
    }

    impl ApplicationMetricsSource for StubAppMetrics {
        fn active_sessions(&self) -> usize {
            self.sessions
        }

        fn websocket_connections(&self) -> usize {
            self.sessions
        }
    }

    #[tokio::test]
    async fn collect_metrics_reports_application_counters() {
        let monitor =
            HealthMonitor::new(AlertThresholds::default(), Box::new(StubAppMetrics { sessions: 3 }));
        let metrics = monitor.collect_metrics().await;
        assert_eq!(metrics.active_sessions, 3);
        assert_eq!(metrics.websocket_connections, 3);
    }

    #[tokio::test]
    async fn check_health_fails_session_threshold() {
        let thresholds = AlertThresholds { active_sessions: 2, ..AlertThresholds::default() };
        let monitor = HealthMonitor::new(thresholds, Box::new(StubAppMetrics { sessions: 5 }));
        let result = monitor.check_health().await;
        assert!(!result.healthy);
        assert!(result.checks.contains(&("sessions", false)));
    }

    #[tokio::test]
    async fn check_health_passes_when_under_thresholds() {
        let monitor =
            HealthMonitor::new(AlertThresholds::default(), Box::new(StubAppMetrics { sessions: 1 }));
        let result = monitor.check_health().await;
        assert!(result.checks.iter().any(|(name, _)| *name == "sessions"));
    }

    #[tokio::test]
    async fn history_is_bounded() {
        let monitor = HealthMonitor::new(AlertThresholds::default(), Box::new(NullApplicationMetrics));
        for _ in 0..DEFAULT_MAX_HISTORY_SIZE + 10 {
            monitor.collect_metrics().await;
        }
        let history = monitor.recent_history(usize::MAX).await;
        assert_eq!(history.len(), DEFAULT_MAX_HISTORY_SIZE);
    }

    #[tokio::test]
    async fn recent_history_respects_limit_and_order() {
        let monitor = HealthMonitor::new(AlertThresholds::default(), Box::new(NullApplicationMetrics));
        for _ in 0..5 {
            monitor.collect_metrics().await;
        }
        let history = monitor.recent_history(2).await;
        assert_eq!(history.len(), 2);
    }
}
