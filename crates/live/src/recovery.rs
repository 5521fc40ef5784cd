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

//! The recovery supervisor (C11): records error events, runs the first eligible recovery action
//! in priority order (subject to a per-action cooldown), and keeps a bounded history with
//! per-component/per-severity aggregates (spec.md §4.11).
//!
//! Grounded on the original bot's `ErrorRecoveryManager`/`RecoveryAction` hierarchy: the
//! severity-threshold + 60-second-cooldown gate on each action, the ordered "first action that
//! succeeds wins" dispatch, and the three default actions (session restart, WebSocket reconnect,
//! memory cleanup) are carried over as-is; `gc.collect()` has no Rust equivalent, so
//! [`MemoryCleanupAction`] instead trims this process's bounded metrics cache and measures whether
//! that moved the needle on RSS.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use grid_core::{metrics::MetricsRegistry, SessionId};
use sysinfo::System;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::manager::SessionManager;

/// How severe an error is, ascending (spec.md §4.11). Declaration order is significant: `Ord` is
/// derived from it, and an action only runs for events at or above its `severity_threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// An error observed by some component, with enough context for the supervisor to classify it,
/// attempt recovery, and record it to history (spec.md §4.11).
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub component: String,
    pub severity: ErrorSeverity,
    pub session_id: Option<SessionId>,
    pub message: String,
    pub timestamp_ms: i64,
    pub recovered: bool,
}

/// A single recovery action: something the supervisor can try in response to an [`ErrorEvent`]
/// that meets its severity threshold (spec.md §4.11).
#[async_trait]
pub trait RecoveryAction: std::fmt::Debug + Send + Sync {
    /// A stable name used for cooldown tracking and statistics.
    fn name(&self) -> &'static str;

    /// The minimum severity this action will run for.
    fn severity_threshold(&self) -> ErrorSeverity;

    /// Attempts the recovery, returning whether it succeeded.
    async fn recover(&self, event: &ErrorEvent) -> bool;
}

/// Minimum time between two executions of the same action (spec.md §4.11 "Cooldown").
pub const RECOVERY_COOLDOWN: Duration = Duration::from_secs(60);

/// Bound on retained error events (spec.md §4.11 "History").
pub const DEFAULT_MAX_HISTORY: usize = 1000;

/// Restarts a session via `force_cleanup`, the original bot's "restart" for a live session that
/// has no cheaper in-place recovery (spec.md §4.11's `SessionRestart` action).
#[derive(Debug)]
pub struct SessionRestartAction {
    manager: Arc<SessionManager>,
}

impl SessionRestartAction {
    #[must_use]
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl RecoveryAction for SessionRestartAction {
    fn name(&self) -> &'static str {
        "session_restart"
    }

    fn severity_threshold(&self) -> ErrorSeverity {
        ErrorSeverity::High
    }

    async fn recover(&self, event: &ErrorEvent) -> bool {
        let Some(session_id) = &event.session_id else {
            return false;
        };
        match self.manager.force_cleanup(session_id).await {
            Ok(_) => true,
            // The session was still removed from the index even though stop() overran; treat
            // that as a successful restart since the bad session is gone either way.
            Err(crate::error::LiveError::ForceCleanupTimedOut(_)) => true,
            Err(_) => false,
        }
    }
}

/// Maximum reconnect attempts the recovery action allows before giving up on one invocation
/// (distinct from the session's own steady-state reconnect loop, which runs independently).
const WS_RECONNECT_MAX_ATTEMPTS: u32 = 5;

/// Reconnects a session's WebSocket subscription (spec.md §4.11's `WebSocketReconnect` action).
#[derive(Debug)]
pub struct WebSocketReconnectAction {
    manager: Arc<SessionManager>,
}

impl WebSocketReconnectAction {
    #[must_use]
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl RecoveryAction for WebSocketReconnectAction {
    fn name(&self) -> &'static str {
        "websocket_reconnect"
    }

    fn severity_threshold(&self) -> ErrorSeverity {
        ErrorSeverity::Medium
    }

    async fn recover(&self, event: &ErrorEvent) -> bool {
        let Some(session_id) = &event.session_id else {
            return false;
        };
        let Some(session) = self.manager.get(session_id) else {
            return false;
        };
        match session.reconnect_ws(WS_RECONNECT_MAX_ATTEMPTS).await {
            Ok(()) => true,
            Err(error) => {
                warn!(%session_id, %error, "websocket_reconnect recovery action failed");
                false
            }
        }
    }
}

/// Frees bounded in-process caches and checks whether RSS actually dropped (spec.md §4.11's
/// `MemoryCleanup` action). There is no garbage collector to force in Rust; the closest
/// equivalent this process controls is trimming the metrics registry's counters, gauges, and
/// histograms, which is the one cache this engine accumulates without an inherent TTL.
#[derive(Debug)]
pub struct MemoryCleanupAction {
    metrics: Arc<MetricsRegistry>,
}

impl MemoryCleanupAction {
    #[must_use]
    pub fn new(metrics: Arc<MetricsRegistry>) -> Self {
        Self { metrics }
    }

    fn used_memory_kb() -> u64 {
        let mut system = System::new();
        system.refresh_memory();
        system.used_memory()
    }
}

#[async_trait]
impl RecoveryAction for MemoryCleanupAction {
    fn name(&self) -> &'static str {
        "memory_cleanup"
    }

    fn severity_threshold(&self) -> ErrorSeverity {
        ErrorSeverity::Medium
    }

    async fn recover(&self, _event: &ErrorEvent) -> bool {
        let before_kb = Self::used_memory_kb();
        self.metrics.reset();
        let after_kb = Self::used_memory_kb();
        let freed_kb = before_kb.saturating_sub(after_kb);

        info!(freed_kb, "memory cleanup recovery action ran");
        freed_kb > 0
    }
}

/// Per-key (component or severity) success/total counters (spec.md §4.11 "Statistics").
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct RecoveryOutcomeCounts {
    pub total: u64,
    pub recovered: u64,
}

/// Aggregated recovery statistics over the retained history (spec.md §4.11 "Statistics").
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RecoveryStatistics {
    pub total_errors: u64,
    pub by_component: HashMap<String, RecoveryOutcomeCounts>,
    pub by_severity: HashMap<String, RecoveryOutcomeCounts>,
}

struct RegisteredAction {
    action: Box<dyn RecoveryAction>,
    last_execution_ms: Option<i64>,
}

/// The C11 recovery supervisor: an ordered list of [`RecoveryAction`]s, each gated by severity
/// threshold and cooldown, plus a bounded history of every error it was asked to handle
/// (spec.md §4.11).
pub struct RecoverySupervisor {
    actions: Mutex<Vec<RegisteredAction>>,
    history: Mutex<VecDeque<ErrorEvent>>,
    max_history: usize,
}

impl std::fmt::Debug for RecoverySupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoverySupervisor").finish_non_exhaustive()
    }
}

impl RecoverySupervisor {
    #[must_use]
    pub fn new(actions: Vec<Box<dyn RecoveryAction>>) -> Self {
        Self {
            actions: Mutex::new(
                actions.into_iter().map(|action| RegisteredAction { action, last_execution_ms: None }).collect(),
            ),
            history: Mutex::new(VecDeque::with_capacity(DEFAULT_MAX_HISTORY)),
            max_history: DEFAULT_MAX_HISTORY,
        }
    }

    /// The three default actions wired over a session manager and the shared metrics registry,
    /// in the original bot's priority order (spec.md §4.11 "Default actions").
    #[must_use]
    pub fn with_default_actions(manager: Arc<SessionManager>, metrics: Arc<MetricsRegistry>) -> Self {
        Self::new(vec![
            Box::new(SessionRestartAction::new(Arc::clone(&manager))),
            Box::new(WebSocketReconnectAction::new(manager)),
            Box::new(MemoryCleanupAction::new(metrics)),
        ])
    }

    /// Registers an additional action, appended after the existing ones.
    pub async fn register_action(&self, action: Box<dyn RecoveryAction>) {
        self.actions.lock().await.push(RegisteredAction { action, last_execution_ms: None });
    }

    /// Records `error_event`, logs it at a level proportional to its severity, attempts recovery
    /// through the registered actions in order, and returns whether any action succeeded
    /// (spec.md §4.11 "Handling an error").
    pub async fn handle_error(
        &self,
        component: impl Into<String>,
        severity: ErrorSeverity,
        session_id: Option<SessionId>,
        message: impl Into<String>,
    ) -> bool {
        let mut event = ErrorEvent {
            component: component.into(),
            severity,
            session_id,
            message: message.into(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            recovered: false,
        };

        match severity {
            ErrorSeverity::Low => debug!(component = %event.component, message = %event.message, "error recorded"),
            ErrorSeverity::Medium => warn!(component = %event.component, message = %event.message, "error recorded"),
            ErrorSeverity::High | ErrorSeverity::Critical => {
                error!(component = %event.component, message = %event.message, "error recorded");
            }
        }

        let recovered = self.attempt_recovery(&event).await;
        event.recovered = recovered;

        if recovered {
            info!(component = %event.component, "recovery succeeded");
        } else {
            warn!(component = %event.component, "recovery did not succeed");
        }

        self.record(event).await;
        recovered
    }

    async fn attempt_recovery(&self, event: &ErrorEvent) -> bool {
        let mut actions = self.actions.lock().await;
        for registered in actions.iter_mut() {
            if event.severity < registered.action.severity_threshold() {
                continue;
            }
            if let Some(last) = registered.last_execution_ms
                && event.timestamp_ms - last < RECOVERY_COOLDOWN.as_millis() as i64
            {
                continue;
            }

            registered.last_execution_ms = Some(event.timestamp_ms);
            info!(action = registered.action.name(), component = %event.component, "attempting recovery action");
            if registered.action.recover(event).await {
                return true;
            }
            warn!(action = registered.action.name(), component = %event.component, "recovery action failed");
        }
        false
    }

    async fn record(&self, event: ErrorEvent) {
        let mut history = self.history.lock().await;
        if history.len() >= self.max_history {
            history.pop_front();
        }
        history.push_back(event);
    }

    /// Aggregates the retained history by component and by severity (spec.md §4.11
    /// "Statistics").
    pub async fn statistics(&self) -> RecoveryStatistics {
        let history = self.history.lock().await;
        let mut by_component: HashMap<String, RecoveryOutcomeCounts> = HashMap::new();
        let mut by_severity: HashMap<String, RecoveryOutcomeCounts> = HashMap::new();

        for event in history.iter() {
            let component_counts = by_component.entry(event.component.clone()).or_default();
            component_counts.total += 1;
            if event.recovered {
                component_counts.recovered += 1;
            }

            let severity_key = format!("{:?}", event.severity).to_ascii_lowercase();
            let severity_counts = by_severity.entry(severity_key).or_default();
            severity_counts.total += 1;
            if event.recovered {
                severity_counts.recovered += 1;
            }
        }

        RecoveryStatistics { total_errors: history.len() as u64, by_component, by_severity }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use rstest::rstest;

    use super::*;

    #[derive(Debug)]
    struct CountingAction {
        threshold: ErrorSeverity,
        succeeds: bool,
        calls: Arc<AtomicU64>,
    }

    #[async_trait]
    impl RecoveryAction for CountingAction {
        fn name(&self) -> &'static str {
            "counting_action"
        }

        fn severity_threshold(&self) -> ErrorSeverity {
            self.threshold
        }

        async fn recover(&self, _event: &ErrorEvent) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.succeeds
        }
    }

    #[rstest]
    #[case(ErrorSeverity::Low, ErrorSeverity::Medium, false)]
    #[case(ErrorSeverity::Medium, ErrorSeverity::Medium, true)]
    #[case(ErrorSeverity::High, ErrorSeverity::Medium, true)]
    fn severity_ordering_matches_threshold_semantics(
        #[case] event_severity: ErrorSeverity,
        #[case] threshold: ErrorSeverity,
        #[case] expected: bool,
    ) {
        assert_eq!(event_severity >= threshold, expected);
    }

    #[tokio::test]
    async fn handle_error_skips_actions_below_threshold() {
        let calls = Arc::new(AtomicU64::new(0));
        let supervisor = RecoverySupervisor::new(vec![Box::new(CountingAction {
            threshold: ErrorSeverity::High,
            succeeds: true,
            calls: Arc::clone(&calls),
        })]);

        let recovered = supervisor.handle_error("test", ErrorSeverity::Low, None, "boom").await;
        assert!(!recovered);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn handle_error_runs_first_eligible_action_that_succeeds() {
        let first_calls = Arc::new(AtomicU64::new(0));
        let second_calls = Arc::new(AtomicU64::new(0));
        let supervisor = RecoverySupervisor::new(vec![
            Box::new(CountingAction {
                threshold: ErrorSeverity::Medium,
                succeeds: false,
                calls: Arc::clone(&first_calls),
            }),
            Box::new(CountingAction {
                threshold: ErrorSeverity::Medium,
                succeeds: true,
                calls: Arc::clone(&second_calls),
            }),
        ]);

        let recovered = supervisor.handle_error("test", ErrorSeverity::High, None, "boom").await;
        assert!(recovered);
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cooldown_suppresses_rapid_repeat_execution() {
        let calls = Arc::new(AtomicU64::new(0));
        let supervisor = RecoverySupervisor::new(vec![Box::new(CountingAction {
            threshold: ErrorSeverity::Medium,
            succeeds: true,
            calls: Arc::clone(&calls),
        })]);

        supervisor.handle_error("test", ErrorSeverity::High, None, "first").await;
        supervisor.handle_error("test", ErrorSeverity::High, None, "second").await;
        // Both calls land within the same millisecond in a test, well inside the 60s cooldown.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn statistics_aggregate_by_component_and_severity() {
        let calls = Arc::new(AtomicU64::new(0));
        let supervisor = RecoverySupervisor::new(vec![Box::new(CountingAction {
            threshold: ErrorSeverity::Critical,
            succeeds: false,
            calls,
        })]);

        supervisor.handle_error("network", ErrorSeverity::Low, None, "a").await;
        supervisor.handle_error("network", ErrorSeverity::Medium, None, "b").await;
        supervisor.handle_error("storage", ErrorSeverity::Low, None, "c").await;

        let stats = supervisor.statistics().await;
        assert_eq!(stats.total_errors, 3);
        assert_eq!(stats.by_component.get("network").unwrap().total, 2);
        assert_eq!(stats.by_component.get("storage").unwrap().total, 1);
        assert_eq!(stats.by_severity.get("low").unwrap().total, 2);
    }

    #[tokio::test]
    async fn history_is_bounded() {
        let supervisor = RecoverySupervisor::new(vec![]);
        for i in 0..DEFAULT_MAX_HISTORY + 10 {
            supervisor.handle_error("test", ErrorSeverity::Low, None, format!("event {i}")).await;
        }
        let stats = supervisor.statistics().await;
        assert_eq!(stats.total_errors, DEFAULT_MAX_HISTORY as u64);
    }
}
