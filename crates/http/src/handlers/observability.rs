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

//! `/health`, `/health/ready`, `/metrics`, `/system/metrics`, `/system/stats` (spec.md §6).

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use grid_core::metrics::MetricsSnapshot;
use grid_live::{RecoveryStatistics, SystemMetrics};
use serde::Serialize;

use crate::{envelope::Envelope, state::AppState};

/// `GET /health`: bare liveness. Always `200` if the process can answer HTTP at all.
pub async fn liveness() -> Envelope<&'static str> {
    Envelope::ok("ok")
}

/// `GET /health/ready`: samples system resources and evaluates them against alert thresholds,
/// returning `503` if any check fails (spec.md §4.10 "Health check").
pub async fn readiness(State(state): State<AppState>) -> Response {
    let result = state.health.check_health().await;
    let status = if result.healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, axum::Json(Envelope::ok(result))).into_response()
}

/// `GET /metrics`: a snapshot of every counter, gauge, and histogram in the shared registry.
pub async fn metrics(State(state): State<AppState>) -> Envelope<MetricsSnapshot> {
    Envelope::ok(state.metrics.snapshot())
}

/// `GET /system/metrics`: one fresh system-resource sample.
pub async fn system_metrics(State(state): State<AppState>) -> Envelope<SystemMetrics> {
    Envelope::ok(state.health.collect_metrics().await)
}

/// Combined payload for `GET /system/stats`: the latest sample, recent history, recovery
/// statistics, and the application metrics registry, in one response for a dashboard to poll.
#[derive(Debug, Serialize)]
pub struct SystemStats {
    pub current: SystemMetrics,
    pub history: Vec<SystemMetrics>,
    pub recovery: RecoveryStatistics,
    pub metrics: MetricsSnapshot,
}

const SYSTEM_STATS_HISTORY_LIMIT: usize = 60;

/// `GET /system/stats`.
pub async fn system_stats(State(state): State<AppState>) -> Envelope<SystemStats> {
    let current = state.health.collect_metrics().await;
    let history = state.health.recent_history(SYSTEM_STATS_HISTORY_LIMIT).await;
    let recovery = state.recovery.statistics().await;
    let metrics = state.metrics.snapshot();
    Envelope::ok(SystemStats { current, history, recovery, metrics })
}
