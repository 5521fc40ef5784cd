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

//! The live trading surface: the session (C8), the session manager (C9), the health monitor
//! (C10), and the recovery supervisor (C11).
//!
//! This crate is the seam between the exchange-agnostic execution engine (`grid-execution`) and
//! the control plane that exposes it over HTTP (`grid-http`). It owns no I/O of its own beyond
//! what it asks `grid-network` and `grid-persistence` to do.

#![warn(rustc::all)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]

pub mod error;
pub mod health;
pub mod manager;
pub mod recovery;
pub mod session;

pub use crate::{
    error::LiveError,
    health::{AlertThresholds, ApplicationMetricsSource, HealthCheckResult, HealthMonitor, NullApplicationMetrics, SystemMetrics},
    manager::{instrument_from_session, AdmissionConfig, SessionFactory, SessionManager},
    recovery::{
        ErrorEvent, ErrorSeverity, MemoryCleanupAction, RecoveryAction, RecoveryStatistics,
        RecoverySupervisor, SessionRestartAction, WebSocketReconnectAction,
    },
    session::{ProfitReport, Session, SessionConfig, SessionStatus},
};
