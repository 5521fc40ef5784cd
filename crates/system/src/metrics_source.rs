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

//! Bridges the live session manager and WebSocket manager into the health monitor's
//! [`ApplicationMetricsSource`] seam (spec.md §4.10 "Application metrics"), the one piece of
//! `grid-live` that genuinely needs a concrete type only this binary can provide.

use std::sync::Arc;

use grid_live::{ApplicationMetricsSource, SessionManager};
use grid_network::WsManager;

#[derive(Debug)]
pub struct LiveApplicationMetrics {
    sessions: Arc<SessionManager>,
    websockets: Arc<WsManager>,
}

impl LiveApplicationMetrics {
    #[must_use]
    pub fn new(sessions: Arc<SessionManager>, websockets: Arc<WsManager>) -> Self {
        Self { sessions, websockets }
    }
}

impl ApplicationMetricsSource for LiveApplicationMetrics {
    fn active_sessions(&self) -> usize {
        self.sessions.active_count()
    }

    fn websocket_connections(&self) -> usize {
        self.websockets.active_count()
    }
}
