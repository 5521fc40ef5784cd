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

//! Shared application state handed to every handler via axum's `State` extractor.

use std::sync::Arc;

use grid_core::metrics::MetricsRegistry;
use grid_cryptography::WalletSignatureVerifier;
use grid_live::{HealthMonitor, RecoverySupervisor, SessionManager};
use grid_persistence::UserStore;

use crate::rate_limit::IpRateLimiter;

/// Everything a handler needs to serve a request: the session manager (C9), the wallet
/// verifier (C4), the user store, the health monitor (C10), the recovery supervisor (C11), the
/// shared metrics registry, and the inbound rate limiter.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub verifier: Arc<WalletSignatureVerifier>,
    pub users: Arc<dyn UserStore>,
    pub health: Arc<HealthMonitor>,
    pub recovery: Arc<RecoverySupervisor>,
    pub metrics: Arc<MetricsRegistry>,
    pub rate_limiter: Arc<IpRateLimiter>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
