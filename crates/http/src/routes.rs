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

//! Wires every handler into a single [`Router`], with tracing and per-route rate limiting
//! applied as middleware (spec.md §6).

use std::net::SocketAddr;

use axum::{
    Router,
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::{
    error::HttpError,
    handlers::{auth, grid, observability},
    rate_limit::RateLimitClass,
    state::AppState,
};

/// Classifies a request path into the rate-limit bucket it is billed against (spec.md §6).
/// Paths with no specific bucket (health/metrics) are only subject to the global cap.
fn classify(path: &str) -> Option<RateLimitClass> {
    if path.starts_with("/api/auth") {
        Some(RateLimitClass::Auth)
    } else if path == "/api/grid/start" || path == "/api/grid/stop" {
        Some(RateLimitClass::Trading)
    } else if path.starts_with("/api/grid/cleanup") {
        Some(RateLimitClass::GridControl)
    } else if path.starts_with("/api/grid/status")
        || path == "/api/grid/sessions"
        || path.starts_with("/api/user/strategies")
    {
        Some(RateLimitClass::StatusCheck)
    } else {
        None
    }
}

async fn rate_limit_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |connect_info| connect_info.0.ip().to_string());

    if let Some(class) = classify(request.uri().path())
        && !state.rate_limiter.check(&ip, class).await
    {
        return HttpError::RateLimited.into_response();
    }

    // The global cap also applies to routes with no specific class (health/metrics); `check`
    // already folds the global bucket into every call, so run it once more for those here.
    if classify(request.uri().path()).is_none() && !state.rate_limiter.check(&ip, RateLimitClass::StatusCheck).await {
        return (StatusCode::TOO_MANY_REQUESTS, "rate limited").into_response();
    }

    next.run(request).await
}

/// Builds the complete control-plane [`Router`] over the given [`AppState`].
///
/// Serve with `axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())`
/// so the rate limiter can see the caller's address.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/grid/start", post(grid::start_grid))
        .route("/api/grid/stop", post(grid::stop_grid))
        .route("/api/grid/status/{session_id}", get(grid::get_status))
        .route("/api/grid/sessions", get(grid::list_sessions))
        .route("/api/user/strategies/{user_id}", get(grid::list_user_strategies))
        .route("/api/grid/cleanup/{session_id}", post(grid::force_cleanup))
        .route("/api/auth/challenge", get(auth::get_challenge))
        .route("/health", get(observability::liveness))
        .route("/health/ready", get(observability::readiness))
        .route("/metrics", get(observability::metrics))
        .route("/system/metrics", get(observability::system_metrics))
        .route("/system/stats", get(observability::system_stats))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
