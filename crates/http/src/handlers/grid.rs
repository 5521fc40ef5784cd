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

//! `/api/grid/*` and `/api/user/strategies/{user_id}` (spec.md §6).

use std::str::FromStr;

use axum::extract::{Path, State};
use grid_core::{Direction, GridType, InstrumentId, SessionId};
use grid_cryptography::CryptographyError;
use grid_live::{ProfitReport, SessionConfig, SessionStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{envelope::Envelope, error::HttpError, state::AppState};

/// Verifies that `user_sig` was produced by the wallet on file for `user_id` over the challenge
/// identified by `timestamp`/`nonce`, consuming the nonce (spec.md §6 "Request body").
///
/// # Errors
///
/// Returns [`HttpError::Persistence`] if `user_id` is unknown, or [`HttpError::Cryptography`] if
/// the timestamp is stale, the nonce was replayed, or the signature does not verify.
async fn authenticate(
    state: &AppState,
    user_id: &str,
    user_sig: &str,
    timestamp: i64,
    nonce: &str,
) -> Result<(), HttpError> {
    let credentials = state.users.get_credentials(user_id).await?;
    let now = chrono::Utc::now().timestamp();
    let outcome = state
        .verifier
        .verify_signature(user_sig, &credentials.wallet_address, timestamp, nonce, now)
        .await?;
    if !outcome.signature_valid {
        return Err(HttpError::Cryptography(CryptographyError::SignatureMismatch));
    }
    Ok(())
}

/// Request body for `POST /api/grid/start` (spec.md §6).
#[derive(Debug, Deserialize)]
pub struct StartGridRequest {
    pub ticker: String,
    pub direction: String,
    pub current_price: Decimal,
    pub upper_bound: Decimal,
    pub lower_bound: Decimal,
    pub grid_type: String,
    pub grid_ratio: Option<Decimal>,
    pub grid_levels: u32,
    pub total_margin: Decimal,
    pub stop_bot_price: Option<Decimal>,
    pub stop_top_price: Option<Decimal>,
    pub user_id: String,
    pub user_sig: String,
    pub timestamp: i64,
    pub nonce: String,
}

/// `POST /api/grid/start` response payload.
#[derive(Debug, Serialize)]
pub struct StartGridResponse {
    pub session_id: String,
}

impl StartGridRequest {
    fn into_session_config(self) -> Result<SessionConfig, HttpError> {
        let instrument = InstrumentId::parse(&self.ticker).map_err(|e| HttpError::Validation(e.to_string()))?;
        let direction = Direction::from_str(&self.direction).map_err(|e| HttpError::Validation(e.to_string()))?;
        let grid_type = GridType::from_str(&self.grid_type).map_err(|e| HttpError::Validation(e.to_string()))?;

        let config = SessionConfig {
            user_id: self.user_id,
            instrument,
            direction,
            current_price: self.current_price,
            upper_bound: self.upper_bound,
            lower_bound: self.lower_bound,
            grid_type,
            grid_ratio: self.grid_ratio,
            grid_levels: self.grid_levels,
            total_margin: self.total_margin,
            stop_bot_price: self.stop_bot_price,
            stop_top_price: self.stop_top_price,
        };
        config.validate().map_err(HttpError::Validation)?;
        Ok(config)
    }
}

/// Validates the request, authenticates the caller, and creates + starts a new grid session.
///
/// # Errors
///
/// Returns [`HttpError::Validation`] for a malformed ticker/direction/grid type or a bounds
/// violation, an auth error if the signature does not verify, and
/// [`HttpError::Live`] (`DUPLICATE_GRID_SESSION` / `SESSION_CREATE_RATE_LIMITED`) if admission is
/// refused.
pub async fn start_grid(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<StartGridRequest>,
) -> Result<Envelope<StartGridResponse>, HttpError> {
    authenticate(&state, &body.user_id, &body.user_sig, body.timestamp, &body.nonce).await?;
    let config = body.into_session_config()?;

    let session = state.sessions.create_session(config).await?;
    Ok(Envelope::ok(StartGridResponse { session_id: session.session_id().to_string() }))
}

/// Request body for `POST /api/grid/stop` (spec.md §6): the owning user is derived from the
/// `session_id` prefix rather than supplied separately.
#[derive(Debug, Deserialize)]
pub struct StopGridRequest {
    pub session_id: String,
    pub user_sig: String,
    pub timestamp: i64,
    pub nonce: String,
}

/// Authenticates the caller as the session's owning user, then gracefully stops the session.
///
/// # Errors
///
/// Returns an auth error if the signature does not verify, or
/// [`HttpError::Live`] (`SESSION_NOT_FOUND`) if no such session is tracked.
pub async fn stop_grid(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<StopGridRequest>,
) -> Result<Envelope<SessionStatus>, HttpError> {
    let session_id = SessionId::from_raw(body.session_id);
    authenticate(&state, session_id.user_id(), &body.user_sig, body.timestamp, &body.nonce).await?;

    let status = state.sessions.stop_session(&session_id).await?;
    Ok(Envelope::ok(status))
}

/// A session snapshot combining lifecycle status with the profit report (spec.md §4.8).
#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    #[serde(flatten)]
    pub status: SessionStatus,
    pub profit: ProfitReport,
}

/// `GET /api/grid/status/{session_id}`.
///
/// # Errors
///
/// Returns [`HttpError::Live`] (`SESSION_NOT_FOUND`) if no such session is tracked.
pub async fn get_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Envelope<SessionSnapshot>, HttpError> {
    let session_id = SessionId::from_raw(session_id);
    let session = state
        .sessions
        .get(&session_id)
        .ok_or_else(|| HttpError::Live(grid_live::LiveError::SessionNotFound(session_id.to_string())))?;

    let status = session.status().await;
    let profit = session.profit_report().await;
    Ok(Envelope::ok(SessionSnapshot { status, profit }))
}

/// `GET /api/grid/sessions`: every session tracked by this process.
pub async fn list_sessions(State(state): State<AppState>) -> Envelope<Vec<SessionSnapshot>> {
    let mut snapshots = Vec::new();
    for session in state.sessions.list_all() {
        let status = session.status().await;
        let profit = session.profit_report().await;
        snapshots.push(SessionSnapshot { status, profit });
    }
    Envelope::ok(snapshots)
}

/// `GET /api/user/strategies/{user_id}`: every session owned by `user_id`.
pub async fn list_user_strategies(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Envelope<Vec<SessionSnapshot>> {
    let mut snapshots = Vec::new();
    for session in state.sessions.list_all() {
        if session.session_id().user_id() != user_id {
            continue;
        }
        let status = session.status().await;
        let profit = session.profit_report().await;
        snapshots.push(SessionSnapshot { status, profit });
    }
    Envelope::ok(snapshots)
}

/// `POST /api/grid/cleanup/{session_id}`: operator-only force cleanup, no signature required
/// (spec.md §6 "intended for operators").
///
/// # Errors
///
/// Returns [`HttpError::Live`] (`SESSION_NOT_FOUND`) if untracked, or
/// (`SESSION_FORCE_CLEANUP_TIMEOUT`) if the graceful stop overran (the session is removed
/// regardless).
pub async fn force_cleanup(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Envelope<SessionStatus>, HttpError> {
    let session_id = SessionId::from_raw(session_id);
    let status = state.sessions.force_cleanup(&session_id).await?;
    Ok(Envelope::ok(status))
}
