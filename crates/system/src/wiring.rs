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

//! Assembles every crate into one running process: connects to Postgres, builds the session
//! factory the session manager (C9) uses to wire a fresh exchange client and WebSocket
//! subscription per session, and produces the [`AppState`] the HTTP control plane serves from.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use grid_core::{clock::LiveClock, metrics::MetricsRegistry, SessionId};
use grid_cryptography::WalletSignatureVerifier;
use grid_http::{AppState, RateLimitConfig as HttpRateLimitConfig};
use grid_live::{HealthMonitor, RecoverySupervisor, SessionConfig, SessionFactory, SessionManager};
use grid_network::{
    ExchangeClient, ExchangeCredentials, FillNotification, RateLimitGuard, RestExchangeClient,
    WsConnection, WsManager, WsSlotGuard, WsState,
};
use grid_persistence::{
    connect_pg, FallbackNonceStore, PostgresSessionStore, PostgresUserStore, UserStore,
};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use url::Url;

use crate::{config::ServerConfig, metrics_source::LiveApplicationMetrics};

/// Everything [`main`](crate::main) needs after wiring: the HTTP state plus the pieces that run
/// their own periodic loops outside of any request.
pub struct Wired {
    pub state: AppState,
    pub nonce_store: Arc<dyn grid_cryptography::NonceStore>,
}

/// How often the slot-release watcher polls a session's WebSocket state (spec.md §4.5's
/// connection cap is only useful if released slots are actually reused).
const SLOT_WATCH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const SLOT_WATCH_SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Tracks which [`WsSlotGuard`] belongs to which session so it can be released once that
/// session's connection closes, instead of only at process exit.
#[derive(Debug, Default)]
struct WsSlotRegistry {
    guards: DashMap<SessionId, WsSlotGuard>,
}

/// Connects to Postgres, builds every shared component, and assembles [`AppState`].
///
/// # Errors
///
/// Returns an error if the initial Postgres connection or migration fails — unlike the nonce
/// store's per-call degradation (spec.md §4.3), session and user persistence have no in-memory
/// fallback, so the process cannot usefully start without a database.
pub async fn build(config: &ServerConfig) -> anyhow::Result<Wired> {
    let pool = connect_pg(config.postgres_options()).await?;
    info!("connected to Postgres");

    let user_store: Arc<dyn UserStore> = Arc::new(PostgresUserStore::new(pool.clone()));
    let session_store = Arc::new(PostgresSessionStore::new(pool.clone()));
    let nonce_store: Arc<dyn grid_cryptography::NonceStore> =
        Arc::new(FallbackNonceStore::new(pool.clone()));

    let verifier = Arc::new(WalletSignatureVerifier::new(Arc::clone(&nonce_store)));

    let ws_manager = Arc::new(WsManager::new(config.max_websocket_connections));
    let exchange_guard = Arc::new(RateLimitGuard::new(
        config.exchange_rate_limit_config(),
        Arc::new(LiveClock) as Arc<dyn grid_core::Clock>,
    ));
    let slot_registry = Arc::new(WsSlotRegistry::default());

    let factory = build_session_factory(
        config,
        Arc::clone(&user_store),
        Arc::clone(&exchange_guard),
        Arc::clone(&ws_manager),
        Arc::clone(&slot_registry),
    );

    let session_manager = Arc::new(SessionManager::new(
        session_store,
        factory,
        config.admission_config(),
        Arc::new(LiveClock) as Arc<dyn grid_core::Clock>,
    ));

    let app_metrics = LiveApplicationMetrics::new(Arc::clone(&session_manager), Arc::clone(&ws_manager));
    let health = Arc::new(HealthMonitor::new(
        grid_live::AlertThresholds::default(),
        Box::new(app_metrics),
    ));

    let metrics = Arc::new(MetricsRegistry::new());
    let recovery = Arc::new(RecoverySupervisor::with_default_actions(
        Arc::clone(&session_manager),
        Arc::clone(&metrics),
    ));

    let rate_limiter = Arc::new(grid_http::rate_limit::IpRateLimiter::new(
        HttpRateLimitConfig::default(),
        Arc::new(LiveClock) as Arc<dyn grid_core::Clock>,
    ));

    let state = AppState {
        sessions: session_manager,
        verifier,
        users: user_store,
        health,
        recovery,
        metrics,
        rate_limiter,
    };

    Ok(Wired { state, nonce_store })
}

/// Builds the [`SessionFactory`] closure: per session, looks up the owning user's exchange
/// credentials, builds a [`RestExchangeClient`] guarded by the shared [`RateLimitGuard`], opens a
/// [`WsConnection`] whose `FillHandler` forwards decoded fills into the returned channel, and
/// reserves a global connection slot for as long as that WebSocket stays open (spec.md §4.2,
/// §4.5, §4.9 "the caller owns credential lookup and connection setup").
fn build_session_factory(
    config: &ServerConfig,
    user_store: Arc<dyn UserStore>,
    exchange_guard: Arc<RateLimitGuard>,
    ws_manager: Arc<WsManager>,
    slot_registry: Arc<WsSlotRegistry>,
) -> SessionFactory {
    let rest_base_url =
        Url::parse(&config.exchange_rest_url).expect("EXCHANGE_REST_URL must be a valid URL");
    let ws_base_url = config.exchange_ws_url.clone();
    let max_reconnect_attempts = config.websocket_reconnect_attempts;

    Arc::new(move |session_config: &SessionConfig| {
        build_session_network(
            session_config,
            &rest_base_url,
            &ws_base_url,
            max_reconnect_attempts,
            &user_store,
            &exchange_guard,
            &ws_manager,
            &slot_registry,
        )
    })
}

/// The synchronous body of the session factory. Credential lookup is the one genuinely async
/// step in an otherwise-synchronous closure (spec.md §4.9's factory signature can't `.await`);
/// `block_in_place` is the documented way to run a short blocking/async step from inside a
/// callback on a multi-threaded runtime without stalling the caller's own task.
fn build_session_network(
    session_config: &SessionConfig,
    rest_base_url: &Url,
    ws_base_url: &str,
    max_reconnect_attempts: u32,
    user_store: &Arc<dyn UserStore>,
    exchange_guard: &Arc<RateLimitGuard>,
    ws_manager: &Arc<WsManager>,
    slot_registry: &Arc<WsSlotRegistry>,
) -> (Arc<dyn ExchangeClient>, Arc<WsConnection>, mpsc::UnboundedReceiver<FillNotification>) {
    let session_id = SessionId::new(&session_config.user_id, &session_config.instrument);
    let user_id = session_config.user_id.clone();

    let credentials = {
        let user_store = Arc::clone(user_store);
        let record = tokio::task::block_in_place(move || {
            tokio::runtime::Handle::current().block_on(user_store.get_credentials(&user_id))
        });
        match record {
            Ok(record) => ExchangeCredentials {
                api_key: record.api_key.unwrap_or_default(),
                api_secret: record.api_secret.unwrap_or_default(),
            },
            Err(error) => {
                error!(%session_id, %error, "failed to load exchange credentials; session will run unauthenticated");
                ExchangeCredentials { api_key: String::new(), api_secret: String::new() }
            }
        }
    };

    let exchange = RestExchangeClient::new(rest_base_url.clone(), credentials.clone(), Arc::clone(exchange_guard))
        .expect("reqwest client construction should not fail under normal process configuration");
    let exchange: Arc<dyn ExchangeClient> = Arc::new(exchange);

    let (fill_tx, fill_rx) = mpsc::unbounded_channel();
    let handler: grid_network::FillHandler = Arc::new(move |fill: FillNotification| {
        if fill_tx.send(fill).is_err() {
            warn!("fill notification dropped: session's receiver already closed");
        }
    });

    let ws = Arc::new(WsConnection::new(ws_base_url.to_string(), credentials.api_key.clone(), handler));

    match ws_manager.reserve_slot() {
        Ok(guard) => {
            slot_registry.guards.insert(session_id.clone(), guard);
            spawn_slot_release_watcher(Arc::clone(&ws), Arc::clone(slot_registry), session_id.clone());
        }
        Err(error) => {
            error!(%session_id, %error, "global websocket connection cap reached; session starts without a live fill subscription");
        }
    }

    spawn_initial_connect(Arc::clone(&ws), max_reconnect_attempts, session_id);

    (exchange, ws, fill_rx)
}

fn spawn_initial_connect(ws: Arc<WsConnection>, max_attempts: u32, session_id: SessionId) {
    tokio::spawn(async move {
        if let Err(error) = ws.connect(max_attempts).await {
            error!(%session_id, %error, "initial websocket connect failed; the session's own reconnect loop will retry");
        }
    });
}

/// Waits for a connection to leave its initial `Disconnected` state, then watches for it to
/// return to `Disconnected` — the terminal state [`WsConnection::close`] sets — and releases the
/// slot at that point instead of holding it until process exit.
fn spawn_slot_release_watcher(ws: Arc<WsConnection>, registry: Arc<WsSlotRegistry>, session_id: SessionId) {
    tokio::spawn(async move {
        while ws.state().await == WsState::Disconnected {
            tokio::time::sleep(SLOT_WATCH_SETTLE_POLL_INTERVAL).await;
        }
        loop {
            tokio::time::sleep(SLOT_WATCH_POLL_INTERVAL).await;
            if ws.state().await == WsState::Disconnected {
                registry.guards.remove(&session_id);
                break;
            }
        }
    });
}
