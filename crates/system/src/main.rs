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

//! The multi-tenant grid-trading engine's control-plane binary: loads configuration, wires every
//! crate together, and serves the HTTP API defined in `grid-http` until asked to shut down.

mod config;
mod metrics_source;
mod wiring;

use std::{net::SocketAddr, time::Duration};

use config::ServerConfig;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::load();
    let wired = wiring::build(&config).await?;

    spawn_health_loop(Duration::from_secs(config.monitoring_interval_secs), wired.state.health.clone());
    spawn_nonce_sweep_loop(Duration::from_secs(config.nonce_sweep_interval_secs), wired.nonce_store.clone());

    let router = grid_http::build_router(wired.state);
    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "grid-server listening");

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("grid-server shut down cleanly");
    Ok(())
}

/// `tracing-subscriber`'s env-filter + fmt layers, configured by `RUST_LOG` (defaulting to
/// `info` for this crate's own logs and `warn` for dependencies).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolves once either `SIGINT` (Ctrl-C) or `SIGTERM` is received, so `axum::serve` can drain
/// in-flight requests before the process exits.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                warn!(%error, "failed to install SIGTERM handler; only Ctrl-C will trigger shutdown");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown signal received, draining in-flight requests");
}

/// Periodically samples system/application metrics and logs an alert when [`HealthMonitor`]'s
/// thresholds are breached (spec.md §4.10 "Periodic sampling" — the monitor itself has no
/// built-in scheduler, since tests drive it reactively).
///
/// [`HealthMonitor`]: grid_live::HealthMonitor
fn spawn_health_loop(interval: Duration, health: std::sync::Arc<grid_live::HealthMonitor>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let result = health.check_health().await;
            if !result.healthy {
                let failing: Vec<&str> =
                    result.checks.iter().filter(|(_, passed)| !passed).map(|(name, _)| *name).collect();
                warn!(?failing, "health check failed");
            }
        }
    });
}

/// Periodically sweeps expired nonce records so replay-defense storage does not grow
/// unboundedly (spec.md §4.3 "Nonce TTL").
fn spawn_nonce_sweep_loop(interval: Duration, nonce_store: std::sync::Arc<dyn grid_cryptography::NonceStore>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let now = chrono::Utc::now().timestamp();
            match nonce_store.sweep_expired(now).await {
                Ok(removed) if removed > 0 => info!(removed, "swept expired nonces"),
                Ok(_) => {}
                Err(error) => error!(%error, "nonce sweep failed"),
            }
        }
    });
}
