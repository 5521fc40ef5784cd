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

//! Process configuration: built-in defaults, layered with `.env` (via `dotenvy`) and the process
//! environment through `clap`'s `env` feature, mirroring the original bot's
//! `settings.py`/`production_config.py` split between exchange credentials and system knobs.

use std::net::{IpAddr, Ipv4Addr};

use clap::Parser;
use grid_live::AdmissionConfig;
use grid_network::RateLimitConfig as ExchangeRateLimitConfig;

/// Top-level CLI/environment configuration for the `grid-server` binary.
///
/// Every field resolves, in order: explicit CLI flag, `GRID_*` environment variable (including
/// `.env`), then the documented default.
#[derive(Parser, Debug, Clone)]
#[command(name = "grid-server")]
#[command(about = "Multi-tenant grid-trading engine control plane")]
pub struct ServerConfig {
    /// Interface to bind the HTTP control plane to.
    #[arg(long, env = "GRID_HOST", default_value_t = IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)))]
    pub host: IpAddr,

    /// Port to bind the HTTP control plane to.
    #[arg(long, env = "GRID_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Postgres host.
    #[arg(long, env = "POSTGRES_HOST", default_value = "localhost")]
    pub postgres_host: String,

    /// Postgres port.
    #[arg(long, env = "POSTGRES_PORT", default_value_t = 5432)]
    pub postgres_port: u16,

    /// Postgres username.
    #[arg(long, env = "POSTGRES_USERNAME", default_value = "grid_engine")]
    pub postgres_username: String,

    /// Postgres password.
    #[arg(long, env = "POSTGRES_PASSWORD", default_value = "grid_engine")]
    pub postgres_password: String,

    /// Postgres database name.
    #[arg(long, env = "POSTGRES_DATABASE", default_value = "grid_engine")]
    pub postgres_database: String,

    /// Base URL of the upstream exchange's REST API.
    #[arg(long, env = "EXCHANGE_REST_URL", default_value = "https://api.orderly.org")]
    pub exchange_rest_url: String,

    /// Base URL of the upstream exchange's private WebSocket stream.
    #[arg(long, env = "EXCHANGE_WS_URL", default_value = "wss://ws-private.orderly.org/ws/stream")]
    pub exchange_ws_url: String,

    /// Requests-per-minute budget handed to the rate-limit guard (spec.md §4.1).
    #[arg(long, env = "EXCHANGE_RPM", default_value_t = 120)]
    pub exchange_requests_per_minute: u32,

    /// Requests-per-second budget handed to the rate-limit guard (spec.md §4.1).
    #[arg(long, env = "EXCHANGE_RPS", default_value_t = 10)]
    pub exchange_requests_per_second: u32,

    /// Maximum concurrent in-flight session creations (spec.md §4.9 "Admission").
    #[arg(long, env = "MAX_CONCURRENT_SESSIONS", default_value_t = 5)]
    pub max_concurrent_creating: usize,

    /// Maximum session creations admitted per rolling second (spec.md §4.9 "Admission").
    #[arg(long, env = "MAX_SESSIONS_PER_SECOND", default_value_t = 10)]
    pub max_creations_per_second: usize,

    /// Global cap on simultaneous WebSocket connections (spec.md §4.5).
    #[arg(long, env = "WEBSOCKET_MAX_CONNECTIONS", default_value_t = 50)]
    pub max_websocket_connections: usize,

    /// Maximum reconnect attempts before a WebSocket connection moves to `Failed` (spec.md §4.5).
    #[arg(long, env = "WEBSOCKET_RECONNECT_ATTEMPTS", default_value_t = 5)]
    pub websocket_reconnect_attempts: u32,

    /// How often the health monitor samples system resources, in seconds (spec.md §4.10).
    #[arg(long, env = "MONITORING_INTERVAL", default_value_t = 30)]
    pub monitoring_interval_secs: u64,

    /// How often the nonce store is swept for expired records, in seconds (spec.md §4.3).
    #[arg(long, env = "NONCE_SWEEP_INTERVAL", default_value_t = 60)]
    pub nonce_sweep_interval_secs: u64,
}

impl ServerConfig {
    /// Parses configuration from CLI flags and the process environment (after `.env` has been
    /// loaded by the caller).
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }

    #[must_use]
    pub fn postgres_options(&self) -> grid_persistence::PostgresConnectOptions {
        grid_persistence::PostgresConnectOptions::from_env_or_defaults(
            Some(self.postgres_host.clone()),
            Some(self.postgres_port),
            Some(self.postgres_username.clone()),
            Some(self.postgres_password.clone()),
            Some(self.postgres_database.clone()),
        )
    }

    #[must_use]
    pub fn admission_config(&self) -> AdmissionConfig {
        AdmissionConfig {
            max_concurrent_creating: self.max_concurrent_creating,
            max_creations_per_second: self.max_creations_per_second,
        }
    }

    #[must_use]
    pub fn exchange_rate_limit_config(&self) -> ExchangeRateLimitConfig {
        ExchangeRateLimitConfig {
            requests_per_minute: self.exchange_requests_per_minute,
            requests_per_second: self.exchange_requests_per_second,
            ..ExchangeRateLimitConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_from_an_empty_argv() {
        let config = ServerConfig::parse_from(["grid-server"]);
        assert_eq!(config.port, 8000);
        assert_eq!(config.max_concurrent_creating, 5);
    }
}
