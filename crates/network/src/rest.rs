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

//! The exchange REST client (C2): order placement, cancellation, and account reads, each call
//! wrapped by the [`RateLimitGuard`](crate::rate_limiter::RateLimitGuard) and classified into
//! `{rate_limited, connection, timeout, other}` on failure (spec.md §4.2).

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use grid_core::{InstrumentId, OrderSide, Price, Qty};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{error::NetworkError, rate_limiter::RateLimitGuard};

/// Per-user credentials loaded from the user record. Never cross a session boundary; the
/// exchange client is constructed fresh per user and holds only what it needs to sign requests.
#[derive(Clone)]
pub struct ExchangeCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for ExchangeCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// The order identifier assigned by the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeOrderId(pub String);

/// Result of `create_limit_order` (spec.md §4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedOrder {
    pub order_id: ExchangeOrderId,
}

/// A tracked position as reported by `get_positions`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Position {
    pub instrument: InstrumentId,
    pub quantity: Qty,
    pub average_open_price: Price,
}

/// Account-level balances and margin as reported by `get_account_info`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountInfo {
    pub total_collateral: Decimal,
    pub free_collateral: Decimal,
}

/// An order as reported by `get_orders`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExchangeOrder {
    pub order_id: ExchangeOrderId,
    pub instrument: InstrumentId,
    pub side: OrderSide,
    pub price: Price,
    pub quantity: Qty,
    pub status: String,
}

/// Filters accepted by `get_orders` (spec.md §4.2).
#[derive(Debug, Clone, Default)]
pub struct OrderFilters {
    pub instrument: Option<InstrumentId>,
    pub status: Option<String>,
}

/// The operations the grid engine consumes from the exchange, each wrapped by C1 (spec.md §4.2).
#[async_trait]
pub trait ExchangeClient: Send + Sync + std::fmt::Debug {
    async fn create_limit_order(
        &self,
        instrument: &InstrumentId,
        side: OrderSide,
        price: Price,
        qty: Qty,
    ) -> Result<CreatedOrder, NetworkError>;

    async fn cancel_order(
        &self,
        instrument: &InstrumentId,
        order_id: &ExchangeOrderId,
    ) -> Result<(), NetworkError>;

    async fn cancel_all_orders(&self, instrument: &InstrumentId) -> Result<(), NetworkError>;

    async fn get_account_info(&self) -> Result<AccountInfo, NetworkError>;

    async fn get_positions(&self) -> Result<Vec<Position>, NetworkError>;

    async fn get_orders(&self, filters: OrderFilters) -> Result<Vec<ExchangeOrder>, NetworkError>;
}

/// A `reqwest`-backed [`ExchangeClient`], every call routed through a shared
/// [`RateLimitGuard`].
#[derive(Debug)]
pub struct RestExchangeClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: ExchangeCredentials,
    guard: Arc<RateLimitGuard>,
}

impl RestExchangeClient {
    /// Builds a client against `base_url`, signing requests with `credentials` and admitting
    /// them through `guard`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying `reqwest::Client` fails to build.
    pub fn new(
        base_url: Url,
        credentials: ExchangeCredentials,
        guard: Arc<RateLimitGuard>,
    ) -> Result<Self, NetworkError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NetworkError::Transport(e.to_string()))?;
        Ok(Self { http, base_url, credentials, guard })
    }

    fn signed_request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = self.base_url.join(path).expect("valid relative path");
        self.http
            .request(method, url)
            .header("X-API-Key", &self.credentials.api_key)
    }

    async fn send<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, NetworkError> {
        self.guard
            .execute(|| async {
                let request = request
                    .try_clone()
                    .ok_or_else(|| NetworkError::Transport("request not cloneable".into()))?;
                let response = request.send().await.map_err(|e| NetworkError::from_reqwest(&e))?;
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .map_err(|e| NetworkError::from_reqwest(&e))?;

                if !status.is_success() {
                    if status.as_u16() == 429 || NetworkError::text_looks_rate_limited(&body) {
                        return Err(NetworkError::RateLimited { retry_after: None });
                    }
                    if status.as_u16() == 401 || status.as_u16() == 403 {
                        return Err(NetworkError::Auth(body));
                    }
                    return Err(NetworkError::Http { status: status.as_u16(), message: body });
                }

                serde_json::from_str(&body).map_err(|e| NetworkError::Decode(e.to_string()))
            })
            .await
    }
}

#[async_trait]
impl ExchangeClient for RestExchangeClient {
    async fn create_limit_order(
        &self,
        instrument: &InstrumentId,
        side: OrderSide,
        price: Price,
        qty: Qty,
    ) -> Result<CreatedOrder, NetworkError> {
        #[derive(Serialize)]
        struct Body<'a> {
            symbol: &'a str,
            side: OrderSide,
            order_type: &'a str,
            price: Price,
            order_quantity: Qty,
        }

        let request = self
            .signed_request(reqwest::Method::POST, "/v1/order")
            .json(&Body {
                symbol: instrument.as_str(),
                side,
                order_type: "LIMIT",
                price,
                order_quantity: qty,
            });
        self.send(request).await
    }

    async fn cancel_order(
        &self,
        instrument: &InstrumentId,
        order_id: &ExchangeOrderId,
    ) -> Result<(), NetworkError> {
        let path = format!("/v1/order?symbol={}&order_id={}", instrument.as_str(), order_id.0);
        let request = self.signed_request(reqwest::Method::DELETE, &path);
        let _: serde_json::Value = self.send(request).await?;
        Ok(())
    }

    async fn cancel_all_orders(&self, instrument: &InstrumentId) -> Result<(), NetworkError> {
        let path = format!("/v1/orders?symbol={}", instrument.as_str());
        let request = self.signed_request(reqwest::Method::DELETE, &path);
        let _: serde_json::Value = self.send(request).await?;
        Ok(())
    }

    async fn get_account_info(&self) -> Result<AccountInfo, NetworkError> {
        let request = self.signed_request(reqwest::Method::GET, "/v1/client/info");
        self.send(request).await
    }

    async fn get_positions(&self) -> Result<Vec<Position>, NetworkError> {
        let request = self.signed_request(reqwest::Method::GET, "/v1/positions");
        self.send(request).await
    }

    async fn get_orders(&self, filters: OrderFilters) -> Result<Vec<ExchangeOrder>, NetworkError> {
        let mut path = "/v1/orders".to_string();
        let mut params = Vec::new();
        if let Some(instrument) = &filters.instrument {
            params.push(format!("symbol={}", instrument.as_str()));
        }
        if let Some(status) = &filters.status {
            params.push(format!("status={status}"));
        }
        if !params.is_empty() {
            path.push('?');
            path.push_str(&params.join("&"));
        }
        let request = self.signed_request(reqwest::Method::GET, &path);
        self.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_redacts_secret() {
        let creds = ExchangeCredentials {
            api_key: "key123".into(),
            api_secret: "supersecret".into(),
        };
        let debug = format!("{creds:?}");
        assert!(debug.contains("key123"));
        assert!(!debug.contains("supersecret"));
    }

    #[test]
    fn order_filters_query_string_includes_only_present_fields() {
        let filters = OrderFilters {
            instrument: Some(InstrumentId::parse("PERP_BTC_USDC").unwrap()),
            status: None,
        };
        assert!(filters.instrument.is_some());
        assert!(filters.status.is_none());
    }
}
