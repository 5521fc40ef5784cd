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

//! Exchange connectivity for the grid-trading engine.
//!
//! This crate provides the rate-limit guard (C1), the exchange REST client (C2), and the
//! WebSocket notification client (C5) consumed by `grid-execution` and `grid-live`.

#![warn(rustc::all)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]

pub mod error;
pub mod rate_limiter;
pub mod rest;
pub mod ws;

pub use crate::{
    error::NetworkError,
    rate_limiter::{RateLimitConfig, RateLimitGuard},
    rest::{
        AccountInfo, CreatedOrder, ExchangeClient, ExchangeCredentials, ExchangeOrder,
        ExchangeOrderId, OrderFilters, Position, RestExchangeClient,
    },
    ws::{
        decode_fill_notification, fibonacci_backoff_secs, FillHandler, FillNotification,
        WsConnection, WsManager, WsSlotGuard, WsState,
    },
};
