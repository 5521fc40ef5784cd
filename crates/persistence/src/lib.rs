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

//! Durable storage for the grid-trading engine: the session registry (C9's persistent half),
//! user credential lookups, and the nonce replay-defense table (C3).
//!
//! Everything here is backed by Postgres via `sqlx`, with an in-memory fallback for the nonce
//! store so C4 can still reject replays (conservatively, by denying novel requests) when the
//! database is unreachable.

#![warn(rustc::all)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]

pub mod error;
pub mod nonce_store;
pub mod pg;
pub mod sessions;
pub mod users;

pub use crate::{
    error::PersistenceError,
    nonce_store::{FallbackNonceStore, InMemoryNonceStore, PostgresNonceStore},
    pg::{PostgresConnectOptions, connect_pg},
    sessions::{PostgresSessionStore, SessionRecord, SessionStore},
    users::{PostgresUserStore, UserCredentials, UserStore},
};
