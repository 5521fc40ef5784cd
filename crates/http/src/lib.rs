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

//! The HTTP control plane (C12): thin handlers over the session manager (C9) and the wallet
//! verifier (C4), wrapped in a structured JSON envelope with per-route rate limiting.
//!
//! This crate owns no trading logic; every handler's job is to validate the request, delegate to
//! `grid-live`/`grid-cryptography`/`grid-persistence`, and translate the outcome into the
//! envelope shape every endpoint returns.

#![warn(rustc::all)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]

pub mod envelope;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use crate::{
    envelope::Envelope,
    error::HttpError,
    rate_limit::{RateLimitClass, RateLimitConfig},
    routes::build_router,
    state::AppState,
};
