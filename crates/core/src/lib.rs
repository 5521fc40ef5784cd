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

//! Foundational types shared by every crate in the grid-trading engine.
//!
//! This crate is deliberately small and has no async runtime or I/O dependencies. It supplies:
//!
//! - The session/grid/order domain types ([`types`]).
//! - The cross-cutting error taxonomy that every component tags its errors with ([`error`]).
//! - Design-by-contract style correctness checks ([`correctness`]).
//! - A testable clock abstraction ([`clock`]).
//! - A minimal in-process counter/histogram registry ([`metrics`]).

#![warn(rustc::all)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]

pub mod clock;
pub mod correctness;
pub mod error;
pub mod metrics;
pub mod types;

pub use crate::{
    clock::{Clock, LiveClock},
    error::{ErrorCategory, GridError},
    types::{Direction, GridType, InstrumentId, OrderSide, Price, Qty, SessionId, SessionState},
};
