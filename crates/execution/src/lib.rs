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

//! The order tracker (C6) and grid engine (C7): ladder construction, fill reaction,
//! bound/stop behaviour, and order restoration.

#![warn(rustc::all)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]

pub mod engine;
pub mod error;
pub mod ladder;
pub mod restoration;
pub mod tracker;

pub use crate::{
    engine::{EngineSignal, GridEngine, PriceTick, StopBounds},
    error::ExecutionError,
    ladder::{build_ladder, GridLevel, Ladder, LadderParams, Spacing},
    restoration::{
        classify_cancel_reason, decide_restoration, CancellationType, RestorationConfig,
        RestorationPolicy, RestorationRateLimiter,
    },
    tracker::{FillKey, OrderTracker, TrackedOrder},
};
