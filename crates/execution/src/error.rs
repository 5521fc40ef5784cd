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

//! Errors raised by the order tracker (C6) and grid engine (C7).

use grid_core::{ErrorCategory, GridError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A grid level was requested that does not exist in this session's ladder.
    #[error("unknown grid level at price {0}")]
    UnknownGridLevel(rust_decimal::Decimal),

    /// `register_new` was called for a grid level that already has an open order.
    #[error("grid level {0} already has an open order")]
    GridLevelOccupied(rust_decimal::Decimal),

    /// `mark_filled`/`mark_cancelled`/`lookup_by_id` referenced an order id the tracker does not
    /// know about.
    #[error("unknown order id: {0}")]
    UnknownOrder(String),

    /// Ladder construction was given an invalid band or level count.
    #[error("invalid ladder parameters: {0}")]
    InvalidLadder(String),

    /// The underlying exchange call failed; wraps the network crate's classification.
    #[error("exchange call failed: {0}")]
    Network(#[from] grid_network::NetworkError),
}

impl GridError for ExecutionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownGridLevel(_) => "EXECUTION_UNKNOWN_LEVEL",
            Self::GridLevelOccupied(_) => "EXECUTION_LEVEL_OCCUPIED",
            Self::UnknownOrder(_) => "EXECUTION_UNKNOWN_ORDER",
            Self::InvalidLadder(_) => "EXECUTION_INVALID_LADDER",
            Self::Network(_) => "EXECUTION_NETWORK_ERROR",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownGridLevel(_) | Self::GridLevelOccupied(_) | Self::UnknownOrder(_) => {
                ErrorCategory::Internal
            }
            Self::InvalidLadder(_) => ErrorCategory::ClientInput,
            Self::Network(inner) => inner.category(),
        }
    }
}
