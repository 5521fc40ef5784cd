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

//! Errors raised by the session, session manager, and recovery supervisor (C8/C9/C11).

use grid_core::{ErrorCategory, GridError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LiveError {
    #[error("a running session already exists for this user and instrument")]
    DuplicateGridSession,

    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error("session creation rate-limited, retry shortly")]
    SessionCreateRateLimited,

    #[error("force-cleanup of session {0} timed out")]
    ForceCleanupTimedOut(String),

    #[error("ladder/session construction failed: {0}")]
    Execution(#[from] grid_execution::ExecutionError),

    #[error("exchange call failed: {0}")]
    Network(#[from] grid_network::NetworkError),

    #[error("persistence error: {0}")]
    Persistence(#[from] grid_persistence::PersistenceError),
}

impl GridError for LiveError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::DuplicateGridSession => "DUPLICATE_GRID_SESSION",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::SessionCreateRateLimited => "SESSION_CREATE_RATE_LIMITED",
            Self::ForceCleanupTimedOut(_) => "SESSION_FORCE_CLEANUP_TIMEOUT",
            Self::Execution(_) => "SESSION_EXECUTION_ERROR",
            Self::Network(_) => "SESSION_NETWORK_ERROR",
            Self::Persistence(_) => "SESSION_PERSISTENCE_ERROR",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::DuplicateGridSession
            | Self::SessionNotFound(_)
            | Self::SessionCreateRateLimited => ErrorCategory::Session,
            Self::ForceCleanupTimedOut(_) => ErrorCategory::Internal,
            Self::Execution(inner) => inner.category(),
            Self::Network(inner) => inner.category(),
            Self::Persistence(_) => ErrorCategory::Internal,
        }
    }

    fn http_status(&self) -> u16 {
        match self {
            Self::DuplicateGridSession => 409,
            Self::SessionNotFound(_) => 404,
            Self::SessionCreateRateLimited => 429,
            _ => self.category().default_http_status(),
        }
    }
}
