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

use grid_core::{ErrorCategory, GridError};

/// Errors raised by the Postgres-backed stores.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("a running session already exists for this user and instrument")]
    DuplicateRunningSession,

    #[error("user not found: {0}")]
    UserNotFound(String),
}

impl GridError for PersistenceError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Database(_) => "PERSISTENCE_UNAVAILABLE",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::DuplicateRunningSession => "DUPLICATE_GRID_SESSION",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Database(_) => ErrorCategory::Internal,
            Self::SessionNotFound(_) | Self::DuplicateRunningSession => ErrorCategory::Session,
            Self::UserNotFound(_) => ErrorCategory::ClientInput,
        }
    }
}
