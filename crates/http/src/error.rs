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

//! The HTTP boundary's own error type: request-validation failures that never reach a leaf
//! component, plus a wrapper for every [`GridError`] the handlers call into.

use grid_core::{ErrorCategory, GridError};

/// Errors the HTTP layer itself can raise, alongside everything it forwards from
/// `grid-live`/`grid-cryptography`/`grid-persistence`.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("{0}")]
    Validation(String),

    #[error("rate limit exceeded, retry shortly")]
    RateLimited,

    #[error(transparent)]
    Live(#[from] grid_live::LiveError),

    #[error(transparent)]
    Cryptography(#[from] grid_cryptography::CryptographyError),

    #[error(transparent)]
    Persistence(#[from] grid_persistence::PersistenceError),
}

impl GridError for HttpError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "INVALID_REQUEST",
            Self::RateLimited => "RATE_LIMITED",
            Self::Live(inner) => inner.error_code(),
            Self::Cryptography(inner) => inner.error_code(),
            Self::Persistence(inner) => inner.error_code(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::ClientInput,
            Self::RateLimited => ErrorCategory::Session,
            Self::Live(inner) => inner.category(),
            Self::Cryptography(inner) => inner.category(),
            Self::Persistence(inner) => inner.category(),
        }
    }

    fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::RateLimited => 429,
            Self::Live(inner) => inner.http_status(),
            Self::Cryptography(inner) => inner.http_status(),
            Self::Persistence(inner) => inner.http_status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_400_client_input() {
        let error = HttpError::Validation("ticker must match PERP_<BASE>_USDC".into());
        assert_eq!(error.http_status(), 400);
        assert_eq!(error.category(), ErrorCategory::ClientInput);
        assert_eq!(error.error_code(), "INVALID_REQUEST");
    }

    #[test]
    fn rate_limited_is_429() {
        assert_eq!(HttpError::RateLimited.http_status(), 429);
    }
}
