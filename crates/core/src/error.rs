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

//! The shared error taxonomy (§7 of the grid-trading specification).
//!
//! Leaf components (network, cryptography, persistence, execution) each define their own
//! `thiserror`-derived error enum tailored to their failure modes, and implement
//! [`ErrorCategory`] so the HTTP boundary can map any error to a stable `error_code`
//! and HTTP status without needing to know the concrete error type.

use serde::Serialize;

/// The five error categories from the specification's error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Missing/invalid parameter, bounds violation. Not recoverable; surfaced to the caller.
    ClientInput,
    /// Expired timestamp, duplicate nonce, bad signature, unknown wallet type.
    Auth,
    /// Session not found, already exists, duplicate (user, instrument), rate-limited creation.
    Session,
    /// Exchange API error, connection, timeout, rate-limited.
    Upstream,
    /// Invariant violation, recovery failed.
    Internal,
}

impl ErrorCategory {
    /// The HTTP status this category maps to by default (specific errors may override via
    /// [`GridError::http_status`]).
    #[must_use]
    pub fn default_http_status(self) -> u16 {
        match self {
            Self::ClientInput => 400,
            Self::Auth => 401,
            Self::Session => 409,
            Self::Upstream => 502,
            Self::Internal => 500,
        }
    }

    /// Whether errors in this category are recoverable by retry (per §7: "by retry" /
    /// "retry/backoff" / "via supervisor" columns count as recoverable).
    #[must_use]
    pub fn is_recoverable(self) -> bool {
        matches!(self, Self::Session | Self::Upstream | Self::Internal)
    }
}

/// A trait implemented by every crate-local error enum so the HTTP boundary can classify it
/// without depending on the concrete error type.
pub trait GridError: std::error::Error {
    /// The stable, machine-readable error code (e.g. `"DUPLICATE_GRID_SESSION"`).
    fn error_code(&self) -> &'static str;

    /// The taxonomy category this error belongs to.
    fn category(&self) -> ErrorCategory;

    /// The HTTP status code for this specific error; defaults to the category's default.
    fn http_status(&self) -> u16 {
        self.category().default_http_status()
    }

    /// A natural-language message safe to show to an end user (not a stack trace).
    fn user_message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_input_is_not_recoverable() {
        assert!(!ErrorCategory::ClientInput.is_recoverable());
        assert!(!ErrorCategory::Auth.is_recoverable());
    }

    #[test]
    fn upstream_and_session_are_recoverable() {
        assert!(ErrorCategory::Upstream.is_recoverable());
        assert!(ErrorCategory::Session.is_recoverable());
        assert!(ErrorCategory::Internal.is_recoverable());
    }

    #[test]
    fn default_status_codes_match_taxonomy() {
        assert_eq!(ErrorCategory::ClientInput.default_http_status(), 400);
        assert_eq!(ErrorCategory::Auth.default_http_status(), 401);
        assert_eq!(ErrorCategory::Session.default_http_status(), 409);
        assert_eq!(ErrorCategory::Upstream.default_http_status(), 502);
        assert_eq!(ErrorCategory::Internal.default_http_status(), 500);
    }
}
