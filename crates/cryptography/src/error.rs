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

/// Errors raised while issuing challenges or verifying wallet signatures.
#[derive(Debug, thiserror::Error)]
pub enum CryptographyError {
    #[error("signature timestamp expired: now={now}, timestamp={timestamp}, window={window_secs}s")]
    ExpiredTimestamp {
        now: i64,
        timestamp: i64,
        window_secs: i64,
    },

    #[error("nonce already used")]
    ReplayedNonce,

    #[error("unrecognized wallet address format: {0}")]
    UnknownWalletType(String),

    #[error("signature verification failed")]
    SignatureMismatch,

    #[error("malformed signature encoding: {0}")]
    MalformedSignature(String),

    #[error("malformed public key or address: {0}")]
    MalformedKey(String),

    #[error("nonce store unavailable: {0}")]
    NonceStoreUnavailable(String),
}

impl CryptographyError {
    /// Whether this failure indicates the caller should simply retry with a fresh challenge
    /// (expired timestamp, replay) as opposed to a malformed request.
    #[must_use]
    pub fn is_retryable_with_fresh_challenge(&self) -> bool {
        matches!(self, Self::ExpiredTimestamp { .. } | Self::ReplayedNonce)
    }
}

impl GridError for CryptographyError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ExpiredTimestamp { .. } => "SIGNATURE_EXPIRED",
            Self::ReplayedNonce => "NONCE_REPLAYED",
            Self::UnknownWalletType(_) => "UNKNOWN_WALLET_TYPE",
            Self::SignatureMismatch => "SIGNATURE_INVALID",
            Self::MalformedSignature(_) => "SIGNATURE_MALFORMED",
            Self::MalformedKey(_) => "WALLET_KEY_MALFORMED",
            Self::NonceStoreUnavailable(_) => "NONCE_STORE_UNAVAILABLE",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::NonceStoreUnavailable(_) => ErrorCategory::Internal,
            _ => ErrorCategory::Auth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_and_expiry_are_retryable_with_fresh_challenge() {
        assert!(CryptographyError::ReplayedNonce.is_retryable_with_fresh_challenge());
        assert!(
            CryptographyError::ExpiredTimestamp {
                now: 100,
                timestamp: 0,
                window_secs: 5
            }
            .is_retryable_with_fresh_challenge()
        );
        assert!(!CryptographyError::SignatureMismatch.is_retryable_with_fresh_challenge());
    }

    #[test]
    fn store_outage_is_internal_not_auth() {
        assert_eq!(
            CryptographyError::NonceStoreUnavailable("down".into()).category(),
            ErrorCategory::Internal
        );
        assert_eq!(
            CryptographyError::SignatureMismatch.category(),
            ErrorCategory::Auth
        );
    }
}
