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

//! Challenge generation for `GET /api/auth/challenge`.

use base64::prelude::*;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::Serialize;

/// The signature validity window, matching the original service's five-minute tolerance.
pub const SIGNATURE_VALIDITY_WINDOW_SECS: i64 = 300;

/// A signing challenge returned to the client: a timestamp, a random nonce, and the exact
/// message the wallet must sign.
#[derive(Debug, Clone, Serialize)]
pub struct Challenge {
    pub timestamp: i64,
    pub nonce: String,
    pub message: String,
}

impl Challenge {
    /// Builds the canonical challenge message for a given timestamp and nonce.
    #[must_use]
    pub fn message_for(timestamp: i64, nonce: &str) -> String {
        format!("Please sign this message to confirm your identity.\nTimestamp: {timestamp}\nNonce: {nonce}")
    }

    /// Generates a fresh challenge using the current time and 32 random bytes, base64-encoded.
    #[must_use]
    pub fn generate(now: DateTime<Utc>) -> Self {
        let timestamp = now.timestamp();
        let mut raw = [0u8; 32];
        rand::rng().fill_bytes(&mut raw);
        let nonce = BASE64_STANDARD.encode(raw);
        let message = Self::message_for(timestamp, &nonce);
        Self {
            timestamp,
            nonce,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_format_matches_expected_layout() {
        let message = Challenge::message_for(1_700_000_000, "abc123");
        assert_eq!(
            message,
            "Please sign this message to confirm your identity.\nTimestamp: 1700000000\nNonce: abc123"
        );
    }

    #[test]
    fn generated_nonces_are_unique() {
        let now = Utc::now();
        let a = Challenge::generate(now);
        let b = Challenge::generate(now);
        assert_ne!(a.nonce, b.nonce);
        assert_eq!(a.timestamp, now.timestamp());
    }
}
