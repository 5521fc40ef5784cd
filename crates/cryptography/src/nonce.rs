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

//! The replay-defense seam (C3).
//!
//! [`WalletSignatureVerifier`](crate::verifier::WalletSignatureVerifier) depends only on this
//! trait, not on a concrete backend. `grid-persistence` supplies a Postgres-backed
//! implementation (a `used_nonces` table with a unique index on `nonce`) and an in-memory
//! fallback for when the database is unreachable.

use async_trait::async_trait;

/// Persists nonces exactly once, with a TTL so the backing store can be swept periodically.
#[async_trait]
pub trait NonceStore: std::fmt::Debug + Send + Sync {
    /// Atomically records `nonce` if and only if it has not been seen before.
    ///
    /// `expires_at_unix` is the second at which this record becomes eligible for cleanup.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation itself fails (not if the nonce was a
    /// duplicate — that is reported via the `Ok(false)` return value).
    ///
    /// Returns `Ok(true)` if the nonce was newly recorded, `Ok(false)` if it was already present
    /// (a replay attempt).
    async fn record_if_absent(
        &self,
        nonce: &str,
        timestamp_unix: i64,
        expires_at_unix: i64,
    ) -> anyhow::Result<bool>;

    /// Deletes every record whose `expires_at_unix` is before `now_unix`. Returns the count of
    /// records removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn sweep_expired(&self, now_unix: i64) -> anyhow::Result<u64>;
}
